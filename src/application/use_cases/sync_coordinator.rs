use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, info};

use crate::application::use_cases::{CollectionResolver, EmbeddingBuilder};
use crate::domain::{DomainError, EmbeddingPayload, Entity, ExtractionRules};

/// FIFO async locks keyed by string, created on demand and pruned once idle.
#[derive(Default)]
pub struct KeyedLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, key: &str) -> Result<OwnedMutexGuard<()>, DomainError> {
        let lock = {
            let mut locks = self
                .locks
                .lock()
                .map_err(|_| DomainError::internal("Sync lock table poisoned"))?;
            // Only the table holds an idle entry
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(key.to_string()).or_default().clone()
        };
        Ok(lock.lock_owned().await)
    }

    pub fn len(&self) -> usize {
        self.locks.lock().map(|l| l.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Pushes entity writes and deletes to the entity's collection.
///
/// Writes for one `(collection, id)` pair are applied in the order they were
/// issued; nothing is promised across different entities.
pub struct SyncCoordinator {
    resolver: Arc<CollectionResolver>,
    locks: KeyedLocks,
}

impl SyncCoordinator {
    pub fn new(resolver: Arc<CollectionResolver>) -> Self {
        Self {
            resolver,
            locks: KeyedLocks::new(),
        }
    }

    /// Builds the entity's payload and upserts it under the entity's id.
    pub async fn upsert<E: Entity>(
        &self,
        rules: &ExtractionRules<E>,
        entity: &E,
    ) -> Result<EmbeddingPayload, DomainError> {
        let collection_name = rules.collection_name();
        let id = entity.primary_key();
        let _guard = self.locks.lock(&sync_key(collection_name, &id)).await?;

        let payload = EmbeddingBuilder::build(rules, entity).await?;
        let collection = self.resolver.resolve(collection_name).await?;
        collection.upsert(&payload).await?;

        info!("Synced {} {} to {}", E::TYPE_NAME, id, collection_name);
        Ok(payload)
    }

    /// Removes `id` from the collection. Ids that were never indexed are fine.
    pub async fn delete(&self, collection_name: &str, id: &str) -> Result<(), DomainError> {
        let _guard = self.locks.lock(&sync_key(collection_name, id)).await?;

        let collection = self.resolver.resolve(collection_name).await?;
        collection.delete(&[id.to_string()]).await?;

        info!("Removed {} from {}", id, collection_name);
        Ok(())
    }

    /// Reads back what the collection currently holds for `id`.
    pub async fn fetch(
        &self,
        collection_name: &str,
        id: &str,
    ) -> Result<Option<EmbeddingPayload>, DomainError> {
        let collection = self.resolver.resolve(collection_name).await?;
        let payload = collection
            .get(&[id.to_string()])
            .await?
            .into_iter()
            .find(|p| p.id() == id);

        debug!(
            "Fetched {} from {}: {}",
            id,
            collection_name,
            if payload.is_some() { "found" } else { "absent" }
        );
        Ok(payload)
    }

    pub fn pending_keys(&self) -> usize {
        self.locks.len()
    }
}

fn sync_key(collection_name: &str, id: &str) -> String {
    format!("{}/{}", collection_name, id)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::connector::InMemoryVectorStore;

    #[derive(Clone)]
    struct Note {
        id: u32,
        text: String,
    }

    impl Entity for Note {
        const TYPE_NAME: &'static str = "Note";

        fn primary_key(&self) -> String {
            self.id.to_string()
        }
    }

    fn coordinator() -> SyncCoordinator {
        let store = Arc::new(InMemoryVectorStore::new());
        SyncCoordinator::new(Arc::new(CollectionResolver::new(store)))
    }

    fn rules() -> ExtractionRules<Note> {
        ExtractionRules::<Note>::builder()
            .document(|n: &Note| n.text.clone())
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_upsert_then_fetch() {
        let coordinator = coordinator();
        let note = Note {
            id: 1,
            text: "first".to_string(),
        };

        let written = coordinator.upsert(&rules(), &note).await.unwrap();
        let stored = coordinator.fetch("notes", "1").await.unwrap().unwrap();

        assert_eq!(stored, written);
    }

    #[tokio::test]
    async fn test_upsert_replaces_previous_version() {
        let coordinator = coordinator();
        let rules = rules();

        let mut note = Note {
            id: 1,
            text: "draft".to_string(),
        };
        coordinator.upsert(&rules, &note).await.unwrap();
        note.text = "published".to_string();
        coordinator.upsert(&rules, &note).await.unwrap();

        let stored = coordinator.fetch("notes", "1").await.unwrap().unwrap();
        assert_eq!(stored.document(), Some("published"));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let coordinator = coordinator();
        let note = Note {
            id: 3,
            text: "gone soon".to_string(),
        };

        coordinator.upsert(&rules(), &note).await.unwrap();
        coordinator.delete("notes", "3").await.unwrap();
        coordinator.delete("notes", "3").await.unwrap();
        coordinator.delete("notes", "never-indexed").await.unwrap();

        assert!(coordinator.fetch("notes", "3").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_lock_table_is_pruned_after_use() {
        let coordinator = coordinator();
        let rules = rules();

        for id in 0..5 {
            let note = Note {
                id,
                text: format!("note {id}"),
            };
            coordinator.upsert(&rules, &note).await.unwrap();
        }

        // The next lock call prunes every idle entry but its own.
        let _guard = coordinator.locks.lock("notes/99").await.unwrap();
        assert_eq!(coordinator.pending_keys(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_same_key_writes_are_serialized_in_order() {
        let locks = Arc::new(KeyedLocks::new());
        let log = Arc::new(Mutex::new(Vec::new()));
        assert!(locks.is_empty());

        let first = locks.lock("notes/1").await.unwrap();
        assert_eq!(locks.len(), 1);

        let second = {
            let locks = locks.clone();
            let log = log.clone();
            tokio::spawn(async move {
                let _guard = locks.lock("notes/1").await.unwrap();
                log.lock().unwrap().push("second");
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        log.lock().unwrap().push("first");
        drop(first);

        second.await.unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["first", "second"]);
    }
}
