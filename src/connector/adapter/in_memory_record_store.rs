use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::application::{RecordLifecycle, RecordStore};
use crate::domain::{DomainError, Entity};

/// A primary store kept in memory.
///
/// `save` and `delete` commit first and only then run the registered
/// lifecycle hooks. A failing hook fails the call, but the committed change
/// is not rolled back.
pub struct InMemoryRecordStore<E: Entity + Clone> {
    records: Mutex<HashMap<String, E>>,
    hooks: Vec<Arc<dyn RecordLifecycle<E>>>,
}

impl<E: Entity + Clone> InMemoryRecordStore<E> {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            hooks: Vec::new(),
        }
    }

    pub fn with_hook(mut self, hook: Arc<dyn RecordLifecycle<E>>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Commits `entity` and then notifies the hooks.
    pub async fn save(&self, entity: E) -> Result<(), DomainError> {
        {
            let mut records = self.records.lock().await;
            records.insert(entity.primary_key(), entity.clone());
        }
        debug!("Committed {} {}", E::TYPE_NAME, entity.primary_key());

        for hook in &self.hooks {
            hook.on_committed(&entity).await.inspect_err(|e| {
                warn!("After-commit hook failed for {} {}: {}", E::TYPE_NAME, entity.primary_key(), e)
            })?;
        }
        Ok(())
    }

    /// Removes the record and then notifies the hooks. Unknown ids are a
    /// `NotFound` error and fire no hooks.
    pub async fn delete(&self, id: &str) -> Result<(), DomainError> {
        let removed = {
            let mut records = self.records.lock().await;
            records.remove(id)
        };
        if removed.is_none() {
            return Err(DomainError::not_found(format!("{} {}", E::TYPE_NAME, id)));
        }
        debug!("Deleted {} {}", E::TYPE_NAME, id);

        for hook in &self.hooks {
            hook.on_deleted(id).await.inspect_err(|e| {
                warn!("After-delete hook failed for {} {}: {}", E::TYPE_NAME, id, e)
            })?;
        }
        Ok(())
    }

    /// Inserts without firing hooks.
    pub async fn insert(&self, entity: E) {
        let mut records = self.records.lock().await;
        records.insert(entity.primary_key(), entity);
    }

    /// Removes without firing hooks, leaving the index to drift.
    pub async fn remove_silently(&self, id: &str) -> Option<E> {
        let mut records = self.records.lock().await;
        records.remove(id)
    }

    pub async fn find(&self, id: &str) -> Option<E> {
        let records = self.records.lock().await;
        records.get(id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl<E: Entity + Clone> Default for InMemoryRecordStore<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<E: Entity + Clone> RecordStore<E> for InMemoryRecordStore<E> {
    async fn find_by_ids(&self, ids: &[String]) -> Result<Vec<E>, DomainError> {
        let records = self.records.lock().await;
        // Unordered: ranking is the caller's job
        Ok(records
            .iter()
            .filter(|(id, _)| ids.contains(id))
            .map(|(_, entity)| entity.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Task {
        id: u32,
        title: String,
    }

    impl Entity for Task {
        const TYPE_NAME: &'static str = "Task";

        fn primary_key(&self) -> String {
            self.id.to_string()
        }
    }

    fn task(id: u32, title: &str) -> Task {
        Task {
            id,
            title: title.to_string(),
        }
    }

    /// Records every hook call and can be told to fail.
    #[derive(Default)]
    struct RecordingHook {
        calls: StdMutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl RecordLifecycle<Task> for RecordingHook {
        async fn on_committed(&self, entity: &Task) -> Result<(), DomainError> {
            self.calls.lock().unwrap().push(format!("committed {}", entity.id));
            if self.fail {
                return Err(DomainError::remote("index unavailable"));
            }
            Ok(())
        }

        async fn on_deleted(&self, id: &str) -> Result<(), DomainError> {
            self.calls.lock().unwrap().push(format!("deleted {}", id));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_save_and_delete_notify_hooks() {
        let hook = Arc::new(RecordingHook::default());
        let store = InMemoryRecordStore::<Task>::new().with_hook(hook.clone());
        assert!(store.is_empty().await);

        store.save(task(1, "write docs")).await.unwrap();
        assert_eq!(store.len().await, 1);

        store.delete("1").await.unwrap();
        assert!(store.is_empty().await);

        assert_eq!(*hook.calls.lock().unwrap(), vec!["committed 1", "deleted 1"]);
    }

    #[tokio::test]
    async fn test_failing_hook_keeps_the_commit() {
        let hook = Arc::new(RecordingHook {
            fail: true,
            ..Default::default()
        });
        let store = InMemoryRecordStore::<Task>::new().with_hook(hook);

        let err = store.save(task(2, "flaky")).await.unwrap_err();

        assert!(err.is_remote());
        assert_eq!(store.find("2").await, Some(task(2, "flaky")));
    }

    #[tokio::test]
    async fn test_delete_unknown_fires_no_hooks() {
        let hook = Arc::new(RecordingHook::default());
        let store = InMemoryRecordStore::<Task>::new().with_hook(hook.clone());

        let err = store.delete("404").await.unwrap_err();

        assert!(err.is_not_found());
        assert!(hook.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_find_by_ids_skips_unknown() {
        let store = InMemoryRecordStore::new();
        store.insert(task(1, "a")).await;
        store.insert(task(2, "b")).await;

        let mut found = store
            .find_by_ids(&["2".to_string(), "9".to_string()])
            .await
            .unwrap();
        found.sort_by_key(|t| t.id);

        assert_eq!(found, vec![task(2, "b")]);
    }
}
