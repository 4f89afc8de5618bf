use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::application::use_cases::{
    CollectionResolver, EmbeddingBuilder, EmbeddingRegistry, QueryResolver, SyncCoordinator,
};
use crate::application::{CollectionHandle, RecordLifecycle, RecordStore, VectorStore};
use crate::domain::{
    DomainError, EmbeddingPayload, Entity, EntityMatch, ExtractionRules, QueryOptions,
};

/// Entry point that keeps per-type vector collections in step with the
/// primary store and answers similarity queries with entities.
///
/// ```ignore
/// let index = EmbeddingIndex::new(Arc::new(InMemoryVectorStore::new()));
/// index.configure(
///     ExtractionRules::<BlogPost>::builder()
///         .document(|p: &BlogPost| p.body.clone())
///         .metadata("title", |p: &BlogPost| p.title.clone())
///         .embedder(embedder)
///         .build()?,
/// )?;
/// index.sync(&post).await?;
/// let similar = index.query(&posts, "ownership", QueryOptions::new()).await?;
/// ```
pub struct EmbeddingIndex {
    registry: EmbeddingRegistry,
    resolver: Arc<CollectionResolver>,
    coordinator: SyncCoordinator,
    queries: QueryResolver,
}

impl EmbeddingIndex {
    pub fn new(store: Arc<dyn VectorStore>) -> Self {
        let resolver = Arc::new(CollectionResolver::new(store));
        Self {
            registry: EmbeddingRegistry::new(),
            coordinator: SyncCoordinator::new(resolver.clone()),
            queries: QueryResolver::new(resolver.clone()),
            resolver,
        }
    }

    /// Registers (or replaces) the extraction rules for `E`.
    pub fn configure<E: Entity>(&self, rules: ExtractionRules<E>) -> Result<(), DomainError> {
        self.registry.register(rules)
    }

    pub fn rules<E: Entity>(&self) -> Result<Arc<ExtractionRules<E>>, DomainError> {
        self.registry.rules::<E>()
    }

    pub fn is_configured<E: Entity>(&self) -> bool {
        self.registry.is_registered::<E>()
    }

    /// Derives the payload `entity` would be indexed with, without touching
    /// the collection.
    pub async fn build_embedding<E: Entity>(
        &self,
        entity: &E,
    ) -> Result<EmbeddingPayload, DomainError> {
        let rules = self.rules::<E>()?;
        EmbeddingBuilder::build(&rules, entity).await
    }

    /// The payload the collection holds for `entity`, if any.
    pub async fn current_embedding<E: Entity>(
        &self,
        entity: &E,
    ) -> Result<Option<EmbeddingPayload>, DomainError> {
        let rules = self.rules::<E>()?;
        self.coordinator
            .fetch(rules.collection_name(), &entity.primary_key())
            .await
    }

    pub async fn sync<E: Entity>(&self, entity: &E) -> Result<EmbeddingPayload, DomainError> {
        let rules = self.rules::<E>()?;
        self.coordinator.upsert(&rules, entity).await
    }

    /// Syncs entities one after another; the first failure stops the batch.
    pub async fn sync_all<E: Entity>(&self, entities: &[E]) -> Result<usize, DomainError> {
        let rules = self.rules::<E>()?;
        for entity in entities {
            self.coordinator.upsert(&rules, entity).await?;
        }
        info!("Synced {} {} records", entities.len(), E::TYPE_NAME);
        Ok(entities.len())
    }

    pub async fn unsync<E: Entity>(&self, entity: &E) -> Result<(), DomainError> {
        self.unsync_id::<E>(&entity.primary_key()).await
    }

    pub async fn unsync_id<E: Entity>(&self, id: &str) -> Result<(), DomainError> {
        let rules = self.rules::<E>()?;
        self.coordinator.delete(rules.collection_name(), id).await
    }

    /// Entities most similar to `text`, closest first.
    pub async fn query<E: Entity>(
        &self,
        records: &dyn RecordStore<E>,
        text: &str,
        options: QueryOptions,
    ) -> Result<Vec<E>, DomainError> {
        let matches = self.query_matches(records, text, options).await?;
        Ok(matches.into_iter().map(EntityMatch::into_entity).collect())
    }

    /// Like [`EmbeddingIndex::query`], keeping each hit's distance, document
    /// and metadata.
    pub async fn query_matches<E: Entity>(
        &self,
        records: &dyn RecordStore<E>,
        text: &str,
        options: QueryOptions,
    ) -> Result<Vec<EntityMatch<E>>, DomainError> {
        let rules = self.rules::<E>()?;
        self.queries.query(&rules, records, text, &options).await
    }

    pub async fn collection<E: Entity>(&self) -> Result<CollectionHandle, DomainError> {
        let rules = self.rules::<E>()?;
        self.resolver.resolve(rules.collection_name()).await
    }

    pub async fn delete_collection<E: Entity>(&self) -> Result<(), DomainError> {
        let rules = self.rules::<E>()?;
        self.resolver.delete(rules.collection_name()).await
    }

    pub async fn count<E: Entity>(&self) -> Result<u64, DomainError> {
        self.collection::<E>().await?.count().await
    }
}

#[async_trait]
impl<E: Entity> RecordLifecycle<E> for EmbeddingIndex {
    async fn on_committed(&self, entity: &E) -> Result<(), DomainError> {
        self.sync(entity).await.map(|_| ())
    }

    async fn on_deleted(&self, id: &str) -> Result<(), DomainError> {
        self.unsync_id::<E>(id).await
    }
}
