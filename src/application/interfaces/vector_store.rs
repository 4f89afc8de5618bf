use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{CollectionQuery, DomainError, EmbeddingPayload, QueryHit};

pub type CollectionHandle = Arc<dyn Collection>;

/// Client for a vector store that groups payloads into named collections.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Returns the named collection, creating it when absent. Never fails
    /// because the collection already exists.
    async fn get_or_create_collection(&self, name: &str) -> Result<CollectionHandle, DomainError>;

    async fn delete_collection(&self, name: &str) -> Result<(), DomainError>;
}

/// One remote collection.
#[async_trait]
pub trait Collection: Send + Sync {
    fn name(&self) -> &str;

    /// Inserts or fully replaces the payload stored under `payload.id()`.
    async fn upsert(&self, payload: &EmbeddingPayload) -> Result<(), DomainError>;

    /// Deletes the given ids; ids that were never stored are ignored.
    async fn delete(&self, ids: &[String]) -> Result<(), DomainError>;

    /// Returns the stored payloads for the ids that exist.
    async fn get(&self, ids: &[String]) -> Result<Vec<EmbeddingPayload>, DomainError>;

    /// Ranked hits, closest first.
    async fn query(&self, query: &CollectionQuery) -> Result<Vec<QueryHit>, DomainError>;

    async fn count(&self) -> Result<u64, DomainError>;
}
