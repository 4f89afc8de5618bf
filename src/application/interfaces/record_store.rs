use async_trait::async_trait;

use crate::domain::{DomainError, Entity};

/// Batch lookup into the primary record store.
#[async_trait]
pub trait RecordStore<E: Entity>: Send + Sync {
    /// Returns the records that exist for `ids`, in any order. Missing ids are
    /// skipped, not reported.
    async fn find_by_ids(&self, ids: &[String]) -> Result<Vec<E>, DomainError>;
}

/// Commit hooks the primary store calls after a mutation is durable.
///
/// An error returned here fails the save or delete that triggered it, but the
/// committed mutation itself stands.
#[async_trait]
pub trait RecordLifecycle<E: Entity>: Send + Sync {
    async fn on_committed(&self, entity: &E) -> Result<(), DomainError>;

    async fn on_deleted(&self, id: &str) -> Result<(), DomainError>;
}
