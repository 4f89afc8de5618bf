use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::application::{CollectionHandle, VectorStore};
use crate::domain::DomainError;

/// Caches one collection handle per collection name.
///
/// The first `resolve` for a name creates the collection; concurrent callers
/// wait on the same creation instead of racing their own.
pub struct CollectionResolver {
    store: Arc<dyn VectorStore>,
    handles: Mutex<HashMap<String, Arc<OnceCell<CollectionHandle>>>>,
}

impl CollectionResolver {
    pub fn new(store: Arc<dyn VectorStore>) -> Self {
        Self {
            store,
            handles: Mutex::new(HashMap::new()),
        }
    }

    pub async fn resolve(&self, name: &str) -> Result<CollectionHandle, DomainError> {
        let cell = {
            let mut handles = self
                .handles
                .lock()
                .map_err(|_| DomainError::internal("Collection cache lock poisoned"))?;
            handles.entry(name.to_string()).or_default().clone()
        };

        // A failed creation leaves the cell empty, so the next caller retries.
        let handle = cell
            .get_or_try_init(|| async {
                debug!("Resolving collection {}", name);
                self.store.get_or_create_collection(name).await
            })
            .await?;

        Ok(handle.clone())
    }

    /// Drops the cached handle and deletes the remote collection.
    pub async fn delete(&self, name: &str) -> Result<(), DomainError> {
        self.invalidate(name)?;
        self.store.delete_collection(name).await?;
        info!("Deleted collection {}", name);
        Ok(())
    }

    /// Drops the cached handle; the next `resolve` fetches it again.
    pub fn invalidate(&self, name: &str) -> Result<(), DomainError> {
        let mut handles = self
            .handles
            .lock()
            .map_err(|_| DomainError::internal("Collection cache lock poisoned"))?;
        handles.remove(name);
        Ok(())
    }

    pub fn is_cached(&self, name: &str) -> bool {
        self.handles
            .lock()
            .map(|h| h.get(name).is_some_and(|cell| cell.initialized()))
            .unwrap_or(false)
    }
}
