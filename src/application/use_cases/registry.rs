use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::{debug, info};

use crate::domain::{DomainError, Entity, ExtractionRules};

struct Registration {
    type_name: &'static str,
    collection_name: String,
    rules: Arc<dyn Any + Send + Sync>,
}

/// Maps each entity type to its extraction rules.
///
/// Registering a type again replaces its rules wholesale. Two different types
/// may never claim the same collection name.
#[derive(Default)]
pub struct EmbeddingRegistry {
    registrations: RwLock<HashMap<TypeId, Registration>>,
}

impl EmbeddingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<E: Entity>(&self, rules: ExtractionRules<E>) -> Result<(), DomainError> {
        let type_id = TypeId::of::<E>();
        let collection_name = rules.collection_name().to_string();

        let mut registrations = self
            .registrations
            .write()
            .map_err(|_| DomainError::internal("Embedding registry lock poisoned"))?;

        if let Some((_, owner)) = registrations
            .iter()
            .find(|(id, r)| **id != type_id && r.collection_name == collection_name)
        {
            return Err(DomainError::configuration(format!(
                "Collection `{}` is already used by {}, cannot register {}",
                collection_name,
                owner.type_name,
                E::TYPE_NAME
            )));
        }

        debug!("Registering {} with {:?}", E::TYPE_NAME, rules);

        let replaced = registrations.insert(
            type_id,
            Registration {
                type_name: E::TYPE_NAME,
                collection_name: collection_name.clone(),
                rules: Arc::new(Arc::new(rules)),
            },
        );

        if replaced.is_some() {
            info!(
                "Replaced extraction rules for {} (collection {})",
                E::TYPE_NAME,
                collection_name
            );
        }

        Ok(())
    }

    pub fn rules<E: Entity>(&self) -> Result<Arc<ExtractionRules<E>>, DomainError> {
        let registrations = self
            .registrations
            .read()
            .map_err(|_| DomainError::internal("Embedding registry lock poisoned"))?;

        let registration = registrations.get(&TypeId::of::<E>()).ok_or_else(|| {
            DomainError::configuration(format!("{} has no extraction rules", E::TYPE_NAME))
        })?;

        registration
            .rules
            .downcast_ref::<Arc<ExtractionRules<E>>>()
            .cloned()
            .ok_or_else(|| {
                DomainError::internal(format!("Rules stored for {} have the wrong type", E::TYPE_NAME))
            })
    }

    pub fn is_registered<E: Entity>(&self) -> bool {
        self.registrations
            .read()
            .map(|r| r.contains_key(&TypeId::of::<E>()))
            .unwrap_or(false)
    }

    pub fn collection_names(&self) -> Vec<String> {
        self.registrations
            .read()
            .map(|r| r.values().map(|reg| reg.collection_name.clone()).collect())
            .unwrap_or_default()
    }
}
