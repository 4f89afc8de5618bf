use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::application::use_cases::CollectionResolver;
use crate::application::{embed_checked, RecordStore};
use crate::domain::{
    CollectionQuery, DomainError, Entity, EntityMatch, ExtractionRules, IncludeField, QueryInput,
    QueryOptions,
};

/// Runs similarity queries and maps the ranked ids back onto entities.
pub struct QueryResolver {
    resolver: Arc<CollectionResolver>,
}

impl QueryResolver {
    pub fn new(resolver: Arc<CollectionResolver>) -> Self {
        Self { resolver }
    }

    pub async fn query<E: Entity>(
        &self,
        rules: &ExtractionRules<E>,
        records: &dyn RecordStore<E>,
        text: &str,
        options: &QueryOptions,
    ) -> Result<Vec<EntityMatch<E>>, DomainError> {
        info!(
            "Querying {} for: {} (limit={})",
            rules.collection_name(),
            text,
            options.limit()
        );
        let start_time = Instant::now();

        let input = match rules.embedder() {
            Some(embedder) => {
                let mut embed_options = rules.embedder_options().clone();
                for (key, value) in options.embedder_options() {
                    embed_options.insert(key.clone(), value.clone());
                }
                QueryInput::Embedding(embed_checked(embedder.as_ref(), text, &embed_options).await?)
            }
            None => {
                if !options.embedder_options().is_empty() {
                    debug!(
                        "{} has no embedder, ignoring {} embedder options",
                        E::TYPE_NAME,
                        options.embedder_options().len()
                    );
                }
                QueryInput::Text(text.to_string())
            }
        };

        let query = CollectionQuery {
            input,
            limit: options.limit(),
            where_metadata: options.where_metadata().cloned(),
            where_document: options.where_document().cloned(),
            include: stored_fields(rules, options.include()),
        };

        let collection = self.resolver.resolve(rules.collection_name()).await?;
        let hits = collection.query(&query).await?;

        if hits.is_empty() {
            debug!("No hits in {}", rules.collection_name());
            return Ok(Vec::new());
        }

        let ids: Vec<String> = hits.iter().map(|hit| hit.id.clone()).collect();
        let mut by_id: HashMap<String, E> = records
            .find_by_ids(&ids)
            .await?
            .into_iter()
            .map(|entity| (entity.primary_key(), entity))
            .collect();

        // Keep the collection's ranking, not the record store's order.
        let mut seen = HashSet::new();
        let hits: Vec<_> = hits.into_iter().filter(|hit| seen.insert(hit.id.clone())).collect();
        let hit_count = hits.len();
        let mut matches = Vec::with_capacity(hit_count);
        for hit in hits {
            match by_id.remove(&hit.id) {
                Some(entity) => matches.push(EntityMatch::new(entity, hit)),
                None => debug!("Dropping {} from results: no {} record", hit.id, E::TYPE_NAME),
            }
        }

        let drifted = hit_count - matches.len();
        if drifted > 0 {
            warn!(
                "{} of {} hits in {} have no {} record",
                drifted,
                hit_count,
                rules.collection_name(),
                E::TYPE_NAME
            );
        }

        info!(
            "Resolved {} {} records in {:.2}s",
            matches.len(),
            E::TYPE_NAME,
            start_time.elapsed().as_secs_f64()
        );

        Ok(matches)
    }
}

/// Drops `Documents` from `include` when the collection holds no documents;
/// Chroma answers such a request with null entries.
fn stored_fields<E: Entity>(rules: &ExtractionRules<E>, include: &[IncludeField]) -> Vec<IncludeField> {
    let has_documents = rules.keep_document() && rules.document().is_some();
    include
        .iter()
        .copied()
        .filter(|field| has_documents || *field != IncludeField::Documents)
        .collect()
}
