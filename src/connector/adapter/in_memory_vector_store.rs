use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

use crate::application::{
    Collection, CollectionHandle, EmbedOptions, EmbeddingService, VectorStore,
};
use crate::domain::{
    CollectionQuery, DomainError, EmbeddingPayload, IncludeField, Metadata, QueryHit, QueryInput,
};

/// Process-local vector store. Distances are squared L2, ties broken by id.
///
/// When built with an embedding function it embeds payload documents and
/// query text that arrive without a vector, the way a server-side embedding
/// function would.
pub struct InMemoryVectorStore {
    collections: Mutex<HashMap<String, Arc<InMemoryCollection>>>,
    embedding_function: Option<Arc<dyn EmbeddingService>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self {
            collections: Mutex::new(HashMap::new()),
            embedding_function: None,
        }
    }

    pub fn with_embedding_function(service: Arc<dyn EmbeddingService>) -> Self {
        Self {
            collections: Mutex::new(HashMap::new()),
            embedding_function: Some(service),
        }
    }

    pub async fn has_collection(&self, name: &str) -> bool {
        self.collections.lock().await.contains_key(name)
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn get_or_create_collection(&self, name: &str) -> Result<CollectionHandle, DomainError> {
        let mut collections = self.collections.lock().await;
        let collection = collections
            .entry(name.to_string())
            .or_insert_with(|| {
                debug!("Creating in-memory collection {}", name);
                Arc::new(InMemoryCollection::new(name, self.embedding_function.clone()))
            })
            .clone();
        Ok(collection)
    }

    async fn delete_collection(&self, name: &str) -> Result<(), DomainError> {
        let mut collections = self.collections.lock().await;
        collections
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| DomainError::remote(format!("Collection {} does not exist", name)))
    }
}

pub struct InMemoryCollection {
    name: String,
    records: Mutex<HashMap<String, EmbeddingPayload>>,
    embedding_function: Option<Arc<dyn EmbeddingService>>,
}

impl InMemoryCollection {
    fn new(name: &str, embedding_function: Option<Arc<dyn EmbeddingService>>) -> Self {
        Self {
            name: name.to_string(),
            records: Mutex::new(HashMap::new()),
            embedding_function,
        }
    }

    async fn embed_text(&self, text: &str) -> Result<Vec<f32>, DomainError> {
        match &self.embedding_function {
            Some(service) => service.embed(text, &EmbedOptions::new()).await,
            None => Err(DomainError::remote(format!(
                "Collection {} has no embedding function for text input",
                self.name
            ))),
        }
    }
}

#[async_trait]
impl Collection for InMemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn upsert(&self, payload: &EmbeddingPayload) -> Result<(), DomainError> {
        let mut stored = payload.clone();
        if stored.embedding().is_none() && self.embedding_function.is_some() {
            if let Some(document) = payload.document() {
                stored = stored.with_embedding(self.embed_text(document).await?);
            }
        }

        let mut records = self.records.lock().await;
        records.insert(stored.id().to_string(), stored);
        debug!("Upserted {} into {}", payload.id(), self.name);
        Ok(())
    }

    async fn delete(&self, ids: &[String]) -> Result<(), DomainError> {
        let mut records = self.records.lock().await;
        for id in ids {
            records.remove(id);
        }
        Ok(())
    }

    async fn get(&self, ids: &[String]) -> Result<Vec<EmbeddingPayload>, DomainError> {
        let records = self.records.lock().await;
        Ok(ids.iter().filter_map(|id| records.get(id).cloned()).collect())
    }

    async fn query(&self, query: &CollectionQuery) -> Result<Vec<QueryHit>, DomainError> {
        let target = match &query.input {
            QueryInput::Embedding(vector) => vector.clone(),
            QueryInput::Text(text) => self.embed_text(text).await?,
        };

        let records = self.records.lock().await;
        let mut scored: Vec<(f32, &EmbeddingPayload)> = Vec::new();

        for payload in records.values() {
            let vector = match payload.embedding() {
                Some(vector) => vector,
                None => continue,
            };

            if let Some(filter) = &query.where_metadata {
                let empty = Metadata::new();
                if !matches_metadata(payload.metadata().unwrap_or(&empty), filter)? {
                    continue;
                }
            }

            if let Some(filter) = &query.where_document {
                if !matches_document(payload.document().unwrap_or(""), filter)? {
                    continue;
                }
            }

            scored.push((squared_l2(&target, vector)?, payload));
        }

        scored.sort_by(|a, b| {
            a.0.partial_cmp(&b.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.1.id().cmp(b.1.id()))
        });

        let hits = scored
            .into_iter()
            .take(query.limit)
            .map(|(distance, payload)| QueryHit {
                id: payload.id().to_string(),
                distance: query
                    .includes(IncludeField::Distances)
                    .then_some(distance),
                document: if query.includes(IncludeField::Documents) {
                    payload.document().map(str::to_string)
                } else {
                    None
                },
                metadata: if query.includes(IncludeField::Metadatas) {
                    payload.metadata().cloned()
                } else {
                    None
                },
            })
            .collect();

        Ok(hits)
    }

    async fn count(&self) -> Result<u64, DomainError> {
        let records = self.records.lock().await;
        Ok(records.len() as u64)
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> Result<f32, DomainError> {
    if a.len() != b.len() {
        return Err(DomainError::remote(format!(
            "Embedding dimension {} does not match collection dimension {}",
            a.len(),
            b.len()
        )));
    }

    Ok(a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum())
}

fn filter_object<'a>(filter: &'a Value, what: &str) -> Result<&'a serde_json::Map<String, Value>, DomainError> {
    filter
        .as_object()
        .ok_or_else(|| DomainError::remote(format!("Invalid {} filter: {}", what, filter)))
}

fn filter_list<'a>(value: &'a Value, op: &str) -> Result<&'a Vec<Value>, DomainError> {
    value
        .as_array()
        .ok_or_else(|| DomainError::remote(format!("{} expects a list, got {}", op, value)))
}

fn matches_metadata(metadata: &Metadata, filter: &Value) -> Result<bool, DomainError> {
    for (key, condition) in filter_object(filter, "where")? {
        let matched = match key.as_str() {
            "$and" => {
                let mut all = true;
                for clause in filter_list(condition, "$and")? {
                    all &= matches_metadata(metadata, clause)?;
                }
                all
            }
            "$or" => {
                let mut any = false;
                for clause in filter_list(condition, "$or")? {
                    any |= matches_metadata(metadata, clause)?;
                }
                any
            }
            field => matches_condition(metadata.get(field), condition)?,
        };

        if !matched {
            return Ok(false);
        }
    }
    Ok(true)
}

fn matches_condition(value: Option<&Value>, condition: &Value) -> Result<bool, DomainError> {
    let operators = match condition.as_object() {
        Some(operators) => operators,
        None => return Ok(value == Some(condition)),
    };

    for (op, operand) in operators {
        let matched = match op.as_str() {
            "$eq" => value == Some(operand),
            "$ne" => value != Some(operand),
            "$in" => {
                let list = filter_list(operand, "$in")?;
                value.is_some_and(|v| list.contains(v))
            }
            "$nin" => {
                let list = filter_list(operand, "$nin")?;
                !value.is_some_and(|v| list.contains(v))
            }
            "$gt" | "$gte" | "$lt" | "$lte" => {
                let (Some(actual), Some(bound)) = (value.and_then(Value::as_f64), operand.as_f64())
                else {
                    return Ok(false);
                };
                match op.as_str() {
                    "$gt" => actual > bound,
                    "$gte" => actual >= bound,
                    "$lt" => actual < bound,
                    _ => actual <= bound,
                }
            }
            other => {
                return Err(DomainError::remote(format!("Unsupported where operator {}", other)))
            }
        };

        if !matched {
            return Ok(false);
        }
    }
    Ok(true)
}

fn matches_document(document: &str, filter: &Value) -> Result<bool, DomainError> {
    for (op, operand) in filter_object(filter, "where_document")? {
        let matched = match op.as_str() {
            "$contains" | "$not_contains" => {
                let needle = operand.as_str().ok_or_else(|| {
                    DomainError::remote(format!("{} expects a string, got {}", op, operand))
                })?;
                document.contains(needle) == (op == "$contains")
            }
            "$and" => {
                let mut all = true;
                for clause in filter_list(operand, "$and")? {
                    all &= matches_document(document, clause)?;
                }
                all
            }
            "$or" => {
                let mut any = false;
                for clause in filter_list(operand, "$or")? {
                    any |= matches_document(document, clause)?;
                }
                any
            }
            other => {
                return Err(DomainError::remote(format!(
                    "Unsupported where_document operator {}",
                    other
                )))
            }
        };

        if !matched {
            return Ok(false);
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::connector::FnEmbedding;

    fn payload(id: &str, vector: Vec<f32>, document: &str, metadata: Value) -> EmbeddingPayload {
        let metadata = metadata.as_object().cloned().unwrap_or_default();
        EmbeddingPayload::new(id)
            .with_embedding(vector)
            .with_document(document)
            .with_metadata(metadata)
    }

    fn vector_query(vector: Vec<f32>, limit: usize) -> CollectionQuery {
        CollectionQuery {
            input: QueryInput::Embedding(vector),
            limit,
            where_metadata: None,
            where_document: None,
            include: IncludeField::defaults(),
        }
    }

    async fn seeded() -> CollectionHandle {
        let store = InMemoryVectorStore::new();
        let collection = store.get_or_create_collection("docs").await.unwrap();
        collection
            .upsert(&payload("a", vec![0.1, 0.0], "rust borrow checker", json!({"lang": "rust", "stars": 5})))
            .await
            .unwrap();
        collection
            .upsert(&payload("b", vec![0.5, 0.0], "python generators", json!({"lang": "python", "stars": 3})))
            .await
            .unwrap();
        collection
            .upsert(&payload("c", vec![0.9, 0.0], "rust async runtimes", json!({"lang": "rust", "stars": 1})))
            .await
            .unwrap();
        collection
    }

    #[tokio::test]
    async fn test_get_or_create_returns_the_same_collection() {
        let store = InMemoryVectorStore::new();
        let first = store.get_or_create_collection("docs").await.unwrap();
        first.upsert(&EmbeddingPayload::new("x")).await.unwrap();

        let second = store.get_or_create_collection("docs").await.unwrap();
        assert_eq!(second.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_missing_collection_is_remote_error() {
        let store = InMemoryVectorStore::new();
        let err = store.delete_collection("nope").await.unwrap_err();
        assert!(err.is_remote());
    }

    #[tokio::test]
    async fn test_query_ranks_closest_first() {
        let collection = seeded().await;

        let hits = collection.query(&vector_query(vec![0.0, 0.0], 2)).await.unwrap();

        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert!((hits[0].distance.unwrap() - 0.01).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_query_respects_include() {
        let collection = seeded().await;
        let mut query = vector_query(vec![0.0, 0.0], 1);
        query.include = vec![IncludeField::Documents];

        let hits = collection.query(&query).await.unwrap();

        assert_eq!(hits[0].document.as_deref(), Some("rust borrow checker"));
        assert!(hits[0].distance.is_none());
        assert!(hits[0].metadata.is_none());
    }

    #[tokio::test]
    async fn test_metadata_filters() {
        let collection = seeded().await;

        let mut query = vector_query(vec![0.0, 0.0], 10);
        query.where_metadata = Some(json!({"lang": "rust"}));
        let ids: Vec<String> = collection.query(&query).await.unwrap().into_iter().map(|h| h.id).collect();
        assert_eq!(ids, vec!["a", "c"]);

        query.where_metadata = Some(json!({"$and": [{"lang": "rust"}, {"stars": {"$lt": 3}}]}));
        let ids: Vec<String> = collection.query(&query).await.unwrap().into_iter().map(|h| h.id).collect();
        assert_eq!(ids, vec!["c"]);

        query.where_metadata = Some(json!({"lang": {"$in": ["python", "go"]}}));
        let ids: Vec<String> = collection.query(&query).await.unwrap().into_iter().map(|h| h.id).collect();
        assert_eq!(ids, vec!["b"]);
    }

    #[tokio::test]
    async fn test_document_filters() {
        let collection = seeded().await;

        let mut query = vector_query(vec![0.0, 0.0], 10);
        query.where_document = Some(json!({"$contains": "rust"}));
        let ids: Vec<String> = collection.query(&query).await.unwrap().into_iter().map(|h| h.id).collect();
        assert_eq!(ids, vec!["a", "c"]);

        query.where_document = Some(json!({"$not_contains": "async"}));
        let ids: Vec<String> = collection.query(&query).await.unwrap().into_iter().map(|h| h.id).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_unknown_operator_is_remote_error() {
        let collection = seeded().await;
        let mut query = vector_query(vec![0.0, 0.0], 10);
        query.where_metadata = Some(json!({"stars": {"$near": 3}}));

        let err = collection.query(&query).await.unwrap_err();
        assert!(err.is_remote());
    }

    #[tokio::test]
    async fn test_membership_operand_must_be_a_list() {
        let collection = seeded().await;
        let mut query = vector_query(vec![0.0, 0.0], 10);

        query.where_metadata = Some(json!({"lang": {"$in": "rust"}}));
        assert!(collection.query(&query).await.unwrap_err().is_remote());

        query.where_metadata = Some(json!({"lang": {"$nin": "rust"}}));
        assert!(collection.query(&query).await.unwrap_err().is_remote());
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_remote_error() {
        let collection = seeded().await;

        let err = collection.query(&vector_query(vec![0.0], 1)).await.unwrap_err();
        assert!(err.is_remote());
    }

    #[tokio::test]
    async fn test_text_query_needs_an_embedding_function() {
        let collection = seeded().await;
        let query = CollectionQuery {
            input: QueryInput::Text("borrow".to_string()),
            ..vector_query(vec![], 1)
        };

        let err = collection.query(&query).await.unwrap_err();
        assert!(err.is_remote());
    }

    #[tokio::test]
    async fn test_server_side_embedding_of_documents_and_text() {
        let ef = Arc::new(FnEmbedding::new("len", |text, _| Ok(vec![text.len() as f32])));
        let store = InMemoryVectorStore::with_embedding_function(ef);
        let collection = store.get_or_create_collection("docs").await.unwrap();

        collection
            .upsert(&EmbeddingPayload::new("short").with_document("ab"))
            .await
            .unwrap();
        collection
            .upsert(&EmbeddingPayload::new("long").with_document("abcdefgh"))
            .await
            .unwrap();

        let stored = collection.get(&["short".to_string()]).await.unwrap();
        assert_eq!(stored[0].embedding(), Some(&[2.0][..]));

        let query = CollectionQuery {
            input: QueryInput::Text("abc".to_string()),
            ..vector_query(vec![], 1)
        };
        let hits = collection.query(&query).await.unwrap();
        assert_eq!(hits[0].id, "short");
    }

    #[tokio::test]
    async fn test_payloads_without_vectors_are_not_ranked() {
        let store = InMemoryVectorStore::new();
        let collection = store.get_or_create_collection("docs").await.unwrap();
        collection
            .upsert(&EmbeddingPayload::new("bare").with_document("no vector"))
            .await
            .unwrap();

        let hits = collection.query(&vector_query(vec![0.0], 5)).await.unwrap();
        assert!(hits.is_empty());
        assert_eq!(collection.count().await.unwrap(), 1);
    }
}
