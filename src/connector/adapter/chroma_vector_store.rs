use std::sync::Arc;

use async_trait::async_trait;
use chromadb::client::{ChromaAuthMethod, ChromaClient, ChromaClientOptions};
use chromadb::collection::{CollectionEntries, GetOptions, GetResult, QueryOptions, QueryResult};
use chromadb::ChromaCollection;
use tracing::debug;

use crate::application::{
    embed_checked, Collection, CollectionHandle, EmbedOptions, EmbeddingService, VectorStore,
};
use crate::domain::{
    CollectionQuery, DomainError, EmbeddingPayload, IncludeField, Metadata, QueryHit, QueryInput,
};

pub const DEFAULT_CHROMA_URL: &str = "http://localhost:8000";
pub const DEFAULT_DATABASE: &str = "default_database";

/// ChromaDB server reached over its HTTP API.
///
/// Chroma's HTTP API only stores vectors, so payload documents and query text
/// that arrive without a vector are embedded here with the store's embedding
/// function before the request goes out.
pub struct ChromaVectorStore {
    client: ChromaClient,
    embedding_function: Option<Arc<dyn EmbeddingService>>,
}

impl ChromaVectorStore {
    pub async fn new(url: &str, database: &str) -> Result<Self, DomainError> {
        let client = ChromaClient::new(ChromaClientOptions {
            url: Some(url.to_string()),
            database: database.to_string(),
            auth: ChromaAuthMethod::None,
        })
        .await
        .map_err(|e| DomainError::remote(format!("Failed to connect to ChromaDB: {}", e)))?;

        debug!("Connected to ChromaDB at {} (database {})", url, database);

        Ok(Self {
            client,
            embedding_function: None,
        })
    }

    pub fn with_embedding_function(mut self, service: Arc<dyn EmbeddingService>) -> Self {
        debug!("ChromaDB embedding function: {}", service.model_name());
        self.embedding_function = Some(service);
        self
    }
}

#[async_trait]
impl VectorStore for ChromaVectorStore {
    async fn get_or_create_collection(&self, name: &str) -> Result<CollectionHandle, DomainError> {
        let collection = self
            .client
            .get_or_create_collection(name, None)
            .await
            .map_err(|e| {
                DomainError::remote(format!("Failed to get/create collection {}: {}", name, e))
            })?;

        debug!("Using ChromaDB collection: {}", name);

        Ok(Arc::new(ChromaCollectionHandle {
            name: name.to_string(),
            collection,
            embedding_function: self.embedding_function.clone(),
        }))
    }

    async fn delete_collection(&self, name: &str) -> Result<(), DomainError> {
        self.client
            .delete_collection(name)
            .await
            .map_err(|e| DomainError::remote(format!("Failed to delete collection {}: {}", name, e)))?;

        debug!("Deleted ChromaDB collection: {}", name);
        Ok(())
    }
}

pub struct ChromaCollectionHandle {
    name: String,
    collection: ChromaCollection,
    embedding_function: Option<Arc<dyn EmbeddingService>>,
}

impl ChromaCollectionHandle {
    fn entries(payload: &EmbeddingPayload) -> CollectionEntries<'_> {
        CollectionEntries {
            ids: vec![payload.id()],
            embeddings: payload.embedding().map(|v| vec![v.to_vec()]),
            metadatas: payload.metadata().map(|m| vec![m.clone()]),
            documents: payload.document().map(|d| vec![d]),
        }
    }

    async fn delete_ids(&self, ids: &[String]) -> Result<(), DomainError> {
        let id_refs: Vec<&str> = ids.iter().map(|id| id.as_str()).collect();
        self.collection
            .delete(Some(id_refs), None, None)
            .await
            .map_err(|e| DomainError::remote(format!("Failed to delete ids: {}", e)))
    }
}

/// Gives `payload` a vector, embedding its document when it has none.
///
/// `None` means there is nothing to embed: Chroma cannot hold an entry without
/// a vector.
async fn with_vector(
    collection_name: &str,
    payload: &EmbeddingPayload,
    embedding_function: Option<&dyn EmbeddingService>,
) -> Result<Option<EmbeddingPayload>, DomainError> {
    if payload.embedding().is_some() {
        return Ok(Some(payload.clone()));
    }

    let Some(document) = payload.document() else {
        return Ok(None);
    };

    let service = embedding_function.ok_or_else(|| {
        DomainError::remote(format!(
            "Collection {} has no embedding function for documents without vectors",
            collection_name
        ))
    })?;

    let vector = embed_checked(service, document, &EmbedOptions::new()).await?;
    Ok(Some(payload.clone().with_embedding(vector)))
}

async fn query_vector(
    collection_name: &str,
    input: &QueryInput,
    embedding_function: Option<&dyn EmbeddingService>,
) -> Result<Vec<f32>, DomainError> {
    match input {
        QueryInput::Embedding(vector) => Ok(vector.clone()),
        QueryInput::Text(text) => {
            let service = embedding_function.ok_or_else(|| {
                DomainError::remote(format!(
                    "Collection {} has no embedding function for text queries",
                    collection_name
                ))
            })?;
            embed_checked(service, text, &EmbedOptions::new()).await
        }
    }
}

fn payloads_from_get(result: GetResult) -> Vec<EmbeddingPayload> {
    // Each column is Option<Vec<Option<_>>>, aligned with `ids`
    let documents = result.documents.unwrap_or_default();
    let embeddings = result.embeddings.unwrap_or_default();
    let metadatas = result.metadatas.unwrap_or_default();

    result
        .ids
        .into_iter()
        .enumerate()
        .map(|(i, id)| {
            let mut payload = EmbeddingPayload::new(id);
            if let Some(Some(document)) = documents.get(i) {
                payload = payload.with_document(document.clone());
            }
            if let Some(Some(vector)) = embeddings.get(i) {
                payload = payload.with_embedding(vector.clone());
            }
            if let Some(Some(metadata)) = metadatas.get(i) {
                payload = payload.with_metadata(metadata.clone());
            }
            payload
        })
        .collect()
}

fn hits_from_query(result: QueryResult) -> Vec<QueryHit> {
    // One query in, so only the first row of each column matters
    let ids = result.ids.into_iter().next().unwrap_or_default();
    let distances = result
        .distances
        .and_then(|d| d.into_iter().next())
        .unwrap_or_default();
    let metadatas: Vec<Option<Metadata>> = result
        .metadatas
        .and_then(|m| m.into_iter().next())
        .unwrap_or_default();
    let documents: Vec<String> = result
        .documents
        .and_then(|d| d.into_iter().next())
        .unwrap_or_default();

    ids.into_iter()
        .enumerate()
        .map(|(i, id)| QueryHit {
            id,
            distance: distances.get(i).copied(),
            document: documents.get(i).cloned(),
            metadata: metadatas.get(i).cloned().flatten(),
        })
        .collect()
}

#[async_trait]
impl Collection for ChromaCollectionHandle {
    fn name(&self) -> &str {
        &self.name
    }

    async fn upsert(&self, payload: &EmbeddingPayload) -> Result<(), DomainError> {
        let Some(stored) =
            with_vector(&self.name, payload, self.embedding_function.as_deref()).await?
        else {
            // Drop whatever an earlier version of the entity left behind
            debug!("Nothing to embed for {}, removing it from {}", payload.id(), self.name);
            return self.delete_ids(&[payload.id().to_string()]).await;
        };

        self.collection
            .upsert(Self::entries(&stored), None)
            .await
            .map_err(|e| DomainError::remote(format!("Failed to upsert {}: {}", payload.id(), e)))?;

        debug!("Upserted {} into {}", payload.id(), self.name);
        Ok(())
    }

    async fn delete(&self, ids: &[String]) -> Result<(), DomainError> {
        if ids.is_empty() {
            return Ok(());
        }
        self.delete_ids(ids).await
    }

    async fn get(&self, ids: &[String]) -> Result<Vec<EmbeddingPayload>, DomainError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let result = self
            .collection
            .get(GetOptions {
                ids: ids.to_vec(),
                where_metadata: None,
                limit: None,
                offset: None,
                where_document: None,
                include: Some(vec![
                    "documents".into(),
                    "embeddings".into(),
                    "metadatas".into(),
                ]),
            })
            .await
            .map_err(|e| DomainError::remote(format!("Failed to get ids: {}", e)))?;

        Ok(payloads_from_get(result))
    }

    async fn query(&self, query: &CollectionQuery) -> Result<Vec<QueryHit>, DomainError> {
        let vector =
            query_vector(&self.name, &query.input, self.embedding_function.as_deref()).await?;
        let include: Vec<&str> = query.include.iter().map(IncludeField::as_str).collect();

        let query_options = QueryOptions {
            query_texts: None,
            query_embeddings: Some(vec![vector]),
            where_metadata: query.where_metadata.clone(),
            where_document: query.where_document.clone(),
            n_results: Some(query.limit),
            include: Some(include),
        };

        let result = self
            .collection
            .query(query_options, None)
            .await
            .map_err(|e| DomainError::remote(format!("Failed to query {}: {}", self.name, e)))?;

        let hits = hits_from_query(result);
        debug!("Query on {} returned {} hits", self.name, hits.len());
        Ok(hits)
    }

    async fn count(&self) -> Result<u64, DomainError> {
        let count = self
            .collection
            .count()
            .await
            .map_err(|e| DomainError::remote(format!("Failed to count {}: {}", self.name, e)))?;
        Ok(count as u64)
    }
}
