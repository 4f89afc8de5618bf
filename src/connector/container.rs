use std::sync::Arc;

use clap::ValueEnum;
use tracing::debug;

use crate::application::{EmbeddingIndex, EmbeddingService, VectorStore};
use crate::connector::adapter::{
    ChromaVectorStore, HttpEmbedding, InMemoryVectorStore, JsonRecordRules, MockEmbedding,
    DEFAULT_CHROMA_URL,
};
use crate::domain::DomainError;

/// Which embedder computes vectors on our side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EmbedderKind {
    /// OpenAI-compatible HTTP endpoint configured through `EMBEDDING_*` variables
    Http,
    /// Deterministic hash-seeded vectors
    Mock,
    /// Send documents and query text as-is; the vector store embeds them
    None,
}

pub struct ContainerConfig {
    pub chroma_url: Option<String>,
    pub database: String,
    pub memory_storage: bool,
    pub embedder: EmbedderKind,
    pub rules: JsonRecordRules,
}

/// Wires the vector store, embedder and index from CLI configuration.
pub struct Container {
    index: Arc<EmbeddingIndex>,
    collection_name: String,
    memory_storage: bool,
}

impl Container {
    pub async fn new(config: ContainerConfig) -> Result<Self, DomainError> {
        let embedding_service: Option<Arc<dyn EmbeddingService>> = match config.embedder {
            EmbedderKind::Http => {
                let http = HttpEmbedding::from_env();
                debug!("Using HTTP embedding service at {}", http.url());
                Some(Arc::new(http))
            }
            EmbedderKind::Mock => {
                debug!("Using mock embedding service");
                Some(Arc::new(MockEmbedding::new()))
            }
            EmbedderKind::None => {
                debug!("No client-side embedder, the store embeds documents");
                None
            }
        };

        let vector_store: Arc<dyn VectorStore> = if config.memory_storage {
            debug!("Using in-memory vector storage");
            // Stand-in for a server-side embedding function
            Arc::new(InMemoryVectorStore::with_embedding_function(Arc::new(
                MockEmbedding::new(),
            )))
        } else {
            let url = config
                .chroma_url
                .as_deref()
                .unwrap_or(DEFAULT_CHROMA_URL);
            let chroma = ChromaVectorStore::new(url, &config.database).await?;
            if embedding_service.is_some() {
                Arc::new(chroma)
            } else {
                // Chroma only stores vectors; documents and query text are
                // embedded on the way in
                Arc::new(chroma.with_embedding_function(Arc::new(HttpEmbedding::from_env())))
            }
        };

        let collection_name = config.rules.collection_name();
        let rules = config.rules.into_rules(embedding_service)?;

        let index = Arc::new(EmbeddingIndex::new(vector_store));
        index.configure(rules)?;

        Ok(Self {
            index,
            collection_name,
            memory_storage: config.memory_storage,
        })
    }

    pub fn index(&self) -> Arc<EmbeddingIndex> {
        self.index.clone()
    }

    pub fn collection_name(&self) -> &str {
        &self.collection_name
    }

    pub fn memory_storage(&self) -> bool {
        self.memory_storage
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(embedder: EmbedderKind) -> ContainerConfig {
        ContainerConfig {
            chroma_url: None,
            database: "default_database".to_string(),
            memory_storage: true,
            embedder,
            rules: JsonRecordRules {
                type_name: "BlogPost".to_string(),
                collection_name: None,
                document_field: Some("body".to_string()),
                metadata_fields: vec!["title".to_string()],
                keep_document: true,
            },
        }
    }

    #[tokio::test]
    async fn test_container_configures_json_records() {
        let container = Container::new(config(EmbedderKind::Mock)).await.unwrap();

        assert_eq!(container.collection_name(), "blog_posts");
        assert!(container.memory_storage());

        let rules = container
            .index()
            .rules::<crate::connector::adapter::JsonRecord>()
            .unwrap();
        assert_eq!(rules.metadata_fields(), vec!["title"]);
        assert!(rules.embedder().is_some());
    }

    #[tokio::test]
    async fn test_container_without_embedder() {
        let container = Container::new(config(EmbedderKind::None)).await.unwrap();

        let rules = container
            .index()
            .rules::<crate::connector::adapter::JsonRecord>()
            .unwrap();
        assert!(rules.embedder().is_none());
    }
}
