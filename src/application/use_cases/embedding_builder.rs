use tracing::debug;

use crate::application::embed_checked;
use crate::domain::{DomainError, EmbeddingPayload, Entity, ExtractionRules, Metadata};

/// Derives an entity's embedding payload from its extraction rules.
pub struct EmbeddingBuilder;

impl EmbeddingBuilder {
    /// Builds the payload for `entity` as it is right now.
    ///
    /// The document text is embedded when an embedder is configured and kept
    /// in the payload only when `keep_document` is set. Any accessor or
    /// embedder failure aborts the build.
    pub async fn build<E: Entity>(
        rules: &ExtractionRules<E>,
        entity: &E,
    ) -> Result<EmbeddingPayload, DomainError> {
        let id = entity.primary_key();
        let mut payload = EmbeddingPayload::new(id.as_str());

        let document = match rules.document() {
            Some(accessor) => Some(accessor(entity)?),
            None => None,
        };

        if let Some(embedder) = rules.embedder() {
            let text = document.as_deref().ok_or_else(|| {
                DomainError::configuration(format!(
                    "{}: embedder configured without a document accessor",
                    E::TYPE_NAME
                ))
            })?;
            let vector = embed_checked(embedder.as_ref(), text, rules.embedder_options()).await?;
            payload = payload.with_embedding(vector);
        }

        if let Some(accessors) = rules.metadata() {
            let mut metadata = Metadata::new();
            for (name, accessor) in accessors {
                metadata.insert(name.clone(), accessor(entity)?.to_json());
            }
            payload = payload.with_metadata(metadata);
        }

        if rules.keep_document() {
            if let Some(text) = document {
                payload = payload.with_document(text);
            }
        }

        debug!(
            "Built payload for {} {} (document={}, embedding={}, metadata={})",
            E::TYPE_NAME,
            id,
            payload.document().is_some(),
            payload.embedding().map(|v| v.len()).unwrap_or(0),
            payload.metadata().map(|m| m.len()).unwrap_or(0)
        );

        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::connector::FnEmbedding;

    #[derive(Clone)]
    struct Article {
        id: u32,
        title: String,
        body: String,
        stars: i64,
    }

    impl Entity for Article {
        const TYPE_NAME: &'static str = "Article";

        fn primary_key(&self) -> String {
            self.id.to_string()
        }
    }

    fn article() -> Article {
        Article {
            id: 42,
            title: "Rust ownership".to_string(),
            body: "Borrowing rules explained".to_string(),
            stars: 5,
        }
    }

    fn length_embedder() -> Arc<FnEmbedding> {
        Arc::new(FnEmbedding::new("length", |text, _| {
            Ok(vec![text.len() as f32, 1.0])
        }))
    }

    #[tokio::test]
    async fn test_build_full_payload() {
        let rules = ExtractionRules::<Article>::builder()
            .document(|a: &Article| a.body.clone())
            .metadata("title", |a: &Article| a.title.clone())
            .metadata("stars", |a: &Article| a.stars)
            .embedder(length_embedder())
            .build()
            .unwrap();

        let payload = EmbeddingBuilder::build(&rules, &article()).await.unwrap();

        assert_eq!(payload.id(), "42");
        assert_eq!(payload.document(), Some("Borrowing rules explained"));
        assert_eq!(payload.embedding(), Some(&[25.0, 1.0][..]));

        let metadata = payload.metadata().unwrap();
        let keys: Vec<&String> = metadata.keys().collect();
        assert_eq!(keys, vec!["title", "stars"]);
        assert_eq!(metadata["title"], json!("Rust ownership"));
        assert_eq!(metadata["stars"], json!(5));
    }

    #[tokio::test]
    async fn test_keep_document_off_still_embeds() {
        let rules = ExtractionRules::<Article>::builder()
            .document(|a: &Article| a.body.clone())
            .embedder(length_embedder())
            .keep_document(false)
            .build()
            .unwrap();

        let payload = EmbeddingBuilder::build(&rules, &article()).await.unwrap();

        assert!(payload.document().is_none());
        assert!(payload.embedding().is_some());
    }

    #[tokio::test]
    async fn test_unset_fields_are_omitted() {
        let rules = ExtractionRules::<Article>::builder()
            .document(|a: &Article| a.title.clone())
            .build()
            .unwrap();

        let payload = EmbeddingBuilder::build(&rules, &article()).await.unwrap();

        assert_eq!(payload.document(), Some("Rust ownership"));
        assert!(payload.embedding().is_none());
        assert!(payload.metadata().is_none());
    }

    #[tokio::test]
    async fn test_nothing_configured_builds_an_empty_payload() {
        let rules = ExtractionRules::<Article>::builder().build().unwrap();

        let payload = EmbeddingBuilder::build(&rules, &article()).await.unwrap();

        assert_eq!(payload.id(), "42");
        assert!(payload.is_empty());
    }

    #[tokio::test]
    async fn test_metadata_accessor_failure_aborts_build() {
        let rules = ExtractionRules::<Article>::builder()
            .document(|a: &Article| a.body.clone())
            .try_metadata("author", |_: &Article| {
                Err::<String, _>("author association missing")
            })
            .build()
            .unwrap();

        let err = EmbeddingBuilder::build(&rules, &article()).await.unwrap_err();
        assert!(err.is_extraction());
    }

    #[tokio::test]
    async fn test_embedder_failure_aborts_build() {
        let failing = Arc::new(FnEmbedding::new("down", |_, _| {
            Err(DomainError::embedding("model unavailable"))
        }));
        let rules = ExtractionRules::<Article>::builder()
            .document(|a: &Article| a.body.clone())
            .embedder(failing)
            .build()
            .unwrap();

        let err = EmbeddingBuilder::build(&rules, &article()).await.unwrap_err();
        assert!(err.is_embedding());
    }

    #[tokio::test]
    async fn test_malformed_embedder_output_is_rejected() {
        let empty = Arc::new(FnEmbedding::new("empty", |_, _| Ok(Vec::new())));
        let rules = ExtractionRules::<Article>::builder()
            .document(|a: &Article| a.body.clone())
            .embedder(empty)
            .build()
            .unwrap();

        let err = EmbeddingBuilder::build(&rules, &article()).await.unwrap_err();
        assert!(err.is_embedding());

        let nan = Arc::new(FnEmbedding::new("nan", |_, _| Ok(vec![0.5, f32::NAN])));
        let rules = ExtractionRules::<Article>::builder()
            .document(|a: &Article| a.body.clone())
            .embedder(nan)
            .build()
            .unwrap();

        let err = EmbeddingBuilder::build(&rules, &article()).await.unwrap_err();
        assert!(err.is_embedding());
    }

    #[tokio::test]
    async fn test_embedder_receives_rule_options() {
        let echo = Arc::new(FnEmbedding::new("echo", |_, options| {
            let dims = options.get("dimensions").and_then(|v| v.as_u64()).unwrap_or(1);
            Ok(vec![1.0; dims as usize])
        }));
        let mut options = crate::application::EmbedOptions::new();
        options.insert("dimensions".to_string(), json!(3));

        let rules = ExtractionRules::<Article>::builder()
            .document(|a: &Article| a.body.clone())
            .embedder(echo)
            .embedder_options(options)
            .build()
            .unwrap();

        let payload = EmbeddingBuilder::build(&rules, &article()).await.unwrap();
        assert_eq!(payload.embedding().map(|v| v.len()), Some(3));
    }
}
