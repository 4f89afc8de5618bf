use async_trait::async_trait;

use crate::domain::DomainError;

/// Extra embedder parameters (model knobs and the like), passed through
/// untouched.
pub type EmbedOptions = serde_json::Map<String, serde_json::Value>;

/// Turns text into a vector. One service is bound per entity type and embeds
/// both that type's documents and the text of queries against it.
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    async fn embed(&self, text: &str, options: &EmbedOptions) -> Result<Vec<f32>, DomainError>;

    fn model_name(&self) -> &str;
}

/// Embeds `text` and rejects output no collection could store.
pub async fn embed_checked(
    service: &dyn EmbeddingService,
    text: &str,
    options: &EmbedOptions,
) -> Result<Vec<f32>, DomainError> {
    let vector = service.embed(text, options).await?;

    if vector.is_empty() {
        return Err(DomainError::embedding(format!(
            "{} returned an empty vector",
            service.model_name()
        )));
    }

    if let Some(position) = vector.iter().position(|x| !x.is_finite()) {
        return Err(DomainError::embedding(format!(
            "{} returned a non-finite component at index {}",
            service.model_name(),
            position
        )));
    }

    Ok(vector)
}
