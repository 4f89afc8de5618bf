use async_trait::async_trait;

use crate::application::{EmbedOptions, EmbeddingService};
use crate::domain::DomainError;

type EmbedFn = dyn Fn(&str, &EmbedOptions) -> Result<Vec<f32>, DomainError> + Send + Sync;

/// Adapts a plain function into an [`EmbeddingService`].
pub struct FnEmbedding {
    model_name: String,
    embed: Box<EmbedFn>,
}

impl FnEmbedding {
    pub fn new<F>(model_name: impl Into<String>, embed: F) -> Self
    where
        F: Fn(&str, &EmbedOptions) -> Result<Vec<f32>, DomainError> + Send + Sync + 'static,
    {
        Self {
            model_name: model_name.into(),
            embed: Box::new(embed),
        }
    }
}

#[async_trait]
impl EmbeddingService for FnEmbedding {
    async fn embed(&self, text: &str, options: &EmbedOptions) -> Result<Vec<f32>, DomainError> {
        (self.embed)(text, options)
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
