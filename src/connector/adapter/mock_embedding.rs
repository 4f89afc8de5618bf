use async_trait::async_trait;
use rand::Rng;
use rand::SeedableRng;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use tracing::debug;

use crate::application::{EmbedOptions, EmbeddingService};
use crate::domain::DomainError;

const MOCK_MODEL: &str = "mock-embedding";
const DEFAULT_DIMENSIONS: usize = 384;

/// Deterministic unit vectors seeded from a hash of the text. Equal text
/// always embeds to the same vector.
pub struct MockEmbedding {
    dimensions: usize,
}

impl MockEmbedding {
    pub fn new() -> Self {
        Self {
            dimensions: DEFAULT_DIMENSIONS,
        }
    }

    pub fn with_dimensions(dimensions: usize) -> Self {
        Self { dimensions }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn generate_embedding(&self, text: &str) -> Vec<f32> {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        let seed = hasher.finish();

        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        let mut vector: Vec<f32> = (0..self.dimensions)
            .map(|_| rng.gen_range(-1.0..1.0))
            .collect();

        let magnitude: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for x in &mut vector {
                *x /= magnitude;
            }
        }

        vector
    }
}

impl Default for MockEmbedding {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingService for MockEmbedding {
    async fn embed(&self, text: &str, _options: &EmbedOptions) -> Result<Vec<f32>, DomainError> {
        let vector = self.generate_embedding(text);
        debug!("Generated mock embedding with {} dimensions", vector.len());
        Ok(vector)
    }

    fn model_name(&self) -> &str {
        MOCK_MODEL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_embedding_consistency() {
        let service = MockEmbedding::new();
        let options = EmbedOptions::new();

        let embedding1 = service.embed("hello world", &options).await.unwrap();
        let embedding2 = service.embed("hello world", &options).await.unwrap();

        assert_eq!(embedding1, embedding2);
    }

    #[tokio::test]
    async fn test_mock_embedding_dimensions() {
        let service = MockEmbedding::with_dimensions(128);

        let embedding = service.embed("test", &EmbedOptions::new()).await.unwrap();

        assert_eq!(embedding.len(), 128);
    }

    #[tokio::test]
    async fn test_mock_embedding_normalized() {
        let service = MockEmbedding::new();

        let embedding = service.embed("test", &EmbedOptions::new()).await.unwrap();
        let magnitude: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();

        assert!((magnitude - 1.0).abs() < 0.001);
    }
}
