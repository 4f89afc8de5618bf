use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::application::{EmbedOptions, EmbeddingService};
use crate::domain::DomainError;

/// Default target: Ollama's OpenAI-compatible endpoint on its standard port.
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";
const EMBEDDINGS_PATH: &str = "/v1/embeddings";
const DEFAULT_MODEL: &str = "nomic-embed-text";

#[derive(Deserialize)]
struct ApiResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// HTTP client for OpenAI-compatible `/v1/embeddings` endpoints.
///
/// **Local-first defaults**: targets Ollama on `http://localhost:11434`
/// without an API key. Override via environment variables:
///
/// ```text
/// EMBEDDING_BASE_URL=https://api.openai.com
/// EMBEDDING_API_KEY=sk-...
/// EMBEDDING_MODEL=text-embedding-3-small
/// ```
///
/// Per-call options are merged into the request body as-is, so parameters
/// such as `dimensions` reach the server untouched.
pub struct HttpEmbedding {
    client: reqwest::Client,
    api_key: String,
    model: String,
    /// Full endpoint URL (base + EMBEDDINGS_PATH).
    url: String,
}

impl HttpEmbedding {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        let base: String = base_url.into();
        let url = format!("{}{}", base.trim_end_matches('/'), EMBEDDINGS_PATH);
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            api_key: api_key.into(),
            model: model.into(),
            url,
        }
    }

    /// Construct from environment variables with local-first defaults:
    ///
    /// | Variable             | Default                  | Purpose                 |
    /// |----------------------|--------------------------|-------------------------|
    /// | `EMBEDDING_BASE_URL` | `http://localhost:11434` | Ollama / any server     |
    /// | `EMBEDDING_MODEL`    | `nomic-embed-text`       | Embedding model         |
    /// | `EMBEDDING_API_KEY`  | `""` (empty)             | Not required for local  |
    pub fn from_env() -> Self {
        let base =
            std::env::var("EMBEDDING_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let model = std::env::var("EMBEDDING_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let key = std::env::var("EMBEDDING_API_KEY").unwrap_or_default();
        Self::new(key, model, base)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn request_body(&self, text: &str, options: &EmbedOptions) -> Value {
        let mut body = options.clone();
        body.insert("model".to_string(), Value::String(self.model.clone()));
        body.insert("input".to_string(), Value::String(text.to_string()));
        Value::Object(body)
    }
}

#[async_trait]
impl EmbeddingService for HttpEmbedding {
    async fn embed(&self, text: &str, options: &EmbedOptions) -> Result<Vec<f32>, DomainError> {
        let mut request = self.client.post(&self.url).json(&self.request_body(text, options));
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        let response = request.send().await.map_err(|e| {
            DomainError::embedding(format!("HttpEmbedding: request to {} failed: {e}", self.url))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!("HttpEmbedding: API returned {status}: {body}");
            return Err(DomainError::embedding(format!(
                "HttpEmbedding: API returned {status}"
            )));
        }

        let api_response: ApiResponse = response.json().await.map_err(|e| {
            DomainError::embedding(format!("HttpEmbedding: failed to parse response: {e}"))
        })?;

        let vector = api_response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| DomainError::embedding("HttpEmbedding: response carried no embedding"))?;

        debug!("Embedded {} chars with {} ({} dims)", text.len(), self.model, vector.len());
        Ok(vector)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
