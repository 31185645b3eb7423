use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::application::EmbeddingService;
use crate::domain::{CodeEntity, DomainError};

const EMBEDDINGS_PATH: &str = "/api/embeddings";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

/// Embeddings served by the LLM gateway.
///
/// Failures are `EmbeddingError`s: fatal for the ingest batch that hit
/// them, never for the process.
pub struct GatewayEmbedding {
    client: reqwest::Client,
    base_url: String,
    model: String,
    dimensions: usize,
}

impl GatewayEmbedding {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, dimensions: usize) -> Self {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            dimensions,
        }
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, DomainError> {
        let payload = json!({"model": self.model, "text": text});
        let response = self
            .client
            .post(format!("{}{}", self.base_url, EMBEDDINGS_PATH))
            .json(&payload)
            .send()
            .await
            .map_err(|e| DomainError::embedding(format!("gateway embeddings: {}", e)))?;

        if !response.status().is_success() {
            return Err(DomainError::embedding(format!(
                "gateway embeddings returned {}",
                response.status()
            )));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| DomainError::embedding(format!("gateway embeddings body: {}", e)))?;

        if parsed.embedding.len() != self.dimensions {
            return Err(DomainError::embedding(format!(
                "gateway returned dimension {} (expected {})",
                parsed.embedding.len(),
                self.dimensions
            )));
        }
        Ok(parsed.embedding)
    }
}

#[async_trait]
impl EmbeddingService for GatewayEmbedding {
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, DomainError> {
        self.embed(text).await
    }

    async fn embed_entity(&self, entity: &CodeEntity) -> Result<Vec<f32>, DomainError> {
        let text = format!("{} {} {}", entity.name(), entity.file_path(), entity.code());
        self.embed(&text).await
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
