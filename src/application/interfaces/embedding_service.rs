use async_trait::async_trait;

use crate::domain::{CodeEntity, DomainError};

/// Generates vector embeddings for queries and code entities.
///
/// The embedding dimension is fixed per model; the vector store rejects rows
/// that disagree with it.
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, DomainError>;

    async fn embed_entity(&self, entity: &CodeEntity) -> Result<Vec<f32>, DomainError>;

    fn dimensions(&self) -> usize;

    fn model_name(&self) -> &str;
}
