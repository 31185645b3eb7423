use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use async_trait::async_trait;

use crate::application::EmbeddingService;
use crate::domain::{CodeEntity, DomainError};

const DEFAULT_DIMENSIONS: usize = 384;

/// Deterministic hashed bag-of-words embeddings.
///
/// Texts sharing tokens land near each other in the vector space, so
/// retrieval behaves sensibly without a model: `"user login"` is closer to
/// `def login(user, pw)` than to an unrelated import block. Identical input
/// always produces the identical vector.
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

    fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        for token in tokenize(text) {
            let mut hasher = DefaultHasher::new();
            token.hash(&mut hasher);
            let bucket = (hasher.finish() % self.dimensions as u64) as usize;
            vector[bucket] += 1.0;
        }
        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in vector.iter_mut() {
                *v /= norm;
            }
        }
        vector
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 1)
        .map(str::to_lowercase)
        .collect()
}

impl Default for MockEmbedding {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingService for MockEmbedding {
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, DomainError> {
        Ok(self.embed(text))
    }

    async fn embed_entity(&self, entity: &CodeEntity) -> Result<Vec<f32>, DomainError> {
        let text = format!(
            "{} {} {}",
            entity.name(),
            entity.file_path(),
            entity.code()
        );
        Ok(self.embed(&text))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        "mock-embedding"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EntityType, Language};

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
    }

    #[tokio::test]
    async fn test_deterministic() {
        let service = MockEmbedding::new();
        let a = service.embed_query("user login flow").await.unwrap();
        let b = service.embed_query("user login flow").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), DEFAULT_DIMENSIONS);
    }

    #[tokio::test]
    async fn test_token_overlap_means_similarity() {
        let service = MockEmbedding::new();
        let query = service.embed_query("implement user login").await.unwrap();

        let login = CodeEntity::function_entity(
            "r",
            "a.py",
            "login",
            "def login(user, pw):\n    return check(user, pw)".to_string(),
            Language::Python,
            0,
            1,
        );
        let unrelated = CodeEntity::new(
            "r:chunk:b.py:0-1".to_string(),
            "r".to_string(),
            "b.py".to_string(),
            EntityType::Chunk,
            "chunk_0".to_string(),
            "import numpy\nresult = numpy.zeros(3)".to_string(),
            Language::Python,
            0,
            1,
        );

        let close = service.embed_entity(&login).await.unwrap();
        let far = service.embed_entity(&unrelated).await.unwrap();
        assert!(cosine(&query, &close) > cosine(&query, &far));
    }

    #[tokio::test]
    async fn test_vectors_are_normalized() {
        let service = MockEmbedding::with_dimensions(64);
        let v = service.embed_query("normalize me please").await.unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
        assert_eq!(service.dimensions(), 64);
    }
}
