use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use async_trait::async_trait;

use crate::application::{rerank_pair_text, RerankingService};
use crate::domain::{Candidate, DomainError};

/// Cross-encoder stand-in for tests: deterministic pseudo-scores from a hash
/// of `(query, pair text)`, sorted descending with the incoming order kept
/// for ties.
pub struct MockReranking;

impl MockReranking {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MockReranking {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RerankingService for MockReranking {
    fn available(&self) -> bool {
        true
    }

    async fn rerank(
        &self,
        query: &str,
        candidates: Vec<Candidate>,
        top_k: Option<usize>,
    ) -> Result<Vec<Candidate>, DomainError> {
        if candidates.is_empty() {
            return Ok(vec![]);
        }

        let query_hash = {
            let mut hasher = DefaultHasher::new();
            query.hash(&mut hasher);
            hasher.finish()
        };

        let mut scored: Vec<(f32, usize, Candidate)> = candidates
            .into_iter()
            .enumerate()
            .map(|(position, candidate)| {
                let mut hasher = DefaultHasher::new();
                query_hash.hash(&mut hasher);
                rerank_pair_text(&candidate).hash(&mut hasher);
                let score = (hasher.finish() % 10_000) as f32 / 10_000.0;
                (score, position, candidate)
            })
            .collect();

        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.1.cmp(&b.1))
        });

        let mut reranked: Vec<Candidate> = scored.into_iter().map(|(_, _, c)| c).collect();
        if let Some(k) = top_k {
            reranked.truncate(k);
        }
        Ok(reranked)
    }

    fn model_name(&self) -> &str {
        "mock-reranking"
    }
}

/// The spec's first-class fallback: used whenever a cross-encoder model is
/// not available. Keeps the incoming order untouched.
pub struct NoopReranking;

impl NoopReranking {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NoopReranking {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RerankingService for NoopReranking {
    fn available(&self) -> bool {
        false
    }

    async fn rerank(
        &self,
        _query: &str,
        candidates: Vec<Candidate>,
        top_k: Option<usize>,
    ) -> Result<Vec<Candidate>, DomainError> {
        let mut out = candidates;
        if let Some(k) = top_k {
            out.truncate(k);
        }
        Ok(out)
    }

    fn model_name(&self) -> &str {
        "noop-reranking"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CodeEntity, EntityType, Language};

    fn candidate(file: &str) -> Candidate {
        let entity = CodeEntity::new(
            format!("r:chunk:{}:0-9", file),
            "r".to_string(),
            file.to_string(),
            EntityType::Chunk,
            "chunk_0".to_string(),
            format!("code in {}", file),
            Language::Python,
            0,
            9,
        );
        Candidate::with_distance(entity, 0.5)
    }

    #[tokio::test]
    async fn test_mock_is_deterministic() {
        let service = MockReranking::new();
        let input = vec![candidate("a.py"), candidate("b.py"), candidate("c.py")];
        let first = service.rerank("query", input.clone(), None).await.unwrap();
        let second = service.rerank("query", input, None).await.unwrap();
        let order = |v: &[Candidate]| -> Vec<String> {
            v.iter().map(|c| c.entity.file_path().to_string()).collect()
        };
        assert_eq!(order(&first), order(&second));
    }

    #[tokio::test]
    async fn test_mock_truncates_to_top_k() {
        let service = MockReranking::new();
        let input = (0..10).map(|i| candidate(&format!("f{}.py", i))).collect();
        let out = service.rerank("q", input, Some(4)).await.unwrap();
        assert_eq!(out.len(), 4);
    }

    #[tokio::test]
    async fn test_noop_preserves_order() {
        let service = NoopReranking::new();
        assert!(!service.available());
        let input = vec![candidate("a.py"), candidate("b.py")];
        let out = service.rerank("q", input, None).await.unwrap();
        assert_eq!(out[0].entity.file_path(), "a.py");
        assert_eq!(out[1].entity.file_path(), "b.py");
    }
}
