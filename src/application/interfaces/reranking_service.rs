use async_trait::async_trait;

use crate::domain::{Candidate, DomainError};

/// Cross-encoder re-ranking over retrieval candidates.
///
/// A no-op implementation is a first-class variant: it is what retrieval
/// uses whenever a model cannot load, so reranker failure never fails a
/// request.
#[async_trait]
pub trait RerankingService: Send + Sync {
    fn available(&self) -> bool;

    /// Re-order candidates by pairwise relevance to the query, most relevant
    /// first, truncated to `top_k` when given. Implementations must preserve
    /// the incoming order for ties.
    async fn rerank(
        &self,
        query: &str,
        candidates: Vec<Candidate>,
        top_k: Option<usize>,
    ) -> Result<Vec<Candidate>, DomainError>;

    fn model_name(&self) -> &str;
}

/// Text the cross-encoder scores against the query for one candidate.
pub fn rerank_pair_text(candidate: &Candidate) -> String {
    format!(
        "{} {} {}",
        candidate.entity.name(),
        candidate.entity.file_path(),
        candidate.snippet(512)
    )
}
