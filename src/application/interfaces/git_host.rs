use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePullRequest {
    pub title: String,
    pub head: String,
    pub base: String,
    pub body: String,
    pub draft: bool,
    pub connection_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequestInfo {
    pub number: u64,
    pub url: String,
    pub title: String,
}

/// External Git hosting service. Only used on the patch-apply path; failures
/// surface as patch-apply errors.
#[async_trait]
pub trait GitHost: Send + Sync {
    async fn create_pr(&self, request: CreatePullRequest) -> Result<PullRequestInfo, DomainError>;
}
