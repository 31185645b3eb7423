use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::application::{CreatePullRequest, GitHost, PullRequestInfo};
use crate::domain::DomainError;

const PR_PATH: &str = "/api/pr";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Deserialize)]
struct PrResponse {
    number: Option<u64>,
    #[serde(alias = "html_url")]
    url: Option<String>,
    title: Option<String>,
}

/// HTTP client for the Git hosting hub. Failures surface as patch-apply
/// errors on the only path that uses this.
pub struct GithubHubClient {
    client: reqwest::Client,
    base_url: String,
    default_connection: Option<String>,
}

impl GithubHubClient {
    pub fn new(base_url: impl Into<String>, default_connection: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            default_connection,
        }
    }
}

#[async_trait]
impl GitHost for GithubHubClient {
    async fn create_pr(&self, request: CreatePullRequest) -> Result<PullRequestInfo, DomainError> {
        let conn_id = request
            .connection_id
            .clone()
            .or_else(|| self.default_connection.clone())
            .unwrap_or_default();

        let payload = json!({
            "title": request.title,
            "head": request.head,
            "base": request.base,
            "body": request.body,
            "draft": request.draft,
        });

        let response = self
            .client
            .post(format!("{}{}", self.base_url, PR_PATH))
            .query(&[("conn_id", conn_id.as_str())])
            .json(&payload)
            .send()
            .await
            .map_err(|e| DomainError::upstream(format!("Git host create_pr: {}", e)))?;

        if !response.status().is_success() {
            return Err(DomainError::upstream(format!(
                "Git host create_pr returned {}",
                response.status()
            )));
        }

        let parsed: PrResponse = response
            .json()
            .await
            .map_err(|e| DomainError::upstream(format!("Git host create_pr body: {}", e)))?;

        Ok(PullRequestInfo {
            number: parsed.number.unwrap_or(0),
            url: parsed.url.unwrap_or_default(),
            title: parsed.title.unwrap_or(request.title),
        })
    }
}
