use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

/// One message in a chat exchange with the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ChatOptions {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            max_tokens: 1024,
        }
    }
}

/// External LLM gateway. Failures surface as `UpstreamUnavailable`;
/// retrieval degrades rather than failing when the gateway is down
/// (agentic expansion is skipped, token counting falls back to the
/// heuristic).
#[async_trait]
pub trait LlmGateway: Send + Sync {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        options: ChatOptions,
    ) -> Result<String, DomainError>;

    async fn count_tokens(&self, messages: &[ChatMessage]) -> Result<usize, DomainError>;
}
