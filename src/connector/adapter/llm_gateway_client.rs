use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::application::{ChatMessage, ChatOptions, LlmGateway};
use crate::domain::DomainError;

const CHAT_PATH: &str = "/api/v1/chat";
const TOKENS_PATH: &str = "/api/tokens";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Deserialize)]
struct ChatResponse {
    content: Option<String>,
}

#[derive(Deserialize)]
struct UsageBlock {
    total_tokens: Option<u64>,
}

#[derive(Deserialize)]
struct TokenCountResponse {
    total: Option<u64>,
    count: Option<u64>,
    usage: Option<UsageBlock>,
}

/// HTTP client for the external LLM gateway.
///
/// All failures map to `UpstreamUnavailable`; callers degrade (agentic
/// expansion is skipped, token counts fall back to the heuristic) rather
/// than failing the request.
pub struct HttpLlmGateway {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl HttpLlmGateway {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl LlmGateway for HttpLlmGateway {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        options: ChatOptions,
    ) -> Result<String, DomainError> {
        let payload = json!({
            "model": self.model,
            "messages": messages,
            "temperature": options.temperature,
            "max_tokens": options.max_tokens,
            "stream": false,
        });

        let response = self
            .client
            .post(self.url(CHAT_PATH))
            .json(&payload)
            .send()
            .await
            .map_err(|e| DomainError::upstream(format!("LLM gateway chat: {}", e)))?;

        if !response.status().is_success() {
            return Err(DomainError::upstream(format!(
                "LLM gateway chat returned {}",
                response.status()
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| DomainError::upstream(format!("LLM gateway chat body: {}", e)))?;
        let content = parsed.content.unwrap_or_default();
        debug!("LLM gateway chat returned {} chars", content.len());
        Ok(content)
    }

    async fn count_tokens(&self, messages: &[ChatMessage]) -> Result<usize, DomainError> {
        let payload = json!({
            "model": self.model,
            "messages": messages,
        });

        let response = self
            .client
            .post(self.url(TOKENS_PATH))
            .json(&payload)
            .send()
            .await
            .map_err(|e| DomainError::upstream(format!("LLM gateway tokens: {}", e)))?;

        if !response.status().is_success() {
            return Err(DomainError::upstream(format!(
                "LLM gateway tokens returned {}",
                response.status()
            )));
        }

        let parsed: TokenCountResponse = response
            .json()
            .await
            .map_err(|e| DomainError::upstream(format!("LLM gateway tokens body: {}", e)))?;

        // Gateways report the count under different shapes.
        let total = parsed
            .total
            .or(parsed.count)
            .or(parsed.usage.and_then(|u| u.total_tokens))
            .ok_or_else(|| DomainError::upstream("LLM gateway tokens: no count in response"))?;
        Ok(total as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trimmed() {
        let gateway = HttpLlmGateway::new("http://gateway:3010/", "small-model");
        assert_eq!(gateway.url(CHAT_PATH), "http://gateway:3010/api/v1/chat");
    }

    #[tokio::test]
    async fn test_unreachable_gateway_is_upstream_error() {
        let gateway = HttpLlmGateway::new("http://127.0.0.1:1", "m");
        let err = gateway
            .chat(&[ChatMessage::user("hi")], ChatOptions::default())
            .await
            .unwrap_err();
        assert!(err.is_upstream());
    }

    #[test]
    fn test_token_response_shapes() {
        let a: TokenCountResponse = serde_json::from_str(r#"{"total": 12}"#).unwrap();
        assert_eq!(a.total, Some(12));
        let b: TokenCountResponse = serde_json::from_str(r#"{"count": 7}"#).unwrap();
        assert_eq!(b.count, Some(7));
        let c: TokenCountResponse =
            serde_json::from_str(r#"{"usage": {"total_tokens": 33}}"#).unwrap();
        assert_eq!(c.usage.unwrap().total_tokens, Some(33));
    }
}
