//! Inference API client
//!
//! Raw transport to an OpenAI-compatible chat-completions endpoint.
//! The cache-or-call policy lives in the gateway; this module only
//! sends a prompt and returns the completion text.

use governor::{Quota, RateLimiter};
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = "boardwatch/0.1.0";
const REQUEST_TIMEOUT_SECS: u64 = 60;
/// Requests per second against the inference endpoint
const RATE_LIMIT_PER_SEC: u32 = 2;

/// Inference client errors
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Transport seam for chat completions. The gateway is generic over
/// this so tests can substitute a scripted backend.
pub trait CompletionApi {
    fn complete(
        &self,
        system: &str,
        user: &str,
    ) -> impl Future<Output = Result<String, InferenceError>> + Send;
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

/// OpenAI-compatible chat completions client
pub struct OpenAiCompletions {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    rate_limiter: RateLimiter<
        governor::state::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl OpenAiCompletions {
    pub fn new(base_url: &str, api_key: &str, model: &str) -> Result<Self, InferenceError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| InferenceError::Network(e.to_string()))?;

        // Safe: RATE_LIMIT_PER_SEC is non-zero
        let quota = Quota::per_second(std::num::NonZeroU32::new(RATE_LIMIT_PER_SEC).unwrap());

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            rate_limiter: RateLimiter::direct(quota),
        })
    }
}

impl CompletionApi for OpenAiCompletions {
    async fn complete(&self, system: &str, user: &str) -> Result<String, InferenceError> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}/chat/completions", self.base_url);
        let payload = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
            "temperature": 0.2,
        });

        tracing::debug!(model = %self.model, "Calling inference API");

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| InferenceError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(InferenceError::Api(status.as_u16(), error_text));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| InferenceError::Parse(e.to_string()))?;

        chat.choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| InferenceError::Parse("response contained no choices".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_creation_trims_trailing_slash() {
        let client = OpenAiCompletions::new("https://api.example.com/v1/", "sk-x", "test-model");
        assert!(client.is_ok());
        assert_eq!(client.unwrap().base_url, "https://api.example.com/v1");
    }

    #[test]
    fn chat_response_parses_content() {
        let json = r#"{"choices":[{"message":{"role":"assistant","content":"Q3 2026"}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.choices[0].message.content, "Q3 2026");
    }
}
