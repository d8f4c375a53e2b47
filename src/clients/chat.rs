//! Chat-completion client abstraction
//!
//! One hosted provider speaking the OpenAI-compatible chat API, plus a
//! mock for tests and local development (provider = "mock").

use crate::config::ChatConfig;
use crate::errors::AppError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Trait for chat-completion generation
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Run one completion and return the assistant message text
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, AppError>;
}

/// Hosted chat-completion client
pub struct CloudChatClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    max_retries: u32,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

impl CloudChatClient {
    pub fn new(config: &ChatConfig) -> Result<Self, AppError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| AppError::ValidationError("chat api_key is required".to_string()))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::ChatError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            model: config.model.clone(),
            base_url: config
                .api_base
                .clone()
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            max_retries: config.max_retries,
        })
    }

    /// Make request, retrying up to `max_retries` additional times
    async fn request_with_retry(&self, system: &str, prompt: &str) -> Result<String, AppError> {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                // Exponential backoff
                let delay = Duration::from_millis(200 * (2_u64.pow(attempt - 1)));
                tokio::time::sleep(delay).await;
            }

            match self.make_request(system, prompt).await {
                Ok(text) => return Ok(text),
                Err(e) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        error = %e,
                        "Chat completion request failed, retrying"
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| AppError::ChatError("Unknown error after retries".to_string())))
    }

    async fn make_request(&self, system: &str, prompt: &str) -> Result<String, AppError> {
        let url = format!("{}/chat/completions", self.base_url);

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: prompt.to_string(),
                },
            ],
            temperature: 0.7,
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::ChatError(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ChatError(format!("API error {}: {}", status, body)));
        }

        let result: ChatResponse = response
            .json()
            .await
            .map_err(|e| AppError::ChatError(format!("Failed to parse response: {}", e)))?;

        result
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| AppError::ChatError("Empty response".to_string()))
    }
}

#[async_trait]
impl ChatClient for CloudChatClient {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, AppError> {
        self.request_with_retry(system, prompt).await
    }
}

/// Mock chat client for tests and local development
///
/// Pops scripted responses in order; once the script is exhausted it
/// returns a fixed placeholder line.
#[derive(Default)]
pub struct MockChatClient {
    responses: Mutex<Vec<String>>,
}

impl MockChatClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_responses(responses: Vec<&str>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().rev().map(String::from).collect()),
        }
    }
}

#[async_trait]
impl ChatClient for MockChatClient {
    async fn complete(&self, _system: &str, _prompt: &str) -> Result<String, AppError> {
        let mut responses = self.responses.lock().unwrap();
        Ok(responses
            .pop()
            .unwrap_or_else(|| "Placeholder copy from the mock chat client.".to_string()))
    }
}

/// Create a chat client based on configuration
pub fn create_chat_client(config: &ChatConfig) -> Result<Arc<dyn ChatClient>, AppError> {
    match config.provider.as_str() {
        "mock" => Ok(Arc::new(MockChatClient::new())),
        _ => Ok(Arc::new(CloudChatClient::new(config)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_scripted_order() {
        let client = MockChatClient::with_responses(vec!["first", "second"]);
        assert_eq!(client.complete("s", "p").await.unwrap(), "first");
        assert_eq!(client.complete("s", "p").await.unwrap(), "second");
    }

    #[tokio::test]
    async fn test_mock_exhausted_falls_back() {
        let client = MockChatClient::new();
        let text = client.complete("s", "p").await.unwrap();
        assert!(!text.is_empty());
    }

    #[tokio::test]
    async fn test_zero_retries_still_attempts_once() {
        let config = ChatConfig {
            provider: "openai".to_string(),
            api_key: Some("test-key".to_string()),
            // Unreachable endpoint: the request itself must fail
            api_base: Some("http://127.0.0.1:9".to_string()),
            model: "gpt-4o-mini".to_string(),
            timeout_secs: 2,
            max_retries: 0,
        };
        let client = CloudChatClient::new(&config).unwrap();
        let err = client.complete("s", "p").await.unwrap_err();
        // The single attempt ran and produced a transport error, not the
        // no-attempts fallback message.
        assert!(err.to_string().contains("Request failed"));
    }
}
