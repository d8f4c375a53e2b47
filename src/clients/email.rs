//! Transactional email client abstraction
//!
//! One HTTP provider (Resend-style `/emails` endpoint), plus a mock that
//! records dispatches and can be told to fail specific addresses.

use crate::config::EmailConfig;
use crate::errors::AppError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One outgoing email
#[derive(Debug, Clone)]
pub struct OutboundEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Trait for email dispatch
#[async_trait]
pub trait EmailClient: Send + Sync {
    /// Dispatch one email; returns the provider message id
    async fn send(&self, email: &OutboundEmail) -> Result<String, AppError>;
}

/// HTTP transactional email client
pub struct HttpEmailClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    from: String,
}

#[derive(Serialize)]
struct SendRequest<'a> {
    from: &'a str,
    to: Vec<&'a str>,
    subject: &'a str,
    html: &'a str,
}

#[derive(Deserialize)]
struct SendResponse {
    id: String,
}

impl HttpEmailClient {
    pub fn new(config: &EmailConfig) -> Result<Self, AppError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| AppError::ValidationError("email api_key is required".to_string()))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::EmailError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            base_url: config
                .api_base
                .clone()
                .unwrap_or_else(|| "https://api.resend.com".to_string()),
            from: format!("{} <{}>", config.from_name, config.from_address),
        })
    }
}

#[async_trait]
impl EmailClient for HttpEmailClient {
    async fn send(&self, email: &OutboundEmail) -> Result<String, AppError> {
        let url = format!("{}/emails", self.base_url);

        let request = SendRequest {
            from: &self.from,
            to: vec![&email.to],
            subject: &email.subject,
            html: &email.html,
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::EmailError(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::EmailError(format!("API error {}: {}", status, body)));
        }

        let result: SendResponse = response
            .json()
            .await
            .map_err(|e| AppError::EmailError(format!("Failed to parse response: {}", e)))?;

        Ok(result.id)
    }
}

/// Mock email client for tests and local development
#[derive(Default)]
pub struct MockEmailClient {
    sent: Mutex<Vec<OutboundEmail>>,
    failing: Mutex<HashSet<String>>,
}

impl MockEmailClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sends to this address fail
    pub fn fail_address(&self, address: &str) {
        self.failing.lock().unwrap().insert(address.to_string());
    }

    pub fn sent(&self) -> Vec<OutboundEmail> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl EmailClient for MockEmailClient {
    async fn send(&self, email: &OutboundEmail) -> Result<String, AppError> {
        if self.failing.lock().unwrap().contains(&email.to) {
            return Err(AppError::EmailError(format!(
                "mock delivery failure for {}",
                email.to
            )));
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push(email.clone());
        Ok(format!("mock-{}", sent.len()))
    }
}

/// Create an email client based on configuration
pub fn create_email_client(config: &EmailConfig) -> Result<Arc<dyn EmailClient>, AppError> {
    match config.provider.as_str() {
        "mock" => Ok(Arc::new(MockEmailClient::new())),
        _ => Ok(Arc::new(HttpEmailClient::new(config)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email(to: &str) -> OutboundEmail {
        OutboundEmail {
            to: to.to_string(),
            subject: "Subject".to_string(),
            html: "<p>Body</p>".to_string(),
        }
    }

    #[tokio::test]
    async fn test_mock_records_sends() {
        let client = MockEmailClient::new();
        let id = client.send(&email("a@example.com")).await.unwrap();
        assert_eq!(id, "mock-1");
        assert_eq!(client.sent_count(), 1);
        assert_eq!(client.sent()[0].to, "a@example.com");
    }

    #[tokio::test]
    async fn test_mock_failure_injection() {
        let client = MockEmailClient::new();
        client.fail_address("bad@example.com");
        assert!(client.send(&email("bad@example.com")).await.is_err());
        assert!(client.send(&email("ok@example.com")).await.is_ok());
        assert_eq!(client.sent_count(), 1);
    }
}
