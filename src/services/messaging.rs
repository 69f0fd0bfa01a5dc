// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Outbound messages to community group chats and admins.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::AppError;

const SEND_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum MessagingError {
    #[error("messaging request failed: {0}")]
    Request(String),

    #[error("messaging gateway returned HTTP {status}")]
    Status { status: u16 },
}

impl From<MessagingError> for AppError {
    fn from(err: MessagingError) -> Self {
        AppError::Messaging(err.to_string())
    }
}

/// Fire-and-report send. Success means the gateway accepted the message,
/// not that it was delivered.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send(&self, to: &str, body: &str) -> Result<(), MessagingError>;
}

#[derive(Serialize)]
struct SendRequest<'a> {
    to: &'a str,
    body: &'a str,
}

/// Sends through `POST {MESSAGING_API_URL}/messages`.
#[derive(Clone)]
pub struct HttpMessenger {
    http: reqwest::Client,
    url: String,
    token: Option<String>,
}

impl HttpMessenger {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self, MessagingError> {
        let http = reqwest::Client::builder()
            .timeout(SEND_TIMEOUT)
            .build()
            .map_err(|e| MessagingError::Request(e.to_string()))?;
        Ok(Self {
            http,
            url: format!("{}/messages", base_url.trim_end_matches('/')),
            token,
        })
    }
}

#[async_trait]
impl Messenger for HttpMessenger {
    async fn send(&self, to: &str, body: &str) -> Result<(), MessagingError> {
        let mut request = self.http.post(&self.url).json(&SendRequest { to, body });
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| MessagingError::Request(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            tracing::warn!(to, status = status.as_u16(), "Message send rejected");
            return Err(MessagingError::Status {
                status: status.as_u16(),
            });
        }
        tracing::debug!(to, "Message sent");
        Ok(())
    }
}

/// Used when no gateway is configured.
#[derive(Debug, Default, Clone)]
pub struct LogMessenger;

#[async_trait]
impl Messenger for LogMessenger {
    async fn send(&self, to: &str, body: &str) -> Result<(), MessagingError> {
        tracing::info!(to, chars = body.chars().count(), "Message (not sent, no gateway)");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_url() {
        let m = HttpMessenger::new("https://gateway.example.com/", None).unwrap();
        assert_eq!(m.url, "https://gateway.example.com/messages");
    }

    #[tokio::test]
    async fn test_log_messenger_always_succeeds() {
        assert!(LogMessenger.send("+254700000001", "habari").await.is_ok());
    }

    #[test]
    fn test_error_maps_to_bad_gateway_variant() {
        let err: AppError = MessagingError::Status { status: 503 }.into();
        assert!(matches!(err, AppError::Messaging(_)));
    }
}
