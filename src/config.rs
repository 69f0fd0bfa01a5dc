//! Application configuration loaded from environment variables.
//!
//! On Cloud Run secrets are injected as environment variables, so a single
//! `from_env()` covers both local development and production.

use std::env;
use std::time::Duration;

/// Which implementation backs the classifier and hotspot predictor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiMode {
    /// Random plausible values generated in-process
    Mock,
    /// HTTP calls to `AI_SERVICE_URL`
    Remote,
}

impl AiMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AiMode::Mock => "mock",
            AiMode::Remote => "remote",
        }
    }
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Frontend URL allowed by CORS
    pub frontend_url: String,
    /// GCP project ID (Firestore)
    pub gcp_project_id: String,
    /// Server port
    pub port: u16,

    /// JWT signing key for identity tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,

    pub ai_mode: AiMode,
    pub ai_service_url: Option<String>,
    pub ai_service_key: Option<String>,
    /// Map overlay refresh period
    pub overlay_refresh: Duration,
    /// How long a cached profile is served before it is re-read
    pub profile_ttl: Duration,
    /// Sessions idle this long are dropped
    pub session_idle: Duration,

    /// Messaging gateway base URL; unset means log-only delivery
    pub messaging_api_url: Option<String>,
    pub messaging_api_token: Option<String>,
    /// Shared secret for inbound message webhook signatures
    pub webhook_secret: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let ai_service_url = optional("AI_SERVICE_URL");
        let ai_mode = match env::var("AI_MODE").ok().as_deref() {
            Some("remote") => AiMode::Remote,
            Some("mock") => AiMode::Mock,
            None if ai_service_url.is_some() => AiMode::Remote,
            None => AiMode::Mock,
            Some(_) => return Err(ConfigError::Invalid("AI_MODE")),
        };
        if ai_mode == AiMode::Remote && ai_service_url.is_none() {
            return Err(ConfigError::Missing("AI_SERVICE_URL"));
        }

        let overlay_refresh_secs: u64 = env::var("OVERLAY_REFRESH_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .map_err(|_| ConfigError::Invalid("OVERLAY_REFRESH_SECS"))?;
        if overlay_refresh_secs == 0 {
            return Err(ConfigError::Invalid("OVERLAY_REFRESH_SECS"));
        }

        let profile_ttl_secs: u64 = env::var("PROFILE_TTL_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .map_err(|_| ConfigError::Invalid("PROFILE_TTL_SECS"))?;
        let session_idle_secs: u64 = env::var("SESSION_IDLE_SECS")
            .unwrap_or_else(|_| "1800".to_string())
            .parse()
            .map_err(|_| ConfigError::Invalid("SESSION_IDLE_SECS"))?;

        Ok(Self {
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),

            jwt_signing_key: env::var("JWT_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
                .into_bytes(),

            ai_mode,
            ai_service_url,
            ai_service_key: optional("AI_SERVICE_KEY"),
            overlay_refresh: Duration::from_secs(overlay_refresh_secs),
            profile_ttl: Duration::from_secs(profile_ttl_secs),
            session_idle: Duration::from_secs(session_idle_secs),

            messaging_api_url: optional("MESSAGING_API_URL"),
            messaging_api_token: optional("MESSAGING_API_TOKEN"),
            webhook_secret: env::var("WEBHOOK_SECRET")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("WEBHOOK_SECRET"))?,
        })
    }

    /// Config for tests: offline, mock AI, log-only messaging.
    pub fn test_default() -> Self {
        Self {
            frontend_url: "http://localhost:5173".to_string(),
            gcp_project_id: "test-project".to_string(),
            port: 8080,
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            ai_mode: AiMode::Mock,
            ai_service_url: None,
            ai_service_key: None,
            overlay_refresh: Duration::from_secs(30),
            profile_ttl: Duration::from_secs(30),
            session_idle: Duration::from_secs(1800),
            messaging_api_url: None,
            messaging_api_token: None,
            webhook_secret: "test_webhook_secret".to_string(),
        }
    }
}

fn optional(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}
