// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Webhook route for inbound group chat messages.

use crate::error::{AppError, Result};
use crate::services::groups::{InboundMessage, InboundReply};
use crate::AppState;
use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::post,
    Json, Router,
};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::sync::Arc;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Hex HMAC-SHA256 of the raw request body, optionally prefixed `sha256=`.
pub const SIGNATURE_HEADER: &str = "x-hyve-signature";

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/webhook/messages", post(handle_message))
}

fn digest(secret: &[u8], body: &[u8]) -> Option<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(body);
    Some(mac.finalize().into_bytes().to_vec())
}

/// Signature for `body`, as the gateway computes it.
pub fn sign(secret: &[u8], body: &[u8]) -> Option<String> {
    digest(secret, body).map(hex::encode)
}

/// Constant-time check of a signature header value against `body`.
pub fn verify_signature(secret: &[u8], body: &[u8], header_value: &str) -> bool {
    let provided = header_value.trim();
    let provided = provided.strip_prefix("sha256=").unwrap_or(provided);
    let (Ok(provided), Some(expected)) = (hex::decode(provided), digest(secret, body)) else {
        return false;
    };
    expected.as_slice().ct_eq(provided.as_slice()).into()
}

async fn handle_message(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<InboundReply>> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            tracing::warn!("Inbound message without signature");
            AppError::Unauthorized
        })?;

    if !verify_signature(state.config.webhook_secret.as_bytes(), &body, signature) {
        tracing::warn!("Security Alert: inbound message signature mismatch");
        return Err(AppError::Unauthorized);
    }

    let message: InboundMessage = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid message payload: {}", e)))?;
    tracing::info!(chat_id = %message.chat_id, "Inbound message accepted");

    Ok(Json(state.groups.handle_inbound(message).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test_webhook_secret";

    #[test]
    fn test_signature_accepts_matching_body() {
        let body = br#"{"chat_id":"c","from":"+254700000001","body":"help"}"#;
        let signature = sign(SECRET, body).unwrap();
        assert!(verify_signature(SECRET, body, &signature));
        assert!(verify_signature(SECRET, body, &format!("sha256={}", signature)));
    }

    #[test]
    fn test_signature_rejects_tampering() {
        let body = b"{\"body\":\"help\"}";
        let signature = sign(SECRET, body).unwrap();
        assert!(!verify_signature(SECRET, b"{\"body\":\"HELP\"}", &signature));
        assert!(!verify_signature(b"wrong_secret", body, &signature));
        assert!(!verify_signature(SECRET, body, "not-hex"));
        assert!(!verify_signature(SECRET, body, &signature[..10]));
    }
}
