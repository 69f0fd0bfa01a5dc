// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! JWT authentication middleware.

use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Session cookie carrying the JWT.
pub const AUTH_COOKIE: &str = "hyve_token";

/// JWT claims structure.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (platform user id)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
    /// Issued at (Unix timestamp)
    pub iat: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Authenticated user extracted from JWT.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub name: Option<String>,
    pub email: Option<String>,
}

impl AuthUser {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or_default()
    }
}

/// Lifetime of an issued session token.
const SESSION_DAYS: i64 = 30;

/// Session token from the auth cookie, else a bearer header.
fn session_token(jar: &CookieJar, headers: &HeaderMap) -> Option<String> {
    if let Some(cookie) = jar.get(AUTH_COOKIE) {
        return Some(cookie.value().to_string());
    }
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_string)
}

/// Verify a token's signature and expiry, rejecting blank subjects.
fn verify_token(token: &str, signing_key: &[u8]) -> Option<AuthUser> {
    let claims = decode::<Claims>(
        token,
        &DecodingKey::from_secret(signing_key),
        &Validation::new(Algorithm::HS256),
    )
    .map_err(|e| tracing::debug!(error = %e, "Rejected JWT"))
    .ok()?
    .claims;

    if claims.sub.trim().is_empty() {
        return None;
    }
    Some(AuthUser {
        user_id: claims.sub,
        name: claims.name.filter(|n| !n.is_empty()),
        email: claims.email.filter(|e| !e.is_empty()),
    })
}

/// Middleware that requires valid JWT authentication.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let user = session_token(&jar, request.headers())
        .and_then(|token| verify_token(&token, &state.config.jwt_signing_key))
        .ok_or(StatusCode::UNAUTHORIZED)?;

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// Sign a session token for `user_id`.
pub fn create_jwt(
    user_id: &str,
    name: Option<&str>,
    email: Option<&str>,
    signing_key: &[u8],
) -> anyhow::Result<String> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id.to_string(),
        iat: usize::try_from(now.timestamp())?,
        exp: usize::try_from((now + Duration::days(SESSION_DAYS)).timestamp())?,
        name: name.map(str::to_string),
        email: email.map(str::to_string),
    };

    Ok(encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(signing_key),
    )?)
}
