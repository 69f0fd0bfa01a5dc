// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for authenticated users: profile, credits, gamification and
//! image classification.

use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::models::user::NotificationPreferences;
use crate::models::{
    AchievementProgress, Coordinates, CreditEntry, ProfilePatch, RedemptionMethod,
    RedemptionReceipt, User,
};
use crate::services::achievements::{self, ReportStats};
use crate::services::Classification;
use crate::AppState;
use axum::{
    extract::{Query, State},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

const DEFAULT_LEADERBOARD_SIZE: u32 = 10;
const MAX_LEADERBOARD_SIZE: u32 = 100;
const DEFAULT_HISTORY_SIZE: u32 = 50;
const MAX_HISTORY_SIZE: u32 = 200;

/// API routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(get_me).put(update_me))
        .route("/api/me/email", post(connect_email))
        .route("/api/classify", post(classify))
        .route("/api/credits/redeem", post(redeem))
        .route("/api/credits/history", get(credit_history))
        .route("/api/achievements", get(get_achievements))
        .route("/api/stats", get(get_stats))
        .route("/api/leaderboard", get(get_leaderboard))
}

/// Profile of the caller, created from the token claims on first access.
pub(crate) async fn current_user(state: &AppState, user: &AuthUser) -> Result<User> {
    state
        .store
        .load_user_profile(&user.user_id, user.name.as_deref(), user.email.as_deref())
        .await
}

// ─── User Profile ────────────────────────────────────────────

async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<User>> {
    Ok(Json(current_user(&state, &user).await?))
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub preferences: Option<NotificationPreferences>,
}

async fn update_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<UpdateProfileRequest>,
) -> Result<Json<User>> {
    body.validate()?;
    current_user(&state, &user).await?;
    let patch = ProfilePatch {
        name: body.name.map(|n| n.trim().to_string()),
        email: body.email,
        preferences: body.preferences,
    };
    Ok(Json(
        state.store.update_user_profile(&user.user_id, patch).await?,
    ))
}

#[derive(Debug, Deserialize, Validate)]
pub struct ConnectEmailRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 50))]
    pub provider: String,
}

async fn connect_email(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<ConnectEmailRequest>,
) -> Result<Json<User>> {
    body.validate()?;
    current_user(&state, &user).await?;
    Ok(Json(
        state
            .store
            .connect_email(&user.user_id, &body.email, &body.provider)
            .await?,
    ))
}

// ─── Classification ──────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
pub struct ClassifyRequest {
    #[validate(url)]
    pub image_url: String,
    pub coordinates: Option<Coordinates>,
}

async fn classify(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<ClassifyRequest>,
) -> Result<Json<Classification>> {
    body.validate()?;
    let classification = state
        .classifier
        .classify(&body.image_url, body.coordinates)
        .await?;
    tracing::debug!(
        user_id = %user.user_id,
        waste_type = classification.waste_type.as_str(),
        confidence = classification.confidence,
        "Image classified"
    );
    Ok(Json(classification))
}

// ─── Credits ─────────────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
pub struct RedeemRequest {
    #[validate(range(min = 1))]
    pub amount: i64,
    pub method: RedemptionMethod,
}

async fn redeem(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<RedeemRequest>,
) -> Result<Json<RedemptionReceipt>> {
    body.validate()?;
    current_user(&state, &user).await?;
    let receipt = state
        .store
        .redeem_credits(&user.user_id, body.amount, body.method)
        .await?;
    tracing::info!(
        user_id = %user.user_id,
        amount = receipt.amount,
        method = ?receipt.method,
        remaining = receipt.remaining_credits,
        "Credits redeemed"
    );
    Ok(Json(receipt))
}

#[derive(Deserialize)]
struct LimitQuery {
    limit: Option<u32>,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CreditHistoryResponse {
    pub entries: Vec<CreditEntry>,
    pub balance: u32,
}

async fn credit_history(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<LimitQuery>,
) -> Result<Json<CreditHistoryResponse>> {
    let profile = current_user(&state, &user).await?;
    let limit = params
        .limit
        .unwrap_or(DEFAULT_HISTORY_SIZE)
        .clamp(1, MAX_HISTORY_SIZE);
    let entries = state.store.credit_history(&user.user_id, limit).await?;
    Ok(Json(CreditHistoryResponse {
        entries,
        balance: profile.credits,
    }))
}

// ─── Gamification ────────────────────────────────────────────

async fn get_achievements(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<AchievementProgress>>> {
    current_user(&state, &user).await?;
    Ok(Json(state.store.check_achievements(&user.user_id).await?))
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct StatsResponse {
    pub credits: u32,
    pub total_earned: u32,
    pub reports_count: u32,
    pub verified_reports: u32,
    pub recycling_score: u8,
    #[cfg_attr(feature = "binding-generation", ts(skip))]
    pub reports: ReportStats,
}

async fn get_stats(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<StatsResponse>> {
    let profile = current_user(&state, &user).await?;
    let reports = state.store.load_reports(&user.user_id).await?;
    Ok(Json(StatsResponse {
        credits: profile.credits,
        total_earned: profile.total_earned,
        reports_count: profile.reports_count,
        verified_reports: profile.verified_reports,
        recycling_score: profile.recycling_score,
        reports: achievements::report_stats(&reports),
    }))
}

/// Public view of a leaderboard row; no contact details.
#[derive(Serialize, Debug, PartialEq)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub user_id: String,
    pub name: String,
    pub total_earned: u32,
    pub reports_count: u32,
    pub badges: Vec<String>,
}

fn leaderboard_entries(users: Vec<User>) -> Vec<LeaderboardEntry> {
    users
        .into_iter()
        .enumerate()
        .map(|(i, u)| LeaderboardEntry {
            rank: i as u32 + 1,
            user_id: u.id,
            name: u.name,
            total_earned: u.total_earned,
            reports_count: u.reports_count,
            badges: u.badges,
        })
        .collect()
}

async fn get_leaderboard(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LimitQuery>,
) -> Result<Json<Vec<LeaderboardEntry>>> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_LEADERBOARD_SIZE)
        .clamp(1, MAX_LEADERBOARD_SIZE);
    let users = state.store.leaderboard(limit).await?;
    Ok(Json(leaderboard_entries(users)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_leaderboard_ranks_in_order_without_email() {
        let mut a = User::new("a", "Amina", "amina@example.com", Utc::now());
        a.total_earned = 90;
        let mut b = User::new("b", "Baraka", "baraka@example.com", Utc::now());
        b.total_earned = 40;
        let entries = leaderboard_entries(vec![a, b]);
        assert_eq!(entries[0].rank, 1);
        assert_eq!(entries[1].rank, 2);
        assert_eq!(entries[1].name, "Baraka");
        let json = serde_json::to_value(&entries[0]).unwrap();
        assert!(json.get("email").is_none());
    }

    #[test]
    fn test_redeem_request_validation() {
        let bad: RedeemRequest =
            serde_json::from_str(r#"{"amount": 0, "method": "cash"}"#).unwrap();
        assert!(bad.validate().is_err());
        let good: RedeemRequest =
            serde_json::from_str(r#"{"amount": 20, "method": "donation"}"#).unwrap();
        assert!(good.validate().is_ok());
    }
}
