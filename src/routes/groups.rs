// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Community group console routes.

use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::models::{CommunityChallenge, CommunityEvent, CommunityGroup, RsvpStatus};
use crate::routes::api::current_user;
use crate::services::groups::{
    Announced, NewChallenge, NewEvent, NewGroup, RsvpResult, WeeklySummary,
};
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/groups", get(list_groups).post(register_group))
        .route(
            "/api/groups/{id}/challenges",
            get(list_challenges).post(create_challenge),
        )
        .route("/api/groups/{id}/events", post(create_event))
        .route(
            "/api/groups/{id}/events/{event_id}/reminders",
            post(send_reminder),
        )
        .route("/api/groups/{id}/summary", post(send_summary))
        .route("/api/events/{id}/rsvp", post(rsvp))
}

async fn list_groups(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<CommunityGroup>>> {
    Ok(Json(state.groups.list_groups(&user.user_id).await?))
}

async fn register_group(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<NewGroup>,
) -> Result<(StatusCode, Json<Announced<CommunityGroup>>)> {
    // Reports arriving through the group are credited to the admin's profile
    let admin = current_user(&state, &user).await?;
    let group = state
        .groups
        .register_group(&admin.id, &admin.name, body)
        .await?;
    Ok((StatusCode::CREATED, Json(group)))
}

async fn list_challenges(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(group_id): Path<String>,
) -> Result<Json<Vec<CommunityChallenge>>> {
    Ok(Json(
        state
            .groups
            .list_challenges(&user.user_id, &group_id)
            .await?,
    ))
}

async fn create_challenge(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(group_id): Path<String>,
    Json(body): Json<NewChallenge>,
) -> Result<(StatusCode, Json<Announced<CommunityChallenge>>)> {
    let challenge = state
        .groups
        .create_challenge(&user.user_id, &group_id, body)
        .await?;
    Ok((StatusCode::CREATED, Json(challenge)))
}

async fn create_event(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(group_id): Path<String>,
    Json(body): Json<NewEvent>,
) -> Result<(StatusCode, Json<Announced<CommunityEvent>>)> {
    let event = state
        .groups
        .create_event(&user.user_id, &group_id, body)
        .await?;
    Ok((StatusCode::CREATED, Json(event)))
}

async fn send_reminder(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path((group_id, event_id)): Path<(String, String)>,
) -> Result<Json<CommunityEvent>> {
    Ok(Json(
        state
            .groups
            .send_event_reminder(&user.user_id, &group_id, &event_id)
            .await?,
    ))
}

async fn send_summary(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(group_id): Path<String>,
) -> Result<Json<WeeklySummary>> {
    Ok(Json(
        state
            .groups
            .send_weekly_summary(&user.user_id, &group_id)
            .await?,
    ))
}

#[derive(Debug, Deserialize, Validate)]
pub struct RsvpRequest {
    #[validate(length(min = 7, max = 20))]
    pub phone: String,
    #[serde(default)]
    #[validate(length(max = 100))]
    pub name: String,
    pub status: RsvpStatus,
}

async fn rsvp(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<String>,
    Json(body): Json<RsvpRequest>,
) -> Result<Json<RsvpResult>> {
    body.validate()?;
    Ok(Json(
        state
            .groups
            .record_rsvp(&event_id, &body.phone, &body.name, body.status)
            .await?,
    ))
}
