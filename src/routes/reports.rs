// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Waste report routes.

use crate::db::firestore::ReportQuery;
use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{
    Coordinates, Location, ReportClassification, ReportDraft, ReportPatch, Urgency, WasteReport,
    WasteType,
};
use crate::routes::api::current_user;
use crate::time_utils::{format_utc_rfc3339, parse_rfc3339};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Extension, Json, Router,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

const DEFAULT_PER_PAGE: u32 = 20;
const MAX_PER_PAGE: u32 = 100;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/reports", get(list_reports).post(create_report))
        .route("/api/reports/{id}", get(get_report).patch(update_report))
}

// ─── Listing ─────────────────────────────────────────────────

#[derive(Deserialize)]
struct ReportsQuery {
    /// Only the caller's own reports
    #[serde(default)]
    mine: bool,
    /// Cursor for forward pagination (opaque token).
    cursor: Option<String>,
    per_page: Option<u32>,
}

/// The cursor is the `created_at` of the last report on the previous page.
fn parse_cursor(cursor: Option<&str>) -> Result<Option<String>> {
    cursor
        .map(|raw| {
            let invalid_cursor = || AppError::BadRequest("Invalid 'cursor' parameter".to_string());

            let decoded = URL_SAFE_NO_PAD.decode(raw).map_err(|_| invalid_cursor())?;
            let decoded_str = std::str::from_utf8(&decoded).map_err(|_| invalid_cursor())?;
            let created_at = parse_rfc3339(decoded_str).ok_or_else(invalid_cursor)?;
            Ok(format_utc_rfc3339(created_at))
        })
        .transpose()
}

fn encode_cursor(report: &WasteReport) -> String {
    URL_SAFE_NO_PAD.encode(format_utc_rfc3339(report.created_at))
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ReportsResponse {
    pub reports: Vec<WasteReport>,
    pub per_page: u32,
    pub next_cursor: Option<String>,
}

async fn list_reports(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<ReportsQuery>,
) -> Result<Json<ReportsResponse>> {
    let limit = params
        .per_page
        .unwrap_or(DEFAULT_PER_PAGE)
        .clamp(1, MAX_PER_PAGE);
    let before = parse_cursor(params.cursor.as_deref())?;

    tracing::debug!(
        user_id = %user.user_id,
        mine = params.mine,
        cursor = ?params.cursor,
        "Fetching reports"
    );

    // Fetch one extra item to determine if another page is available.
    let mut reports = state
        .store
        .list_reports(&ReportQuery {
            user_id: params.mine.then(|| user.user_id.clone()),
            before,
            limit: limit.saturating_add(1),
            ..Default::default()
        })
        .await?;

    let has_more = reports.len() > limit as usize;
    if has_more {
        reports.truncate(limit as usize);
    }
    let next_cursor = if has_more {
        reports.last().map(encode_cursor)
    } else {
        None
    };

    Ok(Json(ReportsResponse {
        reports,
        per_page: limit,
        next_cursor,
    }))
}

async fn get_report(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<WasteReport>> {
    state
        .store
        .get_report(&id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Report {}", id)))
}

// ─── Submission ──────────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
pub struct LocationRequest {
    #[validate(length(min = 1, max = 200))]
    pub address: String,
    pub coordinates: Coordinates,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateReportRequest {
    #[serde(rename = "type")]
    pub waste_type: WasteType,
    #[validate(nested)]
    pub location: LocationRequest,
    #[serde(default)]
    #[validate(length(max = 2000))]
    pub description: String,
    pub urgency: Urgency,
    #[serde(default)]
    #[validate(length(max = 10))]
    pub images: Vec<String>,
    pub classification: Option<ReportClassification>,
}

impl From<CreateReportRequest> for ReportDraft {
    fn from(body: CreateReportRequest) -> Self {
        ReportDraft {
            waste_type: body.waste_type,
            location: Location {
                address: body.location.address.trim().to_string(),
                coordinates: body.location.coordinates,
            },
            description: body.description,
            urgency: body.urgency,
            images: body.images,
            classification: body.classification,
            // Group reports only arrive through the group webhook
            group_id: None,
        }
    }
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CreateReportResponse {
    pub report: WasteReport,
    pub credits_awarded: u32,
    pub balance: u32,
    pub new_badges: Vec<String>,
}

async fn create_report(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<CreateReportRequest>,
) -> Result<(StatusCode, Json<CreateReportResponse>)> {
    body.validate()?;
    if body
        .images
        .iter()
        .any(|i| !(i.starts_with("https://") || i.starts_with("http://")))
    {
        return Err(AppError::BadRequest("Image URLs must be http(s)".to_string()));
    }
    current_user(&state, &user).await?;

    let commit = state
        .store
        .add_report(&user.user_id, ReportDraft::from(body))
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(CreateReportResponse {
            credits_awarded: commit.report.credits,
            balance: commit.user.credits,
            new_badges: commit.new_badges,
            report: commit.report,
        }),
    ))
}

async fn update_report(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(patch): Json<ReportPatch>,
) -> Result<Json<WasteReport>> {
    current_user(&state, &user).await?;
    let report = state.store.update_report(&user.user_id, &id, patch).await?;
    tracing::info!(
        user_id = %user.user_id,
        report_id = %report.id,
        status = report.status.as_str(),
        "Report status changed"
    );
    Ok(Json(report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ReportStatus;
    use chrono::TimeZone;

    #[test]
    fn test_cursor_roundtrip() {
        let created_at = chrono::Utc
            .with_ymd_and_hms(2026, 10, 14, 9, 5, 0)
            .unwrap();
        let report = WasteReport {
            id: "r1".to_string(),
            waste_type: WasteType::Plastic,
            location: Location {
                address: "Yaya Centre".to_string(),
                coordinates: Coordinates::DEFAULT,
            },
            description: String::new(),
            urgency: Urgency::Low,
            status: ReportStatus::Pending,
            images: vec![],
            credits: 10,
            user_id: "u".to_string(),
            created_at,
            resolved_at: None,
            classification: None,
            group_id: None,
        };
        let cursor = encode_cursor(&report);
        assert_eq!(
            parse_cursor(Some(&cursor)).unwrap().as_deref(),
            Some("2026-10-14T09:05:00.000Z")
        );
    }

    #[test]
    fn test_invalid_cursor_rejected() {
        assert!(matches!(
            parse_cursor(Some("not base64!")),
            Err(AppError::BadRequest(_))
        ));
        let not_a_date = URL_SAFE_NO_PAD.encode("yesterday");
        assert!(parse_cursor(Some(&not_a_date)).is_err());
        assert_eq!(parse_cursor(None).unwrap(), None);
    }

    #[test]
    fn test_create_request_uses_type_field() {
        let body: CreateReportRequest = serde_json::from_str(
            r#"{"type":"hazardous","location":{"address":"Ngong Rd","coordinates":{"lat":-1.3,"lng":36.78}},"urgency":"high"}"#,
        )
        .unwrap();
        assert!(body.validate().is_ok());
        let draft = ReportDraft::from(body);
        assert_eq!(draft.waste_type, WasteType::Hazardous);
        assert!(draft.images.is_empty());
    }

    #[test]
    fn test_create_request_cannot_target_a_group() {
        let body: CreateReportRequest = serde_json::from_str(
            r#"{"type":"plastic","location":{"address":"Ngong Rd","coordinates":{"lat":-1.3,"lng":36.78}},"urgency":"low","group_id":"someone-elses-group"}"#,
        )
        .unwrap();
        let draft = ReportDraft::from(body);
        assert_eq!(draft.group_id, None);
    }

    #[test]
    fn test_create_request_needs_address() {
        let body: CreateReportRequest = serde_json::from_str(
            r#"{"type":"plastic","location":{"address":"","coordinates":{"lat":-1.3,"lng":36.78}},"urgency":"low"}"#,
        )
        .unwrap();
        assert!(body.validate().is_err());
    }
}
