// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Row representations of stored entities and the mapping to models.
//!
//! Report locations are stored flattened, with coordinates as a textual
//! point `"(lat,lng)"`.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::user::NotificationPreferences;
use crate::models::{
    Coordinates, Location, ReportClassification, ReportStatus, Urgency, User, WasteReport,
    WasteType,
};
use crate::time_utils::{format_utc_rfc3339, parse_rfc3339};

static POINT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*\(\s*([^,()\s]+)\s*,\s*([^,()\s]+)\s*\)\s*$").expect("static point pattern")
});

/// Encode coordinates as `"(lat,lng)"`.
pub fn format_point(coordinates: Coordinates) -> String {
    format!("({},{})", coordinates.lat, coordinates.lng)
}

/// Decode a textual point. `None` if malformed or out of range.
pub fn parse_point(raw: &str) -> Option<Coordinates> {
    let caps = POINT_RE.captures(raw)?;
    let lat: f64 = caps[1].parse().ok()?;
    let lng: f64 = caps[2].parse().ok()?;
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
        return None;
    }
    Some(Coordinates::new(lat, lng))
}

/// Decode a stored point, falling back to the default pair.
pub fn parse_point_or_default(raw: &str) -> Coordinates {
    parse_point(raw).unwrap_or_else(|| {
        tracing::warn!(raw, "Malformed stored coordinates, using default location");
        Coordinates::DEFAULT
    })
}

/// `user_profiles` document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfileRow {
    pub auth_user_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub credits: u32,
    #[serde(default)]
    pub total_earned: u32,
    #[serde(default)]
    pub reports_count: u32,
    #[serde(default)]
    pub verified_reports: u32,
    #[serde(default = "default_recycling_score")]
    pub recycling_score: u8,
    #[serde(default)]
    pub badges: Vec<String>,
    #[serde(default)]
    pub email_connected: bool,
    #[serde(default)]
    pub preferences: Option<NotificationPreferences>,
    pub created_at: String,
    #[serde(default)]
    pub revision: u64,
}

fn default_recycling_score() -> u8 {
    crate::models::user::DEFAULT_RECYCLING_SCORE
}

impl From<&User> for UserProfileRow {
    fn from(user: &User) -> Self {
        Self {
            auth_user_id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            credits: user.credits,
            total_earned: user.total_earned,
            reports_count: user.reports_count,
            verified_reports: user.verified_reports,
            recycling_score: user.recycling_score,
            badges: user.badges.clone(),
            email_connected: user.email_connected,
            preferences: Some(user.preferences),
            created_at: format_utc_rfc3339(user.joined_at),
            revision: user.revision,
        }
    }
}

impl TryFrom<UserProfileRow> for User {
    type Error = AppError;

    fn try_from(row: UserProfileRow) -> Result<Self, Self::Error> {
        let joined_at = parse_rfc3339(&row.created_at).ok_or_else(|| {
            AppError::Database(format!(
                "Invalid created_at on profile {}: {}",
                row.auth_user_id, row.created_at
            ))
        })?;
        Ok(User {
            id: row.auth_user_id,
            name: row.name,
            email: row.email,
            credits: row.credits,
            total_earned: row.total_earned,
            reports_count: row.reports_count,
            verified_reports: row.verified_reports,
            recycling_score: row.recycling_score.min(100),
            badges: row.badges,
            email_connected: row.email_connected,
            preferences: row.preferences.unwrap_or_default(),
            joined_at,
            revision: row.revision,
        })
    }
}

/// `waste_reports` document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportRow {
    pub id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub waste_type: WasteType,
    pub location_address: String,
    pub location_coordinates: String,
    #[serde(default)]
    pub description: String,
    pub urgency: Urgency,
    pub status: ReportStatus,
    #[serde(default)]
    pub images: Vec<String>,
    pub credits: u32,
    #[serde(default)]
    pub classification: Option<ReportClassification>,
    #[serde(default)]
    pub group_id: Option<String>,
    pub created_at: String,
    #[serde(default)]
    pub resolved_at: Option<String>,
}

impl From<&WasteReport> for ReportRow {
    fn from(report: &WasteReport) -> Self {
        Self {
            id: report.id.clone(),
            user_id: report.user_id.clone(),
            waste_type: report.waste_type,
            location_address: report.location.address.clone(),
            location_coordinates: format_point(report.location.coordinates),
            description: report.description.clone(),
            urgency: report.urgency,
            status: report.status,
            images: report.images.clone(),
            credits: report.credits,
            classification: report.classification.clone(),
            group_id: report.group_id.clone(),
            created_at: format_utc_rfc3339(report.created_at),
            resolved_at: report.resolved_at.map(format_utc_rfc3339),
        }
    }
}

impl TryFrom<ReportRow> for WasteReport {
    type Error = AppError;

    fn try_from(row: ReportRow) -> Result<Self, Self::Error> {
        let created_at = parse_rfc3339(&row.created_at).ok_or_else(|| {
            AppError::Database(format!(
                "Invalid created_at on report {}: {}",
                row.id, row.created_at
            ))
        })?;
        let resolved_at: Option<DateTime<Utc>> = row.resolved_at.as_deref().and_then(|raw| {
            let parsed = parse_rfc3339(raw);
            if parsed.is_none() {
                tracing::warn!(report_id = %row.id, raw, "Ignoring malformed resolved_at");
            }
            parsed
        });

        let coordinates = parse_point_or_default(&row.location_coordinates);

        Ok(WasteReport {
            id: row.id,
            waste_type: row.waste_type,
            location: Location {
                address: row.location_address,
                coordinates,
            },
            description: row.description,
            urgency: row.urgency,
            status: row.status,
            images: row.images,
            credits: row.credits,
            user_id: row.user_id,
            created_at,
            resolved_at,
            classification: row.classification,
            group_id: row.group_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_point_format() {
        assert_eq!(
            format_point(Coordinates::new(-1.2921, 36.8219)),
            "(-1.2921,36.8219)"
        );
    }

    #[test]
    fn test_point_roundtrip_precision() {
        let c = Coordinates::new(-1.292_123_456, 36.821_987_654);
        let parsed = parse_point(&format_point(c)).unwrap();
        assert!((parsed.lat - c.lat).abs() < 1e-6);
        assert!((parsed.lng - c.lng).abs() < 1e-6);
    }

    #[test]
    fn test_point_accepts_whitespace() {
        let parsed = parse_point(" ( -1.3 , 36.8 ) ").unwrap();
        assert_eq!(parsed, Coordinates::new(-1.3, 36.8));
    }

    #[test]
    fn test_malformed_point_falls_back() {
        for raw in ["", "garbage", "(1.0)", "(abc,def)", "(95.0,36.0)", "1.0,2.0"] {
            assert!(parse_point(raw).is_none(), "{raw:?} should not parse");
            assert_eq!(parse_point_or_default(raw), Coordinates::DEFAULT);
        }
    }

    fn sample_row() -> ReportRow {
        ReportRow {
            id: "r1".to_string(),
            user_id: "user_1".to_string(),
            waste_type: WasteType::Electronic,
            location_address: "Argwings Kodhek Rd".to_string(),
            location_coordinates: "(-1.2950,36.7900)".to_string(),
            description: "Old monitors".to_string(),
            urgency: Urgency::Medium,
            status: ReportStatus::Resolved,
            images: vec![],
            credits: 22,
            classification: None,
            group_id: None,
            created_at: "2026-03-01T08:00:00.000Z".to_string(),
            resolved_at: Some("2026-03-02T09:30:00.000Z".to_string()),
        }
    }

    #[test]
    fn test_report_row_to_model() {
        let report = WasteReport::try_from(sample_row()).unwrap();
        assert_eq!(report.location.coordinates, Coordinates::new(-1.295, 36.79));
        assert_eq!(
            report.created_at,
            Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap()
        );
        assert_eq!(
            report.resolved_at,
            Some(Utc.with_ymd_and_hms(2026, 3, 2, 9, 30, 0).unwrap())
        );
        assert_eq!(report.credits, 22);
    }

    #[test]
    fn test_report_row_bad_coordinates_uses_default() {
        let mut row = sample_row();
        row.location_coordinates = "somewhere".to_string();
        let report = WasteReport::try_from(row).unwrap();
        assert_eq!(report.location.coordinates, Coordinates::DEFAULT);
    }

    #[test]
    fn test_report_row_bad_created_at_is_error() {
        let mut row = sample_row();
        row.created_at = "yesterday".to_string();
        assert!(WasteReport::try_from(row).is_err());
    }

    #[test]
    fn test_report_row_serializes_type_field() {
        let row = ReportRow::from(&WasteReport::try_from(sample_row()).unwrap());
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["type"], "electronic");
        assert_eq!(json["location_coordinates"], "(-1.295,36.79)");
    }

    #[test]
    fn test_profile_row_defaults() {
        let row: UserProfileRow = serde_json::from_value(serde_json::json!({
            "auth_user_id": "user_9",
            "created_at": "2026-01-01T00:00:00.000Z"
        }))
        .unwrap();
        let user = User::try_from(row).unwrap();
        assert_eq!(user.credits, 0);
        assert_eq!(user.recycling_score, 50);
        assert!(user.preferences.email_notifications);
        assert_eq!(user.revision, 0);
    }
}
