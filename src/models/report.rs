// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Waste report model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Waste category assigned by the reporter or the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum WasteType {
    Plastic,
    Organic,
    Electronic,
    Hazardous,
    Construction,
    Other,
}

impl WasteType {
    pub const ALL: [WasteType; 6] = [
        WasteType::Plastic,
        WasteType::Organic,
        WasteType::Electronic,
        WasteType::Hazardous,
        WasteType::Construction,
        WasteType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WasteType::Plastic => "plastic",
            WasteType::Organic => "organic",
            WasteType::Electronic => "electronic",
            WasteType::Hazardous => "hazardous",
            WasteType::Construction => "construction",
            WasteType::Other => "other",
        }
    }
}

/// Three-level priority tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum Urgency {
    Low,
    Medium,
    High,
}

impl Urgency {
    /// Expected response window quoted back to reporters.
    pub fn response_window(&self) -> &'static str {
        match self {
            Urgency::High => "24 hours",
            Urgency::Medium => "3 days",
            Urgency::Low => "1 week",
        }
    }
}

/// Report status. Declaration order is the lifecycle order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum ReportStatus {
    Pending,
    InProgress,
    Resolved,
    Verified,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Pending => "pending",
            ReportStatus::InProgress => "in-progress",
            ReportStatus::Resolved => "resolved",
            ReportStatus::Verified => "verified",
        }
    }
}

/// Latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    /// Kilimani, Nairobi. Used when stored coordinates cannot be parsed.
    pub const DEFAULT: Coordinates = Coordinates {
        lat: -1.2921,
        lng: 36.8219,
    };

    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Location {
    pub address: String,
    pub coordinates: Coordinates,
}

/// Classification payload attached to a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ReportClassification {
    pub waste_type: WasteType,
    /// 0.0 - 1.0
    pub confidence: f64,
    /// Kilograms
    pub estimated_weight: f64,
    pub disposal_method: String,
}

/// A geotagged waste report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct WasteReport {
    pub id: String,
    #[serde(rename = "type")]
    pub waste_type: WasteType,
    pub location: Location,
    pub description: String,
    pub urgency: Urgency,
    pub status: ReportStatus,
    pub images: Vec<String>,
    /// Reward fixed at creation time
    pub credits: u32,
    pub user_id: String,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub created_at: DateTime<Utc>,
    #[cfg_attr(feature = "binding-generation", ts(type = "string | null"))]
    pub resolved_at: Option<DateTime<Utc>>,
    pub classification: Option<ReportClassification>,
    /// Community group the report arrived through, if any
    pub group_id: Option<String>,
}

/// What a reporter submits. Identity, status, credits and timestamps are
/// assigned by the lifecycle controller.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportDraft {
    pub waste_type: WasteType,
    pub location: Location,
    pub description: String,
    pub urgency: Urgency,
    pub images: Vec<String>,
    pub classification: Option<ReportClassification>,
    pub group_id: Option<String>,
}

/// The only mutation a report accepts after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportPatch {
    pub status: ReportStatus,
}
