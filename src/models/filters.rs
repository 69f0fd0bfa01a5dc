//! Map filter flags kept per session.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::models::{ReportStatus, WasteReport, WasteType};

/// Which layers and report categories the map shows. All on by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct MapFilters {
    pub plastic: bool,
    pub organic: bool,
    pub electronic: bool,
    pub hazardous: bool,
    pub construction: bool,
    pub other: bool,
    pub pending: bool,
    pub in_progress: bool,
    pub resolved: bool,
    pub verified: bool,
    pub hotspots: bool,
    pub pickups: bool,
}

impl Default for MapFilters {
    fn default() -> Self {
        Self {
            plastic: true,
            organic: true,
            electronic: true,
            hazardous: true,
            construction: true,
            other: true,
            pending: true,
            in_progress: true,
            resolved: true,
            verified: true,
            hotspots: true,
            pickups: true,
        }
    }
}

impl MapFilters {
    pub fn shows_type(&self, waste_type: WasteType) -> bool {
        match waste_type {
            WasteType::Plastic => self.plastic,
            WasteType::Organic => self.organic,
            WasteType::Electronic => self.electronic,
            WasteType::Hazardous => self.hazardous,
            WasteType::Construction => self.construction,
            WasteType::Other => self.other,
        }
    }

    pub fn shows_status(&self, status: ReportStatus) -> bool {
        match status {
            ReportStatus::Pending => self.pending,
            ReportStatus::InProgress => self.in_progress,
            ReportStatus::Resolved => self.resolved,
            ReportStatus::Verified => self.verified,
        }
    }

    pub fn admits(&self, report: &WasteReport) -> bool {
        self.shows_type(report.waste_type) && self.shows_status(report.status)
    }

    /// Merge a partial update.
    pub fn merge(&mut self, patch: &MapFiltersPatch) {
        macro_rules! merge_fields {
            ($($field:ident),*) => {
                $(if let Some(v) = patch.$field { self.$field = v; })*
            };
        }
        merge_fields!(
            plastic,
            organic,
            electronic,
            hazardous,
            construction,
            other,
            pending,
            in_progress,
            resolved,
            verified,
            hotspots,
            pickups
        );
    }
}

/// Partial filter update; absent fields stay unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct MapFiltersPatch {
    pub plastic: Option<bool>,
    pub organic: Option<bool>,
    pub electronic: Option<bool>,
    pub hazardous: Option<bool>,
    pub construction: Option<bool>,
    pub other: Option<bool>,
    pub pending: Option<bool>,
    pub in_progress: Option<bool>,
    pub resolved: Option<bool>,
    pub verified: Option<bool>,
    pub hotspots: Option<bool>,
    pub pickups: Option<bool>,
}
