// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Achievement catalogue types.

use serde::Serialize;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum AchievementCategory {
    Reporting,
    Recycling,
    Community,
    Impact,
}

/// Which user counter an achievement tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    ReportsCount,
    VerifiedReports,
    TotalEarned,
    RecyclingScore,
}

/// A static achievement definition. `id` doubles as the badge identifier.
#[derive(Debug, Clone, Copy)]
pub struct Achievement {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub category: AchievementCategory,
    pub metric: Metric,
    pub requirement: u32,
}

/// An achievement evaluated against a user.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AchievementProgress {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: AchievementCategory,
    pub progress: u32,
    pub requirement: u32,
    pub completed: bool,
}

impl AchievementProgress {
    /// 0 - 100
    pub fn percent(&self) -> u32 {
        if self.requirement == 0 {
            return 100;
        }
        (self.progress.min(self.requirement) * 100) / self.requirement
    }
}
