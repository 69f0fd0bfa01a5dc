// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Community group, challenge and event models for the messaging console.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::models::Coordinates;

/// Default weekly credit target for a new group.
pub const DEFAULT_WEEKLY_TARGET: u32 = 100;

/// Message language for a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum Language {
    #[default]
    En,
    Sw,
    /// English/Swahili code-switching
    Mixed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct GroupLocation {
    pub area: String,
    pub coordinates: Coordinates,
}

/// A messaging-based community group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CommunityGroup {
    pub id: String,
    pub name: String,
    /// Messaging chat the group's announcements go to
    pub chat_id: String,
    /// Platform user who registered the group; reports arriving through the
    /// group are credited to this user.
    pub admin_user_id: String,
    pub admin_phone: String,
    pub admin_name: String,
    pub member_count: u32,
    pub total_credits: u32,
    pub weekly_target: u32,
    pub language: Language,
    pub location: GroupLocation,
    pub is_active: bool,
    pub joined_at: String,
    pub last_activity: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CommunityChallenge {
    pub id: String,
    pub group_id: String,
    pub title: String,
    pub description: String,
    pub target: u32,
    /// e.g. "kg", "reports"
    pub unit: String,
    pub start_date: String,
    pub end_date: String,
    pub progress: u32,
    pub reward_credits: u32,
    pub badges: Vec<String>,
    pub is_active: bool,
}

impl CommunityChallenge {
    /// Whether a report committed at `at` (RFC3339) counts toward the challenge.
    pub fn is_open_at(&self, at: &str) -> bool {
        self.is_active && self.start_date.as_str() <= at && at <= self.end_date.as_str()
    }

    /// Units one report adds: its credits for credit-counting challenges,
    /// otherwise one per report.
    pub fn contribution(&self, credits: u32) -> u32 {
        match self.unit.to_lowercase().as_str() {
            "credits" | "points" | "pointi" => credits,
            _ => 1,
        }
    }

    pub fn record_report(&mut self, credits: u32) {
        self.progress = self.progress.saturating_add(self.contribution(credits));
    }

    /// Progress as a rounded percentage of the target.
    pub fn percent(&self) -> u32 {
        if self.target == 0 {
            return 100;
        }
        let pct = (u64::from(self.progress) * 100 + u64::from(self.target) / 2)
            / u64::from(self.target);
        pct.min(u64::from(u32::MAX)) as u32
    }

    pub fn is_complete(&self) -> bool {
        self.progress >= self.target
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum RsvpStatus {
    Yes,
    No,
    Maybe,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Rsvp {
    pub phone: String,
    pub name: String,
    pub status: RsvpStatus,
    pub timestamp: String,
}

/// A cleanup event coordinated through a group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CommunityEvent {
    pub id: String,
    pub group_id: String,
    pub title: String,
    pub description: String,
    pub date: String,
    pub location: String,
    pub organizer: String,
    pub max_participants: Option<u32>,
    pub rsvps: Vec<Rsvp>,
    #[serde(default)]
    pub reminders_sent: u32,
}

impl CommunityEvent {
    /// Record a reply, replacing any earlier one from the same phone.
    ///
    /// Returns `false` when a "yes" would exceed `max_participants`.
    pub fn record_rsvp(&mut self, rsvp: Rsvp) -> bool {
        if rsvp.status == RsvpStatus::Yes {
            if let Some(max) = self.max_participants {
                let others = self
                    .rsvps
                    .iter()
                    .filter(|r| r.status == RsvpStatus::Yes && r.phone != rsvp.phone)
                    .count() as u32;
                if others >= max {
                    return false;
                }
            }
        }
        self.rsvps.retain(|r| r.phone != rsvp.phone);
        self.rsvps.push(rsvp);
        true
    }

    pub fn attending(&self) -> u32 {
        self.rsvps
            .iter()
            .filter(|r| r.status == RsvpStatus::Yes)
            .count() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(max: Option<u32>) -> CommunityEvent {
        CommunityEvent {
            id: "e1".to_string(),
            group_id: "g1".to_string(),
            title: "Cleanup".to_string(),
            description: String::new(),
            date: "2026-11-01T08:00:00Z".to_string(),
            location: "Yaya Centre".to_string(),
            organizer: "g1".to_string(),
            max_participants: max,
            rsvps: vec![],
            reminders_sent: 0,
        }
    }

    fn rsvp(phone: &str, status: RsvpStatus) -> Rsvp {
        Rsvp {
            phone: phone.to_string(),
            name: String::new(),
            status,
            timestamp: "2026-10-14T10:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_rsvp_replaces_previous_reply() {
        let mut e = event(None);
        assert!(e.record_rsvp(rsvp("+254700000001", RsvpStatus::Maybe)));
        assert!(e.record_rsvp(rsvp("+254700000001", RsvpStatus::Yes)));
        assert_eq!(e.rsvps.len(), 1);
        assert_eq!(e.attending(), 1);
    }

    #[test]
    fn test_rsvp_respects_capacity() {
        let mut e = event(Some(1));
        assert!(e.record_rsvp(rsvp("+254700000001", RsvpStatus::Yes)));
        assert!(!e.record_rsvp(rsvp("+254700000002", RsvpStatus::Yes)));
        assert!(e.record_rsvp(rsvp("+254700000002", RsvpStatus::No)));
        assert_eq!(e.attending(), 1);
    }

    fn challenge(unit: &str, target: u32) -> CommunityChallenge {
        CommunityChallenge {
            id: "c1".to_string(),
            group_id: "g1".to_string(),
            title: "Clean Kilimani".to_string(),
            description: String::new(),
            target,
            unit: unit.to_string(),
            start_date: "2026-10-10T00:00:00.000Z".to_string(),
            end_date: "2026-10-17T00:00:00.000Z".to_string(),
            progress: 0,
            reward_credits: 5,
            badges: vec![],
            is_active: true,
        }
    }

    #[test]
    fn test_challenge_counts_reports_or_credits() {
        let mut reports = challenge("reports", 3);
        reports.record_report(35);
        reports.record_report(10);
        assert_eq!(reports.progress, 2);
        assert_eq!(reports.percent(), 67);
        assert!(!reports.is_complete());
        reports.record_report(10);
        assert!(reports.is_complete());

        let mut credits = challenge("Credits", 100);
        credits.record_report(35);
        assert_eq!(credits.progress, 35);
        assert_eq!(credits.percent(), 35);
    }

    #[test]
    fn test_challenge_window() {
        let mut c = challenge("reports", 10);
        assert!(c.is_open_at("2026-10-14T10:00:00.000Z"));
        assert!(!c.is_open_at("2026-10-18T10:00:00.000Z"));
        assert!(!c.is_open_at("2026-10-09T10:00:00.000Z"));
        c.is_active = false;
        assert!(!c.is_open_at("2026-10-14T10:00:00.000Z"));
    }

    #[test]
    fn test_language_wire_format() {
        assert_eq!(serde_json::to_string(&Language::Sw).unwrap(), "\"sw\"");
        assert_eq!(Language::default(), Language::En);
    }
}
