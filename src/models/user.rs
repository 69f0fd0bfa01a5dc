//! User profile model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Default recycling score for new profiles.
pub const DEFAULT_RECYCLING_SCORE: u8 = 50;

/// Notification preference flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct NotificationPreferences {
    pub email_notifications: bool,
    pub sms_notifications: bool,
    pub push_notifications: bool,
    pub automation_enabled: bool,
    pub real_time_updates: bool,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            email_notifications: true,
            sms_notifications: false,
            push_notifications: true,
            automation_enabled: true,
            real_time_updates: true,
        }
    }
}

/// A resident's profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct User {
    /// Opaque ID issued by the identity provider (also the document ID)
    pub id: String,
    pub name: String,
    pub email: String,
    /// Current redeemable balance
    pub credits: u32,
    /// Lifetime credits earned; redemption never decreases this
    pub total_earned: u32,
    pub reports_count: u32,
    pub verified_reports: u32,
    /// 0 - 100
    pub recycling_score: u8,
    /// Ordered, no duplicates
    pub badges: Vec<String>,
    pub email_connected: bool,
    pub preferences: NotificationPreferences,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub joined_at: DateTime<Utc>,
    /// Bumped on every committed write
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub revision: u64,
}

impl User {
    /// A freshly registered profile with zeroed counters.
    pub fn new(id: &str, name: &str, email: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            email: email.to_string(),
            credits: 0,
            total_earned: 0,
            reports_count: 0,
            verified_reports: 0,
            recycling_score: DEFAULT_RECYCLING_SCORE,
            badges: Vec::new(),
            email_connected: false,
            preferences: NotificationPreferences::default(),
            joined_at: now,
            revision: 0,
        }
    }

    /// Append a badge unless already held.
    pub fn award_badge(&mut self, badge: &str) -> bool {
        if self.badges.iter().any(|b| b == badge) {
            return false;
        }
        self.badges.push(badge.to_string());
        true
    }
}

/// Editable profile fields.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ProfilePatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub preferences: Option<NotificationPreferences>,
}

impl ProfilePatch {
    pub fn apply(&self, user: &mut User) {
        if let Some(name) = &self.name {
            user.name = name.clone();
        }
        if let Some(email) = &self.email {
            user.email = email.clone();
        }
        if let Some(preferences) = self.preferences {
            user.preferences = preferences;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_user_defaults() {
        let user = User::new("user_1", "Jane", "jane@example.com", Utc::now());
        assert_eq!(user.credits, 0);
        assert_eq!(user.total_earned, 0);
        assert_eq!(user.recycling_score, 50);
        assert!(user.badges.is_empty());
        assert!(user.preferences.email_notifications);
        assert!(!user.preferences.sms_notifications);
    }

    #[test]
    fn test_award_badge_is_idempotent() {
        let mut user = User::new("user_1", "", "", Utc::now());
        assert!(user.award_badge("first_report"));
        assert!(!user.award_badge("first_report"));
        assert!(user.award_badge("carbon_saver"));
        assert_eq!(user.badges, vec!["first_report", "carbon_saver"]);
    }

    #[test]
    fn test_profile_patch_only_touches_given_fields() {
        let mut user = User::new("user_1", "Jane", "jane@example.com", Utc::now());
        let patch = ProfilePatch {
            name: Some("Jane Doe".to_string()),
            ..Default::default()
        };
        patch.apply(&mut user);
        assert_eq!(user.name, "Jane Doe");
        assert_eq!(user.email, "jane@example.com");
    }
}
