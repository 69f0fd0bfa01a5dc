// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Report lifecycle rules: status transitions and credit accrual.
//!
//! Everything here is pure so the same rules run inside Firestore
//! transactions and in the session state container.

use chrono::{DateTime, Utc};

use crate::models::{ReportDraft, ReportStatus, Urgency, User, WasteReport, WasteType};
use crate::services::achievements;

/// Credits every report earns.
pub const BASE_CREDITS: u32 = 10;
pub const HIGH_URGENCY_BONUS: u32 = 10;
pub const HAZARDOUS_BONUS: u32 = 15;
pub const ELECTRONIC_BONUS: u32 = 12;

/// Reward for a new report. Computed once at creation and frozen.
pub fn credits_for(waste_type: WasteType, urgency: Urgency) -> u32 {
    let mut credits = BASE_CREDITS;
    if urgency == Urgency::High {
        credits += HIGH_URGENCY_BONUS;
    }
    match waste_type {
        WasteType::Hazardous => credits += HAZARDOUS_BONUS,
        WasteType::Electronic => credits += ELECTRONIC_BONUS,
        _ => {}
    }
    credits
}

/// Rejected status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cannot move report from {} to {}", .from.as_str(), .to.as_str())]
pub struct InvalidTransition {
    pub from: ReportStatus,
    pub to: ReportStatus,
}

/// Check a status change.
///
/// Transitions only move forward. `in-progress` may be skipped, but
/// `verified` is only reachable from `resolved` so a verified report always
/// carries `resolved_at`.
pub fn check_transition(from: ReportStatus, to: ReportStatus) -> Result<(), InvalidTransition> {
    let allowed = matches!(
        (from, to),
        (
            ReportStatus::Pending,
            ReportStatus::InProgress | ReportStatus::Resolved
        ) | (ReportStatus::InProgress, ReportStatus::Resolved)
            | (ReportStatus::Resolved, ReportStatus::Verified)
    );
    if allowed {
        Ok(())
    } else {
        Err(InvalidTransition { from, to })
    }
}

/// Build a new report from a draft. Status is forced to `pending`.
pub fn new_report(
    id: String,
    user_id: &str,
    draft: ReportDraft,
    now: DateTime<Utc>,
) -> WasteReport {
    WasteReport {
        id,
        waste_type: draft.waste_type,
        credits: credits_for(draft.waste_type, draft.urgency),
        location: draft.location,
        description: draft.description,
        urgency: draft.urgency,
        status: ReportStatus::Pending,
        images: draft.images,
        user_id: user_id.to_string(),
        created_at: now,
        resolved_at: None,
        classification: draft.classification,
        group_id: draft.group_id,
    }
}

/// Side effects of a submission on the owner's profile.
///
/// Returns the badges newly earned by this submission.
pub fn apply_submission(user: &mut User, report: &WasteReport) -> Vec<String> {
    user.credits = user.credits.saturating_add(report.credits);
    user.total_earned = user.total_earned.saturating_add(report.credits);
    user.reports_count = user.reports_count.saturating_add(1);
    user.revision += 1;
    achievements::award_new_badges(user)
}

/// Outcome of applying a transition to a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionOutcome {
    /// The owner's `verified_reports` must be incremented.
    pub credit_owner: bool,
}

/// Apply a validated status change to `report`.
///
/// Entering `resolved` stamps `resolved_at`; when the owner initiated it the
/// owner's verified-report count is due an increment.
pub fn apply_transition(
    report: &mut WasteReport,
    to: ReportStatus,
    actor_id: &str,
    now: DateTime<Utc>,
) -> Result<TransitionOutcome, InvalidTransition> {
    check_transition(report.status, to)?;
    report.status = to;
    let mut credit_owner = false;
    if to == ReportStatus::Resolved {
        // Never earlier than creation even with clock skew between writers
        report.resolved_at = Some(now.max(report.created_at));
        credit_owner = report.user_id == actor_id;
    }
    Ok(TransitionOutcome { credit_owner })
}

/// Profile side effect of a transition the owner initiated into `resolved`.
pub fn apply_verified(user: &mut User) -> Vec<String> {
    user.verified_reports = user.verified_reports.saturating_add(1);
    user.revision += 1;
    achievements::award_new_badges(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Coordinates, Location};

    fn draft(waste_type: WasteType, urgency: Urgency) -> ReportDraft {
        ReportDraft {
            waste_type,
            location: Location {
                address: "Wood Avenue, Kilimani".to_string(),
                coordinates: Coordinates::new(-1.2930, 36.8225),
            },
            description: "Dumped waste".to_string(),
            urgency,
            images: vec!["https://img.example.com/1.jpg".to_string()],
            classification: None,
            group_id: None,
        }
    }

    #[test]
    fn test_credit_rule_every_combination() {
        for waste_type in WasteType::ALL {
            for urgency in [Urgency::Low, Urgency::Medium, Urgency::High] {
                let expected = 10
                    + if urgency == Urgency::High { 10 } else { 0 }
                    + if waste_type == WasteType::Hazardous { 15 } else { 0 }
                    + if waste_type == WasteType::Electronic { 12 } else { 0 };
                assert_eq!(credits_for(waste_type, urgency), expected);
            }
        }
    }

    #[test]
    fn test_hazardous_high_submission_awards_35() {
        let now = Utc::now();
        let mut user = User::new("user_1", "Jane", "jane@example.com", now);
        user.credits = 5;
        user.total_earned = 40;

        let report = new_report(
            "r1".to_string(),
            "user_1",
            draft(WasteType::Hazardous, Urgency::High),
            now,
        );
        assert_eq!(report.credits, 35);
        assert_eq!(report.status, ReportStatus::Pending);

        apply_submission(&mut user, &report);
        assert_eq!(user.credits, 40);
        assert_eq!(user.total_earned, 75);
        assert_eq!(user.reports_count, 1);
        assert_eq!(user.revision, 1);
    }

    #[test]
    fn test_first_submission_earns_badge() {
        let now = Utc::now();
        let mut user = User::new("user_1", "", "", now);
        let report = new_report("r1".into(), "user_1", draft(WasteType::Other, Urgency::Low), now);
        let badges = apply_submission(&mut user, &report);
        assert_eq!(badges, vec!["first_report".to_string()]);
        assert_eq!(user.badges, vec!["first_report".to_string()]);
    }

    #[test]
    fn test_transitions_are_forward_only() {
        use ReportStatus::*;
        let all = [Pending, InProgress, Resolved, Verified];
        for from in all {
            for to in all {
                let result = check_transition(from, to);
                if to <= from {
                    assert!(result.is_err(), "{:?} -> {:?} should be rejected", from, to);
                }
            }
        }
        assert!(check_transition(Pending, Resolved).is_ok());
        assert!(check_transition(Pending, Verified).is_err());
        assert!(check_transition(InProgress, Verified).is_err());
        assert!(check_transition(Resolved, Verified).is_ok());
    }

    #[test]
    fn test_resolve_stamps_time_and_credits_owner() {
        let created = Utc::now();
        let mut report = new_report(
            "r1".into(),
            "owner",
            draft(WasteType::Plastic, Urgency::Medium),
            created,
        );
        let later = created + chrono::Duration::minutes(5);

        let outcome = apply_transition(&mut report, ReportStatus::Resolved, "owner", later).unwrap();
        assert!(outcome.credit_owner);
        assert_eq!(report.resolved_at, Some(later));
        assert!(report.resolved_at.unwrap() >= report.created_at);
        assert_eq!(report.credits, 10, "reward stays frozen");
    }

    #[test]
    fn test_resolve_by_other_user_does_not_credit_owner() {
        let now = Utc::now();
        let mut report = new_report("r1".into(), "owner", draft(WasteType::Plastic, Urgency::Low), now);
        let outcome = apply_transition(&mut report, ReportStatus::InProgress, "crew", now).unwrap();
        assert!(!outcome.credit_owner);
        assert!(report.resolved_at.is_none());

        let outcome = apply_transition(&mut report, ReportStatus::Resolved, "crew", now).unwrap();
        assert!(!outcome.credit_owner);
        assert!(report.resolved_at.is_some());
    }

    #[test]
    fn test_verify_keeps_resolved_at() {
        let now = Utc::now();
        let mut report = new_report("r1".into(), "owner", draft(WasteType::Organic, Urgency::Low), now);
        apply_transition(&mut report, ReportStatus::Resolved, "owner", now).unwrap();
        let resolved_at = report.resolved_at;
        apply_transition(&mut report, ReportStatus::Verified, "owner", now).unwrap();
        assert_eq!(report.resolved_at, resolved_at);
        assert_eq!(report.status, ReportStatus::Verified);
    }

    #[test]
    fn test_rejected_transition_leaves_report_untouched() {
        let now = Utc::now();
        let mut report = new_report("r1".into(), "owner", draft(WasteType::Organic, Urgency::Low), now);
        apply_transition(&mut report, ReportStatus::Resolved, "owner", now).unwrap();
        let before = report.clone();
        let err = apply_transition(&mut report, ReportStatus::Pending, "owner", now).unwrap_err();
        assert_eq!(err.from, ReportStatus::Resolved);
        assert_eq!(report, before);
    }

    #[test]
    fn test_apply_verified_increments() {
        let mut user = User::new("owner", "", "", Utc::now());
        apply_verified(&mut user);
        assert_eq!(user.verified_reports, 1);
        assert_eq!(user.revision, 1);
    }
}
