// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! State container actions.
//!
//! Each action inspects a session snapshot and returns the [`Effect`] to run
//! against the store client. The executor runs the effect and hands the
//! [`Outcome`] to [`fold`], which updates the session. Nothing here performs
//! I/O.

use chrono::{DateTime, Utc};

use crate::db::firestore::{SubmitCommit, TransitionCommit};
use crate::models::{
    MapFilters, MapFiltersPatch, ProfilePatch, RedemptionMethod, RedemptionReceipt, ReportDraft,
    ReportPatch, ReportStatus, User, WasteReport,
};
use crate::services::{achievements, lifecycle};
use crate::store::session::Session;

/// Reasons an action refuses to produce an effect.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionError {
    #[error("user profile is not loaded")]
    NotLoaded,

    #[error("redemption amount must be positive, got {0}")]
    InvalidAmount(i64),

    #[error(transparent)]
    InvalidTransition(#[from] lifecycle::InvalidTransition),

    #[error("invalid input: {0}")]
    Invalid(String),
}

/// Side effect an action asks the executor to run.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    LoadProfile {
        user_id: String,
        name: String,
        email: String,
    },
    LoadReports {
        user_id: String,
        limit: u32,
    },
    SubmitReport {
        report: WasteReport,
    },
    TransitionReport {
        report_id: String,
        to: ReportStatus,
        actor_id: String,
    },
    Redeem {
        user_id: String,
        amount: u32,
        method: RedemptionMethod,
    },
    UpdateProfile {
        user_id: String,
        patch: ProfilePatch,
    },
    ConnectEmail {
        user_id: String,
        email: String,
    },
    AwardBadges {
        user_id: String,
        badges: Vec<String>,
    },
}

/// Committed result of an effect.
#[derive(Debug, Clone)]
pub enum Outcome {
    Profile(User),
    Reports(Vec<WasteReport>),
    Submitted(SubmitCommit),
    Transitioned(TransitionCommit),
    Redeemed(User, RedemptionReceipt),
}

/// Most recent reports cached per session.
pub const SESSION_REPORT_LIMIT: u32 = 100;

fn loaded_user(session: &Session) -> Result<&User, ActionError> {
    session.user.as_ref().ok_or(ActionError::NotLoaded)
}

pub fn load_user_profile(user_id: &str, name: Option<&str>, email: Option<&str>) -> Effect {
    Effect::LoadProfile {
        user_id: user_id.to_string(),
        name: name.unwrap_or_default().to_string(),
        email: email.unwrap_or_default().to_string(),
    }
}

pub fn load_reports(session: &Session) -> Result<Effect, ActionError> {
    let user = loaded_user(session)?;
    Ok(Effect::LoadReports {
        user_id: user.id.clone(),
        limit: SESSION_REPORT_LIMIT,
    })
}

/// Plan a submission: the new report with its reward computed.
pub fn add_report(
    session: &Session,
    report_id: String,
    draft: ReportDraft,
    now: DateTime<Utc>,
) -> Result<Effect, ActionError> {
    let user = loaded_user(session)?;
    let coords = draft.location.coordinates;
    if !(-90.0..=90.0).contains(&coords.lat) || !(-180.0..=180.0).contains(&coords.lng) {
        return Err(ActionError::Invalid(format!(
            "coordinates out of range: ({}, {})",
            coords.lat, coords.lng
        )));
    }
    let report = lifecycle::new_report(report_id, &user.id, draft, now);
    Ok(Effect::SubmitReport { report })
}

/// Plan a status change. A cached copy of the report lets obviously invalid
/// transitions fail without a round trip; the store re-checks either way.
pub fn update_report(
    session: &Session,
    report_id: &str,
    patch: ReportPatch,
) -> Result<Effect, ActionError> {
    let user = loaded_user(session)?;
    if let Some(cached) = session.find_report(report_id) {
        lifecycle::check_transition(cached.status, patch.status)?;
    }
    Ok(Effect::TransitionReport {
        report_id: report_id.to_string(),
        to: patch.status,
        actor_id: user.id.clone(),
    })
}

pub fn redeem_credits(
    session: &Session,
    amount: i64,
    method: RedemptionMethod,
) -> Result<Effect, ActionError> {
    let user = loaded_user(session)?;
    if amount <= 0 {
        return Err(ActionError::InvalidAmount(amount));
    }
    // The balance is checked inside the store transaction; the cached
    // one may be behind writes from other instances.
    Ok(Effect::Redeem {
        user_id: user.id.clone(),
        amount: u32::try_from(amount).unwrap_or(u32::MAX),
        method,
    })
}

pub fn update_user_profile(session: &Session, patch: ProfilePatch) -> Result<Effect, ActionError> {
    let user = loaded_user(session)?;
    Ok(Effect::UpdateProfile {
        user_id: user.id.clone(),
        patch,
    })
}

pub fn connect_email(session: &Session, email: &str, provider: &str) -> Result<Effect, ActionError> {
    let user = loaded_user(session)?;
    let email = email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(ActionError::Invalid(format!("not an email address: {email}")));
    }
    tracing::debug!(user_id = %user.id, provider, "Connecting email");
    Ok(Effect::ConnectEmail {
        user_id: user.id.clone(),
        email: email.to_string(),
    })
}

/// Purely local: filters never leave the session.
pub fn set_map_filters(session: &mut Session, patch: &MapFiltersPatch) -> MapFilters {
    session.map_filters.merge(patch);
    session.map_filters
}

/// Badges the cached counters qualify for but the profile lacks.
pub fn check_achievements(session: &Session) -> Result<Option<Effect>, ActionError> {
    let user = loaded_user(session)?;
    let mut candidate = user.clone();
    let badges = achievements::award_new_badges(&mut candidate);
    if badges.is_empty() {
        return Ok(None);
    }
    Ok(Some(Effect::AwardBadges {
        user_id: user.id.clone(),
        badges,
    }))
}

/// Fold a committed outcome into the session.
pub fn fold(session: &mut Session, outcome: &Outcome) {
    match outcome {
        Outcome::Profile(user) => {
            session.apply_user(user.clone());
        }
        Outcome::Reports(reports) => {
            session.reports = reports.clone();
        }
        Outcome::Submitted(commit) => {
            session.upsert_report(commit.report.clone());
            session.apply_user(commit.user.clone());
        }
        Outcome::Transitioned(commit) => {
            session.replace_report(&commit.report);
            if let Some(owner) = &commit.owner {
                if session.user.as_ref().is_some_and(|u| u.id == owner.id) {
                    session.apply_user(owner.clone());
                }
            }
        }
        Outcome::Redeemed(user, _) => {
            session.apply_user(user.clone());
        }
    }
}
