// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application state container.
//!
//! Handlers go through [`StateContainer`] for everything touching the
//! current user or their reports. It plans with the pure functions in
//! [`actions`], executes the resulting effect against the store client and
//! folds the committed result back into the caller's [`Session`].
//!
//! Cached profiles are served for at most the profile TTL. Writes made by
//! other instances reach this one only through that re-read, so balance
//! checks are left to the store transaction.

pub mod actions;
pub mod session;

pub use actions::{ActionError, Effect, Outcome};
pub use session::{Session, SessionStore};

use std::time::Duration;

use crate::db::changes::Change;
use crate::db::firestore::{ReportQuery, SubmitCommit};
use crate::db::FirestoreDb;
use crate::error::AppError;
use crate::models::{
    AchievementProgress, CreditEntry, MapFilters, MapFiltersPatch, ProfilePatch,
    RedemptionMethod, RedemptionReceipt, ReportDraft, ReportPatch, User, WasteReport,
};
use crate::services::achievements;
use crate::time_utils;

impl From<ActionError> for AppError {
    fn from(err: ActionError) -> Self {
        match err {
            ActionError::NotLoaded => AppError::Unauthorized,
            ActionError::InvalidAmount(_) | ActionError::Invalid(_) => {
                AppError::BadRequest(err.to_string())
            }
            ActionError::InvalidTransition(e) => AppError::InvalidTransition(e),
        }
    }
}

pub const DEFAULT_PROFILE_TTL: Duration = Duration::from_secs(30);

pub struct StateContainer {
    db: FirestoreDb,
    sessions: SessionStore,
    profile_ttl: Duration,
}

impl StateContainer {
    pub fn new(db: FirestoreDb) -> Self {
        Self::with_profile_ttl(db, DEFAULT_PROFILE_TTL)
    }

    pub fn with_profile_ttl(db: FirestoreDb, profile_ttl: Duration) -> Self {
        Self {
            db,
            sessions: SessionStore::new(),
            profile_ttl,
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    async fn execute(&self, effect: Effect) -> Result<Outcome, AppError> {
        let outcome = match effect {
            Effect::LoadProfile {
                user_id,
                name,
                email,
            } => Outcome::Profile(
                self.db
                    .get_or_create_user_profile(&user_id, &name, &email, time_utils::now())
                    .await?,
            ),
            Effect::LoadReports { user_id, limit } => Outcome::Reports(
                self.db
                    .list_reports(&ReportQuery {
                        user_id: Some(user_id),
                        limit,
                        ..Default::default()
                    })
                    .await?,
            ),
            Effect::SubmitReport { report } => {
                Outcome::Submitted(self.db.submit_report_atomic(&report).await?)
            }
            Effect::TransitionReport {
                report_id,
                to,
                actor_id,
            } => Outcome::Transitioned(
                self.db
                    .transition_report_atomic(&report_id, to, &actor_id, time_utils::now())
                    .await?,
            ),
            Effect::Redeem {
                user_id,
                amount,
                method,
            } => {
                let (user, receipt) = self
                    .db
                    .redeem_credits_atomic(&user_id, amount, method, time_utils::now())
                    .await?;
                Outcome::Redeemed(user, receipt)
            }
            Effect::UpdateProfile { user_id, patch } => {
                Outcome::Profile(self.db.update_user_profile(&user_id, &patch).await?)
            }
            Effect::ConnectEmail { user_id, email } => {
                Outcome::Profile(self.db.connect_email(&user_id, &email).await?)
            }
            Effect::AwardBadges { user_id, badges } => {
                Outcome::Profile(self.db.award_badges(&user_id, &badges).await?)
            }
        };
        Ok(outcome)
    }

    async fn run(&self, user_id: &str, effect: Effect) -> Result<Outcome, AppError> {
        let outcome = self.execute(effect).await?;
        self.sessions
            .update(user_id, |session| actions::fold(session, &outcome));
        Ok(outcome)
    }

    /// Cached profile, fetching (or creating) it on first access and again
    /// once the cached copy is older than the profile TTL.
    ///
    /// A failed first fetch leaves the session without a user.
    pub async fn load_user_profile(
        &self,
        user_id: &str,
        name: Option<&str>,
        email: Option<&str>,
    ) -> Result<User, AppError> {
        if let Some(user) = self
            .sessions
            .get(user_id)
            .filter(|s| s.profile_is_fresh(self.profile_ttl))
            .and_then(|s| s.user)
        {
            return Ok(user);
        }
        match self
            .run(user_id, actions::load_user_profile(user_id, name, email))
            .await?
        {
            Outcome::Profile(user) => Ok(user),
            other => Err(unexpected(other)),
        }
    }

    pub async fn load_reports(&self, user_id: &str) -> Result<Vec<WasteReport>, AppError> {
        let effect = actions::load_reports(&self.sessions.snapshot(user_id))?;
        match self.run(user_id, effect).await? {
            Outcome::Reports(reports) => Ok(reports),
            other => Err(unexpected(other)),
        }
    }

    pub async fn add_report(
        &self,
        user_id: &str,
        draft: ReportDraft,
    ) -> Result<SubmitCommit, AppError> {
        let effect = actions::add_report(
            &self.sessions.snapshot(user_id),
            uuid::Uuid::new_v4().to_string(),
            draft,
            time_utils::now(),
        )?;
        match self.run(user_id, effect).await? {
            Outcome::Submitted(commit) => Ok(commit),
            other => Err(unexpected(other)),
        }
    }

    pub async fn update_report(
        &self,
        user_id: &str,
        report_id: &str,
        patch: ReportPatch,
    ) -> Result<WasteReport, AppError> {
        let effect = actions::update_report(&self.sessions.snapshot(user_id), report_id, patch)?;
        match self.run(user_id, effect).await? {
            Outcome::Transitioned(commit) => Ok(commit.report),
            other => Err(unexpected(other)),
        }
    }

    pub async fn redeem_credits(
        &self,
        user_id: &str,
        amount: i64,
        method: RedemptionMethod,
    ) -> Result<RedemptionReceipt, AppError> {
        let effect = actions::redeem_credits(&self.sessions.snapshot(user_id), amount, method)?;
        match self.run(user_id, effect).await {
            Ok(Outcome::Redeemed(_, receipt)) => Ok(receipt),
            Ok(other) => Err(unexpected(other)),
            Err(err) => {
                if matches!(err, AppError::InsufficientCredits { .. }) {
                    // The cached balance disagreed with the store
                    self.sessions.update(user_id, |s| s.synced_at = None);
                }
                Err(err)
            }
        }
    }

    // ─── Reads passed through to the store ──────────────────────

    pub async fn list_reports(&self, query: &ReportQuery) -> Result<Vec<WasteReport>, AppError> {
        self.db.list_reports(query).await
    }

    pub async fn get_report(&self, report_id: &str) -> Result<Option<WasteReport>, AppError> {
        self.db.get_report(report_id).await
    }

    pub async fn credit_history(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<CreditEntry>, AppError> {
        self.db.credit_history(user_id, limit).await
    }

    pub async fn leaderboard(&self, limit: u32) -> Result<Vec<User>, AppError> {
        self.db.leaderboard(limit).await
    }

    pub async fn update_user_profile(
        &self,
        user_id: &str,
        patch: ProfilePatch,
    ) -> Result<User, AppError> {
        let effect = actions::update_user_profile(&self.sessions.snapshot(user_id), patch)?;
        self.expect_profile(user_id, effect).await
    }

    pub async fn connect_email(
        &self,
        user_id: &str,
        email: &str,
        provider: &str,
    ) -> Result<User, AppError> {
        let effect = actions::connect_email(&self.sessions.snapshot(user_id), email, provider)?;
        self.expect_profile(user_id, effect).await
    }

    pub fn map_filters(&self, user_id: &str) -> MapFilters {
        self.sessions.snapshot(user_id).map_filters
    }

    pub fn set_map_filters(&self, user_id: &str, patch: &MapFiltersPatch) -> MapFilters {
        self.sessions
            .update(user_id, |session| actions::set_map_filters(session, patch))
    }

    /// Evaluate achievements, persisting any badges the profile is missing.
    pub async fn check_achievements(
        &self,
        user_id: &str,
    ) -> Result<Vec<AchievementProgress>, AppError> {
        let session = self.sessions.snapshot(user_id);
        let user = match actions::check_achievements(&session)? {
            Some(effect) => self.expect_profile(user_id, effect).await?,
            None => session.user.ok_or(AppError::Unauthorized)?,
        };
        Ok(achievements::evaluate(&user))
    }

    async fn expect_profile(&self, user_id: &str, effect: Effect) -> Result<User, AppError> {
        match self.run(user_id, effect).await? {
            Outcome::Profile(user) => Ok(user),
            other => Err(unexpected(other)),
        }
    }

    /// Fold a change published by another writer into the cached sessions.
    pub fn apply_change(&self, change: &Change) {
        match change {
            Change::UserUpdated { user } => {
                if self.sessions.get(&user.id).is_some() {
                    self.sessions.update(&user.id, |s| {
                        s.apply_user(user.clone());
                    });
                }
            }
            Change::ReportUpdated { report } => {
                self.sessions.for_each(|_, s| {
                    s.replace_report(report);
                });
            }
            Change::ReportCreated { report } => {
                if self.sessions.get(&report.user_id).is_some() {
                    self.sessions.update(&report.user_id, |s| s.upsert_report(report.clone()));
                }
            }
        }
    }
}

fn unexpected(outcome: Outcome) -> AppError {
    AppError::Internal(anyhow::anyhow!("unexpected outcome: {:?}", outcome))
}
