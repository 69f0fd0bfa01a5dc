// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - User profiles (fetch-or-create, edits, leaderboard)
//! - Waste reports (atomic submission and status transitions)
//! - The credit ledger (atomic redemption, history)
//! - Community groups, challenges and events
//!
//! Every multi-document write runs in a single transaction, and each commit
//! is published on the change feed.

use chrono::{DateTime, Utc};
use firestore::{FirestoreConsistencySelector, FirestoreQueryDirection, FirestoreTransaction};

use crate::db::changes::{Change, ChangeFeed};
use crate::db::collections;
use crate::db::rows::{ReportRow, UserProfileRow};
use crate::error::AppError;
use crate::models::{
    CommunityChallenge, CommunityEvent, CommunityGroup, CreditEntry, CreditSource, ProfilePatch,
    RedemptionMethod, RedemptionReceipt, ReportStatus, Rsvp, User, WasteReport,
};
use crate::services::lifecycle;
use crate::time_utils::format_utc_rfc3339;

/// Attempts for a transaction whose commit failed (typically contention).
const MAX_TX_ATTEMPTS: usize = 5;

/// Committed result of a report submission.
#[derive(Debug, Clone)]
pub struct SubmitCommit {
    pub report: WasteReport,
    pub user: User,
    pub new_badges: Vec<String>,
    /// Group the report was credited to, after the update
    pub group: Option<CommunityGroup>,
    /// Group challenges the report advanced, after the update
    pub challenges: Vec<CommunityChallenge>,
}

/// Committed result of a status transition.
#[derive(Debug, Clone)]
pub struct TransitionCommit {
    pub report: WasteReport,
    /// Owner profile when the transition credited a verified report
    pub owner: Option<User>,
    pub new_badges: Vec<String>,
}

/// Filter for report listings.
#[derive(Debug, Clone, Default)]
pub struct ReportQuery {
    pub user_id: Option<String>,
    pub group_id: Option<String>,
    /// Only reports created strictly before this RFC3339 timestamp
    pub before: Option<String>,
    /// Only reports created at or after this RFC3339 timestamp
    pub since: Option<String>,
    pub limit: u32,
}

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
    changes: ChangeFeed,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // Emulator gets an unauthenticated connection so local credentials
        // are never picked up.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
            changes: ChangeFeed::new(),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
            changes: ChangeFeed::new(),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self {
            client: None,
            changes: ChangeFeed::new(),
        }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    /// Client whose reads are registered with `transaction` for conflict detection.
    fn in_transaction(
        &self,
        transaction: &FirestoreTransaction<'_>,
    ) -> Result<firestore::FirestoreDb, AppError> {
        Ok(self
            .get_client()?
            .clone_with_consistency_selector(FirestoreConsistencySelector::Transaction(
                transaction.transaction_id().clone(),
            )))
    }

    async fn begin(&self) -> Result<FirestoreTransaction<'_>, AppError> {
        self.get_client()?
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))
    }

    /// Commit; `false` if the commit was rejected and the whole unit may be retried.
    async fn commit(transaction: FirestoreTransaction<'_>, what: &str) -> bool {
        match transaction.commit().await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(error = %e, what, "Transaction commit failed");
                false
            }
        }
    }

    /// Change feed for committed writes.
    pub fn changes(&self) -> &ChangeFeed {
        &self.changes
    }

    // ─── User Profile Operations ─────────────────────────────────

    /// Get a user profile. `Ok(None)` for an unknown id.
    pub async fn get_user_profile(&self, user_id: &str) -> Result<Option<User>, AppError> {
        let row: Option<UserProfileRow> = self
            .get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USER_PROFILES)
            .obj()
            .one(user_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        row.map(User::try_from).transpose()
    }

    /// Fetch a profile, creating it with zeroed counters if absent.
    pub async fn get_or_create_user_profile(
        &self,
        user_id: &str,
        name: &str,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<User, AppError> {
        for attempt in 1..=MAX_TX_ATTEMPTS {
            let mut transaction = self.begin().await?;
            let existing: Option<UserProfileRow> = self
                .in_transaction(&transaction)?
                .fluent()
                .select()
                .by_id_in(collections::USER_PROFILES)
                .obj()
                .one(user_id)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;

            if let Some(row) = existing {
                let _ = transaction.rollback().await;
                return User::try_from(row);
            }

            let user = User::new(user_id, name, email, now);
            self.get_client()?
                .fluent()
                .update()
                .in_col(collections::USER_PROFILES)
                .document_id(user_id)
                .object(&UserProfileRow::from(&user))
                .add_to_transaction(&mut transaction)
                .map_err(|e| {
                    AppError::Database(format!("Failed to add profile to transaction: {}", e))
                })?;

            if Self::commit(transaction, "create_profile").await {
                tracing::info!(user_id, "Created user profile");
                self.changes.publish(Change::UserUpdated { user: user.clone() });
                return Ok(user);
            }
            tracing::debug!(user_id, attempt, "Retrying profile creation");
        }
        Err(AppError::Database(format!(
            "Profile creation for {} kept conflicting",
            user_id
        )))
    }

    /// Read-modify-write a profile inside a transaction.
    async fn modify_profile<F>(&self, user_id: &str, what: &str, mut f: F) -> Result<User, AppError>
    where
        F: FnMut(&mut User),
    {
        for attempt in 1..=MAX_TX_ATTEMPTS {
            let mut transaction = self.begin().await?;
            let row: Option<UserProfileRow> = self
                .in_transaction(&transaction)?
                .fluent()
                .select()
                .by_id_in(collections::USER_PROFILES)
                .obj()
                .one(user_id)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;

            let Some(row) = row else {
                let _ = transaction.rollback().await;
                return Err(AppError::NotFound(format!("User profile {}", user_id)));
            };
            let mut user = User::try_from(row)?;
            f(&mut user);
            user.revision += 1;

            self.get_client()?
                .fluent()
                .update()
                .in_col(collections::USER_PROFILES)
                .document_id(user_id)
                .object(&UserProfileRow::from(&user))
                .add_to_transaction(&mut transaction)
                .map_err(|e| {
                    AppError::Database(format!("Failed to add profile to transaction: {}", e))
                })?;

            if Self::commit(transaction, what).await {
                self.changes.publish(Change::UserUpdated { user: user.clone() });
                return Ok(user);
            }
            tracing::debug!(user_id, attempt, what, "Retrying profile update");
        }
        Err(AppError::Database(format!(
            "Profile update for {} kept conflicting",
            user_id
        )))
    }

    /// Apply editable profile fields.
    pub async fn update_user_profile(
        &self,
        user_id: &str,
        patch: &ProfilePatch,
    ) -> Result<User, AppError> {
        self.modify_profile(user_id, "update_profile", |user| patch.apply(user))
            .await
    }

    /// Record a connected email address.
    pub async fn connect_email(&self, user_id: &str, email: &str) -> Result<User, AppError> {
        self.modify_profile(user_id, "connect_email", |user| {
            user.email = email.to_string();
            user.email_connected = true;
        })
        .await
    }

    /// Persist badges earned outside a counter change.
    pub async fn award_badges(&self, user_id: &str, badges: &[String]) -> Result<User, AppError> {
        self.modify_profile(user_id, "award_badges", |user| {
            for badge in badges {
                user.award_badge(badge);
            }
        })
        .await
    }

    /// Top users by lifetime credits earned.
    pub async fn leaderboard(&self, limit: u32) -> Result<Vec<User>, AppError> {
        let rows: Vec<UserProfileRow> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::USER_PROFILES)
            .order_by([("total_earned", FirestoreQueryDirection::Descending)])
            .limit(limit)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(rows.into_iter().filter_map(|row| map_row(row, "profile")).collect())
    }

    // ─── Report Operations ───────────────────────────────────────

    pub async fn get_report(&self, report_id: &str) -> Result<Option<WasteReport>, AppError> {
        let row: Option<ReportRow> = self
            .get_client()?
            .fluent()
            .select()
            .by_id_in(collections::WASTE_REPORTS)
            .obj()
            .one(report_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        row.map(WasteReport::try_from).transpose()
    }

    /// Reports newest first.
    pub async fn list_reports(&self, query: &ReportQuery) -> Result<Vec<WasteReport>, AppError> {
        let ReportQuery {
            user_id,
            group_id,
            before,
            since,
            limit,
        } = query.clone();

        let rows: Vec<ReportRow> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::WASTE_REPORTS)
            .filter(move |q| {
                q.for_all([
                    user_id.clone().and_then(|id| q.field("user_id").eq(id)),
                    group_id.clone().and_then(|id| q.field("group_id").eq(id)),
                    before.clone().and_then(|t| q.field("created_at").less_than(t)),
                    since.clone().and_then(|t| q.field("created_at").greater_than_or_equal(t)),
                ])
            })
            .order_by([("created_at", FirestoreQueryDirection::Descending)])
            .limit(limit)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(rows.into_iter().filter_map(|row| map_row(row, "report")).collect())
    }

    /// Atomically insert a report, credit its owner and append a ledger entry.
    ///
    /// The owner's counters are read inside the transaction, so concurrent
    /// submissions never lose each other's credits. A report arriving through
    /// a community group also adds its credits to the group total and
    /// advances the group's open challenges.
    ///
    /// Submitting a report id that is already stored credits nothing and
    /// returns the stored report. A retry after a commit that landed but
    /// reported failure takes this path.
    pub async fn submit_report_atomic(&self, report: &WasteReport) -> Result<SubmitCommit, AppError> {
        let now = format_utc_rfc3339(report.created_at);

        for attempt in 1..=MAX_TX_ATTEMPTS {
            let mut transaction = self.begin().await?;
            let reader = self.in_transaction(&transaction)?;

            let stored: Option<ReportRow> = reader
                .fluent()
                .select()
                .by_id_in(collections::WASTE_REPORTS)
                .obj()
                .one(&report.id)
                .await
                .map_err(|e| {
                    AppError::Database(format!("Failed to read report in transaction: {}", e))
                })?;

            let row: Option<UserProfileRow> = reader
                .fluent()
                .select()
                .by_id_in(collections::USER_PROFILES)
                .obj()
                .one(&report.user_id)
                .await
                .map_err(|e| {
                    AppError::Database(format!("Failed to read profile in transaction: {}", e))
                })?;
            let Some(row) = row else {
                let _ = transaction.rollback().await;
                return Err(AppError::NotFound(format!(
                    "User profile {}",
                    report.user_id
                )));
            };
            let mut user = User::try_from(row)?;

            let group = match &report.group_id {
                Some(group_id) => {
                    let group: Option<CommunityGroup> = reader
                        .fluent()
                        .select()
                        .by_id_in(collections::COMMUNITY_GROUPS)
                        .obj()
                        .one(group_id)
                        .await
                        .map_err(|e| {
                            AppError::Database(format!(
                                "Failed to read group in transaction: {}",
                                e
                            ))
                        })?;
                    if group.is_none() {
                        let _ = transaction.rollback().await;
                        return Err(AppError::NotFound(format!("Community group {}", group_id)));
                    }
                    group
                }
                None => None,
            };

            if let Some(stored) = stored {
                let _ = transaction.rollback().await;
                let stored = WasteReport::try_from(stored)?;
                if stored.user_id != report.user_id {
                    return Err(AppError::BadRequest(format!(
                        "Report id {} is already taken",
                        report.id
                    )));
                }
                tracing::info!(
                    report_id = %stored.id,
                    attempt,
                    "Report already stored, not crediting again"
                );
                // The landed commit may never have been announced
                self.changes.publish(Change::ReportCreated {
                    report: stored.clone(),
                });
                self.changes.publish(Change::UserUpdated { user: user.clone() });
                return Ok(SubmitCommit {
                    report: stored,
                    user,
                    new_badges: Vec::new(),
                    group,
                    challenges: Vec::new(),
                });
            }

            let challenges: Vec<CommunityChallenge> = match &group {
                Some(group) => {
                    let group_id = group.id.clone();
                    let active: Vec<CommunityChallenge> = reader
                        .fluent()
                        .select()
                        .from(collections::COMMUNITY_CHALLENGES)
                        .filter(move |q| {
                            q.for_all([
                                q.field("group_id").eq(group_id.clone()),
                                q.field("is_active").eq(true),
                            ])
                        })
                        .obj()
                        .query()
                        .await
                        .map_err(|e| {
                            AppError::Database(format!(
                                "Failed to read challenges in transaction: {}",
                                e
                            ))
                        })?;
                    active
                        .into_iter()
                        .filter(|c| c.is_open_at(&now))
                        .map(|mut c| {
                            c.record_report(report.credits);
                            c
                        })
                        .collect()
                }
                None => Vec::new(),
            };

            let new_badges = lifecycle::apply_submission(&mut user, report);

            let entry = CreditEntry {
                id: uuid::Uuid::new_v4().to_string(),
                user_id: report.user_id.clone(),
                amount: i64::from(report.credits),
                source: CreditSource::WasteReport,
                report_id: Some(report.id.clone()),
                method: None,
                payout: None,
                created_at: now.clone(),
            };

            let client = self.get_client()?;
            client
                .fluent()
                .update()
                .in_col(collections::WASTE_REPORTS)
                .document_id(&report.id)
                .object(&ReportRow::from(report))
                .add_to_transaction(&mut transaction)
                .map_err(|e| {
                    AppError::Database(format!("Failed to add report to transaction: {}", e))
                })?;
            client
                .fluent()
                .update()
                .in_col(collections::USER_PROFILES)
                .document_id(&user.id)
                .object(&UserProfileRow::from(&user))
                .add_to_transaction(&mut transaction)
                .map_err(|e| {
                    AppError::Database(format!("Failed to add profile to transaction: {}", e))
                })?;
            client
                .fluent()
                .update()
                .in_col(collections::CREDIT_LEDGER)
                .document_id(&entry.id)
                .object(&entry)
                .add_to_transaction(&mut transaction)
                .map_err(|e| {
                    AppError::Database(format!("Failed to add ledger entry to transaction: {}", e))
                })?;
            let group = group.map(|mut group| {
                group.total_credits = group.total_credits.saturating_add(report.credits);
                group.last_activity = now.clone();
                group
            });
            if let Some(group) = &group {
                client
                    .fluent()
                    .update()
                    .in_col(collections::COMMUNITY_GROUPS)
                    .document_id(&group.id)
                    .object(group)
                    .add_to_transaction(&mut transaction)
                    .map_err(|e| {
                        AppError::Database(format!("Failed to add group to transaction: {}", e))
                    })?;
            }
            for challenge in &challenges {
                client
                    .fluent()
                    .update()
                    .in_col(collections::COMMUNITY_CHALLENGES)
                    .document_id(&challenge.id)
                    .object(challenge)
                    .add_to_transaction(&mut transaction)
                    .map_err(|e| {
                        AppError::Database(format!(
                            "Failed to add challenge to transaction: {}",
                            e
                        ))
                    })?;
            }

            if Self::commit(transaction, "submit_report").await {
                tracing::info!(
                    report_id = %report.id,
                    user_id = %user.id,
                    credits = report.credits,
                    challenges = challenges.len(),
                    "Report submitted atomically"
                );
                self.changes.publish(Change::ReportCreated {
                    report: report.clone(),
                });
                self.changes.publish(Change::UserUpdated { user: user.clone() });
                return Ok(SubmitCommit {
                    report: report.clone(),
                    user,
                    new_badges,
                    group,
                    challenges,
                });
            }
            tracing::debug!(report_id = %report.id, attempt, "Retrying report submission");
        }
        Err(AppError::Database(format!(
            "Submission of report {} kept conflicting",
            report.id
        )))
    }

    /// Atomically move a report to `to`.
    ///
    /// When the owner resolves their own report, the owner's
    /// `verified_reports` increments in the same transaction.
    pub async fn transition_report_atomic(
        &self,
        report_id: &str,
        to: ReportStatus,
        actor_id: &str,
        now: DateTime<Utc>,
    ) -> Result<TransitionCommit, AppError> {
        for attempt in 1..=MAX_TX_ATTEMPTS {
            let mut transaction = self.begin().await?;
            let reader = self.in_transaction(&transaction)?;

            let row: Option<ReportRow> = reader
                .fluent()
                .select()
                .by_id_in(collections::WASTE_REPORTS)
                .obj()
                .one(report_id)
                .await
                .map_err(|e| {
                    AppError::Database(format!("Failed to read report in transaction: {}", e))
                })?;
            let Some(row) = row else {
                let _ = transaction.rollback().await;
                return Err(AppError::NotFound(format!("Report {}", report_id)));
            };
            let mut report = WasteReport::try_from(row)?;

            if attempt > 1 && report.status == to {
                // An earlier attempt landed even though the commit was reported failed
                let _ = transaction.rollback().await;
                tracing::info!(report_id, attempt, "Transition already stored");
                self.changes.publish(Change::ReportUpdated {
                    report: report.clone(),
                });
                return Ok(TransitionCommit {
                    report,
                    owner: None,
                    new_badges: Vec::new(),
                });
            }

            let outcome = match lifecycle::apply_transition(&mut report, to, actor_id, now) {
                Ok(outcome) => outcome,
                Err(e) => {
                    let _ = transaction.rollback().await;
                    return Err(e.into());
                }
            };

            let mut owner = None;
            let mut new_badges = Vec::new();
            if outcome.credit_owner {
                let row: Option<UserProfileRow> = reader
                    .fluent()
                    .select()
                    .by_id_in(collections::USER_PROFILES)
                    .obj()
                    .one(&report.user_id)
                    .await
                    .map_err(|e| {
                        AppError::Database(format!(
                            "Failed to read profile in transaction: {}",
                            e
                        ))
                    })?;
                match row {
                    Some(row) => {
                        let mut user = User::try_from(row)?;
                        new_badges = lifecycle::apply_verified(&mut user);
                        owner = Some(user);
                    }
                    None => {
                        tracing::warn!(
                            report_id,
                            user_id = %report.user_id,
                            "Owner profile missing, skipping verified count"
                        );
                    }
                }
            }

            let client = self.get_client()?;
            client
                .fluent()
                .update()
                .in_col(collections::WASTE_REPORTS)
                .document_id(report_id)
                .object(&ReportRow::from(&report))
                .add_to_transaction(&mut transaction)
                .map_err(|e| {
                    AppError::Database(format!("Failed to add report to transaction: {}", e))
                })?;
            if let Some(user) = &owner {
                client
                    .fluent()
                    .update()
                    .in_col(collections::USER_PROFILES)
                    .document_id(&user.id)
                    .object(&UserProfileRow::from(user))
                    .add_to_transaction(&mut transaction)
                    .map_err(|e| {
                        AppError::Database(format!("Failed to add profile to transaction: {}", e))
                    })?;
            }

            if Self::commit(transaction, "transition_report").await {
                tracing::info!(
                    report_id,
                    status = to.as_str(),
                    actor_id,
                    credited_owner = owner.is_some(),
                    "Report status changed"
                );
                self.changes.publish(Change::ReportUpdated {
                    report: report.clone(),
                });
                if let Some(user) = &owner {
                    self.changes.publish(Change::UserUpdated { user: user.clone() });
                }
                return Ok(TransitionCommit {
                    report,
                    owner,
                    new_badges,
                });
            }
            tracing::debug!(report_id, attempt, "Retrying report transition");
        }
        Err(AppError::Database(format!(
            "Transition of report {} kept conflicting",
            report_id
        )))
    }

    // ─── Credit Ledger Operations ────────────────────────────────

    /// Atomically redeem credits. Rejected without any write when the
    /// balance is short.
    pub async fn redeem_credits_atomic(
        &self,
        user_id: &str,
        amount: u32,
        method: RedemptionMethod,
        now: DateTime<Utc>,
    ) -> Result<(User, RedemptionReceipt), AppError> {
        if amount == 0 {
            return Err(AppError::BadRequest(
                "Redemption amount must be positive".to_string(),
            ));
        }

        let value = method.value_of(amount);
        let receipt_for = |user: &User| RedemptionReceipt {
            amount,
            method,
            value,
            unit: method.unit().to_string(),
            remaining_credits: user.credits,
            redeemed_at: now,
        };
        // Same ledger id on every attempt, so a landed commit is recognised
        let entry_id = uuid::Uuid::new_v4().to_string();

        for attempt in 1..=MAX_TX_ATTEMPTS {
            let mut transaction = self.begin().await?;
            let reader = self.in_transaction(&transaction)?;
            let recorded: Option<CreditEntry> = reader
                .fluent()
                .select()
                .by_id_in(collections::CREDIT_LEDGER)
                .obj()
                .one(&entry_id)
                .await
                .map_err(|e| {
                    AppError::Database(format!("Failed to read ledger in transaction: {}", e))
                })?;
            let row: Option<UserProfileRow> = reader
                .fluent()
                .select()
                .by_id_in(collections::USER_PROFILES)
                .obj()
                .one(user_id)
                .await
                .map_err(|e| {
                    AppError::Database(format!("Failed to read profile in transaction: {}", e))
                })?;
            let Some(row) = row else {
                let _ = transaction.rollback().await;
                return Err(AppError::NotFound(format!("User profile {}", user_id)));
            };
            let mut user = User::try_from(row)?;

            if recorded.is_some() {
                let _ = transaction.rollback().await;
                tracing::info!(user_id, attempt, "Redemption already stored");
                self.changes.publish(Change::UserUpdated { user: user.clone() });
                let receipt = receipt_for(&user);
                return Ok((user, receipt));
            }

            if amount > user.credits {
                let _ = transaction.rollback().await;
                return Err(AppError::InsufficientCredits {
                    requested: amount,
                    available: user.credits,
                });
            }
            user.credits -= amount;
            user.revision += 1;

            let entry = CreditEntry {
                id: entry_id.clone(),
                user_id: user_id.to_string(),
                amount: -i64::from(amount),
                source: CreditSource::Redemption,
                report_id: None,
                method: Some(method),
                payout: Some(value),
                created_at: format_utc_rfc3339(now),
            };

            let client = self.get_client()?;
            client
                .fluent()
                .update()
                .in_col(collections::USER_PROFILES)
                .document_id(user_id)
                .object(&UserProfileRow::from(&user))
                .add_to_transaction(&mut transaction)
                .map_err(|e| {
                    AppError::Database(format!("Failed to add profile to transaction: {}", e))
                })?;
            client
                .fluent()
                .update()
                .in_col(collections::CREDIT_LEDGER)
                .document_id(&entry.id)
                .object(&entry)
                .add_to_transaction(&mut transaction)
                .map_err(|e| {
                    AppError::Database(format!("Failed to add ledger entry to transaction: {}", e))
                })?;

            if Self::commit(transaction, "redeem_credits").await {
                tracing::info!(user_id, amount, ?method, "Credits redeemed");
                self.changes.publish(Change::UserUpdated { user: user.clone() });
                let receipt = receipt_for(&user);
                return Ok((user, receipt));
            }
            tracing::debug!(user_id, attempt, "Retrying redemption");
        }
        Err(AppError::Database(format!(
            "Redemption for {} kept conflicting",
            user_id
        )))
    }

    /// Ledger entries for a user, newest first.
    pub async fn credit_history(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<CreditEntry>, AppError> {
        let user_id = user_id.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::CREDIT_LEDGER)
            .filter(move |q| q.for_all([q.field("user_id").eq(user_id.clone())]))
            .order_by([("created_at", FirestoreQueryDirection::Descending)])
            .limit(limit)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    // ─── Community Group Operations ──────────────────────────────

    pub async fn upsert_group(&self, group: &CommunityGroup) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::COMMUNITY_GROUPS)
            .document_id(&group.id)
            .object(group)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    pub async fn get_group(&self, group_id: &str) -> Result<Option<CommunityGroup>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::COMMUNITY_GROUPS)
            .obj()
            .one(group_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Groups administered by a user.
    pub async fn list_groups_for_admin(
        &self,
        admin_user_id: &str,
    ) -> Result<Vec<CommunityGroup>, AppError> {
        let admin_user_id = admin_user_id.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::COMMUNITY_GROUPS)
            .filter(move |q| q.for_all([q.field("admin_user_id").eq(admin_user_id.clone())]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Resolve the group an inbound message belongs to.
    pub async fn find_group_by_chat(
        &self,
        chat_id: &str,
    ) -> Result<Option<CommunityGroup>, AppError> {
        let chat_id = chat_id.to_string();
        let groups: Vec<CommunityGroup> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::COMMUNITY_GROUPS)
            .filter(move |q| q.for_all([q.field("chat_id").eq(chat_id.clone())]))
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(groups.into_iter().next())
    }

    /// 1-based position of a group with `total_credits` among all groups.
    pub async fn group_rank(&self, total_credits: u32) -> Result<u32, AppError> {
        let ahead: Vec<CommunityGroup> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::COMMUNITY_GROUPS)
            .filter(move |q| q.for_all([q.field("total_credits").greater_than(total_credits)]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(ahead.len() as u32 + 1)
    }

    pub async fn upsert_challenge(&self, challenge: &CommunityChallenge) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::COMMUNITY_CHALLENGES)
            .document_id(&challenge.id)
            .object(challenge)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    pub async fn list_active_challenges(
        &self,
        group_id: &str,
    ) -> Result<Vec<CommunityChallenge>, AppError> {
        let group_id = group_id.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::COMMUNITY_CHALLENGES)
            .filter(move |q| {
                q.for_all([
                    q.field("group_id").eq(group_id.clone()),
                    q.field("is_active").eq(true),
                ])
            })
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    pub async fn upsert_event(&self, event: &CommunityEvent) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::COMMUNITY_EVENTS)
            .document_id(&event.id)
            .object(event)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    pub async fn get_event(&self, event_id: &str) -> Result<Option<CommunityEvent>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::COMMUNITY_EVENTS)
            .obj()
            .one(event_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Upcoming events for a group, soonest first.
    pub async fn list_upcoming_events(
        &self,
        group_id: &str,
        after: &str,
    ) -> Result<Vec<CommunityEvent>, AppError> {
        let group_id = group_id.to_string();
        let after = after.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::COMMUNITY_EVENTS)
            .filter(move |q| {
                q.for_all([
                    q.field("group_id").eq(group_id.clone()),
                    q.field("date").greater_than_or_equal(after.clone()),
                ])
            })
            .order_by([("date", FirestoreQueryDirection::Ascending)])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Atomically record an RSVP. Returns the event and whether the reply
    /// was accepted; a rejected reply (event full) writes nothing.
    pub async fn record_rsvp_atomic(
        &self,
        event_id: &str,
        rsvp: Rsvp,
    ) -> Result<(CommunityEvent, bool), AppError> {
        for attempt in 1..=MAX_TX_ATTEMPTS {
            let mut transaction = self.begin().await?;
            let event: Option<CommunityEvent> = self
                .in_transaction(&transaction)?
                .fluent()
                .select()
                .by_id_in(collections::COMMUNITY_EVENTS)
                .obj()
                .one(event_id)
                .await
                .map_err(|e| {
                    AppError::Database(format!("Failed to read event in transaction: {}", e))
                })?;
            let Some(mut event) = event else {
                let _ = transaction.rollback().await;
                return Err(AppError::NotFound(format!("Event {}", event_id)));
            };

            if !event.record_rsvp(rsvp.clone()) {
                let _ = transaction.rollback().await;
                return Ok((event, false));
            }

            self.get_client()?
                .fluent()
                .update()
                .in_col(collections::COMMUNITY_EVENTS)
                .document_id(event_id)
                .object(&event)
                .add_to_transaction(&mut transaction)
                .map_err(|e| {
                    AppError::Database(format!("Failed to add event to transaction: {}", e))
                })?;

            if Self::commit(transaction, "record_rsvp").await {
                tracing::info!(event_id, attending = event.attending(), "RSVP recorded");
                return Ok((event, true));
            }
            tracing::debug!(event_id, attempt, "Retrying RSVP");
        }
        Err(AppError::Database(format!(
            "RSVP for event {} kept conflicting",
            event_id
        )))
    }

    /// Atomically count one more reminder sent for an event.
    pub async fn count_reminder_atomic(&self, event_id: &str) -> Result<CommunityEvent, AppError> {
        for attempt in 1..=MAX_TX_ATTEMPTS {
            let mut transaction = self.begin().await?;
            let event: Option<CommunityEvent> = self
                .in_transaction(&transaction)?
                .fluent()
                .select()
                .by_id_in(collections::COMMUNITY_EVENTS)
                .obj()
                .one(event_id)
                .await
                .map_err(|e| {
                    AppError::Database(format!("Failed to read event in transaction: {}", e))
                })?;
            let Some(mut event) = event else {
                let _ = transaction.rollback().await;
                return Err(AppError::NotFound(format!("Event {}", event_id)));
            };
            event.reminders_sent = event.reminders_sent.saturating_add(1);

            self.get_client()?
                .fluent()
                .update()
                .in_col(collections::COMMUNITY_EVENTS)
                .document_id(event_id)
                .object(&event)
                .add_to_transaction(&mut transaction)
                .map_err(|e| {
                    AppError::Database(format!("Failed to add event to transaction: {}", e))
                })?;

            if Self::commit(transaction, "count_reminder").await {
                return Ok(event);
            }
            tracing::debug!(event_id, attempt, "Retrying reminder count");
        }
        Err(AppError::Database(format!(
            "Reminder count for event {} kept conflicting",
            event_id
        )))
    }
}

/// Map a stored row, skipping (and logging) rows that cannot be decoded.
fn map_row<R, T>(row: R, kind: &'static str) -> Option<T>
where
    T: TryFrom<R, Error = AppError>,
{
    match T::try_from(row) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(error = %e, kind, "Skipping undecodable row");
            None
        }
    }
}
