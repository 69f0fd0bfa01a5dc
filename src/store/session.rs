// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-session state and the concurrent map holding it.

use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::models::{MapFilters, User, WasteReport};

/// State held for one signed-in user.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    pub user: Option<User>,
    /// Newest first
    pub reports: Vec<WasteReport>,
    pub map_filters: MapFilters,
    /// When the cached profile was last taken from the store or the feed
    pub synced_at: Option<Instant>,
    pub last_active: Option<Instant>,
}

impl Session {
    /// Cache a profile snapshot unless a newer revision is held. An equal
    /// revision replaces the cached one.
    ///
    /// Returns whether the snapshot was taken.
    pub fn apply_user(&mut self, user: User) -> bool {
        match &self.user {
            Some(current) if current.id == user.id && current.revision > user.revision => {
                tracing::debug!(
                    user_id = %user.id,
                    held = current.revision,
                    offered = user.revision,
                    "Discarding stale profile snapshot"
                );
                false
            }
            _ => {
                self.user = Some(user);
                self.synced_at = Some(Instant::now());
                true
            }
        }
    }

    /// Whether the cached profile can be served without a store read.
    pub fn profile_is_fresh(&self, ttl: Duration) -> bool {
        self.user.is_some() && self.synced_at.is_some_and(|at| at.elapsed() < ttl)
    }

    /// Replace a cached report by identity, or prepend it if unknown.
    pub fn upsert_report(&mut self, report: WasteReport) {
        match self.reports.iter_mut().find(|r| r.id == report.id) {
            Some(existing) => *existing = report,
            None => self.reports.insert(0, report),
        }
    }

    /// Replace a cached report by identity; unknown reports are ignored.
    pub fn replace_report(&mut self, report: &WasteReport) -> bool {
        match self.reports.iter_mut().find(|r| r.id == report.id) {
            Some(existing) => {
                *existing = report.clone();
                true
            }
            None => false,
        }
    }

    pub fn find_report(&self, report_id: &str) -> Option<&WasteReport> {
        self.reports.iter().find(|r| r.id == report_id)
    }
}

/// Sessions keyed by user id.
#[derive(Default)]
pub struct SessionStore {
    sessions: DashMap<String, Session>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of a session, or an empty one if absent. Nothing is inserted.
    pub fn snapshot(&self, user_id: &str) -> Session {
        self.get(user_id).unwrap_or_default()
    }

    pub fn get(&self, user_id: &str) -> Option<Session> {
        self.sessions.get(user_id).map(|s| s.clone())
    }

    /// Mutate a session in place, creating it if absent.
    ///
    /// The shard lock is held for the duration of `f`, which must not block.
    pub fn update<R>(&self, user_id: &str, f: impl FnOnce(&mut Session) -> R) -> R {
        let mut entry = self.sessions.entry(user_id.to_string()).or_default();
        let session = entry.value_mut();
        session.last_active = Some(Instant::now());
        f(session)
    }

    /// Mutate every session.
    pub fn for_each(&self, mut f: impl FnMut(&str, &mut Session)) {
        for mut entry in self.sessions.iter_mut() {
            let (key, session) = entry.pair_mut();
            f(key, session);
        }
    }

    /// Force every cached profile to be re-read on next access.
    pub fn mark_profiles_stale(&self) {
        for mut entry in self.sessions.iter_mut() {
            entry.value_mut().synced_at = None;
        }
    }

    /// Drop sessions not updated within `max_idle`. Returns how many went.
    pub fn evict_idle(&self, max_idle: Duration) -> usize {
        let before = self.sessions.len();
        self.sessions
            .retain(|_, s| s.last_active.is_some_and(|at| at.elapsed() < max_idle));
        before.saturating_sub(self.sessions.len())
    }

    pub fn remove(&self, user_id: &str) -> Option<Session> {
        self.sessions.remove(user_id).map(|(_, s)| s)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_stale_snapshot_discarded() {
        let mut session = Session::default();
        let mut newer = User::new("u1", "", "", Utc::now());
        newer.revision = 3;
        newer.credits = 40;
        assert!(session.apply_user(newer));

        let mut older = User::new("u1", "", "", Utc::now());
        older.revision = 2;
        older.credits = 5;
        assert!(!session.apply_user(older));
        assert_eq!(session.user.as_ref().unwrap().credits, 40);
    }

    #[test]
    fn test_equal_revision_replaces() {
        let mut session = Session::default();
        let mut a = User::new("u1", "Old", "", Utc::now());
        a.revision = 1;
        session.apply_user(a);
        let mut b = User::new("u1", "New", "", Utc::now());
        b.revision = 1;
        assert!(session.apply_user(b));
        assert_eq!(session.user.unwrap().name, "New");
    }

    #[test]
    fn test_store_update_and_snapshot() {
        let store = SessionStore::new();
        assert!(store.get("u1").is_none());
        store.update("u1", |s| s.map_filters.plastic = false);
        assert!(!store.snapshot("u1").map_filters.plastic);
        assert_eq!(store.len(), 1);
        store.remove("u1");
        assert!(store.is_empty());
    }

    #[test]
    fn test_reads_do_not_create_sessions() {
        let store = SessionStore::new();
        for i in 0..50 {
            let session = store.snapshot(&format!("visitor_{i}"));
            assert!(session.user.is_none());
        }
        assert!(store.is_empty());
    }

    #[test]
    fn test_idle_sessions_evicted() {
        let store = SessionStore::new();
        store.update("u1", |s| s.map_filters.plastic = false);
        store.update("u2", |s| s.map_filters.organic = false);
        assert_eq!(store.evict_idle(Duration::from_secs(3600)), 0);
        assert_eq!(store.len(), 2);
        assert_eq!(store.evict_idle(Duration::ZERO), 2);
        assert!(store.is_empty());
    }

    #[test]
    fn test_profile_freshness() {
        let store = SessionStore::new();
        store.update("u1", |s| {
            s.apply_user(User::new("u1", "", "", Utc::now()));
        });
        let ttl = Duration::from_secs(60);
        assert!(store.snapshot("u1").profile_is_fresh(ttl));
        assert!(!store.snapshot("u1").profile_is_fresh(Duration::ZERO));

        store.mark_profiles_stale();
        let session = store.snapshot("u1");
        assert!(session.user.is_some());
        assert!(!session.profile_is_fresh(ttl));
    }
}
