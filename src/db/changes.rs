// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Change feed published after each committed write.
//!
//! Subscribers receive the delta itself rather than a "something changed"
//! signal. Report subscriptions see every report event; user subscriptions
//! only see snapshots of one profile.

use serde::Serialize;
use tokio::sync::broadcast;

use crate::models::{User, WasteReport};

/// Buffered events per subscriber before it starts lagging.
const FEED_CAPACITY: usize = 256;

/// A committed change.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Change {
    ReportCreated { report: WasteReport },
    ReportUpdated { report: WasteReport },
    UserUpdated { user: User },
}

impl Change {
    pub fn is_report(&self) -> bool {
        matches!(
            self,
            Change::ReportCreated { .. } | Change::ReportUpdated { .. }
        )
    }

    /// SSE event name.
    pub fn event_name(&self) -> &'static str {
        match self {
            Change::ReportCreated { .. } => "report_created",
            Change::ReportUpdated { .. } => "report_updated",
            Change::UserUpdated { .. } => "user_updated",
        }
    }
}

/// Which events a subscription delivers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Topic {
    /// Everything; used to keep cached sessions in step
    All,
    Reports,
    User(String),
    /// All report events plus one user's profile
    Session(String),
}

impl Topic {
    fn admits(&self, change: &Change) -> bool {
        match (self, change) {
            (Topic::All, _) => true,
            (Topic::Reports, c) => c.is_report(),
            (Topic::User(id), Change::UserUpdated { user }) => &user.id == id,
            (Topic::User(_), _) => false,
            (Topic::Session(_), c) if c.is_report() => true,
            (Topic::Session(id), Change::UserUpdated { user }) => &user.id == id,
            (Topic::Session(_), _) => false,
        }
    }
}

#[derive(Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<Change>,
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeFeed {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(FEED_CAPACITY);
        Self { tx }
    }

    /// Publish a committed change. No subscribers is not an error.
    pub fn publish(&self, change: Change) {
        let receivers = self.tx.send(change).unwrap_or(0);
        tracing::trace!(receivers, "Published change");
    }

    pub fn subscribe(&self, topic: Topic) -> Subscription {
        Subscription {
            rx: self.tx.subscribe(),
            topic,
            lagged: false,
        }
    }

    pub fn subscribe_reports(&self) -> Subscription {
        self.subscribe(Topic::Reports)
    }

    pub fn subscribe_user(&self, user_id: &str) -> Subscription {
        self.subscribe(Topic::User(user_id.to_string()))
    }
}

/// Receiving end of a filtered subscription. Dropping it unsubscribes.
pub struct Subscription {
    rx: broadcast::Receiver<Change>,
    topic: Topic,
    lagged: bool,
}

impl Subscription {
    /// Next matching change, or `None` once the feed is closed.
    ///
    /// A lagging subscriber skips the events it missed; see [`Self::take_lagged`].
    pub async fn recv(&mut self) -> Option<Change> {
        loop {
            match self.rx.recv().await {
                Ok(change) if self.topic.admits(&change) => return Some(change),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, topic = ?self.topic, "Change subscriber lagged");
                    self.lagged = true;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Whether events were skipped since the last call.
    pub fn take_lagged(&mut self) -> bool {
        std::mem::take(&mut self.lagged)
    }
}
