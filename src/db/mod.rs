//! Database layer (Firestore).

pub mod changes;
pub mod firestore;
pub mod rows;

pub use changes::{Change, ChangeFeed};
pub use firestore::FirestoreDb;

/// Collection names as constants.
pub mod collections {
    pub const USER_PROFILES: &str = "user_profiles";
    pub const WASTE_REPORTS: &str = "waste_reports";
    /// Append-only credit awards and redemptions
    pub const CREDIT_LEDGER: &str = "credit_ledger";
    pub const COMMUNITY_GROUPS: &str = "community_groups";
    pub const COMMUNITY_CHALLENGES: &str = "community_challenges";
    pub const COMMUNITY_EVENTS: &str = "community_events";
}
