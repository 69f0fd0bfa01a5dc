// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod achievement;
pub mod credit;
pub mod filters;
pub mod group;
pub mod overlay;
pub mod report;
pub mod user;

pub use achievement::{Achievement, AchievementCategory, AchievementProgress};
pub use credit::{CreditEntry, CreditSource, RedemptionMethod, RedemptionReceipt};
pub use filters::{MapFilters, MapFiltersPatch};
pub use group::{CommunityChallenge, CommunityEvent, CommunityGroup, Language, Rsvp, RsvpStatus};
pub use overlay::{Bounds, Hotspot, OverlaySnapshot, Pickup};
pub use report::{
    Coordinates, Location, ReportClassification, ReportDraft, ReportPatch, ReportStatus, Urgency,
    WasteReport, WasteType,
};
pub use user::{ProfilePatch, User};
