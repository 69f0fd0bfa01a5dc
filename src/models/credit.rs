// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Credit ledger and redemption models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// How redeemed credits are paid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum RedemptionMethod {
    /// Mobile money payout
    Cash,
    /// Credits forwarded to a charity with a bonus
    Donation,
    Marketplace,
}

impl RedemptionMethod {
    /// Payout per redeemed credit: USD for cash and marketplace, credits for donation.
    pub fn rate(&self) -> f64 {
        match self {
            RedemptionMethod::Cash => 0.05,
            RedemptionMethod::Donation => 1.2,
            RedemptionMethod::Marketplace => 0.08,
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            RedemptionMethod::Cash | RedemptionMethod::Marketplace => "USD",
            RedemptionMethod::Donation => "charity_credits",
        }
    }

    pub fn value_of(&self, amount: u32) -> f64 {
        let value = f64::from(amount) * self.rate();
        match self {
            RedemptionMethod::Donation => value.round(),
            _ => (value * 100.0).round() / 100.0,
        }
    }
}

/// What produced a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum CreditSource {
    WasteReport,
    Redemption,
}

/// Append-only record of a balance change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CreditEntry {
    pub id: String,
    pub user_id: String,
    /// Positive for awards, negative for redemptions
    pub amount: i64,
    pub source: CreditSource,
    pub report_id: Option<String>,
    pub method: Option<RedemptionMethod>,
    /// Value paid out for redemptions
    pub payout: Option<f64>,
    /// RFC3339, lexically sortable
    pub created_at: String,
}

/// Result of a successful redemption.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct RedemptionReceipt {
    pub amount: u32,
    pub method: RedemptionMethod,
    pub value: f64,
    pub unit: String,
    pub remaining_credits: u32,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub redeemed_at: DateTime<Utc>,
}
