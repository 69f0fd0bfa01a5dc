// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Gamification derived from profile counters.

use std::collections::HashMap;

use serde::Serialize;

use crate::models::achievement::Metric;
use crate::models::{
    Achievement, AchievementCategory, AchievementProgress, ReportStatus, User, WasteReport,
};

pub const CATALOGUE: &[Achievement] = &[
    Achievement {
        id: "first_report",
        name: "First Report",
        description: "Submit your first waste report",
        category: AchievementCategory::Reporting,
        metric: Metric::ReportsCount,
        requirement: 1,
    },
    Achievement {
        id: "active_reporter",
        name: "Active Reporter",
        description: "Submit 10 waste reports",
        category: AchievementCategory::Reporting,
        metric: Metric::ReportsCount,
        requirement: 10,
    },
    Achievement {
        id: "waste_warrior",
        name: "Waste Warrior",
        description: "Submit 50 waste reports",
        category: AchievementCategory::Reporting,
        metric: Metric::ReportsCount,
        requirement: 50,
    },
    Achievement {
        id: "verified_contributor",
        name: "Verified Contributor",
        description: "Have 5 of your reports resolved",
        category: AchievementCategory::Community,
        metric: Metric::VerifiedReports,
        requirement: 5,
    },
    Achievement {
        id: "community_champion",
        name: "Community Champion",
        description: "Have 25 of your reports resolved",
        category: AchievementCategory::Community,
        metric: Metric::VerifiedReports,
        requirement: 25,
    },
    Achievement {
        id: "carbon_saver",
        name: "Carbon Saver",
        description: "Earn 100 carbon credits",
        category: AchievementCategory::Impact,
        metric: Metric::TotalEarned,
        requirement: 100,
    },
    Achievement {
        id: "climate_hero",
        name: "Climate Hero",
        description: "Earn 500 carbon credits",
        category: AchievementCategory::Impact,
        metric: Metric::TotalEarned,
        requirement: 500,
    },
    Achievement {
        id: "recycling_pro",
        name: "Recycling Pro",
        description: "Reach a recycling score of 80",
        category: AchievementCategory::Recycling,
        metric: Metric::RecyclingScore,
        requirement: 80,
    },
];

fn metric_value(user: &User, metric: Metric) -> u32 {
    match metric {
        Metric::ReportsCount => user.reports_count,
        Metric::VerifiedReports => user.verified_reports,
        Metric::TotalEarned => user.total_earned,
        Metric::RecyclingScore => u32::from(user.recycling_score),
    }
}

/// Evaluate the whole catalogue for a user.
pub fn evaluate(user: &User) -> Vec<AchievementProgress> {
    CATALOGUE
        .iter()
        .map(|a| {
            let progress = metric_value(user, a.metric);
            AchievementProgress {
                id: a.id.to_string(),
                name: a.name.to_string(),
                description: a.description.to_string(),
                category: a.category,
                progress,
                requirement: a.requirement,
                completed: progress >= a.requirement,
            }
        })
        .collect()
}

/// Append badges for completed achievements the user does not hold yet.
///
/// Badge order follows the order achievements were completed in, then
/// catalogue order.
pub fn award_new_badges(user: &mut User) -> Vec<String> {
    let mut awarded = Vec::new();
    for a in CATALOGUE {
        if metric_value(user, a.metric) >= a.requirement && user.award_badge(a.id) {
            awarded.push(a.id.to_string());
        }
    }
    awarded
}

/// Dashboard counters for a user's reports.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReportStats {
    pub total: u32,
    pub by_status: HashMap<String, u32>,
    pub by_type: HashMap<String, u32>,
    pub credits_from_reports: u32,
    /// Share of reports that reached `resolved` or later, 0 - 100
    pub resolution_rate: u32,
}

pub fn report_stats(reports: &[WasteReport]) -> ReportStats {
    let mut stats = ReportStats::default();
    let mut resolved = 0u32;
    for report in reports {
        stats.total += 1;
        *stats
            .by_status
            .entry(report.status.as_str().to_string())
            .or_insert(0) += 1;
        *stats
            .by_type
            .entry(report.waste_type.as_str().to_string())
            .or_insert(0) += 1;
        stats.credits_from_reports += report.credits;
        if report.status >= ReportStatus::Resolved {
            resolved += 1;
        }
    }
    if stats.total > 0 {
        stats.resolution_rate = resolved * 100 / stats.total;
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Coordinates, Location, Urgency, WasteType};
    use chrono::Utc;

    fn report(status: ReportStatus, waste_type: WasteType, credits: u32) -> WasteReport {
        WasteReport {
            id: "r".to_string(),
            waste_type,
            location: Location {
                address: String::new(),
                coordinates: Coordinates::DEFAULT,
            },
            description: String::new(),
            urgency: Urgency::Low,
            status,
            images: vec![],
            credits,
            user_id: "u".to_string(),
            created_at: Utc::now(),
            resolved_at: None,
            classification: None,
            group_id: None,
        }
    }

    #[test]
    fn test_evaluate_progress() {
        let mut user = User::new("u", "", "", Utc::now());
        user.reports_count = 3;
        user.total_earned = 120;

        let progress = evaluate(&user);
        let first = progress.iter().find(|p| p.id == "first_report").unwrap();
        assert!(first.completed);
        let active = progress.iter().find(|p| p.id == "active_reporter").unwrap();
        assert!(!active.completed);
        assert_eq!(active.percent(), 30);
        let saver = progress.iter().find(|p| p.id == "carbon_saver").unwrap();
        assert!(saver.completed);
        assert_eq!(saver.percent(), 100);
    }

    #[test]
    fn test_award_new_badges_only_once() {
        let mut user = User::new("u", "", "", Utc::now());
        user.reports_count = 10;
        let first = award_new_badges(&mut user);
        assert_eq!(first, vec!["first_report", "active_reporter"]);
        assert!(award_new_badges(&mut user).is_empty());
        assert_eq!(user.badges.len(), 2);
    }

    #[test]
    fn test_report_stats() {
        let reports = vec![
            report(ReportStatus::Pending, WasteType::Plastic, 10),
            report(ReportStatus::Resolved, WasteType::Plastic, 20),
            report(ReportStatus::Verified, WasteType::Hazardous, 35),
            report(ReportStatus::InProgress, WasteType::Organic, 10),
        ];
        let stats = report_stats(&reports);
        assert_eq!(stats.total, 4);
        assert_eq!(stats.by_type.get("plastic"), Some(&2));
        assert_eq!(stats.by_status.get("in-progress"), Some(&1));
        assert_eq!(stats.credits_from_reports, 75);
        assert_eq!(stats.resolution_rate, 50);
    }

    #[test]
    fn test_report_stats_empty() {
        let stats = report_stats(&[]);
        assert_eq!(stats.total, 0);
        assert_eq!(stats.resolution_rate, 0);
    }
}
