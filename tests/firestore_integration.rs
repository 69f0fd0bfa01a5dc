// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Integration tests against the Firestore emulator.
//!
//! Run with: FIRESTORE_EMULATOR_HOST=localhost:8080 cargo test --test firestore_integration

use std::sync::Arc;

use chrono::{Duration, Utc};
use hyve::db::FirestoreDb;
use hyve::error::AppError;
use hyve::models::group::GroupLocation;
use hyve::models::{
    CommunityChallenge, CommunityEvent, CommunityGroup, Coordinates, Language, Location,
    RedemptionMethod, ReportDraft, ReportPatch, ReportStatus, Rsvp, RsvpStatus, Urgency,
    WasteType,
};
use hyve::services::groups::InboundMessage;
use hyve::services::templates::Intent;
use hyve::services::{lifecycle, GroupService, LogMessenger, MockClassifier};
use hyve::store::StateContainer;
use hyve::time_utils::format_utc_rfc3339;

mod common;
use common::{test_db, unique_id};

fn draft(waste_type: WasteType, urgency: Urgency) -> ReportDraft {
    ReportDraft {
        waste_type,
        location: Location {
            address: "Kibera Drive".to_string(),
            coordinates: Coordinates::new(-1.31, 36.79),
        },
        description: "Pile near the footbridge".to_string(),
        urgency,
        images: vec![],
        classification: None,
        group_id: None,
    }
}

#[tokio::test]
async fn test_profile_created_once() {
    require_emulator!();

    let db = test_db().await;
    let user_id = unique_id("user");

    assert!(db.get_user_profile(&user_id).await.unwrap().is_none());

    let first = db
        .get_or_create_user_profile(&user_id, "Amina", "amina@example.com", Utc::now())
        .await
        .unwrap();
    assert_eq!(first.credits, 0);
    assert!(first.badges.is_empty());

    // A second login keeps the stored profile
    let second = db
        .get_or_create_user_profile(&user_id, "Someone Else", "", Utc::now())
        .await
        .unwrap();
    assert_eq!(second.name, "Amina");
    assert_eq!(second.joined_at, first.joined_at);
}

#[tokio::test]
async fn test_submit_awards_credits_and_ledger() {
    require_emulator!();

    let db = test_db().await;
    let user_id = unique_id("user");
    db.get_or_create_user_profile(&user_id, "Amina", "", Utc::now())
        .await
        .unwrap();

    let report = lifecycle::new_report(
        unique_id("report"),
        &user_id,
        draft(WasteType::Hazardous, Urgency::High),
        Utc::now(),
    );
    let commit = db.submit_report_atomic(&report).await.unwrap();

    assert_eq!(commit.report.credits, 35);
    assert_eq!(commit.user.credits, 35);
    assert_eq!(commit.user.total_earned, 35);
    assert_eq!(commit.user.reports_count, 1);
    assert_eq!(commit.new_badges, vec!["first_report".to_string()]);

    let history = db.credit_history(&user_id, 10).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].amount, 35);
    assert_eq!(history[0].report_id.as_deref(), Some(report.id.as_str()));

    let stored = db.get_report(&report.id).await.unwrap().unwrap();
    assert_eq!(stored.status, ReportStatus::Pending);
}

#[tokio::test]
async fn test_redeem_beyond_balance_rejected() {
    require_emulator!();

    let db = test_db().await;
    let user_id = unique_id("user");
    db.get_or_create_user_profile(&user_id, "Otieno", "", Utc::now())
        .await
        .unwrap();
    let report = lifecycle::new_report(
        unique_id("report"),
        &user_id,
        draft(WasteType::Electronic, Urgency::Low),
        Utc::now(),
    );
    let commit = db.submit_report_atomic(&report).await.unwrap();
    assert_eq!(commit.user.credits, 30);

    let err = db
        .redeem_credits_atomic(&user_id, 50, RedemptionMethod::Cash, Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::InsufficientCredits {
            requested: 50,
            available: 30
        }
    ));

    let user = db.get_user_profile(&user_id).await.unwrap().unwrap();
    assert_eq!(user.credits, 30);

    let (user, receipt) = db
        .redeem_credits_atomic(&user_id, 20, RedemptionMethod::Cash, Utc::now())
        .await
        .unwrap();
    assert_eq!(user.credits, 10);
    assert_eq!(user.total_earned, 30);
    assert_eq!(receipt.amount, 20);
}

#[tokio::test]
async fn test_owner_resolve_counts_verified() {
    require_emulator!();

    let db = test_db().await;
    let user_id = unique_id("user");
    db.get_or_create_user_profile(&user_id, "Wanjiru", "", Utc::now())
        .await
        .unwrap();
    let report = lifecycle::new_report(
        unique_id("report"),
        &user_id,
        draft(WasteType::Plastic, Urgency::Low),
        Utc::now(),
    );
    db.submit_report_atomic(&report).await.unwrap();

    let commit = db
        .transition_report_atomic(&report.id, ReportStatus::Resolved, &user_id, Utc::now())
        .await
        .unwrap();
    assert_eq!(commit.report.status, ReportStatus::Resolved);
    assert!(commit.report.resolved_at.is_some());
    assert_eq!(commit.owner.map(|u| u.verified_reports), Some(1));

    // Moving backwards is refused and leaves the report alone
    let err = db
        .transition_report_atomic(&report.id, ReportStatus::Pending, &user_id, Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition(_)));
    let stored = db.get_report(&report.id).await.unwrap().unwrap();
    assert_eq!(stored.status, ReportStatus::Resolved);
}

#[tokio::test]
async fn test_other_user_resolve_skips_owner() {
    require_emulator!();

    let db = test_db().await;
    let owner_id = unique_id("user");
    db.get_or_create_user_profile(&owner_id, "Owner", "", Utc::now())
        .await
        .unwrap();
    let report = lifecycle::new_report(
        unique_id("report"),
        &owner_id,
        draft(WasteType::Organic, Urgency::Medium),
        Utc::now(),
    );
    db.submit_report_atomic(&report).await.unwrap();

    let commit = db
        .transition_report_atomic(
            &report.id,
            ReportStatus::Resolved,
            &unique_id("collector"),
            Utc::now(),
        )
        .await
        .unwrap();
    assert!(commit.owner.is_none());
    let owner = db.get_user_profile(&owner_id).await.unwrap().unwrap();
    assert_eq!(owner.verified_reports, 0);
}

#[tokio::test]
async fn test_concurrent_submissions_all_counted() {
    require_emulator!();

    let db = test_db().await;
    let user_id = unique_id("user");
    db.get_or_create_user_profile(&user_id, "Busy", "", Utc::now())
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..5 {
        let db = db.clone();
        let user_id = user_id.clone();
        handles.push(tokio::spawn(async move {
            let report = lifecycle::new_report(
                unique_id("report"),
                &user_id,
                draft(WasteType::Plastic, Urgency::Low),
                Utc::now(),
            );
            db.submit_report_atomic(&report).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let user = db.get_user_profile(&user_id).await.unwrap().unwrap();
    assert_eq!(user.reports_count, 5);
    assert_eq!(user.credits, 50);
    assert_eq!(user.total_earned, 50);
}

#[tokio::test]
async fn test_rsvp_respects_capacity() {
    require_emulator!();

    let db = test_db().await;
    let event = CommunityEvent {
        id: unique_id("event"),
        group_id: unique_id("group"),
        title: "River cleanup".to_string(),
        description: String::new(),
        date: format_utc_rfc3339(Utc::now() + Duration::days(3)),
        location: "Nairobi River".to_string(),
        organizer: "admin".to_string(),
        max_participants: Some(1),
        rsvps: vec![],
        reminders_sent: 0,
    };
    db.upsert_event(&event).await.unwrap();

    let rsvp = |phone: &str, status| Rsvp {
        phone: phone.to_string(),
        name: String::new(),
        status,
        timestamp: format_utc_rfc3339(Utc::now()),
    };

    let (_, accepted) = db
        .record_rsvp_atomic(&event.id, rsvp("+254700000001", RsvpStatus::Yes))
        .await
        .unwrap();
    assert!(accepted);

    let (stored, accepted) = db
        .record_rsvp_atomic(&event.id, rsvp("+254700000002", RsvpStatus::Yes))
        .await
        .unwrap();
    assert!(!accepted);
    assert_eq!(stored.rsvps.len(), 1);

    // A "maybe" never counts against capacity
    let (stored, accepted) = db
        .record_rsvp_atomic(&event.id, rsvp("+254700000002", RsvpStatus::Maybe))
        .await
        .unwrap();
    assert!(accepted);
    assert_eq!(stored.rsvps.len(), 2);
}

#[tokio::test]
async fn test_resubmitted_report_credited_once() {
    require_emulator!();

    let db = test_db().await;
    let user_id = unique_id("user");
    db.get_or_create_user_profile(&user_id, "Amina", "", Utc::now())
        .await
        .unwrap();
    let report = lifecycle::new_report(
        unique_id("report"),
        &user_id,
        draft(WasteType::Hazardous, Urgency::High),
        Utc::now(),
    );

    let first = db.submit_report_atomic(&report).await.unwrap();
    assert_eq!(first.user.credits, 35);

    // Same as a retry after a commit that landed but reported failure
    let second = db.submit_report_atomic(&report).await.unwrap();
    assert_eq!(second.report.id, report.id);
    assert_eq!(second.user.credits, 35);
    assert!(second.new_badges.is_empty());

    let user = db.get_user_profile(&user_id).await.unwrap().unwrap();
    assert_eq!(user.credits, 35);
    assert_eq!(user.reports_count, 1);
    assert_eq!(db.credit_history(&user_id, 10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_redeem_sees_writes_from_another_instance() {
    require_emulator!();

    let here = StateContainer::new(test_db().await);
    let elsewhere = test_db().await;
    let user_id = unique_id("user");

    here.load_user_profile(&user_id, Some("Amina"), None)
        .await
        .unwrap();
    let commit = here
        .add_report(&user_id, draft(WasteType::Electronic, Urgency::Low))
        .await
        .unwrap();
    assert_eq!(commit.user.credits, 30);

    // Another instance credits the same user; this one never hears of it
    let report = lifecycle::new_report(
        unique_id("report"),
        &user_id,
        draft(WasteType::Hazardous, Urgency::High),
        Utc::now(),
    );
    elsewhere.submit_report_atomic(&report).await.unwrap();
    assert_eq!(
        here.sessions().snapshot(&user_id).user.unwrap().credits,
        30
    );

    let receipt = here
        .redeem_credits(&user_id, 50, RedemptionMethod::Cash)
        .await
        .unwrap();
    assert_eq!(receipt.remaining_credits, 15);
    assert_eq!(
        here.sessions().snapshot(&user_id).user.unwrap().credits,
        15
    );
}

#[tokio::test]
async fn test_expired_profile_picks_up_other_writes() {
    require_emulator!();

    let here = StateContainer::with_profile_ttl(test_db().await, std::time::Duration::ZERO);
    let elsewhere = test_db().await;
    let user_id = unique_id("user");

    let user = here
        .load_user_profile(&user_id, Some("Baraka"), None)
        .await
        .unwrap();
    assert_eq!(user.credits, 0);

    let report = lifecycle::new_report(
        unique_id("report"),
        &user_id,
        draft(WasteType::Plastic, Urgency::Low),
        Utc::now(),
    );
    elsewhere.submit_report_atomic(&report).await.unwrap();

    let user = here.load_user_profile(&user_id, None, None).await.unwrap();
    assert_eq!(user.credits, 10);
}

#[tokio::test]
async fn test_container_submit_and_resolve() {
    require_emulator!();

    let store = StateContainer::new(test_db().await);
    let user_id = unique_id("user");
    store
        .load_user_profile(&user_id, Some("Wanjiru"), None)
        .await
        .unwrap();
    store.load_reports(&user_id).await.unwrap();

    let older = store
        .add_report(&user_id, draft(WasteType::Plastic, Urgency::Low))
        .await
        .unwrap();
    let commit = store
        .add_report(&user_id, draft(WasteType::Hazardous, Urgency::High))
        .await
        .unwrap();
    assert_eq!(commit.report.credits, 35);

    let session = store.sessions().snapshot(&user_id);
    let ids: Vec<&str> = session.reports.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec![commit.report.id.as_str(), older.report.id.as_str()]);
    let cached = session.user.unwrap();
    assert_eq!(cached.credits, 45);
    assert_eq!(cached.reports_count, 2);

    let resolved = store
        .update_report(
            &user_id,
            &commit.report.id,
            ReportPatch {
                status: ReportStatus::Resolved,
            },
        )
        .await
        .unwrap();
    assert_eq!(resolved.status, ReportStatus::Resolved);

    let session = store.sessions().snapshot(&user_id);
    assert_eq!(session.user.as_ref().unwrap().verified_reports, 1);
    assert_eq!(
        session.find_report(&commit.report.id).map(|r| r.status),
        Some(ReportStatus::Resolved)
    );
}

struct GroupFixture {
    db: FirestoreDb,
    service: GroupService,
    group: CommunityGroup,
}

async fn group_fixture() -> GroupFixture {
    let db = test_db().await;
    let admin_id = unique_id("admin");
    db.get_or_create_user_profile(&admin_id, "Wanjiru", "", Utc::now())
        .await
        .unwrap();
    let joined = format_utc_rfc3339(Utc::now());
    let group = CommunityGroup {
        id: unique_id("group"),
        name: "Kilimani Green".to_string(),
        chat_id: unique_id("chat"),
        admin_user_id: admin_id,
        admin_phone: "+254700000001".to_string(),
        admin_name: "Wanjiru".to_string(),
        member_count: 1,
        total_credits: 0,
        weekly_target: 100,
        language: Language::En,
        location: GroupLocation {
            area: "Kilimani".to_string(),
            coordinates: Coordinates::new(-1.29, 36.78),
        },
        is_active: true,
        joined_at: joined.clone(),
        last_activity: joined,
    };
    db.upsert_group(&group).await.unwrap();
    let service = GroupService::new(
        db.clone(),
        Arc::new(LogMessenger),
        Arc::new(MockClassifier),
    );
    GroupFixture { db, service, group }
}

fn message(chat_id: &str, body: &str) -> InboundMessage {
    InboundMessage {
        chat_id: chat_id.to_string(),
        from: "+254700000002".to_string(),
        sender_name: Some("Otieno".to_string()),
        body: body.to_string(),
        image_url: None,
        coordinates: None,
        address: None,
    }
}

fn upcoming_event(group_id: &str) -> CommunityEvent {
    CommunityEvent {
        id: unique_id("event"),
        group_id: group_id.to_string(),
        title: "River cleanup".to_string(),
        description: String::new(),
        date: format_utc_rfc3339(Utc::now() + Duration::days(2)),
        location: "Nairobi River".to_string(),
        organizer: "Wanjiru".to_string(),
        max_participants: None,
        rsvps: vec![],
        reminders_sent: 0,
    }
}

#[tokio::test]
async fn test_inbound_messages_are_routed() {
    require_emulator!();

    let GroupFixture { db, service, group } = group_fixture().await;
    let chat = group.chat_id.as_str();

    let help = service.handle_inbound(message(chat, "help")).await.unwrap();
    assert_eq!(help.intent, Intent::Help);
    assert!(help.reply.contains("\"challenge\""));

    // A question that mentions waste files nothing
    let question = service
        .handle_inbound(message(chat, "is there waste pickup tomorrow?"))
        .await
        .unwrap();
    assert_eq!(question.intent, Intent::WasteReport);
    assert!(question.report_id.is_none());
    assert!(db
        .list_reports(&hyve::db::firestore::ReportQuery {
            group_id: Some(group.id.clone()),
            limit: 10,
            ..Default::default()
        })
        .await
        .unwrap()
        .is_empty());

    let events = service.handle_inbound(message(chat, "events")).await.unwrap();
    assert_eq!(events.intent, Intent::EventsList);
    assert!(events.reply.contains("No events"));

    // Replies with no open invitation are ordinary chat
    let stray = service
        .handle_inbound(message(chat, "no idea what you mean"))
        .await
        .unwrap();
    assert_eq!(stray.intent, Intent::General);
    let early = service.handle_inbound(message(chat, "yes")).await.unwrap();
    assert_eq!(early.intent, Intent::General);

    let event = upcoming_event(&group.id);
    db.upsert_event(&event).await.unwrap();
    let listed = service.handle_inbound(message(chat, "events")).await.unwrap();
    assert!(listed.reply.contains("River cleanup"));
    let rsvp = service.handle_inbound(message(chat, "Ndio!")).await.unwrap();
    assert_eq!(rsvp.intent, Intent::EventRsvp);
    let stored = db.get_event(&event.id).await.unwrap().unwrap();
    assert_eq!(stored.attending(), 1);

    let credits = service.handle_inbound(message(chat, "credits")).await.unwrap();
    assert_eq!(credits.intent, Intent::CreditsInquiry);
}

#[tokio::test]
async fn test_inbound_photo_classified_and_advances_challenge() {
    require_emulator!();

    let GroupFixture { db, service, group } = group_fixture().await;
    let now = Utc::now();
    let challenge = CommunityChallenge {
        id: unique_id("challenge"),
        group_id: group.id.clone(),
        title: "Ten reports this week".to_string(),
        description: String::new(),
        target: 10,
        unit: "reports".to_string(),
        start_date: format_utc_rfc3339(now - Duration::days(1)),
        end_date: format_utc_rfc3339(now + Duration::days(6)),
        progress: 0,
        reward_credits: 1,
        badges: vec![],
        is_active: true,
    };
    db.upsert_challenge(&challenge).await.unwrap();

    let mut photo = message(&group.chat_id, "");
    photo.image_url = Some("https://img.example.com/pile.jpg".to_string());
    let reply = service.handle_inbound(photo).await.unwrap();
    assert_eq!(reply.intent, Intent::WasteReport);
    assert!(reply.reply.contains("Progress: 1/10 reports"));

    let report_id = reply.report_id.unwrap();
    let report = db.get_report(&report_id).await.unwrap().unwrap();
    assert!(report.classification.is_some());
    assert_eq!(report.group_id.as_deref(), Some(group.id.as_str()));
    assert_eq!(report.user_id, group.admin_user_id);

    let stored_group = db.get_group(&group.id).await.unwrap().unwrap();
    assert_eq!(stored_group.total_credits, report.credits);
    let challenges = db.list_active_challenges(&group.id).await.unwrap();
    assert_eq!(challenges[0].progress, 1);

    let update = service
        .handle_inbound(message(&group.chat_id, "changamoto"))
        .await
        .unwrap();
    assert_eq!(update.intent, Intent::ChallengeUpdate);
    assert!(update.reply.contains("1/10"));
}

#[tokio::test]
async fn test_event_reminders_counted() {
    require_emulator!();

    let GroupFixture { db, service, group } = group_fixture().await;
    let event = upcoming_event(&group.id);
    db.upsert_event(&event).await.unwrap();

    let first = service
        .send_event_reminder(&group.admin_user_id, &group.id, &event.id)
        .await
        .unwrap();
    assert_eq!(first.reminders_sent, 1);
    let second = service
        .send_event_reminder(&group.admin_user_id, &group.id, &event.id)
        .await
        .unwrap();
    assert_eq!(second.reminders_sent, 2);

    let err = service
        .send_event_reminder("someone_else", &group.id, &event.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
}
