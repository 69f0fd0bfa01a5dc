// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Messaging-group console: community groups, challenges, events and the
//! inbound message router.
//!
//! Announcements are fire-and-report. A send failure is logged and reported
//! back as `notified: false`; the record is already saved at that point.
//!
//! Reports only come in with a photo. The photo is classified, and a failed
//! classification files the report as "other" with medium urgency.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::db::firestore::ReportQuery;
use crate::db::FirestoreDb;
use crate::error::AppError;
use crate::models::group::{GroupLocation, DEFAULT_WEEKLY_TARGET};
use crate::models::{
    CommunityChallenge, CommunityEvent, CommunityGroup, Coordinates, Language, Location,
    ReportClassification, ReportDraft, Rsvp, RsvpStatus, Urgency, WasteType,
};
use crate::services::classifier::{Classification, Classifier};
use crate::services::lifecycle;
use crate::services::messaging::Messenger;
use crate::services::templates::{self, display_date, Intent, Message};
use crate::time_utils::{format_utc_rfc3339, now, parse_rfc3339};

/// Fraction of a challenge target paid out as reward credits.
pub const CHALLENGE_REWARD_RATE: f64 = 0.1;
pub const DEFAULT_CHALLENGE_DAYS: i64 = 7;
const SUMMARY_WINDOW_DAYS: i64 = 7;
const SUMMARY_REPORT_LIMIT: u32 = 1000;
/// Upcoming events listed in reply to "events"
const EVENTS_LISTED: usize = 5;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewGroup {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(min = 1, max = 200))]
    pub chat_id: String,
    #[validate(length(min = 7, max = 20))]
    pub admin_phone: String,
    #[validate(length(min = 1, max = 100))]
    pub area: String,
    pub coordinates: Option<Coordinates>,
    #[serde(default)]
    pub language: Language,
    pub weekly_target: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewChallenge {
    #[validate(length(min = 1, max = 120))]
    pub title: String,
    #[serde(default)]
    #[validate(length(max = 1000))]
    pub description: String,
    #[validate(range(min = 1))]
    pub target: u32,
    #[validate(length(min = 1, max = 20))]
    pub unit: String,
    #[validate(range(min = 1, max = 90))]
    pub duration_days: Option<i64>,
    #[serde(default)]
    pub badges: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewEvent {
    #[validate(length(min = 1, max = 120))]
    pub title: String,
    #[serde(default)]
    #[validate(length(max = 1000))]
    pub description: String,
    /// RFC3339
    pub date: String,
    #[validate(length(min = 1, max = 200))]
    pub location: String,
    #[validate(range(min = 1))]
    pub max_participants: Option<u32>,
}

/// Message delivered to the webhook by the messaging gateway.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundMessage {
    pub chat_id: String,
    /// Sender phone number
    pub from: String,
    #[serde(default)]
    pub sender_name: Option<String>,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub coordinates: Option<Coordinates>,
    #[serde(default)]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Announced<T> {
    #[serde(flatten)]
    pub item: T,
    pub notified: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RsvpResult {
    pub event: CommunityEvent,
    pub accepted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeeklySummary {
    pub group_id: String,
    pub reports: u32,
    pub credits: u32,
    pub rank: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct InboundReply {
    pub intent: Intent,
    pub reply: String,
    pub report_id: Option<String>,
}

pub fn challenge_reward(target: u32) -> u32 {
    (f64::from(target) * CHALLENGE_REWARD_RATE).floor() as u32
}

fn ensure_admin(group: &CommunityGroup, user_id: &str) -> Result<(), AppError> {
    if group.admin_user_id == user_id {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "Only the admin of group {} can do that",
            group.id
        )))
    }
}

#[derive(Clone)]
pub struct GroupService {
    db: FirestoreDb,
    messenger: Arc<dyn Messenger>,
    classifier: Arc<dyn Classifier>,
}

impl GroupService {
    pub fn new(
        db: FirestoreDb,
        messenger: Arc<dyn Messenger>,
        classifier: Arc<dyn Classifier>,
    ) -> Self {
        Self {
            db,
            messenger,
            classifier,
        }
    }

    async fn notify(&self, to: &str, body: &str) -> bool {
        match self.messenger.send(to, body).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(to, error = %e, "Group notification failed");
                false
            }
        }
    }

    async fn admin_group(&self, group_id: &str, user_id: &str) -> Result<CommunityGroup, AppError> {
        let group = self
            .db
            .get_group(group_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Community group {}", group_id)))?;
        ensure_admin(&group, user_id)?;
        Ok(group)
    }

    pub async fn list_groups(&self, admin_user_id: &str) -> Result<Vec<CommunityGroup>, AppError> {
        self.db.list_groups_for_admin(admin_user_id).await
    }

    /// Save a group and welcome its admin.
    pub async fn register_group(
        &self,
        admin_user_id: &str,
        admin_name: &str,
        input: NewGroup,
    ) -> Result<Announced<CommunityGroup>, AppError> {
        input.validate()?;
        if let Some(existing) = self.db.find_group_by_chat(&input.chat_id).await? {
            return Err(AppError::BadRequest(format!(
                "Chat is already registered as group {}",
                existing.id
            )));
        }

        let joined = format_utc_rfc3339(now());
        let group = CommunityGroup {
            id: uuid::Uuid::new_v4().to_string(),
            name: input.name,
            chat_id: input.chat_id,
            admin_user_id: admin_user_id.to_string(),
            admin_phone: input.admin_phone,
            admin_name: admin_name.to_string(),
            member_count: 1,
            total_credits: 0,
            weekly_target: input.weekly_target.unwrap_or(DEFAULT_WEEKLY_TARGET),
            language: input.language,
            location: GroupLocation {
                area: input.area,
                coordinates: input.coordinates.unwrap_or(Coordinates::DEFAULT),
            },
            is_active: true,
            joined_at: joined.clone(),
            last_activity: joined,
        };
        self.db.upsert_group(&group).await?;
        tracing::info!(group_id = %group.id, admin_user_id, "Community group registered");

        let welcome = templates::render(
            &Message::Welcome {
                group_name: &group.name,
            },
            group.language,
        );
        let notified = self.notify(&group.admin_phone, &welcome).await;
        Ok(Announced {
            item: group,
            notified,
        })
    }

    pub async fn create_challenge(
        &self,
        user_id: &str,
        group_id: &str,
        input: NewChallenge,
    ) -> Result<Announced<CommunityChallenge>, AppError> {
        input.validate()?;
        let group = self.admin_group(group_id, user_id).await?;

        let start = now();
        let end = start
            + chrono::Duration::days(input.duration_days.unwrap_or(DEFAULT_CHALLENGE_DAYS));
        let challenge = CommunityChallenge {
            id: uuid::Uuid::new_v4().to_string(),
            group_id: group.id.clone(),
            title: input.title,
            description: input.description,
            target: input.target,
            unit: input.unit,
            start_date: format_utc_rfc3339(start),
            end_date: format_utc_rfc3339(end),
            progress: 0,
            reward_credits: challenge_reward(input.target),
            badges: input.badges,
            is_active: true,
        };
        self.db.upsert_challenge(&challenge).await?;

        let deadline = display_date(end);
        let body = templates::render(
            &Message::ChallengeAnnouncement {
                title: &challenge.title,
                target: challenge.target,
                unit: &challenge.unit,
                deadline: &deadline,
                credits: challenge.reward_credits,
            },
            group.language,
        );
        let notified = self.notify(&group.chat_id, &body).await;
        Ok(Announced {
            item: challenge,
            notified,
        })
    }

    pub async fn list_challenges(
        &self,
        user_id: &str,
        group_id: &str,
    ) -> Result<Vec<CommunityChallenge>, AppError> {
        let group = self.admin_group(group_id, user_id).await?;
        self.db.list_active_challenges(&group.id).await
    }

    pub async fn create_event(
        &self,
        user_id: &str,
        group_id: &str,
        input: NewEvent,
    ) -> Result<Announced<CommunityEvent>, AppError> {
        input.validate()?;
        let date = parse_rfc3339(&input.date)
            .ok_or_else(|| AppError::BadRequest(format!("Invalid event date: {}", input.date)))?;
        if date <= now() {
            return Err(AppError::BadRequest(
                "Event date must be in the future".to_string(),
            ));
        }
        let group = self.admin_group(group_id, user_id).await?;

        let event = CommunityEvent {
            id: uuid::Uuid::new_v4().to_string(),
            group_id: group.id.clone(),
            title: input.title,
            description: input.description,
            date: format_utc_rfc3339(date),
            location: input.location,
            organizer: group.admin_name.clone(),
            max_participants: input.max_participants,
            rsvps: Vec::new(),
            reminders_sent: 0,
        };
        self.db.upsert_event(&event).await?;

        let shown = display_date(date);
        let body = templates::render(
            &Message::EventInvitation {
                title: &event.title,
                location: &event.location,
                date: &shown,
            },
            group.language,
        );
        let notified = self.notify(&group.chat_id, &body).await;
        Ok(Announced {
            item: event,
            notified,
        })
    }

    pub async fn record_rsvp(
        &self,
        event_id: &str,
        phone: &str,
        name: &str,
        status: RsvpStatus,
    ) -> Result<RsvpResult, AppError> {
        let rsvp = Rsvp {
            phone: phone.to_string(),
            name: name.to_string(),
            status,
            timestamp: format_utc_rfc3339(now()),
        };
        let (event, accepted) = self.db.record_rsvp_atomic(event_id, rsvp).await?;
        Ok(RsvpResult { event, accepted })
    }

    /// Remind the group chat of an upcoming event and count the reminder.
    ///
    /// As with the weekly summary, a failed send is an error.
    pub async fn send_event_reminder(
        &self,
        user_id: &str,
        group_id: &str,
        event_id: &str,
    ) -> Result<CommunityEvent, AppError> {
        let group = self.admin_group(group_id, user_id).await?;
        let event = self
            .db
            .get_event(event_id)
            .await?
            .filter(|e| e.group_id == group.id)
            .ok_or_else(|| AppError::NotFound(format!("Event {}", event_id)))?;
        let date = parse_rfc3339(&event.date)
            .filter(|d| *d > now())
            .ok_or_else(|| AppError::BadRequest("Event has already taken place".to_string()))?;

        let shown = display_date(date);
        let body = templates::render(
            &Message::EventReminder {
                title: &event.title,
                date: &shown,
                location: &event.location,
                confirmed: event.attending(),
            },
            group.language,
        );
        self.messenger.send(&group.chat_id, &body).await?;
        let event = self.db.count_reminder_atomic(&event.id).await?;
        tracing::info!(
            group_id = %group.id,
            event_id = %event.id,
            reminders_sent = event.reminders_sent,
            "Event reminder sent"
        );
        Ok(event)
    }

    /// Reports and credits from the last seven days, sent to the group chat.
    ///
    /// Unlike announcements, a failed send is an error here.
    pub async fn send_weekly_summary(
        &self,
        user_id: &str,
        group_id: &str,
    ) -> Result<WeeklySummary, AppError> {
        let group = self.admin_group(group_id, user_id).await?;
        let summary = self.weekly_summary(&group).await?;
        let body = render_summary(&group, &summary);
        self.messenger.send(&group.chat_id, &body).await?;
        tracing::info!(group_id = %group.id, reports = summary.reports, "Weekly summary sent");
        Ok(summary)
    }

    async fn weekly_summary(&self, group: &CommunityGroup) -> Result<WeeklySummary, AppError> {
        let since = now() - chrono::Duration::days(SUMMARY_WINDOW_DAYS);
        let reports = self
            .db
            .list_reports(&ReportQuery {
                group_id: Some(group.id.clone()),
                since: Some(format_utc_rfc3339(since)),
                limit: SUMMARY_REPORT_LIMIT,
                ..Default::default()
            })
            .await?;
        Ok(WeeklySummary {
            group_id: group.id.clone(),
            reports: reports.len() as u32,
            credits: reports.iter().map(|r| r.credits).sum(),
            rank: self.db.group_rank(group.total_credits).await?,
        })
    }

    /// Route an inbound chat message by intent and send the reply.
    pub async fn handle_inbound(&self, message: InboundMessage) -> Result<InboundReply, AppError> {
        let group = self
            .db
            .find_group_by_chat(&message.chat_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Group for chat {}", message.chat_id)))?;
        let mut intent = templates::classify_intent(&message.body, message.image_url.is_some());
        tracing::info!(group_id = %group.id, ?intent, "Inbound group message");

        let mut report_id = None;
        let reply = match intent {
            Intent::WasteReport => match message.image_url.as_deref() {
                Some(image_url) => {
                    let (id, reply) = self.inbound_report(&group, &message, image_url).await?;
                    report_id = Some(id);
                    reply
                }
                None => templates::render(&Message::PhotoRequest, group.language),
            },
            Intent::CreditsInquiry => templates::render(
                &Message::CreditsReply {
                    group_name: &group.name,
                    total_credits: group.total_credits,
                    weekly_target: group.weekly_target,
                },
                group.language,
            ),
            Intent::ChallengeUpdate => self.challenge_update(&group).await?,
            Intent::EventsList => self.events_list(&group).await?,
            Intent::EventRsvp => match self.inbound_rsvp(&group, &message).await? {
                Some(reply) => reply,
                None => {
                    // Nothing to reply to
                    intent = Intent::General;
                    templates::render(&Message::GeneralReply, group.language)
                }
            },
            Intent::SummaryRequest => {
                let summary = self.weekly_summary(&group).await?;
                render_summary(&group, &summary)
            }
            Intent::Help => templates::render(&Message::HelpMenu, group.language),
            Intent::General => templates::render(&Message::GeneralReply, group.language),
        };

        self.notify(&group.chat_id, &reply).await;
        Ok(InboundReply {
            intent,
            reply,
            report_id,
        })
    }

    /// Classify the photo, commit the report and confirm it, with progress
    /// on any challenge it advanced.
    async fn inbound_report(
        &self,
        group: &CommunityGroup,
        message: &InboundMessage,
        image_url: &str,
    ) -> Result<(String, String), AppError> {
        let classification = match self.classifier.classify(image_url, message.coordinates).await {
            Ok(classification) => Some(classification),
            Err(e) => {
                tracing::warn!(group_id = %group.id, error = %e, "Inbound photo not classified");
                None
            }
        };
        let draft = inbound_draft(group, message, classification.as_ref());
        let report = lifecycle::new_report(
            uuid::Uuid::new_v4().to_string(),
            &group.admin_user_id,
            draft,
            now(),
        );
        let commit = self.db.submit_report_atomic(&report).await?;
        let total = commit
            .group
            .as_ref()
            .map_or(group.total_credits, |g| g.total_credits);

        let mut reply = templates::render(
            &Message::ReportConfirmed {
                waste_type: commit.report.waste_type.as_str(),
                credits: commit.report.credits,
                total_credits: total,
            },
            group.language,
        );
        for challenge in &commit.challenges {
            reply.push_str("\n\n");
            reply.push_str(&templates::render(
                &Message::ChallengeProgress { challenge },
                group.language,
            ));
        }
        Ok((commit.report.id, reply))
    }

    async fn challenge_update(&self, group: &CommunityGroup) -> Result<String, AppError> {
        let at = format_utc_rfc3339(now());
        let challenges: Vec<CommunityChallenge> = self
            .db
            .list_active_challenges(&group.id)
            .await?
            .into_iter()
            .filter(|c| c.is_open_at(&at))
            .collect();
        if challenges.is_empty() {
            return Ok(templates::render(&Message::NoActiveChallenge, group.language));
        }
        let parts: Vec<String> = challenges
            .iter()
            .map(|challenge| {
                templates::render(&Message::ChallengeProgress { challenge }, group.language)
            })
            .collect();
        Ok(parts.join("\n\n"))
    }

    async fn events_list(&self, group: &CommunityGroup) -> Result<String, AppError> {
        let mut upcoming = self
            .db
            .list_upcoming_events(&group.id, &format_utc_rfc3339(now()))
            .await?;
        if upcoming.is_empty() {
            return Ok(templates::render(&Message::NoUpcomingEvents, group.language));
        }
        upcoming.truncate(EVENTS_LISTED);
        Ok(templates::render(
            &Message::UpcomingEvents { events: &upcoming },
            group.language,
        ))
    }

    /// Record a reply against the next event. `None` when no event is open.
    async fn inbound_rsvp(
        &self,
        group: &CommunityGroup,
        message: &InboundMessage,
    ) -> Result<Option<String>, AppError> {
        let upcoming = self
            .db
            .list_upcoming_events(&group.id, &format_utc_rfc3339(now()))
            .await?;
        let Some(event) = upcoming.first() else {
            return Ok(None);
        };

        let status = templates::rsvp_status(&message.body);
        let name = message.sender_name.as_deref().unwrap_or_default();
        let result = self
            .record_rsvp(&event.id, &message.from, name, status)
            .await?;
        let reply = if result.accepted {
            Message::RsvpConfirmed { status }
        } else {
            Message::RsvpRejected
        };
        Ok(Some(templates::render(&reply, group.language)))
    }
}

fn render_summary(group: &CommunityGroup, summary: &WeeklySummary) -> String {
    templates::render(
        &Message::WeeklySummary {
            group_name: &group.name,
            reports: summary.reports,
            credits: summary.credits,
            rank: summary.rank,
        },
        group.language,
    )
}

/// Draft for a report arriving through a group chat. Without a location in
/// the message the group's own location is used.
fn inbound_draft(
    group: &CommunityGroup,
    message: &InboundMessage,
    classification: Option<&Classification>,
) -> ReportDraft {
    let coordinates = message
        .coordinates
        .filter(|c| (-90.0..=90.0).contains(&c.lat) && (-180.0..=180.0).contains(&c.lng))
        .unwrap_or(group.location.coordinates);
    ReportDraft {
        waste_type: classification.map_or(WasteType::Other, |c| c.waste_type),
        location: Location {
            address: message
                .address
                .clone()
                .unwrap_or_else(|| group.location.area.clone()),
            coordinates,
        },
        description: message.body.trim().to_string(),
        urgency: classification.map_or(Urgency::Medium, |c| c.urgency),
        images: message.image_url.iter().cloned().collect(),
        classification: classification.map(|c| ReportClassification {
            waste_type: c.waste_type,
            confidence: c.confidence,
            estimated_weight: c.estimated_weight,
            disposal_method: c.disposal_method.clone(),
        }),
        group_id: Some(group.id.clone()),
    }
}
