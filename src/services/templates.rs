// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Localized group messages and inbound intent detection.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{CommunityChallenge, CommunityEvent, Language, RsvpStatus};
use crate::time_utils::parse_rfc3339;

/// Outbound message with its parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum Message<'a> {
    Welcome {
        group_name: &'a str,
    },
    ReportConfirmed {
        waste_type: &'a str,
        credits: u32,
        total_credits: u32,
    },
    WeeklySummary {
        group_name: &'a str,
        reports: u32,
        credits: u32,
        rank: u32,
    },
    ChallengeAnnouncement {
        title: &'a str,
        target: u32,
        unit: &'a str,
        deadline: &'a str,
        credits: u32,
    },
    EventInvitation {
        title: &'a str,
        location: &'a str,
        date: &'a str,
    },
    HelpMenu,
    GeneralReply,
    CreditsReply {
        group_name: &'a str,
        total_credits: u32,
        weekly_target: u32,
    },
    RsvpConfirmed {
        status: RsvpStatus,
    },
    RsvpRejected,
    /// A text-only waste mention; reports need a photo
    PhotoRequest,
    ChallengeProgress {
        challenge: &'a CommunityChallenge,
    },
    NoActiveChallenge,
    UpcomingEvents {
        events: &'a [CommunityEvent],
    },
    NoUpcomingEvents,
    EventReminder {
        title: &'a str,
        date: &'a str,
        location: &'a str,
        confirmed: u32,
    },
}

pub fn display_date(date: DateTime<Utc>) -> String {
    date.format("%Y-%m-%d %H:%M UTC").to_string()
}

fn event_line(event: &CommunityEvent) -> String {
    let date = parse_rfc3339(&event.date).map_or_else(|| event.date.clone(), display_date);
    format!(
        "• {} - {} ({}, {} going)",
        event.title,
        date,
        event.location,
        event.attending()
    )
}

pub fn render(message: &Message<'_>, language: Language) -> String {
    use Language::*;
    match (message, language) {
        (Message::Welcome { group_name }, En) => format!(
            "🌱 Welcome to Hyve, {group_name}! Your community is now connected to our waste management platform. Send \"help\" for commands."
        ),
        (Message::Welcome { group_name }, Sw) => format!(
            "🌱 Karibu Hyve, {group_name}! Jumuiya yenu sasa imeunganishwa na mfumo wetu wa usimamizi wa taka. Tuma \"msaada\" kwa maagizo."
        ),
        (Message::Welcome { group_name }, Mixed) => format!(
            "🌱 Welcome to Hyve, {group_name}! Jumuiya yenu is now connected. Send \"help\" au \"msaada\" for commands."
        ),

        (Message::ReportConfirmed { waste_type, credits, total_credits }, En) => format!(
            "✅ Waste report received! Type: {waste_type}, Credits: +{credits}. Your group total: {total_credits} credits."
        ),
        (Message::ReportConfirmed { waste_type, credits, total_credits }, Sw) => format!(
            "✅ Ripoti ya taka imepokewa! Aina: {waste_type}, Pointi: +{credits}. Jumla ya kikundi: {total_credits} pointi."
        ),
        (Message::ReportConfirmed { waste_type, credits, total_credits }, Mixed) => format!(
            "✅ Report received! Aina: {waste_type}, Credits: +{credits}. Group total: {total_credits} credits."
        ),

        (Message::WeeklySummary { group_name, reports, credits, rank }, En) => format!(
            "📊 Weekly Summary for {group_name}:\nReports: {reports}\nCredits earned: +{credits}\nRank: #{rank}\n\nKeep up the great work! 🌱"
        ),
        (Message::WeeklySummary { group_name, reports, credits, rank }, Sw) => format!(
            "📊 Muhtasari wa Wiki kwa {group_name}:\nRipoti: {reports}\nPointi zilizopata: +{credits}\nNafasi: #{rank}\n\nEndelezeni kazi nzuri! 🌱"
        ),
        (Message::WeeklySummary { group_name, reports, credits, rank }, Mixed) => format!(
            "📊 Weekly Summary ya {group_name}:\nReports: {reports}\nCredits earned: +{credits}\nRank: #{rank}\n\nKeep up the good work! 🌱"
        ),

        (Message::ChallengeAnnouncement { title, target, unit, deadline, credits }, En) => format!(
            "🎯 NEW CHALLENGE: {title}\nGoal: {target} {unit}\nDeadline: {deadline}\nReward: {credits} credits\n\nLet's do this together!"
        ),
        (Message::ChallengeAnnouncement { title, target, unit, deadline, credits }, Sw) => format!(
            "🎯 CHANGAMOTO MPYA: {title}\nLengo: {target} {unit}\nMuda: {deadline}\nTuzo: {credits} pointi\n\nTufanye hii pamoja!"
        ),
        (Message::ChallengeAnnouncement { title, target, unit, deadline, credits }, Mixed) => format!(
            "🎯 NEW CHALLENGE: {title}\nTarget: {target} {unit}\nDeadline: {deadline}\nReward: {credits} credits\n\nLet's do this pamoja!"
        ),

        (Message::EventInvitation { title, location, date }, En) => format!(
            "📅 EVENT INVITATION\n{title}\nLocation: {location}\nDate: {date}\n\nReply \"YES\" to join, \"NO\" to decline. See you there!"
        ),
        (Message::EventInvitation { title, location, date }, Sw) => format!(
            "📅 MWALIKO WA HAFLA\n{title}\nMahali: {location}\nTarehe: {date}\n\nJibu \"NDIO\" kujiunga, \"HAPANA\" kukataa. Tutaonana!"
        ),
        (Message::EventInvitation { title, location, date }, Mixed) => format!(
            "📅 EVENT INVITATION\n{title}\nLocation: {location}\nDate: {date}\n\nReply \"YES\" au \"NDIO\" to join. Tutaonana!"
        ),

        (Message::HelpMenu, En) => "🆘 HYVE HELP MENU\n\n📸 Send photo + location to report waste\n💰 \"credits\" - Check your credits\n🏆 \"challenge\" - Current challenges\n📅 \"events\" - Upcoming events\n📊 \"summary\" - Weekly summary\n\nNeed more help? Contact support.".to_string(),
        (Message::HelpMenu, Sw) => "🆘 MENYU YA MSAADA\n\n📸 Tuma picha + mahali kuripoti taka\n💰 \"pointi\" - Angalia pointi zako\n🏆 \"changamoto\" - Changamoto za sasa\n📅 \"hafla\" - Hafla zinazokuja\n📊 \"muhtasari\" - Muhtasari wa wiki\n\nUnahitaji msaada zaidi? Wasiliana na msaada.".to_string(),
        (Message::HelpMenu, Mixed) => "🆘 HELP MENU\n\n📸 Send photo + location kuripoti waste\n💰 \"credits\" - Check pointi zako\n🏆 \"challenge\" - Current changamoto\n📅 \"events\" - Upcoming hafla\n📊 \"summary\" - Weekly muhtasari\n\nNeed more msaada? Contact support.".to_string(),

        (Message::GeneralReply, Sw) => "Asante kwa ujumbe wako! Tuma \"msaada\" kwa maagizo au picha ya taka kuripoti.".to_string(),
        (Message::GeneralReply, En | Mixed) => "Thanks for your message! Send \"help\" for commands or a photo of waste to report.".to_string(),

        (Message::CreditsReply { group_name, total_credits, weekly_target }, Sw) => format!(
            "💰 {group_name} ina pointi {total_credits}. Lengo la wiki: {weekly_target}."
        ),
        (Message::CreditsReply { group_name, total_credits, weekly_target }, En | Mixed) => format!(
            "💰 {group_name} has {total_credits} credits. Weekly target: {weekly_target}."
        ),

        (Message::RsvpConfirmed { status }, Sw) => format!(
            "✅ RSVP yako imepokewa: {}",
            match status {
                RsvpStatus::Yes => "Utahudhuria",
                RsvpStatus::No => "Hutahudhuria",
                RsvpStatus::Maybe => "Bado hujaamua",
            }
        ),
        (Message::RsvpConfirmed { status }, En | Mixed) => format!(
            "✅ RSVP received: {}",
            match status {
                RsvpStatus::Yes => "You will attend",
                RsvpStatus::No => "You will not attend",
                RsvpStatus::Maybe => "Maybe attending",
            }
        ),

        (Message::RsvpRejected, Sw) => "Samahani, hakuna hafla wazi au nafasi zimejaa.".to_string(),
        (Message::RsvpRejected, En | Mixed) => "Sorry, there is no open event or it is already full.".to_string(),

        (Message::PhotoRequest, En) => "📸 To report waste, send a photo with your location.".to_string(),
        (Message::PhotoRequest, Sw) => "📸 Kuripoti taka, tuma picha pamoja na mahali ulipo.".to_string(),
        (Message::PhotoRequest, Mixed) => "📸 Kuripoti waste, send a photo na location yako.".to_string(),

        (Message::ChallengeProgress { challenge }, Sw) => format!(
            "🎯 {}\n📊 Maendeleo: {}/{} {} ({}%)\n\n{}",
            challenge.title,
            challenge.progress,
            challenge.target,
            challenge.unit,
            challenge.percent(),
            if challenge.is_complete() { "🎉 Hongera! Mmefanikiwa!" } else { "Endelezeni!" }
        ),
        (Message::ChallengeProgress { challenge }, En | Mixed) => format!(
            "🎯 {}\n📊 Progress: {}/{} {} ({}%)\n\n{}",
            challenge.title,
            challenge.progress,
            challenge.target,
            challenge.unit,
            challenge.percent(),
            if challenge.is_complete() { "🎉 Congratulations! Challenge completed!" } else { "Keep going!" }
        ),

        (Message::NoActiveChallenge, Sw) => "Hakuna changamoto inayoendelea kwa sasa.".to_string(),
        (Message::NoActiveChallenge, En | Mixed) => "There is no active challenge right now.".to_string(),

        (Message::UpcomingEvents { events }, lang) => {
            let header = match lang {
                Sw => "📅 Hafla zinazokuja:",
                En | Mixed => "📅 Upcoming events:",
            };
            let footer = match lang {
                En => "Reply \"YES\" to join the next one.",
                Sw => "Jibu \"NDIO\" kujiunga na inayofuata.",
                Mixed => "Reply \"YES\" au \"NDIO\" to join the next one.",
            };
            let lines: Vec<String> = events.iter().map(event_line).collect();
            format!("{header}\n{}\n\n{footer}", lines.join("\n"))
        }

        (Message::NoUpcomingEvents, Sw) => "Hakuna hafla zilizopangwa kwa sasa.".to_string(),
        (Message::NoUpcomingEvents, En | Mixed) => "No events are scheduled right now.".to_string(),

        (Message::EventReminder { title, date, location, confirmed }, En) => format!(
            "📅 EVENT REMINDER: {title}\n\n🕐 {date}\n📍 Location: {location}\n👥 {confirmed} people confirmed\n\nDon't forget to bring:\n• Gloves and bags\n• Water bottle\n• Positive energy!\n\nSee you there! 🤝"
        ),
        (Message::EventReminder { title, date, location, confirmed }, Sw) => format!(
            "📅 UKUMBUSHO WA HAFLA: {title}\n\n🕐 {date}\n📍 Mahali: {location}\n👥 Watu {confirmed} wamethibitisha\n\nUsisahau kuleta:\n• Glavu na mifuko\n• Chupa ya maji\n• Nguvu nzuri!\n\nTutaonana! 🤝"
        ),
        (Message::EventReminder { title, date, location, confirmed }, Mixed) => format!(
            "📅 EVENT REMINDER: {title}\n\n🕐 {date}\n📍 Location: {location}\n👥 {confirmed} people confirmed\n\nDon't forget kuleta:\n• Gloves na bags\n• Water bottle\n• Positive energy!\n\nTutaonana! 🤝"
        ),
    }
}

/// What an inbound group message is asking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    WasteReport,
    CreditsInquiry,
    ChallengeUpdate,
    EventsList,
    /// A reply to an event invitation
    EventRsvp,
    SummaryRequest,
    Help,
    General,
}

const REPORT_WORDS: &[&str] = &["waste", "trash", "garbage", "taka", "uchafu"];
const CREDIT_WORDS: &[&str] = &["credit", "credits", "points", "score", "pointi"];
const CHALLENGE_WORDS: &[&str] = &["challenge", "challenges", "changamoto"];
const EVENT_WORDS: &[&str] = &["event", "events", "cleanup", "hafla"];
const SUMMARY_WORDS: &[&str] = &["summary", "muhtasari"];
const HELP_WORDS: &[&str] = &["help", "msaada"];
const REPLY_WORDS: &[&str] = &["yes", "no", "maybe", "ndio", "sawa", "hapana", "labda"];
/// Longest message still read as a bare invitation reply
const MAX_REPLY_WORDS: usize = 4;

fn words(body: &str) -> impl Iterator<Item = String> + '_ {
    body.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
}

fn mentions(body: &str, vocabulary: &[&str]) -> bool {
    words(body).any(|w| vocabulary.contains(&w.as_str()))
}

/// A short message opening with yes/no/maybe, or one naming "rsvp".
fn is_reply(body: &str) -> bool {
    let words: Vec<String> = words(body).collect();
    if words.iter().any(|w| w == "rsvp") {
        return true;
    }
    words.len() <= MAX_REPLY_WORDS
        && words
            .first()
            .is_some_and(|w| REPLY_WORDS.contains(&w.as_str()))
}

/// Keyword intent routing. Checked in order: report, credits, challenge,
/// events, summary, help, then invitation replies.
/// A message carrying an image is always a report.
///
/// `EventRsvp` only says the text reads as a reply; whether an invitation
/// is open is for the caller to decide.
pub fn classify_intent(body: &str, has_image: bool) -> Intent {
    if has_image || mentions(body, REPORT_WORDS) {
        Intent::WasteReport
    } else if mentions(body, CREDIT_WORDS) {
        Intent::CreditsInquiry
    } else if mentions(body, CHALLENGE_WORDS) {
        Intent::ChallengeUpdate
    } else if mentions(body, EVENT_WORDS) {
        Intent::EventsList
    } else if mentions(body, SUMMARY_WORDS) {
        Intent::SummaryRequest
    } else if mentions(body, HELP_WORDS) {
        Intent::Help
    } else if is_reply(body) {
        Intent::EventRsvp
    } else {
        Intent::General
    }
}

/// RSVP reply in any supported language; anything unclear is "maybe".
pub fn rsvp_status(body: &str) -> RsvpStatus {
    let mut status = RsvpStatus::Maybe;
    for w in words(body) {
        match w.as_str() {
            "yes" | "ndio" | "sawa" => return RsvpStatus::Yes,
            "no" | "hapana" => status = RsvpStatus::No,
            _ => {}
        }
    }
    status
}
