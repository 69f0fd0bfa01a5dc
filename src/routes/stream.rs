// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Server-sent events of the change feed.

use crate::db::changes::{Subscription, Topic};
use crate::middleware::auth::AuthUser;
use crate::AppState;
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Extension, Router,
};
use futures_util::stream::{self, Stream};
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/stream", get(stream_changes))
}

/// One SSE event per matching change until the feed closes.
fn change_events(subscription: Subscription) -> impl Stream<Item = Result<Event, axum::Error>> {
    stream::unfold(subscription, |mut subscription| async move {
        let change = subscription.recv().await?;
        let event = Event::default()
            .event(change.event_name())
            .json_data(&change);
        Some((event, subscription))
    })
}

/// Every report event plus the caller's own profile updates.
async fn stream_changes(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    tracing::debug!(user_id = %user.user_id, "Change stream opened");
    let subscription = state
        .db
        .changes()
        .subscribe(Topic::Session(user.user_id.clone()));
    Sse::new(change_events(subscription)).keep_alive(KeepAlive::default())
}
