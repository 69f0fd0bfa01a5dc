// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Hyve API Server
//!
//! Serves the waste reporting API, refreshes the map overlay in the
//! background and keeps cached sessions in step with the change feed.

use hyve::{
    config::Config,
    db::{changes::Topic, FirestoreDb},
    services::hotspots,
    AppState,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How often idle sessions are swept.
const SESSION_SWEEP_PERIOD: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging();

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(
        port = config.port,
        ai_mode = config.ai_mode.as_str(),
        messaging = config.messaging_api_url.is_some(),
        "Starting Hyve API"
    );

    // Initialize Firestore database
    let db = FirestoreDb::new(&config.gcp_project_id).await?;

    let state = Arc::new(AppState::new(config.clone(), db)?);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Overlay refresh on a fixed period
    let refresh_task = hotspots::spawn_refresh_task(
        state.overlays.clone(),
        state.predictor.clone(),
        config.overlay_refresh,
        shutdown_rx.clone(),
    );
    tracing::info!(
        period_secs = config.overlay_refresh.as_secs(),
        "Overlay refresh started"
    );

    // Fold committed changes into cached sessions and drop idle ones
    let sync_task = {
        let state = state.clone();
        let mut shutdown = shutdown_rx;
        let mut changes = state.db.changes().subscribe(Topic::All);
        let mut sweep = tokio::time::interval(SESSION_SWEEP_PERIOD);
        let session_idle = config.session_idle;
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    change = changes.recv() => match change {
                        Some(change) => {
                            if changes.take_lagged() {
                                // Skipped changes: re-read every cached profile
                                state.store.sessions().mark_profiles_stale();
                            }
                            state.store.apply_change(&change);
                        }
                        None => break,
                    },
                    _ = sweep.tick() => {
                        let evicted = state.store.sessions().evict_idle(session_idle);
                        if evicted > 0 {
                            tracing::debug!(evicted, "Idle sessions dropped");
                        }
                    }
                    _ = shutdown.changed() => break,
                }
            }
            tracing::info!("Session sync task stopped");
        })
    };

    // Build router
    let app = hyve::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped, shutting down background tasks");
    let _ = shutdown_tx.send(true);
    let _ = tokio::join!(refresh_task, sync_task);
    Ok(())
}

/// Ctrl-C, or SIGTERM from Cloud Run.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    for directive in ["hyve=debug", "info"] {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }

    tracing_subscriber::registry()
        .with(filter)
        .with(format)
        .init();
}
