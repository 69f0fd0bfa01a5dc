// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Hyve: community waste reporting backend
//!
//! Citizens report geotagged waste, earn carbon credits as reports move
//! through their lifecycle, and coordinate cleanups through messaging
//! groups. Reports are classified and hotspots predicted by a pluggable AI
//! backend.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod store;
pub mod time_utils;

use config::{AiMode, Config};
use db::FirestoreDb;
use error::AppError;
use models::Bounds;
use services::{
    AiServiceClient, Classifier, GroupService, HotspotPredictor, HttpMessenger, LogMessenger,
    Messenger, MockClassifier, MockHotspotPredictor, OverlayCache, RemoteClassifier,
    RemoteHotspotPredictor,
};
use std::sync::Arc;
use store::StateContainer;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: FirestoreDb,
    pub store: StateContainer,
    pub classifier: Arc<dyn Classifier>,
    pub predictor: Arc<dyn HotspotPredictor>,
    pub overlays: Arc<OverlayCache>,
    pub groups: GroupService,
}

impl AppState {
    /// Wire services according to `config`.
    pub fn new(config: Config, db: FirestoreDb) -> Result<Self, AppError> {
        let (classifier, predictor): (Arc<dyn Classifier>, Arc<dyn HotspotPredictor>) =
            match (config.ai_mode, config.ai_service_url.as_deref()) {
                (AiMode::Remote, Some(url)) => {
                    let client = AiServiceClient::new(url, config.ai_service_key.clone())
                        .map_err(anyhow::Error::from)?;
                    (
                        Arc::new(RemoteClassifier::new(client.clone())),
                        Arc::new(RemoteHotspotPredictor::new(client)),
                    )
                }
                (AiMode::Remote, None) => {
                    return Err(AppError::Internal(anyhow::anyhow!(
                        "remote AI mode without AI_SERVICE_URL"
                    )))
                }
                (AiMode::Mock, _) => (Arc::new(MockClassifier), Arc::new(MockHotspotPredictor)),
            };

        let messenger: Arc<dyn Messenger> = match config.messaging_api_url.as_deref() {
            Some(url) => Arc::new(HttpMessenger::new(url, config.messaging_api_token.clone())?),
            None => Arc::new(LogMessenger),
        };

        Ok(Self {
            store: StateContainer::with_profile_ttl(db.clone(), config.profile_ttl),
            groups: GroupService::new(db.clone(), messenger, classifier.clone()),
            overlays: Arc::new(OverlayCache::new(Bounds::DEFAULT)),
            classifier,
            predictor,
            config,
            db,
        })
    }
}
