// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Hotspot and pickup prediction, plus the periodically refreshed overlay.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;

use crate::models::overlay::{Driver, PickupStatus};
use crate::models::{Bounds, Hotspot, OverlaySnapshot, Pickup, Urgency, WasteType};
use crate::services::ai_client::{AiServiceClient, AiServiceError};
use crate::time_utils::format_utc_rfc3339;

/// Synthetic hotspots per mock prediction.
pub const MOCK_HOTSPOT_COUNT: usize = 3;

#[async_trait]
pub trait HotspotPredictor: Send + Sync {
    async fn predict_hotspots(&self, bounds: Bounds) -> Result<Vec<Hotspot>, AiServiceError>;
    async fn predict_pickups(&self, bounds: Bounds) -> Result<Vec<Pickup>, AiServiceError>;
}

#[derive(Debug, Default, Clone)]
pub struct MockHotspotPredictor;

impl MockHotspotPredictor {
    pub fn sample_hotspots<R: Rng>(rng: &mut R, bounds: Bounds) -> Vec<Hotspot> {
        let now = Utc::now();
        (0..MOCK_HOTSPOT_COUNT)
            .map(|i| {
                let coordinates = bounds.lerp(rng.gen_range(0.0..=1.0), rng.gen_range(0.0..=1.0));
                let waste_type = *[WasteType::Plastic, WasteType::Organic, WasteType::Electronic]
                    .choose(rng)
                    .unwrap_or(&WasteType::Plastic);
                let severity = *[Urgency::Low, Urgency::Medium, Urgency::High]
                    .choose(rng)
                    .unwrap_or(&Urgency::Medium);
                let ahead = chrono::Duration::minutes(rng.gen_range(0..7 * 24 * 60));
                Hotspot {
                    id: format!("hotspot_{}", i + 1),
                    coordinates,
                    address: format!("Location {}, Nairobi", i + 1),
                    waste_type,
                    probability: rng.gen_range(0.6..=1.0),
                    predicted_date: format_utc_rfc3339(now + ahead),
                    severity,
                    factors: vec![
                        "high_traffic".to_string(),
                        "commercial_area".to_string(),
                        "poor_waste_management".to_string(),
                    ],
                }
            })
            .collect()
    }

    pub fn sample_pickups(bounds: Bounds) -> Vec<Pickup> {
        let now = Utc::now();
        vec![Pickup {
            id: "pickup-001".to_string(),
            report_id: None,
            coordinates: bounds.lerp(0.5, 0.5),
            address: "Yaya Centre Area, Kilimani".to_string(),
            status: PickupStatus::InProgress,
            scheduled_date: format_utc_rfc3339(now),
            estimated_arrival: format_utc_rfc3339(now + chrono::Duration::minutes(30)),
            driver: Driver {
                name: "James Mwangi".to_string(),
                phone: "+254 700 123 456".to_string(),
                vehicle: "KCA 123X".to_string(),
            },
            waste_type: WasteType::Plastic,
            estimated_weight: 15.5,
        }]
    }
}

#[async_trait]
impl HotspotPredictor for MockHotspotPredictor {
    async fn predict_hotspots(&self, bounds: Bounds) -> Result<Vec<Hotspot>, AiServiceError> {
        Ok(Self::sample_hotspots(&mut rand::thread_rng(), bounds))
    }

    async fn predict_pickups(&self, bounds: Bounds) -> Result<Vec<Pickup>, AiServiceError> {
        Ok(Self::sample_pickups(bounds))
    }
}

#[derive(Serialize)]
struct PredictionRequest {
    bounds: Bounds,
}

/// Predictions through `POST {AI_SERVICE_URL}/predictions/...`.
#[derive(Clone)]
pub struct RemoteHotspotPredictor {
    client: AiServiceClient,
}

impl RemoteHotspotPredictor {
    pub fn new(client: AiServiceClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HotspotPredictor for RemoteHotspotPredictor {
    async fn predict_hotspots(&self, bounds: Bounds) -> Result<Vec<Hotspot>, AiServiceError> {
        let hotspots: Vec<Hotspot> = self
            .client
            .post_json("/predictions/hotspots", &PredictionRequest { bounds })
            .await?;
        let total = hotspots.len();
        let inside: Vec<Hotspot> = hotspots
            .into_iter()
            .filter(|h| bounds.contains(h.coordinates))
            .collect();
        if inside.len() < total {
            tracing::warn!(
                dropped = total - inside.len(),
                "Discarding predicted hotspots outside the requested bounds"
            );
        }
        Ok(inside)
    }

    async fn predict_pickups(&self, bounds: Bounds) -> Result<Vec<Pickup>, AiServiceError> {
        self.client
            .post_json("/predictions/pickups", &PredictionRequest { bounds })
            .await
    }
}

/// Latest overlay snapshot shared with handlers.
pub struct OverlayCache {
    bounds: Bounds,
    snapshot: RwLock<OverlaySnapshot>,
}

impl OverlayCache {
    pub fn new(bounds: Bounds) -> Self {
        Self {
            bounds,
            snapshot: RwLock::new(OverlaySnapshot::default()),
        }
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub async fn snapshot(&self) -> OverlaySnapshot {
        self.snapshot.read().await.clone()
    }

    /// Replace the snapshot wholesale. A failed prediction keeps the previous
    /// layer for that half.
    pub async fn refresh(&self, predictor: &dyn HotspotPredictor) {
        let (hotspots, pickups) = tokio::join!(
            predictor.predict_hotspots(self.bounds),
            predictor.predict_pickups(self.bounds)
        );

        let mut snapshot = self.snapshot.write().await;
        match hotspots {
            Ok(hotspots) => snapshot.hotspots = hotspots,
            Err(e) => tracing::warn!(error = %e, "Hotspot prediction failed"),
        }
        match pickups {
            Ok(pickups) => snapshot.pickups = pickups,
            Err(e) => tracing::warn!(error = %e, "Pickup prediction failed"),
        }
        snapshot.refreshed_at = Some(format_utc_rfc3339(Utc::now()));
        tracing::debug!(
            hotspots = snapshot.hotspots.len(),
            pickups = snapshot.pickups.len(),
            "Overlay refreshed"
        );
    }
}

/// Refresh `cache` every `period` until `shutdown` flips to `true` (or its
/// sender is dropped). The first refresh happens immediately.
pub fn spawn_refresh_task(
    cache: Arc<OverlayCache>,
    predictor: Arc<dyn HotspotPredictor>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => cache.refresh(predictor.as_ref()).await,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        tracing::info!("Overlay refresh task stopped");
    })
}
