// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Map view: per-session filters, visible reports and overlay layers.

use crate::db::firestore::ReportQuery;
use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{Bounds, Hotspot, MapFilters, MapFiltersPatch, Pickup, WasteReport};
use crate::time_utils::format_utc_rfc3339;
use crate::AppState;
use axum::{
    extract::{Query, State},
    routing::get,
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Visible reports returned per map request.
const MAP_REPORT_LIMIT: usize = 500;
/// Reports fetched per page while scanning, newest first.
const MAP_PAGE_SIZE: u32 = 250;
/// Pages scanned before older reports are given up on.
const MAP_SCAN_PAGES: usize = 40;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/map/filters", get(get_filters).put(put_filters))
        .route("/api/map/reports", get(map_reports))
        .route("/api/map/overlays", get(overlays))
}

async fn get_filters(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Json<MapFilters> {
    Json(state.store.map_filters(&user.user_id))
}

async fn put_filters(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(patch): Json<MapFiltersPatch>,
) -> Json<MapFilters> {
    Json(state.store.set_map_filters(&user.user_id, &patch))
}

/// Optional bounding box; all four edges or none.
#[derive(Deserialize, Default)]
struct BoundsQuery {
    north: Option<f64>,
    south: Option<f64>,
    east: Option<f64>,
    west: Option<f64>,
}

impl BoundsQuery {
    fn resolve(&self, fallback: Bounds) -> Result<Bounds> {
        match (self.north, self.south, self.east, self.west) {
            (None, None, None, None) => Ok(fallback),
            (Some(north), Some(south), Some(east), Some(west)) => {
                let bounds = Bounds {
                    north,
                    south,
                    east,
                    west,
                };
                if bounds.is_valid() {
                    Ok(bounds)
                } else {
                    Err(AppError::BadRequest("Invalid map bounds".to_string()))
                }
            }
            _ => Err(AppError::BadRequest(
                "Bounds need north, south, east and west".to_string(),
            )),
        }
    }
}

fn visible_reports(
    reports: Vec<WasteReport>,
    bounds: Bounds,
    filters: &MapFilters,
) -> Vec<WasteReport> {
    reports
        .into_iter()
        .filter(|r| bounds.contains(r.location.coordinates) && filters.admits(r))
        .collect()
}

/// Walk report pages newest first, keeping those inside `bounds`, until
/// enough are found or the reports run out.
///
/// `fetch_page` gets the `created_at` cursor of the previous page.
async fn scan_visible<F, Fut>(
    mut fetch_page: F,
    bounds: Bounds,
    filters: &MapFilters,
) -> Result<Vec<WasteReport>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Vec<WasteReport>>>,
{
    let mut visible = Vec::new();
    let mut before = None;
    for _ in 0..MAP_SCAN_PAGES {
        let page = fetch_page(before.take()).await?;
        let exhausted = page.len() < MAP_PAGE_SIZE as usize;
        before = page.last().map(|r| format_utc_rfc3339(r.created_at));
        visible.extend(visible_reports(page, bounds, filters));
        if visible.len() >= MAP_REPORT_LIMIT {
            visible.truncate(MAP_REPORT_LIMIT);
            return Ok(visible);
        }
        if exhausted || before.is_none() {
            return Ok(visible);
        }
    }
    tracing::warn!(
        pages = MAP_SCAN_PAGES,
        found = visible.len(),
        "Map scan stopped before the oldest report"
    );
    Ok(visible)
}

async fn map_reports(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<BoundsQuery>,
) -> Result<Json<Vec<WasteReport>>> {
    let bounds = params.resolve(state.overlays.bounds())?;
    let filters = state.store.map_filters(&user.user_id);
    let store = &state.store;
    let reports = scan_visible(
        |before| async move {
            store
                .list_reports(&ReportQuery {
                    before,
                    limit: MAP_PAGE_SIZE,
                    ..Default::default()
                })
                .await
        },
        bounds,
        &filters,
    )
    .await?;
    Ok(Json(reports))
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct OverlaysResponse {
    pub hotspots: Vec<Hotspot>,
    pub pickups: Vec<Pickup>,
    pub refreshed_at: Option<String>,
}

async fn overlays(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Json<OverlaysResponse> {
    let filters = state.store.map_filters(&user.user_id);
    let snapshot = state.overlays.snapshot().await;
    Json(OverlaysResponse {
        hotspots: if filters.hotspots {
            snapshot.hotspots
        } else {
            Vec::new()
        },
        pickups: if filters.pickups {
            snapshot.pickups
        } else {
            Vec::new()
        },
        refreshed_at: snapshot.refreshed_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Coordinates, Location, ReportStatus, Urgency, WasteType};
    use chrono::{Duration, Utc};

    fn report(id: &str, coordinates: Coordinates, waste_type: WasteType) -> WasteReport {
        WasteReport {
            id: id.to_string(),
            waste_type,
            location: Location {
                address: String::new(),
                coordinates,
            },
            description: String::new(),
            urgency: Urgency::Medium,
            status: ReportStatus::Pending,
            images: vec![],
            credits: 10,
            user_id: "u".to_string(),
            created_at: Utc::now(),
            resolved_at: None,
            classification: None,
            group_id: None,
        }
    }

    #[test]
    fn test_bounds_query_all_or_nothing() {
        assert_eq!(
            BoundsQuery::default().resolve(Bounds::DEFAULT).unwrap(),
            Bounds::DEFAULT
        );
        let partial = BoundsQuery {
            north: Some(1.0),
            ..Default::default()
        };
        assert!(partial.resolve(Bounds::DEFAULT).is_err());
        let inverted = BoundsQuery {
            north: Some(-2.0),
            south: Some(-1.0),
            east: Some(37.0),
            west: Some(36.0),
        };
        assert!(inverted.resolve(Bounds::DEFAULT).is_err());
    }

    #[test]
    fn test_visible_reports_apply_bounds_and_filters() {
        let inside = Coordinates::new(-1.29, 36.82);
        let outside = Coordinates::new(0.5, 30.0);
        let reports = vec![
            report("a", inside, WasteType::Plastic),
            report("b", outside, WasteType::Plastic),
            report("c", inside, WasteType::Organic),
        ];
        let mut filters = MapFilters::default();
        filters.merge(&MapFiltersPatch {
            organic: Some(false),
            ..Default::default()
        });
        let ids: Vec<String> = visible_reports(reports, Bounds::DEFAULT, &filters)
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["a".to_string()]);
    }

    /// Newest first, answering `created_at < before` queries in pages.
    fn paged(
        reports: &[WasteReport],
    ) -> impl FnMut(Option<String>) -> std::future::Ready<Result<Vec<WasteReport>>> + '_ {
        move |before| {
            let page = reports
                .iter()
                .filter(|r| {
                    before
                        .as_deref()
                        .map_or(true, |b| format_utc_rfc3339(r.created_at).as_str() < b)
                })
                .take(MAP_PAGE_SIZE as usize)
                .cloned()
                .collect();
            std::future::ready(Ok(page))
        }
    }

    #[tokio::test]
    async fn test_scan_reaches_older_reports_in_view() {
        let start = Utc::now();
        let elsewhere = Coordinates::new(0.5, 30.0);
        let inside = Coordinates::new(-1.29, 36.82);
        // 700 recent reports outside the view, then two older ones inside
        let mut reports: Vec<WasteReport> = (0..700)
            .map(|i| {
                let mut r = report(&format!("far{i}"), elsewhere, WasteType::Plastic);
                r.created_at = start - Duration::seconds(i);
                r
            })
            .collect();
        for (i, id) in ["near1", "near2"].into_iter().enumerate() {
            let mut r = report(id, inside, WasteType::Plastic);
            r.created_at = start - Duration::seconds(1000 + i as i64);
            reports.push(r);
        }

        let found = scan_visible(paged(&reports), Bounds::DEFAULT, &MapFilters::default())
            .await
            .unwrap();
        let ids: Vec<&str> = found.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["near1", "near2"]);
    }

    #[tokio::test]
    async fn test_scan_stops_at_limit() {
        let start = Utc::now();
        let inside = Coordinates::new(-1.29, 36.82);
        let reports: Vec<WasteReport> = (0..MAP_REPORT_LIMIT as i64 + 100)
            .map(|i| {
                let mut r = report(&format!("r{i}"), inside, WasteType::Plastic);
                r.created_at = start - Duration::seconds(i);
                r
            })
            .collect();
        let found = scan_visible(paged(&reports), Bounds::DEFAULT, &MapFilters::default())
            .await
            .unwrap();
        assert_eq!(found.len(), MAP_REPORT_LIMIT);
        assert_eq!(found[0].id, "r0");
    }
}
