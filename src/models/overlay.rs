// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Map overlay snapshots (predicted hotspots and scheduled pickups).
//!
//! These are display-only: replaced wholesale on each refresh and never
//! persisted, so identifiers are not stable across refreshes.

use crate::models::{Coordinates, Urgency, WasteType};
use geo::{coord, Intersects, Point, Rect};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Geographic bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Bounds {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

impl Bounds {
    /// Roughly Nairobi's Kilimani ward.
    pub const DEFAULT: Bounds = Bounds {
        north: -1.2421,
        south: -1.3421,
        east: 36.8719,
        west: 36.7719,
    };

    pub fn is_valid(&self) -> bool {
        self.north > self.south
            && self.east > self.west
            && (-90.0..=90.0).contains(&self.north)
            && (-90.0..=90.0).contains(&self.south)
            && (-180.0..=180.0).contains(&self.east)
            && (-180.0..=180.0).contains(&self.west)
    }

    fn rect(&self) -> Rect<f64> {
        Rect::new(
            coord! { x: self.west, y: self.south },
            coord! { x: self.east, y: self.north },
        )
    }

    /// Whether a point lies within (or on the edge of) the box.
    pub fn contains(&self, point: Coordinates) -> bool {
        self.rect().intersects(&Point::new(point.lng, point.lat))
    }

    /// Interpolate inside the box; `fy`/`fx` in 0.0..=1.0.
    pub fn lerp(&self, fy: f64, fx: f64) -> Coordinates {
        let lat = self.south + (self.north - self.south) * fy.clamp(0.0, 1.0);
        let lng = self.west + (self.east - self.west) * fx.clamp(0.0, 1.0);
        Coordinates::new(
            lat.clamp(self.south, self.north),
            lng.clamp(self.west, self.east),
        )
    }
}

/// A location predicted to accumulate waste.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Hotspot {
    pub id: String,
    pub coordinates: Coordinates,
    pub address: String,
    pub waste_type: WasteType,
    /// 0.0 - 1.0
    pub probability: f64,
    pub predicted_date: String,
    pub severity: Urgency,
    pub factors: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum PickupStatus {
    Scheduled,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Driver {
    pub name: String,
    pub phone: String,
    pub vehicle: String,
}

/// A collection run shown on the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Pickup {
    pub id: String,
    pub report_id: Option<String>,
    pub coordinates: Coordinates,
    pub address: String,
    pub status: PickupStatus,
    pub scheduled_date: String,
    pub estimated_arrival: String,
    pub driver: Driver,
    pub waste_type: WasteType,
    /// Kilograms
    pub estimated_weight: f64,
}

/// The overlay state served to map clients.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct OverlaySnapshot {
    pub hotspots: Vec<Hotspot>,
    pub pickups: Vec<Pickup>,
    pub refreshed_at: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_contains_interior_and_edge() {
        let b = Bounds::DEFAULT;
        assert!(b.contains(Coordinates::DEFAULT));
        assert!(b.contains(Coordinates::new(b.north, b.west)));
        assert!(!b.contains(Coordinates::new(0.0, 0.0)));
    }

    #[test]
    fn test_lerp_stays_inside() {
        let b = Bounds::DEFAULT;
        for (fy, fx) in [(0.0, 0.0), (0.5, 0.5), (1.0, 1.0), (2.0, -1.0)] {
            assert!(b.contains(b.lerp(fy, fx)));
        }
    }

    #[test]
    fn test_bounds_validity() {
        assert!(Bounds::DEFAULT.is_valid());
        let inverted = Bounds {
            north: -2.0,
            south: -1.0,
            east: 36.0,
            west: 37.0,
        };
        assert!(!inverted.is_valid());
    }
}
