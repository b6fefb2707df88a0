//! Grid zones and the elevation samples fetched for them

use serde::{Deserialize, Serialize};

use super::risk::{RiskLevel, ZoneRiskResult};
use super::{BoundingBox, Coordinates};

/// One rectangular cell of the municipality grid
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Zone {
    /// Dense 1-based identifier in row-major scan order
    pub id: u32,
    /// Midpoint of the zone bbox
    pub center: Coordinates,
    pub bbox: BoundingBox,
    /// Normalized 0-100 score, set once the zone has been scored
    pub score: Option<u8>,
    pub level: Option<RiskLevel>,
}

impl Zone {
    #[must_use]
    pub fn new(id: u32, bbox: BoundingBox) -> Self {
        Self {
            id,
            center: bbox.center(),
            bbox,
            score: None,
            level: None,
        }
    }

    /// Record the outcome of scoring this zone
    pub fn apply(&mut self, result: &ZoneRiskResult) {
        self.score = Some(result.normalized_score);
        self.level = Some(result.level);
    }

    /// Approximate zone area in km²
    #[must_use]
    pub fn area_km2(&self) -> f64 {
        self.bbox.area_km2()
    }
}

/// Terrain elevation at one point
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ElevationSample {
    pub latitude: f64,
    pub longitude: f64,
    /// Elevation in metres
    pub elevation: f64,
}

impl ElevationSample {
    #[must_use]
    pub fn new(latitude: f64, longitude: f64, elevation: f64) -> Self {
        Self {
            latitude,
            longitude,
            elevation,
        }
    }

    #[must_use]
    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }

    /// All three components are finite numbers
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite() && self.longitude.is_finite() && self.elevation.is_finite()
    }
}
