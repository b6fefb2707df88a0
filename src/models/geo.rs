//! Geographic coordinates, bounding boxes and spherical distance helpers

use haversine::{Location as HaversineLocation, Units, distance};
use serde::{Deserialize, Serialize};

use crate::RiskError;

/// Kilometres per degree of latitude under the spherical approximation
pub const KM_PER_DEGREE: f64 = 111.0;

/// A point in decimal degrees
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Coordinates {
    /// Latitude in decimal degrees
    pub lat: f64,
    /// Longitude in decimal degrees
    pub lon: f64,
}

impl Coordinates {
    #[must_use]
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Format as a coordinates string
    #[must_use]
    pub fn format(&self) -> String {
        format!("{:.4}, {:.4}", self.lat, self.lon)
    }

    /// Great-circle distance to another point in metres
    #[must_use]
    pub fn distance_meters(&self, other: &Coordinates) -> f64 {
        let from = HaversineLocation {
            latitude: self.lat,
            longitude: self.lon,
        };
        let to = HaversineLocation {
            latitude: other.lat,
            longitude: other.lon,
        };
        distance(from, to, Units::Kilometers) * 1000.0
    }
}

/// Axis-aligned geographic bounding box
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
    pub center_lat: f64,
    pub center_lon: f64,
}

impl BoundingBox {
    /// Create a box whose center is the midpoint of its extent
    #[must_use]
    pub fn new(min_lat: f64, max_lat: f64, min_lon: f64, max_lon: f64) -> Self {
        Self::with_center(
            min_lat,
            max_lat,
            min_lon,
            max_lon,
            Coordinates::new((min_lat + max_lat) / 2.0, (min_lon + max_lon) / 2.0),
        )
    }

    /// Create a box with an explicit center (geocoders report their own)
    #[must_use]
    pub fn with_center(
        min_lat: f64,
        max_lat: f64,
        min_lon: f64,
        max_lon: f64,
        center: Coordinates,
    ) -> Self {
        Self {
            min_lat,
            max_lat,
            min_lon,
            max_lon,
            center_lat: center.lat,
            center_lon: center.lon,
        }
    }

    /// Min/max envelope of a set of points, `None` when there are no points
    #[must_use]
    pub fn envelope<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = Coordinates>,
    {
        let mut points = points.into_iter().peekable();
        points.peek()?;

        let (mut min_lat, mut max_lat) = (f64::INFINITY, f64::NEG_INFINITY);
        let (mut min_lon, mut max_lon) = (f64::INFINITY, f64::NEG_INFINITY);
        for point in points {
            min_lat = min_lat.min(point.lat);
            max_lat = max_lat.max(point.lat);
            min_lon = min_lon.min(point.lon);
            max_lon = max_lon.max(point.lon);
        }

        Some(Self::new(min_lat, max_lat, min_lon, max_lon))
    }

    #[must_use]
    pub fn center(&self) -> Coordinates {
        Coordinates::new(self.center_lat, self.center_lon)
    }

    #[must_use]
    pub fn lat_span(&self) -> f64 {
        self.max_lat - self.min_lat
    }

    #[must_use]
    pub fn lon_span(&self) -> f64 {
        self.max_lon - self.min_lon
    }

    /// Extent in square degrees, used to flag heavy spatial queries
    #[must_use]
    pub fn area_deg2(&self) -> f64 {
        self.lat_span() * self.lon_span()
    }

    /// Approximate area in km², longitude scaled by the cosine of the mean latitude
    #[must_use]
    pub fn area_km2(&self) -> f64 {
        let mean_lat = (self.min_lat + self.max_lat) / 2.0;
        let lat_km = self.lat_span() * KM_PER_DEGREE;
        let lon_km = self.lon_span() * KM_PER_DEGREE * mean_lat.to_radians().cos();
        lat_km * lon_km
    }

    /// Inclusive containment test
    #[must_use]
    pub fn contains(&self, point: &Coordinates) -> bool {
        point.lat >= self.min_lat
            && point.lat <= self.max_lat
            && point.lon >= self.min_lon
            && point.lon <= self.max_lon
    }

    /// Check ordering, Earth coordinate ranges and a finite center
    pub fn validate(&self) -> crate::Result<()> {
        let values = [
            self.min_lat,
            self.max_lat,
            self.min_lon,
            self.max_lon,
            self.center_lat,
            self.center_lon,
        ];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(RiskError::validation(format!(
                "Bounding box has non-finite values: {self:?}"
            )));
        }
        if self.min_lat >= self.max_lat || self.min_lon >= self.max_lon {
            return Err(RiskError::validation(format!(
                "Bounding box is degenerate: lat [{}, {}], lon [{}, {}]",
                self.min_lat, self.max_lat, self.min_lon, self.max_lon
            )));
        }
        if self.min_lat < -90.0 || self.max_lat > 90.0 {
            return Err(RiskError::validation(
                "Bounding box latitude outside [-90, 90]",
            ));
        }
        if self.min_lon < -180.0 || self.max_lon > 180.0 {
            return Err(RiskError::validation(
                "Bounding box longitude outside [-180, 180]",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn curitiba_bbox() -> BoundingBox {
        BoundingBox::new(-25.5, -25.4, -49.3, -49.2)
    }

    #[test]
    fn test_center_is_midpoint() {
        let bbox = curitiba_bbox();
        assert!((bbox.center_lat - -25.45).abs() < 1e-12);
        assert!((bbox.center_lon - -49.25).abs() < 1e-12);
    }

    #[test]
    fn test_validate() {
        assert!(curitiba_bbox().validate().is_ok());
        assert!(BoundingBox::new(-25.4, -25.5, -49.3, -49.2).validate().is_err());
        assert!(BoundingBox::new(-25.5, -25.5, -49.3, -49.2).validate().is_err());
        assert!(BoundingBox::new(-95.0, -25.5, -49.3, -49.2).validate().is_err());
        assert!(BoundingBox::new(-25.5, -25.4, -49.3, 181.0).validate().is_err());
        assert!(BoundingBox::new(f64::NAN, -25.4, -49.3, -49.2).validate().is_err());
    }

    #[test]
    fn test_envelope() {
        let bbox = BoundingBox::envelope(vec![
            Coordinates::new(-25.45, -49.21),
            Coordinates::new(-25.50, -49.30),
            Coordinates::new(-25.40, -49.25),
        ])
        .unwrap();
        assert_eq!(bbox.min_lat, -25.50);
        assert_eq!(bbox.max_lat, -25.40);
        assert_eq!(bbox.min_lon, -49.30);
        assert_eq!(bbox.max_lon, -49.21);

        assert!(BoundingBox::envelope(Vec::new()).is_none());
    }

    #[test]
    fn test_area_km2_near_equator() {
        let bbox = BoundingBox::new(0.0, 0.1, 0.0, 0.1);
        assert!((bbox.area_km2() - 123.21).abs() < 0.01);
    }

    #[test]
    fn test_distance_meters() {
        let a = Coordinates::new(0.0, 0.0);
        let b = Coordinates::new(0.0, 1.0);
        // One degree of longitude at the equator on a 6371 km sphere
        assert!((a.distance_meters(&b) - 111_194.9).abs() < 1.0);
        assert_eq!(a.distance_meters(&a), 0.0);
    }

    #[test]
    fn test_bbox_serializes_camel_case() {
        let json = serde_json::to_value(curitiba_bbox()).unwrap();
        assert_eq!(json["minLat"], -25.5);
        assert!(json.get("centerLon").is_some());
    }
}
