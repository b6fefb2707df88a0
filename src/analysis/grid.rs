//! Grid partitioning of a bounding box into equal rectangular zones

use tracing::{debug, warn};

use crate::RiskError;
use crate::models::{BoundingBox, Coordinates, Zone, ZoneRiskResult};

/// Maximum tolerated deviation between summed zone area and parent area
const COVERAGE_TOLERANCE_PERCENT: f64 = 5.0;

/// Side length of the grid for `n` zones, `None` unless `n` is a non-zero perfect square
#[must_use]
pub fn grid_side(n: usize) -> Option<usize> {
    if n == 0 {
        return None;
    }
    let side = (n as f64).sqrt().round() as usize;
    (side * side == n).then_some(side)
}

/// Divide `bbox` into `n` zones, row 0 southernmost and column 0 westernmost
///
/// IDs run `1..=n` in row-major order. Fails before any network call when `n`
/// is not a perfect square or the box is degenerate.
pub fn partition(bbox: &BoundingBox, n: usize) -> crate::Result<Vec<Zone>> {
    bbox.validate()
        .map_err(|e| RiskError::partition(format!("invalid bounding box: {e}")))?;

    let side = grid_side(n).ok_or_else(|| {
        RiskError::partition(format!("zone count must be a perfect square, got {n}"))
    })?;

    let lat_step = bbox.lat_span() / side as f64;
    let lon_step = bbox.lon_span() / side as f64;
    debug!(
        "Partitioning into {side}x{side} grid (lat step {lat_step:.6}, lon step {lon_step:.6})"
    );

    let mut zones = Vec::with_capacity(n);
    for row in 0..side {
        for col in 0..side {
            let zone_bbox = BoundingBox::new(
                bbox.min_lat + row as f64 * lat_step,
                bbox.min_lat + (row + 1) as f64 * lat_step,
                bbox.min_lon + col as f64 * lon_step,
                bbox.min_lon + (col + 1) as f64 * lon_step,
            );
            let id = u32::try_from(zones.len() + 1)
                .map_err(|_| RiskError::partition(format!("too many zones: {n}")))?;
            zones.push(Zone::new(id, zone_bbox));
        }
    }

    Ok(zones)
}

/// Outcome of a grid sanity check
#[derive(Debug, Clone, PartialEq)]
pub struct GridValidation {
    pub is_valid: bool,
    pub errors: Vec<String>,
    /// Summed zone area as a percentage of the parent area
    pub coverage_percent: f64,
}

/// Check contiguous IDs and that the zones cover the parent area within 5%
#[must_use]
pub fn validate_grid(zones: &[Zone], parent: &BoundingBox) -> GridValidation {
    let mut errors = Vec::new();

    let mut ids: Vec<u32> = zones.iter().map(|z| z.id).collect();
    ids.sort_unstable();
    let contiguous = ids.iter().enumerate().all(|(i, id)| *id as usize == i + 1);
    if !contiguous {
        errors.push("zone IDs are not a contiguous 1..n sequence".to_string());
    }

    let zones_area: f64 = zones.iter().map(Zone::area_km2).sum();
    let parent_area = parent.area_km2();
    let coverage_percent = if parent_area > 0.0 {
        zones_area / parent_area * 100.0
    } else {
        0.0
    };
    if (coverage_percent - 100.0).abs() > COVERAGE_TOLERANCE_PERCENT {
        errors.push(format!("abnormal coverage: {coverage_percent:.1}%"));
    }

    if !errors.is_empty() {
        warn!("Grid validation failed: {:?}", errors);
    }

    GridValidation {
        is_valid: errors.is_empty(),
        errors,
        coverage_percent,
    }
}

/// Something placed on the zone grid
pub trait GridCell {
    fn cell_id(&self) -> u32;
    fn cell_bbox(&self) -> &BoundingBox;
}

impl GridCell for Zone {
    fn cell_id(&self) -> u32 {
        self.id
    }

    fn cell_bbox(&self) -> &BoundingBox {
        &self.bbox
    }
}

impl GridCell for ZoneRiskResult {
    fn cell_id(&self) -> u32 {
        self.id
    }

    fn cell_bbox(&self) -> &BoundingBox {
        &self.bbox
    }
}

/// First zone whose box contains `point`, edges inclusive
#[must_use]
pub fn find_zone_containing<'a, T: GridCell>(zones: &'a [T], point: &Coordinates) -> Option<&'a T> {
    zones.iter().find(|zone| zone.cell_bbox().contains(point))
}

/// Zones adjacent to `zone_id` on a `side × side` grid, diagonals included
///
/// Lookup is by ID, so `zones` may be in any order (ranked results work).
/// Neighbours come back south-west to north-east, row by row.
#[must_use]
pub fn neighboring_zones<T: GridCell>(zones: &[T], zone_id: u32, side: usize) -> Vec<&T> {
    let index = zone_id as usize;
    if index == 0 || index > side * side {
        return Vec::new();
    }
    let (row, col) = ((index - 1) / side, (index - 1) % side);

    let mut neighbors = Vec::with_capacity(8);
    for neighbor_row in row.saturating_sub(1)..=(row + 1).min(side - 1) {
        for neighbor_col in col.saturating_sub(1)..=(col + 1).min(side - 1) {
            if (neighbor_row, neighbor_col) == (row, col) {
                continue;
            }
            let neighbor_id = neighbor_row * side + neighbor_col + 1;
            if let Some(zone) = zones.iter().find(|z| z.cell_id() as usize == neighbor_id) {
                neighbors.push(zone);
            }
        }
    }
    neighbors
}
