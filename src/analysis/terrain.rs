//! Terrain slope analysis
//!
//! Average slope is computed over every unordered pair of valid elevation
//! samples. Sample grids are small (at most 20x20, 25 points by default) so
//! the quadratic pair count is bounded.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::ElevationSample;

/// Terrain class derived from an average slope percentage
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TerrainClass {
    /// Below 3%
    Plano,
    /// 3% to 8%
    Suave,
    /// 8% to 20%
    Ondulado,
    /// 20% to 45%
    Forte,
    /// 45% and above
    Montanhoso,
}

impl TerrainClass {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            TerrainClass::Plano => "PLANO",
            TerrainClass::Suave => "SUAVE",
            TerrainClass::Ondulado => "ONDULADO",
            TerrainClass::Forte => "FORTE",
            TerrainClass::Montanhoso => "MONTANHOSO",
        }
    }

    /// Slope risk fed into the scorer, in `[0, 1]`
    #[must_use]
    pub fn weight(&self) -> f64 {
        match self {
            TerrainClass::Plano => 0.10,
            TerrainClass::Suave => 0.30,
            TerrainClass::Ondulado => 0.60,
            TerrainClass::Forte => 0.85,
            TerrainClass::Montanhoso => 1.0,
        }
    }

    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            TerrainClass::Plano => "0-3% - terreno plano, baixo risco de deslizamento",
            TerrainClass::Suave => "3-8% - terreno suavemente ondulado",
            TerrainClass::Ondulado => "8-20% - terreno ondulado, risco moderado",
            TerrainClass::Forte => "20-45% - terreno fortemente ondulado, risco alto",
            TerrainClass::Montanhoso => ">45% - terreno montanhoso, risco muito alto",
        }
    }
}

/// Map a slope percentage onto the terrain thresholds table
#[must_use]
pub fn classify_terrain(slope_percent: f64) -> TerrainClass {
    if slope_percent < 3.0 {
        TerrainClass::Plano
    } else if slope_percent < 8.0 {
        TerrainClass::Suave
    } else if slope_percent < 20.0 {
        TerrainClass::Ondulado
    } else if slope_percent < 45.0 {
        TerrainClass::Forte
    } else {
        TerrainClass::Montanhoso
    }
}

fn slope_between(a: &ElevationSample, b: &ElevationSample) -> Option<f64> {
    let horizontal = a.coordinates().distance_meters(&b.coordinates());
    if horizontal <= 0.0 || !horizontal.is_finite() {
        return None;
    }

    let slope = (b.elevation - a.elevation).abs() / horizontal * 100.0;
    (slope > 0.0 && slope.is_finite()).then_some(slope)
}

/// Average pairwise slope in percent, rounded to two decimals
///
/// Returns 0 for fewer than two valid samples or when no pair has a positive
/// slope (flat terrain).
#[must_use]
pub fn slope_percent(samples: &[ElevationSample]) -> f64 {
    let valid: Vec<&ElevationSample> = samples.iter().filter(|s| s.is_valid()).collect();
    if valid.len() < 2 {
        debug!("Not enough valid elevation samples for slope ({})", valid.len());
        return 0.0;
    }

    let slopes: Vec<f64> = valid
        .iter()
        .enumerate()
        .flat_map(|(i, a)| valid[i + 1..].iter().filter_map(|b| slope_between(a, b)))
        .collect();

    if slopes.is_empty() {
        debug!("No positive slope between {} samples, terrain is flat", valid.len());
        return 0.0;
    }

    let average = slopes.iter().sum::<f64>() / slopes.len() as f64;
    debug!(
        "Average slope {:.2}% over {} pairs of {} samples",
        average,
        slopes.len(),
        valid.len()
    );
    (average * 100.0).round() / 100.0
}

/// Summary statistics of a sample set
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElevationStats {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub range: f64,
}

impl ElevationStats {
    /// Statistics over valid samples, `None` if there are none
    #[must_use]
    pub fn from_samples(samples: &[ElevationSample]) -> Option<Self> {
        let elevations: Vec<f64> = samples
            .iter()
            .filter(|s| s.is_valid())
            .map(|s| s.elevation)
            .collect();
        if elevations.is_empty() {
            return None;
        }

        let min = elevations.iter().copied().fold(f64::INFINITY, f64::min);
        let max = elevations.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean = elevations.iter().sum::<f64>() / elevations.len() as f64;

        Some(Self {
            count: elevations.len(),
            min,
            max,
            mean,
            range: max - min,
        })
    }
}
