//! Five-factor weighted risk scoring
//!
//! `score = H·0.20 + S·0.30 + R·0.25 + U·0.15 + V·0.10`, clamped to `[0, 1]`.

use serde::{Deserialize, Serialize};

use super::classification::classify_risk;
use super::recommendations::generate_recommendations;
use super::terrain::{TerrainClass, classify_terrain};
use crate::RiskError;
use crate::models::risk::RiskLevel;
use crate::models::{RiskFactorContribution, Zone, ZoneRiskResult};

pub const WEIGHT_HISTORICAL: f64 = 0.20;
pub const WEIGHT_SLOPE: f64 = 0.30;
pub const WEIGHT_RIVERS: f64 = 0.25;
pub const WEIGHT_URBAN: f64 = 0.15;
pub const WEIGHT_VEGETATION: f64 = 0.10;

pub const FACTOR_WEIGHTS: [f64; 5] = [
    WEIGHT_HISTORICAL,
    WEIGHT_SLOPE,
    WEIGHT_RIVERS,
    WEIGHT_URBAN,
    WEIGHT_VEGETATION,
];

/// Normalized score assigned to zones whose data could not be gathered
pub const FALLBACK_NORMALIZED_SCORE: u8 = 10;

/// Note attached to fallback zones whose geodata could not be fetched
pub const INSUFFICIENT_DATA_NOTE: &str = "Dados insuficientes para cálculo preciso";
/// Note attached to fallback zones whose signals could not be scored
pub const SCORING_ERROR_NOTE: &str = "Erro no cálculo - dados insuficientes para análise precisa";

/// Check once at startup that the factor weights sum to 1.0
pub fn validate_weights() -> crate::Result<()> {
    let sum: f64 = FACTOR_WEIGHTS.iter().sum();
    if (sum - 1.0).abs() > f64::EPSILON * 4.0 {
        return Err(RiskError::config(format!(
            "risk factor weights must sum to 1.0, got {sum}"
        )));
    }
    if FACTOR_WEIGHTS.iter().any(|w| !(0.0..=1.0).contains(w)) {
        return Err(RiskError::config("risk factor weights must lie in [0, 1]"));
    }
    Ok(())
}

/// River risk from the number of water features in the zone
#[must_use]
pub fn river_risk(river_count: usize) -> f64 {
    match river_count {
        0 => 0.1,
        1..=2 => 0.4,
        3..=5 => 0.7,
        _ => 1.0,
    }
}

/// Urban risk from buildings plus half-weighted roads
#[must_use]
pub fn urban_risk(building_count: usize, road_count: usize) -> f64 {
    let density = building_count as f64 + 0.5 * road_count as f64;
    if density < 10.0 {
        0.2
    } else if density < 30.0 {
        0.5
    } else if density < 60.0 {
        0.8
    } else {
        1.0
    }
}

/// Vegetation risk, decreasing as green areas increase
#[must_use]
pub fn vegetation_risk(vegetation_count: usize) -> f64 {
    match vegetation_count {
        0 => 1.0,
        1..=3 => 0.7,
        4..=8 => 0.4,
        _ => 0.1,
    }
}

/// Per-factor risk values in `[0, 1]`, before weighting
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct FactorSignals {
    pub historical: f64,
    pub slope: f64,
    pub rivers: f64,
    pub urban: f64,
    pub vegetation: f64,
}

impl FactorSignals {
    /// Weighted sum clamped to `[0, 1]`
    #[must_use]
    pub fn weighted_score(&self) -> f64 {
        let total = self.historical * WEIGHT_HISTORICAL
            + self.slope * WEIGHT_SLOPE
            + self.rivers * WEIGHT_RIVERS
            + self.urban * WEIGHT_URBAN
            + self.vegetation * WEIGHT_VEGETATION;
        total.clamp(0.0, 1.0)
    }
}

/// Raw signals gathered for one zone
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneSignals {
    /// State code the historical factor was looked up for
    pub uf: String,
    pub historical_factor: f64,
    pub slope_percent: f64,
    pub river_count: usize,
    pub building_count: usize,
    pub road_count: usize,
    pub vegetation_count: usize,
}

impl ZoneSignals {
    #[must_use]
    pub fn terrain(&self) -> TerrainClass {
        classify_terrain(self.slope_percent)
    }

    #[must_use]
    pub fn factor_signals(&self) -> FactorSignals {
        FactorSignals {
            historical: self.historical_factor,
            slope: self.terrain().weight(),
            rivers: river_risk(self.river_count),
            urban: urban_risk(self.building_count, self.road_count),
            vegetation: vegetation_risk(self.vegetation_count),
        }
    }

    fn validate(&self) -> crate::Result<()> {
        if !(0.0..=1.0).contains(&self.historical_factor) {
            return Err(RiskError::validation(format!(
                "historical factor {} outside [0, 1]",
                self.historical_factor
            )));
        }
        if !self.slope_percent.is_finite() || self.slope_percent < 0.0 {
            return Err(RiskError::validation(format!(
                "slope {} is not a non-negative number",
                self.slope_percent
            )));
        }
        Ok(())
    }

    fn contributions(&self, factors: &FactorSignals) -> Vec<RiskFactorContribution> {
        let terrain = self.terrain();
        vec![
            RiskFactorContribution {
                name: "Histórico de Desastres".to_string(),
                value: factors.historical * WEIGHT_HISTORICAL,
                weight: WEIGHT_HISTORICAL,
                description: format!("Fator regional baseado no histórico do estado {}", self.uf),
            },
            RiskFactorContribution {
                name: "Declividade do Terreno".to_string(),
                value: factors.slope * WEIGHT_SLOPE,
                weight: WEIGHT_SLOPE,
                description: format!(
                    "Terreno {} com {:.1}% de inclinação",
                    terrain.as_str().to_lowercase(),
                    self.slope_percent
                ),
            },
            RiskFactorContribution {
                name: "Proximidade de Rios".to_string(),
                value: factors.rivers * WEIGHT_RIVERS,
                weight: WEIGHT_RIVERS,
                description: format!("{} rio(s) identificado(s) na zona", self.river_count),
            },
            RiskFactorContribution {
                name: "Densidade Urbana".to_string(),
                value: factors.urban * WEIGHT_URBAN,
                weight: WEIGHT_URBAN,
                description: format!(
                    "{} construções e {} vias mapeadas",
                    self.building_count, self.road_count
                ),
            },
            RiskFactorContribution {
                name: "Cobertura Vegetal".to_string(),
                value: factors.vegetation * WEIGHT_VEGETATION,
                weight: WEIGHT_VEGETATION,
                description: format!(
                    "{} área(s) verde(s) - proteção natural",
                    self.vegetation_count
                ),
            },
        ]
    }
}

/// Score, classify and annotate one zone
pub fn score_zone(zone: &Zone, signals: &ZoneSignals) -> crate::Result<ZoneRiskResult> {
    signals.validate()?;

    let factors = signals.factor_signals();
    let score = factors.weighted_score();
    let normalized_score = (score * 100.0).round() as u8;
    let level = classify_risk(f64::from(normalized_score));

    Ok(ZoneRiskResult {
        id: zone.id,
        coordinates: zone.center,
        bbox: zone.bbox,
        normalized_score,
        score,
        level,
        color: level.color().to_string(),
        priority: level.priority(),
        factors: signals.contributions(&factors),
        slope_percent: signals.slope_percent,
        recommendations: generate_recommendations(
            normalized_score,
            &factors,
            signals.slope_percent,
        ),
    })
}

/// Deterministic low-risk result for a zone that could not be scored
///
/// Priority is fixed at 1 even though `RiskLevel::Baixo.priority()` is 2; the
/// view layer reads 1 as "no reliable score".
#[must_use]
pub fn fallback_result(zone: &Zone, note: &str) -> ZoneRiskResult {
    ZoneRiskResult {
        id: zone.id,
        coordinates: zone.center,
        bbox: zone.bbox,
        normalized_score: FALLBACK_NORMALIZED_SCORE,
        score: f64::from(FALLBACK_NORMALIZED_SCORE) / 100.0,
        level: RiskLevel::Baixo,
        color: RiskLevel::Baixo.color().to_string(),
        priority: 1,
        factors: Vec::new(),
        slope_percent: 0.0,
        recommendations: vec![note.to_string()],
    }
}
