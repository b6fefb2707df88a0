//! Risk level classification and display filtering

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::risk::RiskLevel;
use crate::models::{Zone, ZoneRiskResult};

/// Minimum normalized score shown on the map
pub const DISPLAY_THRESHOLD: f64 = 50.0;

/// Map a 0-100 score onto a risk level
///
/// Scores outside the range are clamped. NaN yields `Indeterminado`.
#[must_use]
pub fn classify_risk(score: f64) -> RiskLevel {
    if score.is_nan() {
        return RiskLevel::Indeterminado;
    }

    let score = score.clamp(0.0, 100.0);
    if score >= 75.0 {
        RiskLevel::MuitoAlto
    } else if score >= 50.0 {
        RiskLevel::Alto
    } else if score >= 30.0 {
        RiskLevel::Moderado
    } else if score >= 15.0 {
        RiskLevel::Baixo
    } else {
        RiskLevel::MuitoBaixo
    }
}

/// Anything carrying a normalized 0-100 risk score
pub trait RiskScored {
    fn risk_score(&self) -> f64;
}

impl RiskScored for ZoneRiskResult {
    fn risk_score(&self) -> f64 {
        f64::from(self.normalized_score)
    }
}

impl RiskScored for Zone {
    fn risk_score(&self) -> f64 {
        self.score.map_or(f64::NAN, f64::from)
    }
}

/// Keep only the zones with score ≥ 50, preserving order
#[must_use]
pub fn filter_for_display<T: RiskScored + Clone>(zones: &[T]) -> Vec<T> {
    let filtered: Vec<T> = zones
        .iter()
        .filter(|z| z.risk_score() >= DISPLAY_THRESHOLD)
        .cloned()
        .collect();
    debug!(
        "Display filter kept {}/{} zones (score >= {})",
        filtered.len(),
        zones.len(),
        DISPLAY_THRESHOLD
    );
    filtered
}

/// Distribution of a result set across risk levels
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RiskDistribution {
    pub total: usize,
    pub muito_alto: usize,
    pub alto: usize,
    pub moderado: usize,
    pub baixo: usize,
    pub muito_baixo: usize,
    pub average_score: f64,
    pub max_score: f64,
    pub min_score: f64,
}

impl RiskDistribution {
    #[must_use]
    pub fn from_scores<I: IntoIterator<Item = f64>>(scores: I) -> Self {
        let scores: Vec<f64> = scores.into_iter().filter(|s| !s.is_nan()).collect();
        if scores.is_empty() {
            return Self::default();
        }

        let mut distribution = Self {
            total: scores.len(),
            min_score: f64::INFINITY,
            max_score: f64::NEG_INFINITY,
            ..Self::default()
        };
        for &score in &scores {
            match classify_risk(score) {
                RiskLevel::MuitoAlto => distribution.muito_alto += 1,
                RiskLevel::Alto => distribution.alto += 1,
                RiskLevel::Moderado => distribution.moderado += 1,
                RiskLevel::Baixo => distribution.baixo += 1,
                RiskLevel::MuitoBaixo | RiskLevel::Indeterminado => {
                    distribution.muito_baixo += 1;
                }
            }
            distribution.min_score = distribution.min_score.min(score);
            distribution.max_score = distribution.max_score.max(score);
        }
        distribution.average_score = scores.iter().sum::<f64>() / scores.len() as f64;
        distribution
    }

    #[must_use]
    pub fn from_results(results: &[ZoneRiskResult]) -> Self {
        Self::from_scores(results.iter().map(RiskScored::risk_score))
    }

    /// Zones at or above the display threshold
    #[must_use]
    pub fn high_or_above(&self) -> usize {
        self.muito_alto + self.alto
    }
}
