//! Risk results and calculation progress events

use serde::{Deserialize, Serialize};

use super::{BoundingBox, Coordinates};

/// Discrete risk level of a zone
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    MuitoAlto,
    Alto,
    Moderado,
    Baixo,
    MuitoBaixo,
    /// Score could not be interpreted
    Indeterminado,
}

impl RiskLevel {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::MuitoAlto => "MUITO_ALTO",
            RiskLevel::Alto => "ALTO",
            RiskLevel::Moderado => "MODERADO",
            RiskLevel::Baixo => "BAIXO",
            RiskLevel::MuitoBaixo => "MUITO_BAIXO",
            RiskLevel::Indeterminado => "INDETERMINADO",
        }
    }

    /// Display color used by the map renderer
    #[must_use]
    pub fn color(&self) -> &'static str {
        match self {
            RiskLevel::MuitoAlto => "#991b1b",
            RiskLevel::Alto => "#ea580c",
            RiskLevel::Moderado => "#d97706",
            RiskLevel::Baixo => "#16a34a",
            RiskLevel::MuitoBaixo => "#2563eb",
            RiskLevel::Indeterminado => "#6b7280",
        }
    }

    /// Urgency rank, 1 (lowest) to 5 (highest), 0 when indeterminate
    #[must_use]
    pub fn priority(&self) -> u8 {
        match self {
            RiskLevel::MuitoAlto => 5,
            RiskLevel::Alto => 4,
            RiskLevel::Moderado => 3,
            RiskLevel::Baixo => 2,
            RiskLevel::MuitoBaixo => 1,
            RiskLevel::Indeterminado => 0,
        }
    }

    /// Plain-language summary shown next to the level
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            RiskLevel::MuitoAlto => {
                "Risco muito alto de desastres naturais. Ação imediata necessária."
            }
            RiskLevel::Alto => {
                "Risco alto de desastres naturais. Medidas preventivas recomendadas."
            }
            RiskLevel::Moderado => "Risco moderado. Monitoramento e preparação adequados.",
            RiskLevel::Baixo => "Risco baixo. Manutenção de medidas preventivas básicas.",
            RiskLevel::MuitoBaixo => "Risco muito baixo. Área relativamente segura.",
            RiskLevel::Indeterminado => "Risco indeterminado. Dados insuficientes para avaliação.",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Weighted contribution of one factor to a zone score
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskFactorContribution {
    pub name: String,
    /// Factor risk multiplied by its weight, in `[0, weight]`
    pub value: f64,
    pub weight: f64,
    pub description: String,
}

/// Terminal artifact of the pipeline for one zone
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ZoneRiskResult {
    pub id: u32,
    pub coordinates: Coordinates,
    pub bbox: BoundingBox,
    /// 0-100 integer score
    pub normalized_score: u8,
    /// 0-1 weighted sum
    pub score: f64,
    pub level: RiskLevel,
    pub color: String,
    pub priority: u8,
    pub factors: Vec<RiskFactorContribution>,
    pub slope_percent: f64,
    pub recommendations: Vec<String>,
}

/// Lifecycle of a calculation run
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CalculationStatus {
    FetchingData,
    Calculating,
    Done,
    Error,
}

impl CalculationStatus {
    /// `done` and `error` end a run
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, CalculationStatus::Done | CalculationStatus::Error)
    }
}

/// Progress event emitted while a run is in flight
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CalculationProgress {
    pub total: u32,
    pub completed: u32,
    pub percentage: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_zone: Option<u32>,
    pub status: CalculationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_labels_and_priorities() {
        assert_eq!(RiskLevel::MuitoAlto.as_str(), "MUITO_ALTO");
        assert_eq!(RiskLevel::MuitoBaixo.to_string(), "MUITO_BAIXO");
        assert_eq!(RiskLevel::Alto.priority(), 4);
        assert_eq!(RiskLevel::Indeterminado.priority(), 0);
        assert_eq!(RiskLevel::Baixo.color(), "#16a34a");
    }

    #[test]
    fn test_level_serializes_as_label() {
        let json = serde_json::to_string(&RiskLevel::MuitoAlto).unwrap();
        assert_eq!(json, "\"MUITO_ALTO\"");
    }

    #[test]
    fn test_progress_serialization() {
        let progress = CalculationProgress {
            total: 100,
            completed: 3,
            percentage: 13,
            current_zone: Some(3),
            status: CalculationStatus::FetchingData,
            error: None,
        };
        let json = serde_json::to_value(&progress).unwrap();
        assert_eq!(json["status"], "fetching_data");
        assert_eq!(json["currentZone"], 3);
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_descriptions_follow_level() {
        assert!(RiskLevel::MuitoAlto.description().contains("Ação imediata"));
        assert!(RiskLevel::Moderado.description().starts_with("Risco moderado"));
        assert!(RiskLevel::MuitoBaixo.description().contains("relativamente segura"));
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(CalculationStatus::Done.is_terminal());
        assert!(CalculationStatus::Error.is_terminal());
        assert!(!CalculationStatus::FetchingData.is_terminal());
        assert!(!CalculationStatus::Calculating.is_terminal());
    }
}
