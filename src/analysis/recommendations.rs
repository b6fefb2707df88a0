//! Rule-based prevention recommendations
//!
//! Score-tier rules are unioned with per-factor rules, slope rules and two
//! general items. Duplicates are dropped and the first eight are kept in
//! insertion order, not ranked by severity.

use serde::{Deserialize, Serialize};

use super::scoring::FactorSignals;
use crate::models::ZoneRiskResult;

/// Maximum number of recommendations attached to a zone
pub const MAX_RECOMMENDATIONS: usize = 8;

const URGENT: &[&str] = &[
    "URGENTE: implementar plano de evacuação imediato",
    "Elaborar estudo geotécnico detalhado da área",
    "Considerar relocação de estruturas críticas",
];

const PREVENTIVE: &[&str] = &[
    "Estabelecer sistema de monitoramento contínuo",
    "Implementar medidas de contenção preventivas",
    "Instalar sistema de alerta precoce",
];

const SLOPE: &[&str] = &[
    "Instalar sistema de drenagem em encostas",
    "Implementar cobertura vegetal para estabilização",
    "Monitorar sinais de movimento do solo",
];

const RIVERS: &[&str] = &[
    "Construir barreiras de contenção fluvial",
    "Melhorar sistema de drenagem urbana",
    "Manter faixa de proteção de cursos d'água",
];

const URBAN: &[&str] = &[
    "Implementar zoneamento urbano adequado",
    "Melhorar infraestrutura de escoamento",
    "Criar áreas verdes para absorção de chuva",
];

const VEGETATION: &[&str] = &[
    "URGENTE: programa de reflorestamento",
    "Controlar desmatamento na região",
    "Implementar sistema de retenção de água",
];

const HISTORICAL: &[&str] = &[
    "Estudar padrões históricos de desastres",
    "Reforçar construções existentes",
    "Treinar população para emergências",
];

const GENERAL: &[&str] = &[
    "Manter contatos de emergência atualizados",
    "Preparar kit de emergência familiar",
];

/// Build the deduplicated, capped recommendation list for a zone
#[must_use]
pub fn generate_recommendations(
    normalized_score: u8,
    factors: &FactorSignals,
    slope_percent: f64,
) -> Vec<String> {
    let mut rules: Vec<&[&str]> = Vec::new();

    if normalized_score >= 75 {
        rules.push(URGENT);
    } else if normalized_score >= 50 {
        rules.push(PREVENTIVE);
    }

    if factors.slope > 0.8 {
        rules.push(SLOPE);
    }
    if factors.rivers > 0.7 {
        rules.push(RIVERS);
    }
    if factors.urban > 0.7 {
        rules.push(URBAN);
    }
    if factors.vegetation > 0.8 {
        rules.push(VEGETATION);
    }
    if factors.historical > 0.8 {
        rules.push(HISTORICAL);
    }

    if slope_percent > 30.0 {
        rules.push(&[
            "Evitar construções em áreas de alta declividade",
            "Implementar técnicas de engenharia de encostas",
        ]);
    } else if slope_percent > 15.0 {
        rules.push(&["Seguir normas técnicas para construção em declive"]);
    }

    rules.push(GENERAL);

    let mut recommendations: Vec<String> = Vec::with_capacity(MAX_RECOMMENDATIONS);
    for text in rules.into_iter().flatten() {
        if recommendations.len() == MAX_RECOMMENDATIONS {
            break;
        }
        if !recommendations.iter().any(|r| r == text) {
            recommendations.push((*text).to_string());
        }
    }
    recommendations
}

/// Short list for tooltips and compact cards, by score tier only
#[must_use]
pub fn quick_recommendations(normalized_score: u8) -> &'static [&'static str] {
    if normalized_score >= 75 {
        &[
            "Plano de evacuação urgente",
            "Estudo geotécnico necessário",
            "Avaliar relocação de estruturas",
        ]
    } else if normalized_score >= 50 {
        &[
            "Sistema de monitoramento",
            "Medidas preventivas",
            "Alerta precoce",
        ]
    } else if normalized_score >= 30 {
        &[
            "Monitoramento periódico",
            "Manutenção de áreas verdes",
            "Contatos de emergência",
        ]
    } else {
        &[
            "Manter medidas preventivas",
            "Kit de emergência",
            "Treinamento básico",
        ]
    }
}

/// Most actions handed to a city hall for one zone
pub const MAX_GOVERNMENT_RECOMMENDATIONS: usize = 6;

const GOVERNMENT_EMERGENCY: &[&str] = &[
    "Declarar área de risco e implementar medidas emergenciais",
    "Aprovar orçamento para obras de contenção",
    "Revisar legislação de uso do solo",
    "Ampliar capacidade de resposta a emergências",
];

const GOVERNMENT_PREVENTIVE: &[&str] = &[
    "Incluir área no plano diretor de riscos",
    "Licenciar obras com critérios rigorosos",
    "Investir em infraestrutura preventiva",
    "Programas educativos sobre riscos",
];

const GOVERNMENT_GENERAL: &[&str] = &[
    "Integrar dados no sistema municipal de riscos",
    "Parcerias com defesa civil estadual",
    "Modernizar sistemas de monitoramento",
];

/// Public-policy actions for a zone, capped at six
#[must_use]
pub fn government_recommendations(result: &ZoneRiskResult) -> Vec<String> {
    let tier: &[&str] = if result.normalized_score >= 75 {
        GOVERNMENT_EMERGENCY
    } else if result.normalized_score >= 50 {
        GOVERNMENT_PREVENTIVE
    } else {
        &[]
    };

    tier.iter()
        .chain(GOVERNMENT_GENERAL)
        .take(MAX_GOVERNMENT_RECOMMENDATIONS)
        .map(|text| (*text).to_string())
        .collect()
}

/// Urgency bucket of a single recommendation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecommendationPriority {
    Low,
    Medium,
    High,
    Urgent,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PrioritizedRecommendation {
    pub priority: RecommendationPriority,
    pub text: String,
}

const URGENT_KEYWORDS: &[&str] = &["urgente", "imediato", "evacuação", "emergencial"];
const HIGH_KEYWORDS: &[&str] = &["sistema", "monitoramento", "contenção", "alerta"];
const MEDIUM_KEYWORDS: &[&str] = &["implementar", "melhorar", "instalar"];

fn priority_of(text: &str, normalized_score: u8) -> RecommendationPriority {
    let lower = text.to_lowercase();
    let mentions = |keywords: &[&str]| keywords.iter().any(|k| lower.contains(k));

    if normalized_score >= 75 || mentions(URGENT_KEYWORDS) {
        RecommendationPriority::Urgent
    } else if normalized_score >= 50 || mentions(HIGH_KEYWORDS) {
        RecommendationPriority::High
    } else if mentions(MEDIUM_KEYWORDS) {
        RecommendationPriority::Medium
    } else {
        RecommendationPriority::Low
    }
}

/// Tag each recommendation by urgency and order most urgent first
///
/// The zone score lifts every item to at least `HIGH` (score ≥ 50) or
/// `URGENT` (score ≥ 75); otherwise keywords decide. Ties keep their order.
#[must_use]
pub fn prioritize_recommendations(
    recommendations: &[String],
    normalized_score: u8,
) -> Vec<PrioritizedRecommendation> {
    let mut prioritized: Vec<PrioritizedRecommendation> = recommendations
        .iter()
        .map(|text| PrioritizedRecommendation {
            priority: priority_of(text, normalized_score),
            text: text.clone(),
        })
        .collect();
    prioritized.sort_by(|a, b| b.priority.cmp(&a.priority));
    prioritized
}
