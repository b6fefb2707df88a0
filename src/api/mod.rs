use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
};
use serde::{Deserialize, Serialize};

use crate::RiskError;
use crate::analysis::grid::{find_zone_containing, grid_side, neighboring_zones};
use crate::analysis::recommendations::{
    PrioritizedRecommendation, government_recommendations, prioritize_recommendations,
    quick_recommendations,
};
use crate::analysis::{RiskDistribution, filter_for_display};
use crate::models::{Coordinates, ZoneRiskResult};
use crate::orchestrator::ProgressReporter;
use crate::service::RiskService;

#[derive(Debug, Deserialize)]
pub struct RiskQuery {
    pub uf: String,
    /// Only return zones at or above the display threshold
    #[serde(default)]
    pub display: bool,
    pub max_age_minutes: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiRiskResponse {
    pub city_code: String,
    pub uf: String,
    pub zones: Vec<ZoneRiskResult>,
    /// Distribution over every zone of the run, filtered or not
    pub distribution: RiskDistribution,
}

#[derive(Debug, Deserialize)]
pub struct ZoneQuery {
    pub uf: String,
    pub max_age_minutes: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct LocateQuery {
    pub uf: String,
    pub lat: f64,
    pub lon: f64,
    pub max_age_minutes: Option<u32>,
}

/// One zone with the context a prevention plan needs
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiZoneDetail {
    pub zone: ZoneRiskResult,
    pub description: String,
    pub neighbors: Vec<ZoneRiskResult>,
    pub quick_recommendations: Vec<String>,
    pub government_recommendations: Vec<String>,
    pub prioritized_recommendations: Vec<PrioritizedRecommendation>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiHealth {
    pub status: String,
    pub version: String,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

/// HTTP status for a failed run
#[must_use]
pub fn status_for(error: &RiskError) -> StatusCode {
    match error {
        RiskError::Resolution { .. } => StatusCode::NOT_FOUND,
        RiskError::Validation { .. } | RiskError::Partition { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        RiskError::Superseded { .. } => StatusCode::CONFLICT,
        RiskError::Api { .. } => StatusCode::BAD_GATEWAY,
        RiskError::Config { .. } | RiskError::General { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn error_response(error: &RiskError) -> (StatusCode, Json<ApiError>) {
    (
        status_for(error),
        Json(ApiError {
            error: error.to_string(),
            message: error.user_message(),
        }),
    )
}

pub fn router(service: Arc<RiskService>) -> Router {
    Router::new()
        .route("/health", get(get_health))
        .route("/municipalities/{code}/risk", get(get_municipality_risk))
        .route("/municipalities/{code}/zones/{zone_id}", get(get_zone))
        .route("/municipalities/{code}/locate", get(locate_zone))
        .with_state(service)
}

async fn get_health() -> Json<ApiHealth> {
    Json(ApiHealth {
        status: "ok".to_string(),
        version: crate::VERSION.to_string(),
    })
}

async fn get_municipality_risk(
    State(service): State<Arc<RiskService>>,
    Path(code): Path<String>,
    Query(query): Query<RiskQuery>,
) -> ApiResult<ApiRiskResponse> {
    let results = service
        .calculate(&code, &query.uf, max_age(query.max_age_minutes), ProgressReporter::silent())
        .await
        .map_err(|e| error_response(&e))?;

    let distribution = RiskDistribution::from_results(results.as_slice());
    let zones = if query.display {
        filter_for_display(results.as_slice())
    } else {
        results.to_vec()
    };

    Ok(Json(ApiRiskResponse {
        city_code: code.trim().to_string(),
        uf: query.uf.trim().to_uppercase(),
        zones,
        distribution,
    }))
}

fn max_age(minutes: Option<u32>) -> Option<Duration> {
    minutes.map(|minutes| Duration::from_secs(u64::from(minutes) * 60))
}

fn zone_not_found(message: String) -> (StatusCode, Json<ApiError>) {
    (
        StatusCode::NOT_FOUND,
        Json(ApiError {
            error: "Zone not found".to_string(),
            message,
        }),
    )
}

fn zone_detail(service: &RiskService, results: &[ZoneRiskResult], zone: &ZoneRiskResult) -> ApiZoneDetail {
    let side = grid_side(service.calculator().zone_count()).unwrap_or(0);
    ApiZoneDetail {
        zone: zone.clone(),
        description: zone.level.description().to_string(),
        neighbors: neighboring_zones(results, zone.id, side)
            .into_iter()
            .cloned()
            .collect(),
        quick_recommendations: quick_recommendations(zone.normalized_score)
            .iter()
            .map(|text| (*text).to_string())
            .collect(),
        government_recommendations: government_recommendations(zone),
        prioritized_recommendations: prioritize_recommendations(
            &zone.recommendations,
            zone.normalized_score,
        ),
    }
}

async fn get_zone(
    State(service): State<Arc<RiskService>>,
    Path((code, zone_id)): Path<(String, u32)>,
    Query(query): Query<ZoneQuery>,
) -> ApiResult<ApiZoneDetail> {
    let results = service
        .calculate(&code, &query.uf, max_age(query.max_age_minutes), ProgressReporter::silent())
        .await
        .map_err(|e| error_response(&e))?;

    let zone = results
        .iter()
        .find(|zone| zone.id == zone_id)
        .ok_or_else(|| zone_not_found(format!("{code} has no zone {zone_id}")))?;

    Ok(Json(zone_detail(&service, &results, zone)))
}

async fn locate_zone(
    State(service): State<Arc<RiskService>>,
    Path(code): Path<String>,
    Query(query): Query<LocateQuery>,
) -> ApiResult<ApiZoneDetail> {
    let results = service
        .calculate(&code, &query.uf, max_age(query.max_age_minutes), ProgressReporter::silent())
        .await
        .map_err(|e| error_response(&e))?;

    let point = Coordinates::new(query.lat, query.lon);
    let zone = find_zone_containing(results.as_slice(), &point).ok_or_else(|| {
        zone_not_found(format!("{} lies outside {code}", point.format()))
    })?;

    Ok(Json(zone_detail(&service, &results, zone)))
}
