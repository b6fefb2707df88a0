//! Open-Elevation sampling over a zone

use reqwest_middleware::ClientWithMiddleware;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use super::client::{read_json, transport_failure, with_timeout};
use super::{FetchFailure, FetchResult};
use crate::analysis::terrain::ElevationStats;
use crate::config::ServicesConfig;
use crate::models::{BoundingBox, ElevationSample};

const SERVICE: &str = "open_elevation";

/// Smallest and largest accepted sampling grid side
pub const MIN_GRID_SIZE: usize = 2;
pub const MAX_GRID_SIZE: usize = 20;

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct LookupLocation {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Serialize)]
struct LookupRequest<'a> {
    locations: &'a [LookupLocation],
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    results: Option<Vec<LookupResult>>,
}

#[derive(Debug, Deserialize)]
struct LookupResult {
    latitude: Option<f64>,
    longitude: Option<f64>,
    elevation: Option<f64>,
}

/// Evenly spaced `grid_size × grid_size` points spanning the bbox corners
///
/// Returns `None` for a grid size outside `2..=20`.
#[must_use]
pub fn build_sampling_grid(bbox: &BoundingBox, grid_size: usize) -> Option<Vec<LookupLocation>> {
    if !(MIN_GRID_SIZE..=MAX_GRID_SIZE).contains(&grid_size) {
        return None;
    }

    let steps = (grid_size - 1) as f64;
    let lat_step = bbox.lat_span() / steps;
    let lon_step = bbox.lon_span() / steps;

    let points = (0..grid_size)
        .flat_map(|i| {
            (0..grid_size).map(move |j| LookupLocation {
                latitude: bbox.min_lat + i as f64 * lat_step,
                longitude: bbox.min_lon + j as f64 * lon_step,
            })
        })
        .collect();

    Some(points)
}

fn parse_lookup(response: LookupResponse, requested: usize) -> FetchResult<Vec<ElevationSample>> {
    let results = response
        .results
        .ok_or_else(|| FetchFailure::new(SERVICE, "payload has no 'results' array"))?;

    if results.len() != requested {
        warn!("Elevation returned {}/{} points", results.len(), requested);
    }

    let samples: Vec<ElevationSample> = results
        .into_iter()
        .filter_map(|result| match (result.latitude, result.longitude, result.elevation) {
            (Some(lat), Some(lon), Some(elevation)) => {
                Some(ElevationSample::new(lat, lon, elevation))
            }
            _ => None,
        })
        .filter(ElevationSample::is_valid)
        .collect();

    if samples.len() < 2 {
        return Err(FetchFailure::new(
            SERVICE,
            format!("only {} valid samples", samples.len()),
        ));
    }

    Ok(samples)
}

/// Sample elevations over `bbox` with one batched lookup
#[instrument(skip(client, services, bbox))]
pub async fn fetch_elevation(
    client: &ClientWithMiddleware,
    services: &ServicesConfig,
    bbox: &BoundingBox,
    grid_size: usize,
) -> FetchResult<Vec<ElevationSample>> {
    let locations = build_sampling_grid(bbox, grid_size).ok_or_else(|| {
        FetchFailure::new(
            SERVICE,
            format!("grid size {grid_size} outside {MIN_GRID_SIZE}..={MAX_GRID_SIZE}"),
        )
    })?;

    let body = serde_json::to_vec(&LookupRequest {
        locations: &locations,
    })
    .map_err(|e| FetchFailure::new(SERVICE, format!("failed to encode request: {e}")))?;

    debug!("Requesting elevation for {} points", locations.len());

    let samples = with_timeout(SERVICE, services.elevation_timeout(), async {
        let response = client
            .post(&services.open_elevation_url)
            .header("Accept", "application/json")
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| transport_failure(SERVICE, e))?;
        let payload: LookupResponse = read_json(SERVICE, response).await?;
        parse_lookup(payload, locations.len())
    })
    .await?;

    if let Some(stats) = ElevationStats::from_samples(&samples) {
        debug!(
            "Elevation {} samples: min {:.1} m, max {:.1} m, mean {:.1} m",
            stats.count, stats.min, stats.max, stats.mean
        );
    }

    Ok(samples)
}
