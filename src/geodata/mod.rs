//! Geodata resolvers
//!
//! Adapters over the open geodata services the engine depends on. Every
//! resolver reports failures as a [`FetchFailure`] value instead of raising a
//! [`crate::RiskError`]; callers decide what "no data" means for a zone.

pub mod client;
pub mod elevation;
pub mod geocoding;
pub mod http;
pub mod overpass;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

use crate::analysis::InfrastructureElement;
use crate::models::{BoundingBox, ElevationSample};

pub use http::HttpGeodataProvider;

/// Elevation grid sizes tried in order before giving up on a zone
pub const ELEVATION_GRID_FALLBACK: [usize; 3] = [5, 4, 3];

/// Why a resolver produced no data
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{service} failed: {reason}")]
pub struct FetchFailure {
    /// Name of the service that failed
    pub service: &'static str,
    pub reason: String,
}

impl FetchFailure {
    pub fn new<S: Into<String>>(service: &'static str, reason: S) -> Self {
        Self {
            service,
            reason: reason.into(),
        }
    }
}

pub type FetchResult<T> = std::result::Result<T, FetchFailure>;

/// Source of the geodata needed to score a municipality
#[async_trait]
pub trait GeodataProvider: Send + Sync {
    /// Resolve the bounding box of a municipality by name, UF and IBGE code
    async fn resolve_bounding_box(
        &self,
        name: &str,
        uf: &str,
        city_code: &str,
    ) -> FetchResult<BoundingBox>;

    /// Sample elevations on a `grid_size × grid_size` grid over `bbox`
    ///
    /// Succeeds only with at least two valid samples.
    async fn sample_elevation(
        &self,
        bbox: &BoundingBox,
        grid_size: usize,
    ) -> FetchResult<Vec<ElevationSample>>;

    /// Fetch the tagged water, built-up, green and road features inside `bbox`
    async fn fetch_infrastructure(
        &self,
        bbox: &BoundingBox,
    ) -> FetchResult<Vec<InfrastructureElement>>;

    /// Fetch only the water features inside `bbox`
    ///
    /// Defaults to filtering [`fetch_infrastructure`](Self::fetch_infrastructure).
    async fn fetch_rivers(&self, bbox: &BoundingBox) -> FetchResult<Vec<InfrastructureElement>> {
        self.fetch_infrastructure(bbox).await.map(overpass::keep_rivers)
    }
}

/// Sample elevation with shrinking grids, starting at `initial_grid_size`
///
/// Grid sizes from [`ELEVATION_GRID_FALLBACK`] larger than the initial size are
/// skipped. The last failure is returned when every attempt fails.
pub async fn sample_elevation_with_fallback(
    provider: &dyn GeodataProvider,
    bbox: &BoundingBox,
    initial_grid_size: usize,
) -> FetchResult<Vec<ElevationSample>> {
    let mut sizes = vec![initial_grid_size];
    sizes.extend(
        ELEVATION_GRID_FALLBACK
            .iter()
            .copied()
            .filter(|size| *size < initial_grid_size),
    );

    let mut last_failure = FetchFailure::new("elevation", "no grid size attempted");
    for size in sizes {
        match provider.sample_elevation(bbox, size).await {
            Ok(samples) => {
                debug!("Elevation grid {size}x{size} returned {} samples", samples.len());
                return Ok(samples);
            }
            Err(failure) => {
                warn!("Elevation grid {size}x{size} failed: {failure}");
                last_failure = failure;
            }
        }
    }

    Err(last_failure)
}
