//! Shared fixtures for the integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use climarisk::analysis::InfrastructureElement;
use climarisk::config::{CacheConfig, GridConfig};
use climarisk::geodata::client::with_timeout;
use climarisk::geodata::elevation::build_sampling_grid;
use climarisk::{
    BoundingBox, CityRiskCalculator, Coordinates, ElevationSample, FetchFailure, FetchResult,
    GeodataProvider, HistoricalRiskTable, InMemoryDirectory, RiskService,
};

pub type ElevationFn = Box<dyn Fn(&Coordinates) -> f64 + Send + Sync>;
pub type InfrastructureFn =
    Box<dyn Fn(&BoundingBox) -> FetchResult<Vec<InfrastructureElement>> + Send + Sync>;
pub type StallFn = Box<dyn Fn(&BoundingBox) -> bool + Send + Sync>;

/// Deadline applied to every stubbed infrastructure fetch, like the real resolver
pub const INFRASTRUCTURE_TIMEOUT: Duration = Duration::from_secs(30);

/// Bounding box of the reference scenario around central Curitiba
pub fn curitiba_bbox() -> BoundingBox {
    BoundingBox::new(-25.5, -25.4, -49.3, -49.2)
}

pub fn element(id: u64, tags: &[(&str, &str)]) -> InfrastructureElement {
    InfrastructureElement {
        kind: "way".to_string(),
        id,
        geometry: vec![],
        tags: tags
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect(),
    }
}

pub fn buildings(count: u64) -> Vec<InfrastructureElement> {
    (1..=count).map(|id| element(id, &[("building", "yes")])).collect()
}

/// In-memory geodata source with call counters
pub struct StubProvider {
    pub bbox: Option<BoundingBox>,
    pub elevation: ElevationFn,
    pub infrastructure: InfrastructureFn,
    /// Delay applied to every infrastructure fetch
    pub delay: Duration,
    /// Zones whose infrastructure fetch never answers
    pub stall: Option<StallFn>,
    pub resolve_calls: AtomicUsize,
    pub infrastructure_calls: AtomicUsize,
}

impl StubProvider {
    /// Flat terrain with five buildings per zone
    pub fn new() -> Self {
        Self {
            bbox: Some(curitiba_bbox()),
            elevation: Box::new(|_| 900.0),
            infrastructure: Box::new(|_| Ok(buildings(5))),
            delay: Duration::ZERO,
            stall: None,
            resolve_calls: AtomicUsize::new(0),
            infrastructure_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_bbox(mut self, bbox: Option<BoundingBox>) -> Self {
        self.bbox = bbox;
        self
    }

    pub fn with_elevation(mut self, elevation: ElevationFn) -> Self {
        self.elevation = elevation;
        self
    }

    pub fn with_infrastructure(mut self, infrastructure: InfrastructureFn) -> Self {
        self.infrastructure = infrastructure;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_stall(mut self, stall: StallFn) -> Self {
        self.stall = Some(stall);
        self
    }

    pub fn resolve_calls(&self) -> usize {
        self.resolve_calls.load(Ordering::SeqCst)
    }

    pub fn infrastructure_calls(&self) -> usize {
        self.infrastructure_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GeodataProvider for StubProvider {
    async fn resolve_bounding_box(
        &self,
        _name: &str,
        _uf: &str,
        _city_code: &str,
    ) -> FetchResult<BoundingBox> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        self.bbox
            .ok_or_else(|| FetchFailure::new("geocoding", "no results"))
    }

    async fn sample_elevation(
        &self,
        bbox: &BoundingBox,
        grid_size: usize,
    ) -> FetchResult<Vec<ElevationSample>> {
        let grid = build_sampling_grid(bbox, grid_size)
            .ok_or_else(|| FetchFailure::new("elevation", "bad grid size"))?;
        Ok(grid
            .into_iter()
            .map(|point| {
                let coordinates = Coordinates::new(point.latitude, point.longitude);
                ElevationSample::new(
                    point.latitude,
                    point.longitude,
                    (self.elevation)(&coordinates),
                )
            })
            .collect())
    }

    async fn fetch_infrastructure(
        &self,
        bbox: &BoundingBox,
    ) -> FetchResult<Vec<InfrastructureElement>> {
        self.infrastructure_calls.fetch_add(1, Ordering::SeqCst);
        let stalls = self.stall.as_ref().is_some_and(|stall| stall(bbox));
        with_timeout("overpass", INFRASTRUCTURE_TIMEOUT, async {
            if stalls {
                std::future::pending::<()>().await;
            }
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            (self.infrastructure)(bbox)
        })
        .await
    }
}

pub fn grid(zone_count: usize) -> GridConfig {
    GridConfig {
        zone_count,
        elevation_grid_size: 5,
    }
}

pub fn calculator(provider: Arc<StubProvider>, zone_count: usize) -> CityRiskCalculator {
    CityRiskCalculator::new(
        provider,
        Arc::new(InMemoryDirectory::default()),
        Arc::new(HistoricalRiskTable::default()),
        &grid(zone_count),
    )
    .expect("valid calculator settings")
}

pub fn service(provider: Arc<StubProvider>, zone_count: usize) -> RiskService {
    RiskService::new(calculator(provider, zone_count), &CacheConfig::default())
}
