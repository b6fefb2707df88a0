use anyhow::Result;
use async_trait::async_trait;
use reqwest_middleware::ClientWithMiddleware;

use super::client::build_client;
use super::{FetchResult, GeodataProvider, elevation, geocoding, overpass};
use crate::analysis::InfrastructureElement;
use crate::config::ServicesConfig;
use crate::models::{BoundingBox, ElevationSample};

/// [`GeodataProvider`] backed by the public OSM, IBGE and Open-Elevation services
pub struct HttpGeodataProvider {
    client: ClientWithMiddleware,
    services: ServicesConfig,
}

impl HttpGeodataProvider {
    pub fn new(services: &ServicesConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(services)?,
            services: services.clone(),
        })
    }
}

#[async_trait]
impl GeodataProvider for HttpGeodataProvider {
    async fn resolve_bounding_box(
        &self,
        name: &str,
        uf: &str,
        city_code: &str,
    ) -> FetchResult<BoundingBox> {
        geocoding::resolve_bounding_box(&self.client, &self.services, name, uf, city_code).await
    }

    async fn sample_elevation(
        &self,
        bbox: &BoundingBox,
        grid_size: usize,
    ) -> FetchResult<Vec<ElevationSample>> {
        elevation::fetch_elevation(&self.client, &self.services, bbox, grid_size).await
    }

    async fn fetch_infrastructure(
        &self,
        bbox: &BoundingBox,
    ) -> FetchResult<Vec<InfrastructureElement>> {
        overpass::fetch_infrastructure(&self.client, &self.services, bbox).await
    }

    async fn fetch_rivers(&self, bbox: &BoundingBox) -> FetchResult<Vec<InfrastructureElement>> {
        overpass::fetch_rivers(&self.client, &self.services, bbox).await
    }
}
