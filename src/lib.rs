//! `climarisk` - Regional natural-disaster risk engine for Brazilian municipalities
//!
//! This library partitions a municipality into a grid of zones, gathers open
//! geodata for each zone and scores it from five weighted factors: historical
//! disaster incidence, terrain slope, river proximity, urban density and
//! vegetation cover.

pub mod analysis;
pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod geodata;
pub mod logging;
pub mod models;
pub mod municipality;
pub mod orchestrator;
pub mod service;
pub mod web;

// Re-export core types for public API
pub use analysis::{RiskDistribution, filter_for_display};
pub use config::RiskConfig;
pub use error::RiskError;
pub use geodata::{FetchFailure, FetchResult, GeodataProvider, HttpGeodataProvider};
pub use models::{
    BoundingBox, CalculationProgress, CalculationStatus, Coordinates, ElevationSample,
    RiskFactorContribution, Zone, ZoneRiskResult,
};
pub use models::risk::RiskLevel;
pub use municipality::{
    HistoricalRiskSource, HistoricalRiskTable, InMemoryDirectory, Municipality,
    MunicipalityDirectory,
};
pub use orchestrator::{CityRiskCalculator, ProgressReporter, RunTicket, RunTracker};
pub use service::RiskService;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Core result type used throughout the library
pub type Result<T> = std::result::Result<T, RiskError>;
