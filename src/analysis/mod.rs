//! Risk analysis module
//!
//! Pure, network-free building blocks of a calculation run:
//! - Grid partitioning of a municipality bounding box
//! - Terrain slope analysis from elevation samples
//! - Classification of geodata elements into infrastructure buckets
//! - Five-factor weighted scoring, risk classification and recommendations

pub mod classification;
pub mod grid;
pub mod infrastructure;
pub mod recommendations;
pub mod scoring;
pub mod terrain;

pub use classification::{RiskDistribution, RiskScored, classify_risk, filter_for_display};
pub use grid::{GridValidation, partition, validate_grid};
pub use infrastructure::{ElementKind, InfrastructureElement, InfrastructureSummary};
pub use recommendations::generate_recommendations;
pub use scoring::{FACTOR_WEIGHTS, FactorSignals, ZoneSignals, score_zone, validate_weights};
pub use terrain::{TerrainClass, classify_terrain, slope_percent};
