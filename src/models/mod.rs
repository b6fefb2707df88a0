//! Data models for the risk calculation engine
//!
//! This module contains the core domain models organized by concern:
//! - Geo: coordinates, bounding boxes and spherical distance helpers
//! - Zone: grid cells and the elevation samples fetched for them
//! - Risk: factor contributions, per-zone results and progress events

pub mod geo;
pub mod risk;
pub mod zone;

// Re-export all public types for convenient access
pub use geo::{BoundingBox, Coordinates};
pub use risk::{CalculationProgress, CalculationStatus, RiskFactorContribution, ZoneRiskResult};
pub use zone::{ElevationSample, Zone};
