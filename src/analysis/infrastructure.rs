//! Classification of geodata elements into infrastructure buckets

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::{BoundingBox, Coordinates};

const BUILT_LANDUSE: &[&str] = &["residential", "commercial", "industrial", "retail"];
const GREEN_LANDUSE: &[&str] = &["forest", "grass", "meadow", "orchard", "vineyard", "farmland"];
const GREEN_NATURAL: &[&str] = &["wood", "grassland", "scrub", "heath"];
const GREEN_LEISURE: &[&str] = &["park", "garden", "nature_reserve"];
const WATER_NATURAL: &[&str] = &["water", "wetland"];

/// One tagged feature returned by the spatial query
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InfrastructureElement {
    /// Element type as reported by the index (`node`, `way`, `relation`)
    pub kind: String,
    pub id: u64,
    pub geometry: Vec<Coordinates>,
    pub tags: HashMap<String, String>,
}

impl InfrastructureElement {
    fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    fn tag_in(&self, key: &str, values: &[&str]) -> bool {
        self.tag(key).is_some_and(|v| values.contains(&v))
    }
}

/// Infrastructure bucket of a classified element
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    River,
    Building,
    Vegetation,
    Road,
}

/// Assign an element to the first matching bucket, `None` when unclassifiable
///
/// Predicates are tested in priority order: water, built-up, green, road.
#[must_use]
pub fn classify_element(element: &InfrastructureElement) -> Option<ElementKind> {
    if element.tag("waterway").is_some() || element.tag_in("natural", WATER_NATURAL) {
        Some(ElementKind::River)
    } else if element.tag("building").is_some() || element.tag_in("landuse", BUILT_LANDUSE) {
        Some(ElementKind::Building)
    } else if element.tag_in("landuse", GREEN_LANDUSE)
        || element.tag_in("natural", GREEN_NATURAL)
        || element.tag_in("leisure", GREEN_LEISURE)
    {
        Some(ElementKind::Vegetation)
    } else if element.tag("highway").is_some() {
        Some(ElementKind::Road)
    } else {
        None
    }
}

/// Classified infrastructure of one zone
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct InfrastructureSummary {
    pub rivers: Vec<InfrastructureElement>,
    pub buildings: Vec<InfrastructureElement>,
    pub vegetation: Vec<InfrastructureElement>,
    pub roads: Vec<InfrastructureElement>,
    /// Number of elements returned before classification
    pub total_elements: usize,
}

impl InfrastructureSummary {
    /// Bucket elements in a single pass, dropping unclassifiable ones
    #[must_use]
    pub fn from_elements(elements: Vec<InfrastructureElement>) -> Self {
        let mut summary = Self {
            total_elements: elements.len(),
            ..Self::default()
        };

        for element in elements {
            match classify_element(&element) {
                Some(ElementKind::River) => summary.rivers.push(element),
                Some(ElementKind::Building) => summary.buildings.push(element),
                Some(ElementKind::Vegetation) => summary.vegetation.push(element),
                Some(ElementKind::Road) => summary.roads.push(element),
                None => {}
            }
        }

        summary
    }

    #[must_use]
    pub fn classified_count(&self) -> usize {
        self.rivers.len() + self.buildings.len() + self.vegetation.len() + self.roads.len()
    }

    /// Classified elements per km² of `bbox`
    #[must_use]
    pub fn density_per_km2(&self, bbox: &BoundingBox) -> f64 {
        let area = bbox.area_km2();
        if area > 0.0 {
            self.classified_count() as f64 / area
        } else {
            0.0
        }
    }
}
