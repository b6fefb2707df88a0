//! Overpass infrastructure query for one zone

use std::collections::HashMap;

use reqwest_middleware::ClientWithMiddleware;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use super::client::{read_json, transport_failure, with_timeout};
use super::{FetchFailure, FetchResult};
use crate::analysis::infrastructure::classify_element;
use crate::analysis::{ElementKind, InfrastructureElement};
use crate::config::ServicesConfig;
use crate::models::{BoundingBox, Coordinates};

const SERVICE: &str = "overpass";

/// Above this extent in deg² the query tends to be slow
pub const HEAVY_QUERY_AREA_DEG2: f64 = 0.1;

/// `(element, filter)` selectors of the composite query
const SELECTORS: &[(&str, &str)] = &[
    // water
    ("way", r#"["waterway"~"^(river|stream|canal|ditch)$"]"#),
    ("relation", r#"["waterway"~"^(river|stream|canal|ditch)$"]"#),
    ("way", r#"["natural"~"^(water|wetland)$"]"#),
    ("relation", r#"["natural"~"^(water|wetland)$"]"#),
    // built-up
    ("way", r#"["building"]"#),
    ("relation", r#"["building"]"#),
    ("way", r#"["landuse"~"^(residential|commercial|industrial|retail)$"]"#),
    ("relation", r#"["landuse"~"^(residential|commercial|industrial|retail)$"]"#),
    // green
    ("way", r#"["landuse"~"^(forest|grass|meadow|orchard|vineyard|farmland)$"]"#),
    ("relation", r#"["landuse"~"^(forest|grass|meadow|orchard|vineyard|farmland)$"]"#),
    ("way", r#"["natural"~"^(wood|grassland|scrub|heath)$"]"#),
    ("relation", r#"["natural"~"^(wood|grassland|scrub|heath)$"]"#),
    ("way", r#"["leisure"~"^(park|garden|nature_reserve)$"]"#),
    ("relation", r#"["leisure"~"^(park|garden|nature_reserve)$"]"#),
    // roads
    ("way", r#"["highway"~"^(primary|secondary|tertiary|residential|trunk|motorway)$"]"#),
    ("way", r#"["highway"="unclassified"]"#),
];

/// Water-only subset for river lookups
const RIVER_SELECTORS: &[(&str, &str)] = &[
    ("way", r#"["waterway"~"^(river|stream|canal|ditch)$"]"#),
    ("relation", r#"["waterway"~"^(river|stream|canal|ditch)$"]"#),
    ("way", r#"["natural"~"^(water|wetland)$"]"#),
];

#[derive(Debug, Deserialize)]
struct OverpassPoint {
    lat: f64,
    lon: f64,
}

#[derive(Debug, Deserialize)]
struct RawElement {
    #[serde(rename = "type")]
    kind: String,
    id: u64,
    #[serde(default)]
    lat: Option<f64>,
    #[serde(default)]
    lon: Option<f64>,
    #[serde(default)]
    geometry: Vec<Option<OverpassPoint>>,
    #[serde(default)]
    tags: HashMap<String, String>,
}

impl From<RawElement> for InfrastructureElement {
    fn from(raw: RawElement) -> Self {
        let mut geometry: Vec<Coordinates> = raw
            .geometry
            .into_iter()
            .flatten()
            .map(|point| Coordinates::new(point.lat, point.lon))
            .collect();
        if let (true, Some(lat), Some(lon)) = (geometry.is_empty(), raw.lat, raw.lon) {
            geometry.push(Coordinates::new(lat, lon));
        }

        InfrastructureElement {
            kind: raw.kind,
            id: raw.id,
            geometry,
            tags: raw.tags,
        }
    }
}

fn compose_query(bbox: &BoundingBox, selectors: &[(&str, &str)], timeout_seconds: u32) -> String {
    let area = format!(
        "({},{},{},{})",
        bbox.min_lat, bbox.min_lon, bbox.max_lat, bbox.max_lon
    );

    let mut query = format!("[out:json][timeout:{timeout_seconds}];\n(\n");
    for (element, filter) in selectors {
        query.push_str(&format!("  {element}{filter}{area};\n"));
    }
    query.push_str(");\nout geom;");
    query
}

/// Overpass QL query selecting every feature relevant to the risk factors
#[must_use]
pub fn build_query(bbox: &BoundingBox) -> String {
    compose_query(bbox, SELECTORS, 25)
}

/// Lighter query selecting only waterways and water bodies
#[must_use]
pub fn build_rivers_query(bbox: &BoundingBox) -> String {
    compose_query(bbox, RIVER_SELECTORS, 15)
}

/// Form-encoded request body carrying the query
#[must_use]
pub fn form_body(query: &str) -> String {
    format!("data={}", urlencoding::encode(query))
}

/// Decode the `elements` array, skipping entries that do not parse
pub fn parse_elements(payload: &Value) -> FetchResult<Vec<InfrastructureElement>> {
    let elements = payload
        .get("elements")
        .and_then(Value::as_array)
        .ok_or_else(|| FetchFailure::new(SERVICE, "payload has no 'elements' array"))?;

    let mut parsed = Vec::with_capacity(elements.len());
    for element in elements {
        match serde_json::from_value::<RawElement>(element.clone()) {
            Ok(raw) => parsed.push(raw.into()),
            Err(e) => debug!("Skipping malformed Overpass element: {e}"),
        }
    }

    Ok(parsed)
}

/// Fetch the tagged features inside `bbox`
#[instrument(skip(client, services, bbox), fields(area_deg2 = bbox.area_deg2()))]
pub async fn fetch_infrastructure(
    client: &ClientWithMiddleware,
    services: &ServicesConfig,
    bbox: &BoundingBox,
) -> FetchResult<Vec<InfrastructureElement>> {
    if bbox.min_lat >= bbox.max_lat || bbox.min_lon >= bbox.max_lon {
        return Err(FetchFailure::new(SERVICE, "degenerate bounding box"));
    }

    if bbox.area_deg2() > HEAVY_QUERY_AREA_DEG2 {
        warn!(
            "Overpass query over {:.3} deg² may be slow",
            bbox.area_deg2()
        );
    }

    let elements = run_query(client, services, &build_query(bbox)).await?;
    debug!("Overpass returned {} elements", elements.len());
    Ok(elements)
}

/// Fetch only the water features inside `bbox`
#[instrument(skip(client, services, bbox))]
pub async fn fetch_rivers(
    client: &ClientWithMiddleware,
    services: &ServicesConfig,
    bbox: &BoundingBox,
) -> FetchResult<Vec<InfrastructureElement>> {
    if bbox.min_lat >= bbox.max_lat || bbox.min_lon >= bbox.max_lon {
        return Err(FetchFailure::new(SERVICE, "degenerate bounding box"));
    }

    let elements = run_query(client, services, &build_rivers_query(bbox)).await?;
    let rivers = keep_rivers(elements);
    debug!("Overpass returned {} water features", rivers.len());
    Ok(rivers)
}

/// Drop everything the classifier does not put in the river bucket
#[must_use]
pub fn keep_rivers(elements: Vec<InfrastructureElement>) -> Vec<InfrastructureElement> {
    elements
        .into_iter()
        .filter(|element| classify_element(element) == Some(ElementKind::River))
        .collect()
}

async fn run_query(
    client: &ClientWithMiddleware,
    services: &ServicesConfig,
    query: &str,
) -> FetchResult<Vec<InfrastructureElement>> {
    let body = form_body(query);

    with_timeout(SERVICE, services.overpass_timeout(), async {
        let response = client
            .post(&services.overpass_url)
            .header("Accept", "application/json")
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
            .map_err(|e| transport_failure(SERVICE, e))?;
        let payload: Value = read_json(SERVICE, response).await?;
        parse_elements(&payload)
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_shape() {
        let bbox = BoundingBox::new(-25.5, -25.4, -49.3, -49.2);
        let query = build_query(&bbox);

        assert!(query.starts_with("[out:json][timeout:25];"));
        assert!(query.ends_with("out geom;"));
        assert!(query.contains(r#"way["building"](-25.5,-49.3,-25.4,-49.2);"#));
        assert!(query.contains(r#"way["highway"="unclassified"](-25.5,-49.3,-25.4,-49.2);"#));
        assert_eq!(query.matches("(-25.5,-49.3,-25.4,-49.2)").count(), SELECTORS.len());
    }

    #[test]
    fn test_form_body_is_encoded() {
        let body = form_body(r#"way["building"];"#);
        assert_eq!(body, "data=way%5B%22building%22%5D%3B");
    }

    #[test]
    fn test_parse_elements() {
        let payload = json!({
            "version": 0.6,
            "elements": [
                {
                    "type": "way",
                    "id": 1,
                    "geometry": [{"lat": -25.45, "lon": -49.25}, {"lat": -25.46, "lon": -49.26}],
                    "tags": {"waterway": "stream"}
                },
                {"type": "node", "id": 2, "lat": -25.44, "lon": -49.24, "tags": {"building": "yes"}},
                {"type": "relation", "id": 3},
                {"type": "way"}
            ]
        });

        let elements = parse_elements(&payload).unwrap();
        assert_eq!(elements.len(), 3);
        assert_eq!(elements[0].geometry.len(), 2);
        assert_eq!(elements[0].tags.get("waterway").map(String::as_str), Some("stream"));
        assert_eq!(elements[1].geometry, vec![Coordinates::new(-25.44, -49.24)]);
        assert!(elements[2].tags.is_empty());
    }

    #[test]
    fn test_missing_elements_is_malformed() {
        let failure = parse_elements(&json!({"remark": "runtime error"})).unwrap_err();
        assert_eq!(failure.service, "overpass");

        assert!(parse_elements(&json!({"elements": {}})).is_err());
    }

    #[test]
    fn test_rivers_query_selects_water_only() {
        let bbox = BoundingBox::new(-25.5, -25.4, -49.3, -49.2);
        let query = build_rivers_query(&bbox);

        assert!(query.starts_with("[out:json][timeout:15];"));
        assert!(query.ends_with("out geom;"));
        assert!(query.contains(r#"relation["waterway"~"^(river|stream|canal|ditch)$"](-25.5,-49.3,-25.4,-49.2);"#));
        assert!(!query.contains("building"));
        assert!(!query.contains("highway"));
        assert_eq!(query.matches("(-25.5,-49.3,-25.4,-49.2)").count(), 3);
    }

    #[test]
    fn test_keep_rivers_filters_other_buckets() {
        let payload = json!({
            "elements": [
                {"type": "way", "id": 1, "tags": {"waterway": "river"}},
                {"type": "way", "id": 2, "tags": {"natural": "wetland"}},
                {"type": "way", "id": 3, "tags": {"natural": "wood"}},
                {"type": "way", "id": 4}
            ]
        });

        let rivers = keep_rivers(parse_elements(&payload).unwrap());
        let ids: Vec<u64> = rivers.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }
}
