//! Municipality bounding-box resolution
//!
//! Nominatim text search is tried first; the IBGE municipal boundary
//! service is the authoritative fallback.

use std::future::Future;

use reqwest_middleware::ClientWithMiddleware;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use super::client::{read_json, transport_failure, with_timeout};
use super::{FetchFailure, FetchResult};
use crate::config::ServicesConfig;
use crate::models::{BoundingBox, Coordinates};

const NOMINATIM: &str = "nominatim";
const IBGE: &str = "ibge_malha";

/// One Nominatim search hit
#[derive(Debug, Deserialize)]
struct NominatimPlace {
    /// `[minLat, maxLat, minLon, maxLon]` as decimal strings
    boundingbox: Vec<String>,
    lat: String,
    lon: String,
    #[serde(default)]
    display_name: Option<String>,
}

/// Free-text query for a municipality
#[must_use]
pub fn nominatim_query(name: &str, uf: &str) -> String {
    format!("{name}, {uf}, Brasil")
}

#[must_use]
pub fn nominatim_url(base_url: &str, name: &str, uf: &str) -> String {
    format!(
        "{base_url}?format=json&q={}&limit=1&addressdetails=1",
        urlencoding::encode(&nominatim_query(name, uf))
    )
}

#[must_use]
pub fn ibge_malha_url(base_url: &str, city_code: &str) -> String {
    format!(
        "{base_url}/{}?formato=application/vnd.geo+json",
        urlencoding::encode(city_code)
    )
}

fn parse_number(service: &'static str, field: &str, raw: &str) -> FetchResult<f64> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| FetchFailure::new(service, format!("field '{field}' is not a number: {raw}")))
}

/// Extract the bounding box of the first Nominatim hit
pub fn parse_nominatim(payload: &Value) -> FetchResult<BoundingBox> {
    let places: Vec<NominatimPlace> = serde_json::from_value(payload.clone())
        .map_err(|e| FetchFailure::new(NOMINATIM, format!("malformed payload: {e}")))?;

    let place = places
        .into_iter()
        .next()
        .ok_or_else(|| FetchFailure::new(NOMINATIM, "no results"))?;

    let [min_lat, max_lat, min_lon, max_lon] = place.boundingbox.as_slice() else {
        return Err(FetchFailure::new(
            NOMINATIM,
            format!("expected 4 bounding box values, got {}", place.boundingbox.len()),
        ));
    };

    if let Some(display_name) = &place.display_name {
        debug!("Nominatim matched '{display_name}'");
    }

    Ok(BoundingBox::with_center(
        parse_number(NOMINATIM, "boundingbox[0]", min_lat)?,
        parse_number(NOMINATIM, "boundingbox[1]", max_lat)?,
        parse_number(NOMINATIM, "boundingbox[2]", min_lon)?,
        parse_number(NOMINATIM, "boundingbox[3]", max_lon)?,
        Coordinates::new(
            parse_number(NOMINATIM, "lat", &place.lat)?,
            parse_number(NOMINATIM, "lon", &place.lon)?,
        ),
    ))
}

/// Collect every `[lon, lat, ..]` position below a GeoJSON node
fn collect_positions(node: &Value, positions: &mut Vec<Coordinates>) {
    match node {
        Value::Array(items) => {
            if let [Value::Number(lon), Value::Number(lat), ..] = items.as_slice() {
                if let (Some(lon), Some(lat)) = (lon.as_f64(), lat.as_f64()) {
                    positions.push(Coordinates::new(lat, lon));
                }
            } else {
                for item in items {
                    collect_positions(item, positions);
                }
            }
        }
        Value::Object(map) => {
            for key in ["features", "geometry", "geometries", "coordinates"] {
                if let Some(child) = map.get(key) {
                    collect_positions(child, positions);
                }
            }
        }
        _ => {}
    }
}

/// Envelope of all boundary vertices in an IBGE GeoJSON payload
///
/// Accepts a bare geometry, a Feature or a FeatureCollection with Polygon or
/// MultiPolygon geometries. The center is the envelope midpoint.
pub fn parse_ibge_malha(payload: &Value) -> FetchResult<BoundingBox> {
    let mut positions = Vec::new();
    collect_positions(payload, &mut positions);

    BoundingBox::envelope(positions)
        .ok_or_else(|| FetchFailure::new(IBGE, "payload has no boundary coordinates"))
}

/// Resolve a municipality bbox via Nominatim text search
#[instrument(skip(client, services))]
pub async fn fetch_nominatim_bbox(
    client: &ClientWithMiddleware,
    services: &ServicesConfig,
    name: &str,
    uf: &str,
) -> FetchResult<BoundingBox> {
    let url = nominatim_url(&services.nominatim_url, name, uf);
    debug!("Searching Nominatim: {url}");

    with_timeout(NOMINATIM, services.nominatim_timeout(), async {
        let response = client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| transport_failure(NOMINATIM, e))?;
        let payload: Value = read_json(NOMINATIM, response).await?;
        parse_nominatim(&payload)
    })
    .await
}

/// Resolve a municipality bbox from its IBGE boundary polygon
#[instrument(skip(client, services))]
pub async fn fetch_ibge_bbox(
    client: &ClientWithMiddleware,
    services: &ServicesConfig,
    city_code: &str,
) -> FetchResult<BoundingBox> {
    let url = ibge_malha_url(&services.ibge_malha_url, city_code);
    debug!("Fetching IBGE boundary: {url}");

    with_timeout(IBGE, services.ibge_timeout(), async {
        let response = client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| transport_failure(IBGE, e))?;
        let payload: Value = read_json(IBGE, response).await?;
        parse_ibge_malha(&payload)
    })
    .await
}

/// Try `primary`, then `fallback` only if `primary` fails
///
/// Both failures are folded into one [`FetchFailure`].
pub async fn resolve_with_fallback<P, F, Fut>(
    label: &str,
    primary: P,
    fallback: F,
) -> FetchResult<BoundingBox>
where
    P: Future<Output = FetchResult<BoundingBox>>,
    F: FnOnce() -> Fut,
    Fut: Future<Output = FetchResult<BoundingBox>>,
{
    let primary_failure = match primary.await {
        Ok(bbox) => {
            info!("Resolved {label} via primary lookup");
            return Ok(bbox);
        }
        Err(failure) => {
            warn!("Primary lookup for {label} failed: {failure}");
            failure
        }
    };

    match fallback().await {
        Ok(bbox) => {
            info!("Resolved {label} via fallback boundary lookup");
            Ok(bbox)
        }
        Err(failure) => {
            warn!("Fallback lookup for {label} failed: {failure}");
            Err(FetchFailure::new(
                "geocoding",
                format!("{primary_failure}; {failure}"),
            ))
        }
    }
}

/// Nominatim first, IBGE boundary as fallback
pub async fn resolve_bounding_box(
    client: &ClientWithMiddleware,
    services: &ServicesConfig,
    name: &str,
    uf: &str,
    city_code: &str,
) -> FetchResult<BoundingBox> {
    resolve_with_fallback(
        &format!("{name}/{uf} ({city_code})"),
        fetch_nominatim_bbox(client, services, name, uf),
        || fetch_ibge_bbox(client, services, city_code),
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nominatim_url_encodes_query() {
        let url = nominatim_url("https://nominatim.example/search", "São Paulo", "SP");
        assert!(url.starts_with("https://nominatim.example/search?format=json&q="));
        assert!(url.contains("S%C3%A3o%20Paulo%2C%20SP%2C%20Brasil"));
        assert!(url.ends_with("&limit=1&addressdetails=1"));
    }

    #[test]
    fn test_ibge_url() {
        assert_eq!(
            ibge_malha_url("https://ibge.example/malhas/municipios", "4106902"),
            "https://ibge.example/malhas/municipios/4106902?formato=application/vnd.geo+json"
        );
    }

    #[test]
    fn test_parse_nominatim() {
        let payload = json!([{
            "boundingbox": ["-25.6450", "-25.3447", "-49.3894", "-49.1848"],
            "lat": "-25.4295963",
            "lon": "-49.2712724",
            "display_name": "Curitiba, Paraná, Brasil"
        }]);

        let bbox = parse_nominatim(&payload).unwrap();
        assert_eq!(bbox.min_lat, -25.6450);
        assert_eq!(bbox.max_lat, -25.3447);
        assert_eq!(bbox.min_lon, -49.3894);
        assert_eq!(bbox.max_lon, -49.1848);
        assert_eq!(bbox.center_lat, -25.4295963);
        assert_eq!(bbox.center_lon, -49.2712724);
    }

    #[test]
    fn test_parse_nominatim_empty_and_malformed() {
        let empty = parse_nominatim(&json!([])).unwrap_err();
        assert_eq!(empty.reason, "no results");

        let short_box = json!([{"boundingbox": ["1", "2"], "lat": "1.5", "lon": "1.5"}]);
        assert!(parse_nominatim(&short_box).is_err());

        let not_number = json!([{"boundingbox": ["a", "2", "3", "4"], "lat": "1.5", "lon": "3.5"}]);
        assert!(parse_nominatim(&not_number).unwrap_err().reason.contains("not a number"));

        assert!(parse_nominatim(&json!({"error": "rate limited"})).is_err());
    }

    #[test]
    fn test_parse_ibge_multipolygon_feature() {
        let payload = json!({
            "type": "Feature",
            "geometry": {
                "type": "MultiPolygon",
                "coordinates": [
                    [[[-49.38, -25.64], [-49.19, -25.60], [-49.20, -25.35], [-49.38, -25.64]]],
                    [[[-49.40, -25.50], [-49.39, -25.49], [-49.40, -25.50]]]
                ]
            }
        });

        let bbox = parse_ibge_malha(&payload).unwrap();
        assert_eq!(bbox.min_lat, -25.64);
        assert_eq!(bbox.max_lat, -25.35);
        assert_eq!(bbox.min_lon, -49.40);
        assert_eq!(bbox.max_lon, -49.19);
        assert!((bbox.center_lat - (-25.495)).abs() < 1e-9);
        assert!((bbox.center_lon - (-49.295)).abs() < 1e-9);
    }

    #[test]
    fn test_parse_ibge_feature_collection_polygon() {
        let payload = json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "properties": {"codarea": "4106902"},
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[-49.3, -25.5], [-49.2, -25.5], [-49.2, -25.4], [-49.3, -25.4]]]
                }
            }]
        });

        let bbox = parse_ibge_malha(&payload).unwrap();
        assert_eq!((bbox.min_lat, bbox.max_lat), (-25.5, -25.4));
        assert_eq!((bbox.min_lon, bbox.max_lon), (-49.3, -49.2));
    }

    #[test]
    fn test_parse_ibge_without_geometry() {
        let failure = parse_ibge_malha(&json!({"type": "Feature", "properties": {}})).unwrap_err();
        assert_eq!(failure.service, "ibge_malha");
    }

    fn curitiba() -> BoundingBox {
        BoundingBox::new(-25.5, -25.4, -49.3, -49.2)
    }

    #[tokio::test]
    async fn test_fallback_skipped_when_primary_resolves() {
        let mut fallback_called = false;
        let bbox = resolve_with_fallback("Curitiba/PR", async { Ok(curitiba()) }, || {
            fallback_called = true;
            async { Err(FetchFailure::new(IBGE, "unreachable")) }
        })
        .await
        .unwrap();

        assert_eq!(bbox, curitiba());
        assert!(!fallback_called);
    }

    #[tokio::test]
    async fn test_fallback_used_when_primary_fails() {
        let bbox = resolve_with_fallback(
            "Curitiba/PR",
            async { Err(FetchFailure::new(NOMINATIM, "no results")) },
            || async { Ok(curitiba()) },
        )
        .await
        .unwrap();

        assert_eq!(bbox, curitiba());
    }

    #[tokio::test]
    async fn test_both_lookups_failing_is_an_error_value() {
        let failure = resolve_with_fallback(
            "Nowhere/XX",
            async { Err(FetchFailure::new(NOMINATIM, "no results")) },
            || async { Err(FetchFailure::new(IBGE, "HTTP 404 Not Found: ")) },
        )
        .await
        .unwrap_err();

        assert_eq!(failure.service, "geocoding");
        assert!(failure.reason.contains("nominatim failed: no results"));
        assert!(failure.reason.contains("ibge_malha failed: HTTP 404"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_primary_falls_back() {
        let slow_primary = with_timeout(NOMINATIM, std::time::Duration::from_secs(10), async {
            tokio::time::sleep(std::time::Duration::from_secs(60)).await;
            Ok(BoundingBox::new(0.0, 1.0, 0.0, 1.0))
        });

        let bbox = resolve_with_fallback("Curitiba/PR", slow_primary, || async { Ok(curitiba()) })
            .await
            .unwrap();

        assert_eq!(bbox, curitiba());
    }
}
