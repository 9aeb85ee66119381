//! OpenRouteService directions provider

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::provider::RouteProvider;
use super::types::{ProviderError, Route};
use crate::config::ProviderConfig;
use crate::geo::Coordinate;

/// GeoJSON directions response (only the fields we read)
#[derive(Debug, Deserialize)]
struct DirectionsResponse {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    geometry: Option<Geometry>,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    #[serde(default)]
    coordinates: Vec<Vec<f64>>,
}

/// Route provider backed by the OpenRouteService v2 directions endpoint
pub struct OpenRouteServiceProvider {
    client: reqwest::Client,
    directions_url: String,
    api_key: String,
}

impl OpenRouteServiceProvider {
    /// Create a provider from configuration
    ///
    /// The HTTP client timeout matches the resolver timeout so an abandoned
    /// request does not linger on the connection pool.
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            directions_url: format!(
                "{}/v2/directions/{}",
                config.base_url.trim_end_matches('/'),
                config.profile
            ),
            api_key: config.api_key.clone(),
        })
    }
}

/// Format a coordinate in provider-native `lng,lat` order
fn lng_lat(c: &Coordinate) -> String {
    format!("{},{}", c.longitude(), c.latitude())
}

#[async_trait]
impl RouteProvider for OpenRouteServiceProvider {
    async fn fetch_path(&self, a: Coordinate, b: Coordinate) -> Result<Route, ProviderError> {
        let response = self
            .client
            .get(&self.directions_url)
            .query(&[
                ("api_key", self.api_key.as_str()),
                ("start", lng_lat(&a).as_str()),
                ("end", lng_lat(&b).as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        let route = parse_directions(&body)?;
        debug!("Provider returned {} points", route.len());
        Ok(route)
    }
}

/// Parse a directions response body into a route
///
/// Coordinates arrive as `[lng, lat]` and are mapped to `Coordinate` in order.
pub fn parse_directions(body: &[u8]) -> Result<Route, ProviderError> {
    let response: DirectionsResponse =
        serde_json::from_slice(body).map_err(|e| ProviderError::Malformed(e.to_string()))?;

    let geometry = response
        .features
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::Malformed("no features".to_string()))?
        .geometry
        .ok_or_else(|| ProviderError::Malformed("feature has no geometry".to_string()))?;

    let points = geometry
        .coordinates
        .iter()
        .map(|pair| match pair.as_slice() {
            [lng, lat] => Coordinate::from_lng_lat(*lng, *lat)
                .map_err(|e| ProviderError::Malformed(e.to_string())),
            other => Err(ProviderError::Malformed(format!(
                "expected [lng, lat], got {} values",
                other.len()
            ))),
        })
        .collect::<Result<Vec<_>, _>>()?;

    if points.len() < 2 {
        return Err(ProviderError::Malformed(format!(
            "geometry has {} coordinates",
            points.len()
        )));
    }

    Ok(Route::from(points))
}
