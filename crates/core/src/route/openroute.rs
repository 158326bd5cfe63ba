use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::{config::RoutingConfig, geo::GeoPoint};

use super::provider::{ProviderError, RoutePath, RouteProvider};

const MAX_ERROR_BODY: usize = 256;

/// Directions client for the OpenRouteService v2 API.
#[derive(Debug, Clone)]
pub struct OpenRouteService {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl OpenRouteService {
    /// Build a client from the routing section of the configuration.
    pub fn new(config: &RoutingConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build routing HTTP client")?;

        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(str::to_string);
        if api_key.is_none() {
            warn!("no routing API key configured; requests will likely be rejected");
        }

        Ok(Self {
            client,
            endpoint: format!(
                "{}/v2/directions/{}",
                config.base_url.trim_end_matches('/'),
                config.profile
            ),
            api_key,
        })
    }

    /// Full directions endpoint, without query parameters.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn fetch(&self, start: GeoPoint, end: GeoPoint) -> Result<RoutePath, ProviderError> {
        let mut query = vec![("start", start.to_query()), ("end", end.to_query())];
        if let Some(key) = &self.api_key {
            query.insert(0, ("api_key", key.clone()));
        }

        debug!(%start, %end, "requesting directions");
        let response = self.client.get(&self.endpoint).query(&query).send().await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY).collect(),
            });
        }

        parse_directions(&body)
    }
}

impl RouteProvider for OpenRouteService {
    async fn directions(&self, start: GeoPoint, end: GeoPoint) -> Result<RoutePath, ProviderError> {
        self.fetch(start, end).await
    }
}

#[derive(Debug, Deserialize)]
struct DirectionsResponse {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    geometry: Geometry,
    properties: Properties,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    coordinates: Vec<Vec<f64>>,
}

#[derive(Debug, Deserialize)]
struct Properties {
    summary: Summary,
}

// The provider omits `distance` for zero-length routes.
#[derive(Debug, Deserialize)]
struct Summary {
    #[serde(default)]
    distance: f64,
}

/// Extract the first route of a GeoJSON directions response.
pub fn parse_directions(body: &str) -> Result<RoutePath, ProviderError> {
    let response: DirectionsResponse = serde_json::from_str(body)
        .map_err(|err| ProviderError::Malformed(format!("invalid directions JSON: {err}")))?;
    let feature = response
        .features
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::Malformed("response contains no route".to_string()))?;

    let geometry = feature
        .geometry
        .coordinates
        .iter()
        .map(|pair| match pair.as_slice() {
            [lng, lat, ..] => Ok(GeoPoint::from_lng_lat([*lng, *lat])),
            _ => Err(ProviderError::Malformed(format!(
                "coordinate with {} components",
                pair.len()
            ))),
        })
        .collect::<Result<Vec<_>, _>>()?;

    RoutePath::new(feature.properties.summary.distance, geometry)
}
