use std::{future::Future, sync::Arc};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geo::GeoPoint;

/// A drivable path between two points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutePath {
    distance_meters: u32,
    geometry: Vec<GeoPoint>,
}

impl RoutePath {
    /// Build a path from the provider's raw length and polyline.
    ///
    /// The length is rounded to the nearest metre. Polylines shorter than two
    /// points and negative or non-finite lengths are rejected.
    pub fn new(distance: f64, geometry: Vec<GeoPoint>) -> Result<Self, ProviderError> {
        if !distance.is_finite() || distance < 0.0 {
            return Err(ProviderError::Malformed(format!(
                "invalid route distance {distance}"
            )));
        }
        if geometry.len() < 2 {
            return Err(ProviderError::Malformed(format!(
                "route geometry has {} points, expected at least 2",
                geometry.len()
            )));
        }
        Ok(Self {
            distance_meters: distance.round() as u32,
            geometry,
        })
    }

    /// Route length in whole metres.
    pub fn distance_meters(&self) -> u32 {
        self.distance_meters
    }

    /// Ordered polyline of the route.
    pub fn geometry(&self) -> &[GeoPoint] {
        &self.geometry
    }
}

/// Failure of a single directions request.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The request never produced a response.
    #[error("routing request failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// The provider answered with a non-success status.
    #[error("routing provider returned HTTP {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly truncated.
        body: String,
    },
    /// The response did not contain a usable route.
    #[error("malformed routing response: {0}")]
    Malformed(String),
}

/// Source of driving directions.
pub trait RouteProvider: Send + Sync + 'static {
    /// Fetch one route between `start` and `end` without retrying.
    fn directions(
        &self,
        start: GeoPoint,
        end: GeoPoint,
    ) -> impl Future<Output = Result<RoutePath, ProviderError>> + Send;
}

impl<P: RouteProvider> RouteProvider for Arc<P> {
    fn directions(
        &self,
        start: GeoPoint,
        end: GeoPoint,
    ) -> impl Future<Output = Result<RoutePath, ProviderError>> + Send {
        self.as_ref().directions(start, end)
    }
}
