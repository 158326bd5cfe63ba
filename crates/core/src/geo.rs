//! Geographic value types shared by the catalog, router and rounds.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A WGS84 coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lng: f64,
}

impl GeoPoint {
    /// Build a point from latitude and longitude.
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Build a point from a GeoJSON-ordered `[lng, lat]` pair.
    pub fn from_lng_lat(pair: [f64; 2]) -> Self {
        Self {
            lat: pair[1],
            lng: pair[0],
        }
    }

    /// `lng,lat` as expected by routing query strings.
    pub fn to_query(&self) -> String {
        format!("{},{}", self.lng, self.lat)
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.5}, {:.5}", self.lat, self.lng)
    }
}

/// Errors raised when building geographic shapes.
#[derive(Debug, Error, PartialEq)]
pub enum GeoError {
    /// The southwest corner is not strictly below and left of the northeast corner.
    #[error("invalid bounds: southwest {southwest} must lie strictly below and left of northeast {northeast}")]
    InvertedBounds {
        /// Offending southwest corner.
        southwest: GeoPoint,
        /// Offending northeast corner.
        northeast: GeoPoint,
    },
}

/// Rectangle of legal play.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawBounds")]
pub struct Bounds {
    southwest: GeoPoint,
    northeast: GeoPoint,
}

#[derive(Deserialize)]
struct RawBounds {
    southwest: GeoPoint,
    northeast: GeoPoint,
}

impl TryFrom<RawBounds> for Bounds {
    type Error = GeoError;

    fn try_from(raw: RawBounds) -> Result<Self, Self::Error> {
        Bounds::new(raw.southwest, raw.northeast)
    }
}

impl Bounds {
    /// Build bounds, rejecting degenerate or inverted rectangles.
    pub fn new(southwest: GeoPoint, northeast: GeoPoint) -> Result<Self, GeoError> {
        if southwest.lat < northeast.lat && southwest.lng < northeast.lng {
            Ok(Self {
                southwest,
                northeast,
            })
        } else {
            Err(GeoError::InvertedBounds {
                southwest,
                northeast,
            })
        }
    }

    /// Whether `point` lies inside the rectangle, edges included.
    pub fn contains(&self, point: &GeoPoint) -> bool {
        (self.southwest.lat..=self.northeast.lat).contains(&point.lat)
            && (self.southwest.lng..=self.northeast.lng).contains(&point.lng)
    }
}
