//! Candidate points that rounds are drawn from.

use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geo::{Bounds, GeoPoint};

/// Validation failures for a point catalog.
#[derive(Debug, Error, PartialEq)]
pub enum CatalogError {
    /// Fewer than two points make a distinct pair impossible.
    #[error("catalog needs at least two points, found {0}")]
    TooFewPoints(usize),
    /// A point sits outside the play rectangle.
    #[error("point {point} at index {index} lies outside the catalog bounds")]
    OutOfBounds {
        /// Position of the point in the catalog.
        index: usize,
        /// The offending point.
        point: GeoPoint,
    },
}

/// Fixed, ordered set of legal round endpoints inside a bounding rectangle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "CatalogFile")]
pub struct PointCatalog {
    bounds: Bounds,
    points: Vec<GeoPoint>,
}

#[derive(Deserialize)]
struct CatalogFile {
    bounds: Bounds,
    points: Vec<GeoPoint>,
}

impl TryFrom<CatalogFile> for PointCatalog {
    type Error = CatalogError;

    fn try_from(file: CatalogFile) -> Result<Self, Self::Error> {
        PointCatalog::new(file.bounds, file.points)
    }
}

const POPRAD_SOUTHWEST: GeoPoint = GeoPoint::new(48.96051437696167, 20.069518130440144);
const POPRAD_NORTHEAST: GeoPoint = GeoPoint::new(49.18319629969179, 20.561936386777973);

// Town and village centres around Poprad.
const POPRAD_POINTS: [GeoPoint; 16] = [
    GeoPoint::new(49.05601, 20.29770),
    GeoPoint::new(49.05893, 20.20103),
    GeoPoint::new(49.13571, 20.43197),
    GeoPoint::new(49.06512, 20.32018),
    GeoPoint::new(49.05004, 20.28992),
    GeoPoint::new(49.07198, 20.31705),
    GeoPoint::new(49.04812, 20.33806),
    GeoPoint::new(49.07005, 20.19302),
    GeoPoint::new(49.09502, 20.21004),
    GeoPoint::new(49.05906, 20.07812),
    GeoPoint::new(49.00003, 20.36507),
    GeoPoint::new(48.99498, 20.27003),
    GeoPoint::new(49.04506, 20.13008),
    GeoPoint::new(49.16402, 20.28004),
    GeoPoint::new(49.11301, 20.38205),
    GeoPoint::new(48.99507, 20.13502),
];

impl PointCatalog {
    /// Build a catalog, checking the size and that every point is in bounds.
    pub fn new(bounds: Bounds, points: Vec<GeoPoint>) -> Result<Self, CatalogError> {
        if points.len() < 2 {
            return Err(CatalogError::TooFewPoints(points.len()));
        }
        if let Some((index, point)) = points
            .iter()
            .enumerate()
            .find(|(_, point)| !bounds.contains(point))
        {
            return Err(CatalogError::OutOfBounds {
                index,
                point: *point,
            });
        }
        Ok(Self { bounds, points })
    }

    /// Built-in play area around Poprad, Slovakia.
    pub fn poprad() -> Self {
        Self {
            bounds: Bounds::new(POPRAD_SOUTHWEST, POPRAD_NORTHEAST)
                .expect("static Poprad bounds are ordered"),
            points: POPRAD_POINTS.to_vec(),
        }
    }

    /// Read a catalog from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read catalog {}", path.display()))?;
        let catalog = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse catalog {}", path.display()))?;
        Ok(catalog)
    }

    /// All candidate points, in catalog order.
    pub fn all_points(&self) -> &[GeoPoint] {
        &self.points
    }

    /// Play-area rectangle.
    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    /// Number of candidate points (always at least two).
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Always false; present for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
