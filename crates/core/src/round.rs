//! Round selection: two distinct catalog points, refined along a real route.

use std::sync::Arc;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    catalog::PointCatalog,
    geo::GeoPoint,
    route::{RoutePath, RouteProvider, RouteResolver},
};

/// Sequence number identifying a round within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RoundId(pub u64);

/// The two endpoints presented to the player.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoundPoints {
    /// Where the drive starts.
    pub start: GeoPoint,
    /// Where the drive ends.
    pub end: GeoPoint,
}

/// Resolution state of a round's scored route.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteStatus {
    /// Resolution is in flight.
    Pending,
    /// The true route is known.
    Resolved(RoutePath),
    /// Retries were exhausted; the round has no answer.
    Unavailable,
}

/// One guessing round.
#[derive(Debug, Clone, PartialEq)]
pub struct Round {
    id: RoundId,
    points: RoundPoints,
    route: RouteStatus,
}

impl Round {
    /// New round awaiting resolution.
    pub fn new(id: RoundId, points: RoundPoints) -> Self {
        Self {
            id,
            points,
            route: RouteStatus::Pending,
        }
    }

    /// Round identifier.
    pub fn id(&self) -> RoundId {
        self.id
    }

    /// Start point.
    pub fn start(&self) -> GeoPoint {
        self.points.start
    }

    /// End point.
    pub fn end(&self) -> GeoPoint {
        self.points.end
    }

    /// Current resolution state.
    pub fn route(&self) -> &RouteStatus {
        &self.route
    }

    /// Resolved path, if known.
    pub fn resolved_route(&self) -> Option<&RoutePath> {
        match &self.route {
            RouteStatus::Resolved(path) => Some(path),
            _ => None,
        }
    }

    pub(crate) fn set_route(&mut self, route: RouteStatus) {
        self.route = route;
    }
}

/// Draw a start and a distinct end from the catalog.
pub fn draw_pair<R: Rng + ?Sized>(catalog: &PointCatalog, rng: &mut R) -> RoundPoints {
    let points = catalog.all_points();
    let first = rng.random_range(0..points.len());
    // Terminates because a catalog always holds at least two points.
    let second = loop {
        let candidate = rng.random_range(0..points.len());
        if candidate != first {
            break candidate;
        }
    };
    RoundPoints {
        start: points[first],
        end: points[second],
    }
}

/// Point roughly halfway along `path`, at index `ceil(len / 2)`.
pub fn route_midpoint(path: &RoutePath) -> Option<GeoPoint> {
    let geometry = path.geometry();
    geometry.get(geometry.len().div_ceil(2)).copied()
}

/// Builds round endpoints, moving the end onto the real road network.
pub struct RoundGenerator<P> {
    resolver: Arc<RouteResolver<P>>,
    refine_retries: u32,
}

impl<P: RouteProvider> RoundGenerator<P> {
    /// Generator sharing `resolver`; refinement gets `refine_retries` retries.
    pub fn new(resolver: Arc<RouteResolver<P>>, refine_retries: u32) -> Self {
        Self {
            resolver,
            refine_retries,
        }
    }

    /// Draw and refine a fresh pair of endpoints.
    pub async fn generate(&self, catalog: &PointCatalog) -> RoundPoints {
        let drawn = {
            let mut rng = rand::rng();
            draw_pair(catalog, &mut rng)
        };
        self.refine(drawn).await
    }

    /// Replace the end with the midpoint of the start→end route, if one resolves.
    pub async fn refine(&self, drawn: RoundPoints) -> RoundPoints {
        match self
            .resolver
            .resolve(drawn.start, drawn.end, self.refine_retries)
            .await
        {
            Ok(path) => match route_midpoint(&path) {
                Some(end) => RoundPoints {
                    start: drawn.start,
                    end,
                },
                None => drawn,
            },
            Err(err) => {
                debug!(error = %err, "keeping unrefined end point");
                drawn
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rand::{rngs::StdRng, SeedableRng};

    use super::*;
    use crate::{
        geo::Bounds,
        route::resolver::tests::{failure, path, ScriptedProvider},
    };

    fn two_point_catalog() -> (PointCatalog, GeoPoint, GeoPoint) {
        let a = GeoPoint::new(49.05, 20.29);
        let b = GeoPoint::new(49.06, 20.20);
        let bounds = Bounds::new(GeoPoint::new(48.9, 20.0), GeoPoint::new(49.2, 20.6)).unwrap();
        (PointCatalog::new(bounds, vec![a, b]).unwrap(), a, b)
    }

    #[test]
    fn two_point_catalog_always_yields_both() {
        let (catalog, a, b) = two_point_catalog();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            let pair = draw_pair(&catalog, &mut rng);
            assert!(
                (pair.start == a && pair.end == b) || (pair.start == b && pair.end == a),
                "unexpected pair {pair:?}"
            );
        }
    }

    #[test]
    fn endpoints_never_coincide() {
        let catalog = PointCatalog::poprad();
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..1000 {
            let pair = draw_pair(&catalog, &mut rng);
            assert_ne!(pair.start, pair.end);
        }
    }

    #[test]
    fn midpoint_uses_ceiling_index() {
        let two = path(100.0, 2);
        assert_eq!(route_midpoint(&two), Some(two.geometry()[1]));
        let five = path(100.0, 5);
        assert_eq!(route_midpoint(&five), Some(five.geometry()[3]));
        let six = path(100.0, 6);
        assert_eq!(route_midpoint(&six), Some(six.geometry()[3]));
    }

    #[tokio::test]
    async fn refinement_moves_end_onto_route() {
        let route = path(2500.0, 5);
        let expected = route.geometry()[3];
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(route)]));
        let resolver = Arc::new(RouteResolver::new(provider.clone(), Duration::ZERO));
        let generator = RoundGenerator::new(resolver, 0);
        let (catalog, ..) = two_point_catalog();

        let points = generator.generate(&catalog).await;
        assert_eq!(points.end, expected);
        assert_eq!(provider.call_count(), 1);
        let (requested_start, _) = provider.calls.lock()[0];
        assert_eq!(points.start, requested_start);
    }

    #[tokio::test]
    async fn refinement_failure_keeps_drawn_end() {
        let provider = Arc::new(ScriptedProvider::new(vec![Err(failure())]));
        let resolver = Arc::new(RouteResolver::new(provider.clone(), Duration::ZERO));
        let generator = RoundGenerator::new(resolver, 0);
        let (catalog, a, b) = two_point_catalog();

        let points = generator.generate(&catalog).await;
        assert!((points.start, points.end) == (a, b) || (points.start, points.end) == (b, a));
        assert_eq!(provider.call_count(), 1);
    }
}
