use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

use crate::geo::GeoPoint;

use super::provider::{ProviderError, RoutePath, RouteProvider};

/// Terminal failure after the retry budget is spent.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Every attempt failed.
    #[error("route resolution failed after {attempts} attempts")]
    Exhausted {
        /// Number of provider calls made.
        attempts: u32,
        /// Error from the final attempt.
        #[source]
        last: ProviderError,
    },
}

/// Calls a [`RouteProvider`] with fixed-delay retries.
#[derive(Debug)]
pub struct RouteResolver<P> {
    provider: P,
    backoff: Duration,
}

impl<P: RouteProvider> RouteResolver<P> {
    /// Wrap `provider`, sleeping `backoff` between failed attempts.
    pub fn new(provider: P, backoff: Duration) -> Self {
        Self { provider, backoff }
    }

    /// Resolve a route, retrying up to `max_retries` times on failure.
    pub async fn resolve(
        &self,
        start: GeoPoint,
        end: GeoPoint,
        max_retries: u32,
    ) -> Result<RoutePath, ResolveError> {
        let mut remaining = max_retries;
        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.provider.directions(start, end).await {
                Ok(path) => return Ok(path),
                Err(err) if remaining == 0 => {
                    warn!(attempts, error = %err, "giving up on route resolution");
                    return Err(ResolveError::Exhausted {
                        attempts,
                        last: err,
                    });
                }
                Err(err) => {
                    info!(remaining, error = %err, "route resolution failed, retrying");
                    remaining -= 1;
                    tokio::time::sleep(self.backoff).await;
                }
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::{collections::VecDeque, sync::Arc};

    use parking_lot::Mutex;
    use tokio::time::Instant;

    use super::*;

    /// Provider that replays scripted outcomes and records every call.
    #[derive(Default)]
    pub(crate) struct ScriptedProvider {
        outcomes: Mutex<VecDeque<Result<RoutePath, ProviderError>>>,
        pub(crate) calls: Mutex<Vec<(GeoPoint, GeoPoint)>>,
    }

    impl ScriptedProvider {
        pub(crate) fn new(outcomes: Vec<Result<RoutePath, ProviderError>>) -> Self {
            Self {
                outcomes: Mutex::new(outcomes.into()),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn call_count(&self) -> usize {
            self.calls.lock().len()
        }
    }

    impl RouteProvider for ScriptedProvider {
        async fn directions(
            &self,
            start: GeoPoint,
            end: GeoPoint,
        ) -> Result<RoutePath, ProviderError> {
            self.calls.lock().push((start, end));
            self.outcomes
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(ProviderError::Malformed("script exhausted".to_string())))
        }
    }

    pub(crate) fn path(distance: f64, points: usize) -> RoutePath {
        let geometry = (0..points)
            .map(|i| GeoPoint::new(49.0 + i as f64 * 0.01, 20.0 + i as f64 * 0.01))
            .collect();
        RoutePath::new(distance, geometry).unwrap()
    }

    pub(crate) fn failure() -> ProviderError {
        ProviderError::Status {
            status: 503,
            body: "unavailable".to_string(),
        }
    }

    fn endpoints() -> (GeoPoint, GeoPoint) {
        (GeoPoint::new(49.05, 20.29), GeoPoint::new(49.06, 20.20))
    }

    #[tokio::test(start_paused = true)]
    async fn first_success_returns_without_delay() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(path(1500.0, 3))]));
        let resolver = RouteResolver::new(provider.clone(), Duration::from_secs(1));
        let (start, end) = endpoints();

        let before = Instant::now();
        let route = resolver.resolve(start, end, 5).await.unwrap();
        assert_eq!(route.distance_meters(), 1500);
        assert_eq!(provider.call_count(), 1);
        assert!(before.elapsed() < Duration::from_millis(1));
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_transient_failures() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Err(failure()),
            Err(failure()),
            Ok(path(900.0, 2)),
        ]));
        let resolver = RouteResolver::new(provider.clone(), Duration::from_secs(1));
        let (start, end) = endpoints();

        let before = Instant::now();
        let route = resolver.resolve(start, end, 5).await.unwrap();
        assert_eq!(route.distance_meters(), 900);
        assert_eq!(provider.call_count(), 3);
        let waited = before.elapsed();
        assert!(waited >= Duration::from_secs(2) && waited < Duration::from_millis(2100));
    }

    #[tokio::test(start_paused = true)]
    async fn persistent_failure_retries_exactly_budget() {
        let provider = Arc::new(ScriptedProvider::default());
        let resolver = RouteResolver::new(provider.clone(), Duration::from_secs(1));
        let (start, end) = endpoints();

        let before = Instant::now();
        let err = resolver.resolve(start, end, 3).await.unwrap_err();
        let ResolveError::Exhausted { attempts, .. } = err;
        assert_eq!(attempts, 4);
        assert_eq!(provider.call_count(), 4);
        let waited = before.elapsed();
        assert!(waited >= Duration::from_secs(3) && waited < Duration::from_millis(3100));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_budget_makes_a_single_attempt() {
        let provider = Arc::new(ScriptedProvider::default());
        let resolver = RouteResolver::new(provider.clone(), Duration::from_secs(1));
        let (start, end) = endpoints();

        assert!(resolver.resolve(start, end, 0).await.is_err());
        assert_eq!(provider.call_count(), 1);
    }
}
