//! Route resolution against an external directions provider.

/// OpenRouteService HTTP provider.
pub mod openroute;
/// Provider abstraction and the resolved path type.
pub mod provider;
/// Retrying resolver wrapped around a provider.
pub mod resolver;

pub use openroute::OpenRouteService;
pub use provider::{ProviderError, RoutePath, RouteProvider};
pub use resolver::{ResolveError, RouteResolver};
