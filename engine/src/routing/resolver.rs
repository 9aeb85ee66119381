//! Per-pair segment resolution with straight-line fallback

use metrics::counter;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::provider::RouteProvider;
use super::types::{ProviderError, Route};
use crate::geo::{Coordinate, RegionBounds, qualifies_for_provider_routing};

/// Resolves one waypoint pair into a segment. Never fails.
pub struct SegmentResolver {
    provider: Arc<dyn RouteProvider>,
    bounds: RegionBounds,
    timeout: Duration,
}

impl SegmentResolver {
    pub fn new(provider: Arc<dyn RouteProvider>, bounds: RegionBounds, timeout: Duration) -> Self {
        Self {
            provider,
            bounds,
            timeout,
        }
    }

    pub fn bounds(&self) -> &RegionBounds {
        &self.bounds
    }

    /// Resolve the segment from `a` to `b`
    ///
    /// Out-of-region pairs get `[a, b]` without touching the provider.
    /// In-region pairs make exactly one provider call; any failure,
    /// including the timeout, also yields `[a, b]`.
    pub async fn resolve(&self, a: Coordinate, b: Coordinate) -> Route {
        if !qualifies_for_provider_routing(&a, &b, &self.bounds) {
            counter!("convoy_segments_total", "outcome" => "straight").increment(1);
            return Route::straight(a, b);
        }

        let result = match tokio::time::timeout(self.timeout, self.provider.fetch_path(a, b)).await
        {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(self.timeout)),
        };

        match result {
            Ok(route) => {
                counter!("convoy_segments_total", "outcome" => "provider").increment(1);
                debug!("Resolved segment via provider: {} points", route.len());
                route
            }
            Err(e) => {
                counter!("convoy_segments_total", "outcome" => "fallback").increment(1);
                counter!("convoy_provider_failures_total").increment(1);
                warn!("Routing provider failed, falling back to straight line: {}", e);
                Route::straight(a, b)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{MockProvider, coord};

    fn resolver(provider: Arc<MockProvider>) -> SegmentResolver {
        SegmentResolver::new(provider, RegionBounds::india(), Duration::from_millis(200))
    }

    #[tokio::test]
    async fn test_in_region_pair_calls_provider_once() {
        let provider = Arc::new(MockProvider::midpoint());
        let a = coord(28.70, 77.10);
        let b = coord(28.61, 77.20);

        let route = resolver(provider.clone()).resolve(a, b).await;

        assert_eq!(provider.call_count(), 1);
        assert_eq!(provider.calls(), vec![(a, b)]);
        assert_eq!(route.len(), 3);
        assert_eq!(route.points()[0], a);
        assert_eq!(route.points()[2], b);
    }

    #[tokio::test]
    async fn test_out_of_region_pair_skips_provider() {
        let provider = Arc::new(MockProvider::midpoint());
        let london = coord(51.5, -0.12);
        let delhi = coord(28.61, 77.20);

        let route = resolver(provider.clone()).resolve(london, delhi).await;

        assert_eq!(provider.call_count(), 0);
        assert_eq!(route, Route::straight(london, delhi));
    }

    #[tokio::test]
    async fn test_provider_failure_falls_back() {
        let provider = Arc::new(MockProvider::failing());
        let a = coord(28.70, 77.10);
        let b = coord(28.61, 77.20);

        let route = resolver(provider.clone()).resolve(a, b).await;

        assert_eq!(provider.call_count(), 1);
        assert_eq!(route, Route::straight(a, b));
    }

    #[tokio::test]
    async fn test_provider_timeout_falls_back() {
        let provider = Arc::new(MockProvider::delayed(Duration::from_secs(5)));
        let a = coord(28.70, 77.10);
        let b = coord(28.61, 77.20);
        let resolver = SegmentResolver::new(
            provider.clone(),
            RegionBounds::india(),
            Duration::from_millis(20),
        );

        let route = resolver.resolve(a, b).await;

        assert_eq!(provider.call_count(), 1);
        assert_eq!(route, Route::straight(a, b));
    }
}
