//! RouteProvider trait definition

use async_trait::async_trait;

use super::types::{ProviderError, Route};
use crate::geo::Coordinate;

/// Trait for external routing services
///
/// One call is one outbound request. Implementations do not retry; the
/// timeout is applied by the caller.
#[async_trait]
pub trait RouteProvider: Send + Sync {
    /// Fetch an ordered path from `a` to `b`
    async fn fetch_path(&self, a: Coordinate, b: Coordinate) -> Result<Route, ProviderError>;
}
