//! Stitching per-pair segments into one continuous polyline

use futures_util::future::join_all;
use metrics::histogram;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use super::resolver::SegmentResolver;
use super::types::Route;
use crate::geo::Coordinate;

/// Builds a full route through an ordered waypoint list
#[derive(Clone)]
pub struct RouteSynthesizer {
    resolver: Arc<SegmentResolver>,
}

impl RouteSynthesizer {
    pub fn new(resolver: SegmentResolver) -> Self {
        Self {
            resolver: Arc::new(resolver),
        }
    }

    pub fn resolver(&self) -> &SegmentResolver {
        &self.resolver
    }

    /// Synthesize the route through `waypoints`
    ///
    /// Segments are fetched concurrently and joined in waypoint order. Fewer
    /// than two waypoints yields an empty route.
    pub async fn synthesize(&self, waypoints: &[Coordinate]) -> Route {
        if waypoints.len() < 2 {
            return Route::empty();
        }

        let start = Instant::now();
        let segments = join_all(
            waypoints
                .windows(2)
                .map(|pair| self.resolver.resolve(pair[0], pair[1])),
        )
        .await;

        let route = stitch(segments);
        histogram!("convoy_synthesis_duration_seconds").record(start.elapsed());
        debug!(
            "Synthesized route through {} waypoints: {} points",
            waypoints.len(),
            route.len()
        );
        route
    }
}

/// Concatenate segments, sharing the join vertex between neighbours
///
/// The last point of the accumulator is dropped before each following
/// segment is appended. Adjacent duplicates are collapsed afterwards, and a
/// result with fewer than two distinct points is empty.
pub fn stitch(segments: impl IntoIterator<Item = Route>) -> Route {
    let mut points: Vec<Coordinate> = Vec::new();

    for segment in segments {
        if segment.is_empty() {
            continue;
        }
        if !points.is_empty() {
            points.pop();
        }
        points.extend(segment.into_points());
    }

    points.dedup();
    if points.len() < 2 {
        return Route::empty();
    }
    Route::from(points)
}
