//! Filtered local position subscription

use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use super::sensor::{PositionSensor, SensorFeed};
use super::types::{PositionError, WatchOptions};
use crate::geo::Coordinate;

/// Minimum distance / minimum interval gate between emissions
///
/// A fix passes if it is the first one, or if it is both far enough from and
/// late enough after the last emitted fix.
#[derive(Debug, Clone)]
pub struct EmissionFilter {
    options: WatchOptions,
    last: Option<(Coordinate, Instant)>,
}

impl EmissionFilter {
    pub fn new(options: WatchOptions) -> Self {
        Self {
            options,
            last: None,
        }
    }

    /// Decide whether `fix`, observed at `at`, is emitted
    pub fn accept(&mut self, fix: Coordinate, at: Instant) -> bool {
        if let Some((last_fix, last_at)) = self.last {
            let moved = last_fix.distance_m(&fix);
            let elapsed = at.saturating_duration_since(last_at);
            if moved < self.options.min_distance_m || elapsed < self.options.min_interval {
                return false;
            }
        }
        self.last = Some((fix, at));
        true
    }
}

/// Local device position source
pub struct LocalPositionProvider {
    sensor: Arc<dyn PositionSensor>,
    options: WatchOptions,
}

impl LocalPositionProvider {
    pub fn new(sensor: Arc<dyn PositionSensor>, options: WatchOptions) -> Self {
        Self { sensor, options }
    }

    /// Subscribe to filtered fixes
    ///
    /// `PermissionDenied` is terminal; callers surface it instead of retrying.
    pub async fn subscribe(&self) -> Result<PositionSubscription, PositionError> {
        let feed = self.sensor.subscribe(self.options).await?;
        Ok(PositionSubscription {
            feed: Some(feed),
            filter: EmissionFilter::new(self.options),
        })
    }
}

/// Live filtered subscription; release it on teardown
pub struct PositionSubscription {
    feed: Option<SensorFeed>,
    filter: EmissionFilter,
}

impl PositionSubscription {
    /// Next fix that passes the filter
    ///
    /// When the sensor stops with a reason (e.g. `PermissionDenied`) that
    /// reason is yielded once; afterwards, and after `release`, this is `None`.
    pub async fn next(&mut self) -> Option<Result<Coordinate, PositionError>> {
        loop {
            let item = match self.feed.as_mut() {
                Some(feed) => feed.next().await,
                None => return None,
            };
            match item {
                Some(Ok(fix)) => {
                    if self.filter.accept(fix, Instant::now()) {
                        return Some(Ok(fix));
                    }
                    debug!("Filtered out position fix");
                }
                Some(Err(e)) => {
                    info!("Position sensor stopped: {}", e);
                    self.feed = None;
                    return Some(Err(e));
                }
                None => {
                    info!("Position sensor stopped");
                    self.feed = None;
                    return None;
                }
            }
        }
    }

    /// Cancel the sensor subscription
    pub fn release(&mut self) {
        if self.feed.take().is_some() {
            info!("Position subscription released");
        }
    }

    pub fn is_active(&self) -> bool {
        self.feed.is_some()
    }
}
