use std::time::Duration;
use thiserror::Error;

use crate::config::PositionConfig;

/// Errors raised by position sensors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PositionError {
    /// The user refused location access. Not retried automatically.
    #[error("Location permission denied")]
    PermissionDenied,

    #[error("Position sensor unavailable: {0}")]
    Unavailable(String),
}

/// Subscription filter requested from the sensor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WatchOptions {
    pub min_distance_m: f64,
    pub min_interval: Duration,
}

impl From<&PositionConfig> for WatchOptions {
    fn from(config: &PositionConfig) -> Self {
        Self {
            min_distance_m: config.min_distance_m,
            min_interval: config.min_interval,
        }
    }
}
