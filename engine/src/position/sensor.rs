//! PositionSensor trait definition

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use super::types::{PositionError, WatchOptions};
use crate::geo::Coordinate;

/// Trait for platform position sensors
#[async_trait]
pub trait PositionSensor: Send + Sync {
    /// Start continuous updates
    ///
    /// Returns `PermissionDenied` when access is refused. Dropping the
    /// returned feed cancels the subscription.
    async fn subscribe(&self, options: WatchOptions) -> Result<SensorFeed, PositionError>;
}

/// Raw, unfiltered fixes from a sensor
///
/// A sensor that stops for a known reason (e.g. revoked permission) sends
/// the reason on `ended` before closing the fix channel.
pub struct SensorFeed {
    rx: mpsc::Receiver<Coordinate>,
    ended: Option<oneshot::Receiver<PositionError>>,
}

impl SensorFeed {
    pub fn new(rx: mpsc::Receiver<Coordinate>, ended: oneshot::Receiver<PositionError>) -> Self {
        Self {
            rx,
            ended: Some(ended),
        }
    }

    /// Next fix
    ///
    /// Once the sensor stops, yields its stop reason once if it gave one,
    /// then `None`.
    pub async fn next(&mut self) -> Option<Result<Coordinate, PositionError>> {
        match self.rx.recv().await {
            Some(fix) => Some(Ok(fix)),
            None => self.ended.take()?.try_recv().ok().map(Err),
        }
    }
}
