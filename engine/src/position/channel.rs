//! Sensor fed from outside the engine

use async_trait::async_trait;
use std::sync::Mutex;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::oneshot;
use tracing::{debug, info};

use super::sensor::{PositionSensor, SensorFeed};
use super::types::{PositionError, WatchOptions};
use crate::geo::Coordinate;

const FEED_CAPACITY: usize = 16;

struct Subscriber {
    fixes: mpsc::Sender<Coordinate>,
    ended: oneshot::Sender<PositionError>,
}

#[derive(Default)]
struct ChannelSensorState {
    denied: bool,
    subscriber: Option<Subscriber>,
}

/// Sensor whose fixes are pushed in by the device shell
///
/// Only one subscription is live at a time; a new subscription replaces the
/// previous one.
#[derive(Default)]
pub struct ChannelSensor {
    state: Mutex<ChannelSensorState>,
}

impl ChannelSensor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that the user refused location access
    ///
    /// A live subscription ends with `PermissionDenied`.
    pub fn deny_permission(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.denied = true;
        if let Some(subscriber) = state.subscriber.take() {
            // The reason must be in place before the fix channel closes
            let _ = subscriber.ended.send(PositionError::PermissionDenied);
            info!("Location permission revoked, subscription ended");
        }
    }

    pub fn grant_permission(&self) {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).denied = false;
    }

    /// Deliver a fix to the current subscriber
    pub fn push(&self, coordinate: Coordinate) -> Result<(), PositionError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.denied {
            return Err(PositionError::PermissionDenied);
        }
        let Some(subscriber) = state.subscriber.as_ref() else {
            return Err(PositionError::Unavailable("no active subscription".to_string()));
        };

        match subscriber.fixes.try_send(coordinate) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                // The filter would discard most of a backlog anyway
                debug!("Position feed full, dropping fix");
                Ok(())
            }
            Err(TrySendError::Closed(_)) => {
                state.subscriber = None;
                Err(PositionError::Unavailable(
                    "subscription released".to_string(),
                ))
            }
        }
    }

    pub fn has_subscriber(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .subscriber
            .as_ref()
            .is_some_and(|s| !s.fixes.is_closed())
    }
}

#[async_trait]
impl PositionSensor for ChannelSensor {
    async fn subscribe(&self, options: WatchOptions) -> Result<SensorFeed, PositionError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.denied {
            return Err(PositionError::PermissionDenied);
        }

        let (fixes, rx) = mpsc::channel(FEED_CAPACITY);
        let (ended, ended_rx) = oneshot::channel();
        state.subscriber = Some(Subscriber { fixes, ended });
        info!(
            "Position sensor subscribed: min_distance={}m, min_interval={:?}",
            options.min_distance_m, options.min_interval
        );
        Ok(SensorFeed::new(rx, ended_rx))
    }
}
