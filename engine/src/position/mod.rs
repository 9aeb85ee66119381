//! Local position source
//!
//! This module provides:
//! - `PositionSensor` trait for the platform sensor collaborator
//! - `ChannelSensor`, a sensor fed by the device shell through the presentation API
//! - `LocalPositionProvider` and `PositionSubscription`, which enforce the
//!   distance/interval emission filter

mod channel;
mod provider;
mod sensor;
mod types;

pub use channel::ChannelSensor;
pub use provider::{EmissionFilter, LocalPositionProvider, PositionSubscription};
pub use sensor::{PositionSensor, SensorFeed};
pub use types::{PositionError, WatchOptions};
