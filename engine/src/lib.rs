//! Convoy Engine Library
//!
//! Live position aggregation and stitched route synthesis. This module
//! exports the engine components for the binary, integration tests and
//! external tooling.

pub mod config;
pub mod geo;
pub mod position;
pub mod protocol;
pub mod roster;
pub mod routing;
pub mod server;
pub mod session;
pub mod stream;
pub mod tracking;

#[cfg(test)]
mod test_utils;

// Re-export commonly used types
pub use config::Config;
pub use geo::{Coordinate, RegionBounds};
pub use position::{ChannelSensor, PositionSensor};
pub use protocol::{ClientMessage, ServerMessage};
pub use routing::{OpenRouteServiceProvider, Route, RouteProvider, RouteSynthesizer};
pub use server::{AppState, api_routes};
pub use session::{RouteView, Session, TrackingStatus};
pub use tracking::{TrackedEntity, TrackedEntityStore};
