//! Presentation API
//!
//! HTTP surface for the device shell: read the published route view and
//! push position fixes into the channel-backed sensor.

mod routes;

pub use routes::{ApiError, AppState, HealthResponse, PositionRequest, api_routes};
