//! Location stream client
//!
//! This module provides:
//! - `LocationStreamClient`, which opens the authenticated WebSocket connection
//! - `StreamHandle`, the owned handle used to publish and to disconnect
//! - `StreamEvent`, what the connection task reports back to the state owner

mod client;
mod types;

pub use client::{LocationStreamClient, StreamHandle};
pub use types::{StreamError, StreamEvent, StreamStatus};
