//! Stream-related types and error definitions

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_tungstenite::tungstenite;

use crate::protocol::{DeparturePayload, LocationPayload};

/// Errors raised by the location stream client
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("No session token; refusing to connect")]
    MissingToken,

    #[error("Invalid connection request: {0}")]
    InvalidRequest(String),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("Connection attempt timed out")]
    Timeout,

    #[error("Outbound queue is full")]
    QueueFull,

    #[error("Stream connection closed")]
    Closed,
}

/// Connection state as seen by the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum StreamStatus {
    /// No connection was attempted (e.g. no token)
    Idle,
    Connected,
    Reconnecting { attempt: u32 },
    Disconnected,
}

/// Events the connection task forwards to the state owner
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Status(StreamStatus),
    Location(LocationPayload),
    Departed(DeparturePayload),
}
