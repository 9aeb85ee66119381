use serde::{Deserialize, Serialize};

use crate::geo::Coordinate;

/// Messages sent from this client to the location stream server
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Publish the local user's position
    LocationUpdate(LocationPayload),
}

/// Messages received from the location stream server
///
/// Parsed through [`ServerEnvelope`] so that unknown events are accepted
/// whatever payload they carry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "camelCase",
    try_from = "ServerEnvelope"
)]
pub enum ServerMessage {
    /// A peer reported a new position
    NewLocation(LocationPayload),
    /// A peer left the session
    UserLeft(DeparturePayload),
    /// Any event this client does not understand
    Unknown,
}

/// Raw `{"event", "data"}` frame before the event name is interpreted
#[derive(Debug, Deserialize)]
pub struct ServerEnvelope {
    pub event: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl TryFrom<ServerEnvelope> for ServerMessage {
    type Error = serde_json::Error;

    fn try_from(envelope: ServerEnvelope) -> Result<Self, Self::Error> {
        match envelope.event.as_str() {
            "newLocation" => serde_json::from_value(envelope.data).map(Self::NewLocation),
            "userLeft" => serde_json::from_value(envelope.data).map(Self::UserLeft),
            _ => Ok(Self::Unknown),
        }
    }
}

/// Position report for one user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LocationPayload {
    pub user_id: String,
    pub username: String,
    pub coords: Coordinate,
}

/// Departure notice for one user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeparturePayload {
    pub user_id: String,
}

impl ClientMessage {
    /// Get the message type name for metrics
    pub fn message_type(&self) -> &'static str {
        match self {
            ClientMessage::LocationUpdate(_) => "location_update",
        }
    }
}

impl ServerMessage {
    /// Get the message type name for metrics
    pub fn message_type(&self) -> &'static str {
        match self {
            ServerMessage::NewLocation(_) => "new_location",
            ServerMessage::UserLeft(_) => "user_left",
            ServerMessage::Unknown => "unknown",
        }
    }
}
