use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

use crate::geo::Coordinate;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrackingError {
    #[error("Entity id must not be empty")]
    EmptyId,
}

/// Non-empty entity identifier
///
/// Ordering is lexicographic, which gives the store its stable iteration order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityId(String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Result<Self, TrackingError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(TrackingError::EmptyId);
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for EntityId {
    type Error = TrackingError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<EntityId> for String {
    fn from(id: EntityId) -> Self {
        id.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Last-known state of a remote peer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedEntity {
    pub id: EntityId,
    pub username: String,
    pub coordinate: Coordinate,
    /// Unix epoch milliseconds at which the update was applied
    pub last_updated: u64,
}

impl TrackedEntity {
    pub fn new(
        id: impl Into<String>,
        username: impl Into<String>,
        coordinate: Coordinate,
        last_updated: u64,
    ) -> Result<Self, TrackingError> {
        Ok(Self {
            id: EntityId::new(id)?,
            username: username.into(),
            coordinate,
            last_updated,
        })
    }
}

/// Get current timestamp in milliseconds
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_id_rejects_empty() {
        assert_eq!(EntityId::new(""), Err(TrackingError::EmptyId));
        assert_eq!(EntityId::new("   "), Err(TrackingError::EmptyId));
        assert_eq!(EntityId::new("u1").unwrap().as_str(), "u1");
    }

    #[test]
    fn test_entity_id_serde_validates() {
        let id: EntityId = serde_json::from_str("\"abc\"").unwrap();
        assert_eq!(id.to_string(), "abc");
        assert!(serde_json::from_str::<EntityId>("\"\"").is_err());
    }
}
