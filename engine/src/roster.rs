//! Tracked-user roster bootstrap
//!
//! Before the live stream delivers anything, the backend can be asked for
//! the users the local user tracks together with their last known location.
//! Entries for the local user or with an unusable location are skipped.

use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use crate::geo::Coordinate;
use crate::tracking::{TrackedEntity, now_millis};

const ROSTER_PATH: &str = "/users/tracked-users";

#[derive(Debug, Error)]
pub enum RosterError {
    #[error("Roster request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Roster request returned HTTP {0}")]
    Status(u16),

    #[error("Malformed roster response: {0}")]
    Malformed(String),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RosterUser {
    #[serde(rename = "_id")]
    id: String,
    #[serde(default)]
    username: String,
    last_known_location: Option<GeoPoint>,
}

#[derive(Debug, Deserialize)]
struct GeoPoint {
    #[serde(default)]
    coordinates: Vec<f64>,
}

/// HTTP client for the roster endpoint
pub struct RosterClient {
    client: reqwest::Client,
    url: String,
}

impl RosterClient {
    pub fn new(api_base_url: &str, timeout: Duration) -> Result<Self, RosterError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: format!("{}{}", api_base_url.trim_end_matches('/'), ROSTER_PATH),
        })
    }

    /// Fetch the tracked users of the caller identified by `token`
    pub async fn fetch(
        &self,
        token: &str,
        local_id: &str,
    ) -> Result<Vec<TrackedEntity>, RosterError> {
        let response = self
            .client
            .get(&self.url)
            .bearer_auth(token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RosterError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        let entities = parse_roster(&body, local_id, now_millis())?;
        info!("Roster loaded {} tracked users", entities.len());
        Ok(entities)
    }
}

/// Parse a roster body into entities stamped at `received_at`
pub fn parse_roster(
    body: &[u8],
    local_id: &str,
    received_at: u64,
) -> Result<Vec<TrackedEntity>, RosterError> {
    let users: Vec<RosterUser> =
        serde_json::from_slice(body).map_err(|e| RosterError::Malformed(e.to_string()))?;

    let entities = users
        .into_iter()
        .filter(|user| user.id != local_id)
        .filter_map(|user| {
            // GeoJSON order: [lng, lat]
            let coordinate = match user.last_known_location.as_ref().map(|p| p.coordinates.as_slice()) {
                Some(&[lng, lat]) => Coordinate::from_lng_lat(lng, lat).ok(),
                _ => None,
            };
            let Some(coordinate) = coordinate else {
                debug!("Skipping roster entry {} without a usable location", user.id);
                return None;
            };
            TrackedEntity::new(user.id, user.username, coordinate, received_at).ok()
        })
        .collect();

    Ok(entities)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::coord;

    #[test]
    fn test_parse_roster_reads_lng_lat() {
        let body = br#"[
            {"_id": "u1", "username": "asha", "lastKnownLocation": {"type": "Point", "coordinates": [77.20, 28.61]}}
        ]"#;

        let entities = parse_roster(body, "me", 42).unwrap();
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].id.as_str(), "u1");
        assert_eq!(entities[0].username, "asha");
        assert_eq!(entities[0].coordinate, coord(28.61, 77.20));
        assert_eq!(entities[0].last_updated, 42);
    }

    #[test]
    fn test_parse_roster_skips_self_and_unusable_entries() {
        let body = br#"[
            {"_id": "me", "username": "self", "lastKnownLocation": {"coordinates": [77.0, 28.0]}},
            {"_id": "u1", "username": "no-location"},
            {"_id": "u2", "username": "short", "lastKnownLocation": {"coordinates": [77.0]}},
            {"_id": "u3", "username": "out-of-range", "lastKnownLocation": {"coordinates": [77.0, 95.0]}},
            {"_id": "", "username": "no-id", "lastKnownLocation": {"coordinates": [77.0, 28.0]}},
            {"_id": "u4", "username": "ok", "lastKnownLocation": {"coordinates": [72.87, 19.07]}}
        ]"#;

        let entities = parse_roster(body, "me", 0).unwrap();
        let ids: Vec<&str> = entities.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["u4"]);
    }

    #[test]
    fn test_parse_roster_rejects_non_array() {
        let result = parse_roster(br#"{"users": []}"#, "me", 0);
        assert!(matches!(result, Err(RosterError::Malformed(_))));
    }
}
