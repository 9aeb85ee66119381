use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::orchestrator::{self, OrchestratorHandle, OrchestratorParts};
use super::state::{RouteView, TrackingStatus};
use crate::config::Config;
use crate::position::{LocalPositionProvider, PositionError, PositionSensor};
use crate::roster::RosterClient;
use crate::routing::{RouteProvider, RouteSynthesizer, SegmentResolver};
use crate::stream::{LocationStreamClient, StreamError, StreamEvent, StreamHandle, StreamStatus};
use crate::tracking::{EntityId, TrackedEntity, TrackingError};

const STREAM_EVENT_BUFFER: usize = 64;
const ROSTER_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Invalid local identity: {0}")]
    Identity(#[from] TrackingError),
}

/// A running tracking session
///
/// Dropping a session without calling `shutdown` leaves the owner task
/// running until the runtime stops.
pub struct Session {
    id: Uuid,
    orchestrator: OrchestratorHandle,
    view: watch::Receiver<RouteView>,
}

impl Session {
    /// Subscribe to the sensor, bootstrap the roster, open the stream and
    /// start the owner task
    ///
    /// Sensor, roster and stream failures degrade the session rather than
    /// failing it; they are reflected in the published view.
    pub async fn start(
        config: &Config,
        provider: Arc<dyn RouteProvider>,
        sensor: Arc<dyn PositionSensor>,
    ) -> Result<Self, SessionError> {
        let id = Uuid::new_v4();
        let local_id = EntityId::new(config.identity.user_id.as_str())?;
        info!("Starting session {} for {}", id, local_id);

        let resolver = SegmentResolver::new(provider, config.region, config.provider.timeout);
        let synthesizer = RouteSynthesizer::new(resolver);

        let positions = LocalPositionProvider::new(sensor, (&config.position).into());
        let (positions, tracking) = match positions.subscribe().await {
            Ok(subscription) => (Some(subscription), TrackingStatus::AwaitingFirstFix),
            Err(PositionError::PermissionDenied) => {
                warn!("Location permission denied; route will not be computed");
                (None, TrackingStatus::PermissionDenied)
            }
            Err(e) => {
                error!("Position sensor unavailable: {}", e);
                (None, TrackingStatus::Unavailable)
            }
        };

        let seed = load_roster(config, local_id.as_str()).await;

        let (events_tx, events_rx) = mpsc::channel(STREAM_EVENT_BUFFER);
        let (stream, stream_status) = open_stream(config, events_tx).await;

        let (orchestrator, view) = orchestrator::spawn(OrchestratorParts {
            local_id,
            synthesizer,
            positions,
            tracking,
            stream,
            stream_status,
            stream_events: events_rx,
            seed,
            entity_ttl: config.tracking.entity_ttl,
            sweep_interval: config.tracking.sweep_interval,
        });

        Ok(Self {
            id,
            orchestrator,
            view,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Receiver that always holds the latest view
    pub fn subscribe(&self) -> watch::Receiver<RouteView> {
        self.view.clone()
    }

    pub fn current(&self) -> RouteView {
        self.view.borrow().clone()
    }

    /// Release the sensor, close the stream and clear all state
    pub async fn shutdown(self) {
        info!("Shutting down session {}", self.id);
        self.orchestrator.shutdown().await;
    }
}

async fn load_roster(config: &Config, local_id: &str) -> Vec<TrackedEntity> {
    let (Some(base_url), Some(token)) = (
        config.roster.api_base_url.as_deref(),
        config.identity.token.as_deref(),
    ) else {
        return Vec::new();
    };

    let roster = match RosterClient::new(base_url, ROSTER_TIMEOUT) {
        Ok(roster) => roster,
        Err(e) => {
            warn!("Roster client unavailable: {}", e);
            return Vec::new();
        }
    };

    match roster.fetch(token, local_id).await {
        Ok(entities) => entities,
        Err(e) => {
            error!("Roster bootstrap failed: {}", e);
            Vec::new()
        }
    }
}

async fn open_stream(
    config: &Config,
    events: mpsc::Sender<StreamEvent>,
) -> (Option<StreamHandle>, StreamStatus) {
    let client = LocationStreamClient::new(config.stream.clone());
    match client.connect(&config.identity, events).await {
        // The connection task reports `Connected` itself
        Ok(handle) => (Some(handle), StreamStatus::Idle),
        Err(StreamError::MissingToken) => {
            info!("No session token; location stream disabled");
            (None, StreamStatus::Idle)
        }
        Err(e) => {
            warn!("Location stream unavailable: {}", e);
            (None, StreamStatus::Disconnected)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::ChannelSensor;
    use crate::test_utils::{MockProvider, coord};
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(5);

    fn config() -> Config {
        let mut config = Config::default();
        config.identity.user_id = "me".to_string();
        config.position.min_distance_m = 0.0;
        config.position.min_interval = Duration::ZERO;
        config
    }

    #[tokio::test]
    async fn test_start_without_token_runs_offline() {
        let sensor = Arc::new(ChannelSensor::new());
        let session = Session::start(&config(), Arc::new(MockProvider::midpoint()), sensor.clone())
            .await
            .unwrap();

        let view = session.current();
        assert_eq!(view.stream, StreamStatus::Idle);
        assert_eq!(view.tracking, TrackingStatus::AwaitingFirstFix);

        let mut rx = session.subscribe();
        sensor.push(coord(28.70, 77.10)).unwrap();
        let view = timeout(WAIT, rx.wait_for(|v| v.local.is_some()))
            .await
            .unwrap()
            .unwrap()
            .clone();
        assert_eq!(view.local, Some(coord(28.70, 77.10)));
        assert!(view.route.is_empty());

        session.shutdown().await;
        assert!(!sensor.has_subscriber());
    }

    #[tokio::test]
    async fn test_permission_denied_is_reported() {
        let sensor = Arc::new(ChannelSensor::new());
        sensor.deny_permission();

        let session = Session::start(&config(), Arc::new(MockProvider::midpoint()), sensor)
            .await
            .unwrap();

        assert_eq!(session.current().tracking, TrackingStatus::PermissionDenied);
        assert!(session.current().route.is_empty());
        session.shutdown().await;
    }

    #[tokio::test]
    async fn test_empty_user_id_is_rejected() {
        let mut config = config();
        config.identity.user_id = String::new();

        let result = Session::start(
            &config,
            Arc::new(MockProvider::midpoint()),
            Arc::new(ChannelSensor::new()),
        )
        .await;
        assert!(matches!(result, Err(SessionError::Identity(_))));
    }

    #[tokio::test]
    async fn test_unreachable_stream_is_reported_disconnected() {
        let mut config = config();
        config.identity.token = Some("token".to_string());
        config.stream.url = "ws://127.0.0.1:9/ws".to_string();

        let session = Session::start(
            &config,
            Arc::new(MockProvider::midpoint()),
            Arc::new(ChannelSensor::new()),
        )
        .await
        .unwrap();

        assert_eq!(session.current().stream, StreamStatus::Disconnected);
        session.shutdown().await;
    }
}
