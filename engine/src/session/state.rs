use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::geo::Coordinate;
use crate::protocol::{DeparturePayload, LocationPayload};
use crate::routing::Route;
use crate::stream::StreamStatus;
use crate::tracking::{EntityId, TrackedEntity, TrackedEntityStore, now_millis};

/// Local position tracking state shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingStatus {
    /// Subscribed, no fix yet
    AwaitingFirstFix,
    Tracking,
    /// Terminal until the user grants access
    PermissionDenied,
    /// The sensor could not be subscribed or stopped delivering
    Unavailable,
}

/// Everything the presentation layer renders
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteView {
    /// Generation of the inputs `route` was computed from
    pub generation: u64,
    /// A newer synthesis is in flight
    pub pending: bool,
    pub local: Option<Coordinate>,
    /// Tracked entities ordered by id
    pub entities: Vec<TrackedEntity>,
    pub route: Route,
    pub tracking: TrackingStatus,
    pub stream: StreamStatus,
    pub updated_at: u64,
}

impl Default for RouteView {
    fn default() -> Self {
        Self {
            generation: 0,
            pending: false,
            local: None,
            entities: Vec::new(),
            route: Route::empty(),
            tracking: TrackingStatus::AwaitingFirstFix,
            stream: StreamStatus::Idle,
            updated_at: now_millis(),
        }
    }
}

/// Mutable session state, owned by the orchestrator task
///
/// Every mutator reports whether the waypoint list changed, which is what
/// decides if a new synthesis is needed.
#[derive(Debug)]
pub struct SessionState {
    local_id: EntityId,
    local: Option<Coordinate>,
    store: TrackedEntityStore,
    pub tracking: TrackingStatus,
    pub stream: StreamStatus,
    generation: u64,
}

impl SessionState {
    pub fn new(local_id: EntityId, tracking: TrackingStatus, stream: StreamStatus) -> Self {
        Self {
            local_id,
            local: None,
            store: TrackedEntityStore::new(),
            tracking,
            stream,
            generation: 0,
        }
    }

    pub fn local(&self) -> Option<Coordinate> {
        self.local
    }

    pub fn store(&self) -> &TrackedEntityStore {
        &self.store
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Advance to a new input generation
    pub fn next_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    /// Record a local fix; the first one ends "awaiting first fix"
    pub fn set_local(&mut self, fix: Coordinate) -> bool {
        self.tracking = TrackingStatus::Tracking;
        let changed = self.local != Some(fix);
        self.local = Some(fix);
        changed
    }

    /// Upsert a tracked entity unless it is the local user
    pub fn upsert(&mut self, entity: TrackedEntity) -> bool {
        if entity.id == self.local_id {
            debug!("Ignoring update for the local user");
            return false;
        }
        let coordinate = entity.coordinate;
        match self.store.upsert(entity) {
            Some(previous) => previous.coordinate != coordinate,
            None => true,
        }
    }

    /// Apply an inbound `newLocation`, stamped with the receive time
    pub fn apply_location(&mut self, payload: LocationPayload) -> bool {
        match TrackedEntity::new(
            payload.user_id,
            payload.username,
            payload.coords,
            now_millis(),
        ) {
            Ok(entity) => self.upsert(entity),
            Err(e) => {
                debug!("Dropping location update: {}", e);
                false
            }
        }
    }

    pub fn apply_departure(&mut self, payload: &DeparturePayload) -> bool {
        match EntityId::new(payload.user_id.as_str()) {
            Ok(id) => self.store.remove(&id).is_some(),
            Err(_) => false,
        }
    }

    /// Remove entities silent since before `cutoff_millis`
    pub fn expire(&mut self, cutoff_millis: u64) -> Vec<EntityId> {
        self.store.expire_older_than(cutoff_millis)
    }

    /// `[local] ++ entities by id`; empty until the first local fix
    pub fn waypoints(&self) -> Vec<Coordinate> {
        match self.local {
            Some(local) => std::iter::once(local)
                .chain(self.store.coordinates())
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn clear(&mut self) {
        self.store.clear();
    }

    /// Build the published view around `route` computed at `route_generation`
    pub fn view(&self, route: &Route, route_generation: u64) -> RouteView {
        RouteView {
            generation: route_generation,
            pending: route_generation != self.generation,
            local: self.local,
            entities: self.store.snapshot(),
            route: route.clone(),
            tracking: self.tracking,
            stream: self.stream,
            updated_at: now_millis(),
        }
    }
}
