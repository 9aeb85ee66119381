//! Owned mapping of entity id to last-known state

use std::collections::BTreeMap;

use super::types::{EntityId, TrackedEntity};
use crate::geo::Coordinate;

/// Last-write-wins store of tracked entities
///
/// Backed by a `BTreeMap`, so snapshots enumerate entities in ascending id
/// order and the same state always yields the same waypoint list.
#[derive(Debug, Clone, Default)]
pub struct TrackedEntityStore {
    entities: BTreeMap<EntityId, TrackedEntity>,
}

impl TrackedEntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or fully replace the entry for `entity.id`
    ///
    /// No timestamp comparison is made; the latest call wins. Returns the
    /// replaced entry, if any.
    pub fn upsert(&mut self, entity: TrackedEntity) -> Option<TrackedEntity> {
        self.entities.insert(entity.id.clone(), entity)
    }

    pub fn remove(&mut self, id: &EntityId) -> Option<TrackedEntity> {
        self.entities.remove(id)
    }

    pub fn get(&self, id: &EntityId) -> Option<&TrackedEntity> {
        self.entities.get(id)
    }

    /// Entities ordered by id
    pub fn snapshot(&self) -> Vec<TrackedEntity> {
        self.entities.values().cloned().collect()
    }

    /// Entity coordinates in snapshot order
    pub fn coordinates(&self) -> impl Iterator<Item = Coordinate> + '_ {
        self.entities.values().map(|e| e.coordinate)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn clear(&mut self) {
        self.entities.clear();
    }

    /// Drop every entity last updated before `cutoff_millis`
    pub fn expire_older_than(&mut self, cutoff_millis: u64) -> Vec<EntityId> {
        let expired: Vec<EntityId> = self
            .entities
            .values()
            .filter(|e| e.last_updated < cutoff_millis)
            .map(|e| e.id.clone())
            .collect();

        for id in &expired {
            self.entities.remove(id);
        }
        expired
    }
}
