//! Tracked entity store
//!
//! Last-known positions of remote peers, keyed by entity id. The local user
//! never lives here.

mod store;
mod types;

pub use store::TrackedEntityStore;
pub use types::{EntityId, TrackedEntity, TrackingError, now_millis};
