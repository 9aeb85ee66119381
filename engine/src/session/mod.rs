//! Session lifecycle and orchestration
//!
//! This module provides:
//! - `Session`, which wires sensor, stream, roster and synthesizer together
//! - the single-writer orchestrator task that owns all mutable state
//! - `RouteView`, the snapshot published to the presentation layer

mod orchestrator;
mod runtime;
mod state;

pub use orchestrator::{Command, OrchestratorHandle, OrchestratorParts, spawn};
pub use runtime::{Session, SessionError};
pub use state::{RouteView, SessionState, TrackingStatus};
