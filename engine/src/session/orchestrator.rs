//! Single-writer owner of session state
//!
//! All inputs (local fixes, stream events, synthesis results, expiry ticks,
//! commands) funnel into one task through channels, so the store and the
//! generation counter are never touched concurrently. Each input change bumps
//! the generation and restarts synthesis; a result is only published if its
//! generation is still current.

use metrics::{counter, gauge};
use std::future;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use super::state::{RouteView, SessionState, TrackingStatus};
use crate::geo::Coordinate;
use crate::position::{PositionError, PositionSubscription};
use crate::routing::{Route, RouteSynthesizer};
use crate::stream::{StreamEvent, StreamHandle, StreamStatus};
use crate::tracking::{EntityId, TrackedEntity, now_millis};

const COMMAND_BUFFER: usize = 8;
const RESULT_BUFFER: usize = 16;

/// Requests from the session handle to the owner task
#[derive(Debug)]
pub enum Command {
    Shutdown,
}

/// Inputs assembled by `Session::start`
pub struct OrchestratorParts {
    pub local_id: EntityId,
    pub synthesizer: RouteSynthesizer,
    pub positions: Option<PositionSubscription>,
    pub tracking: TrackingStatus,
    pub stream: Option<StreamHandle>,
    pub stream_status: StreamStatus,
    pub stream_events: mpsc::Receiver<StreamEvent>,
    pub seed: Vec<TrackedEntity>,
    pub entity_ttl: Option<Duration>,
    pub sweep_interval: Duration,
}

struct SynthesisResult {
    generation: u64,
    route: Route,
}

/// Handle to the running owner task
pub struct OrchestratorHandle {
    commands: mpsc::Sender<Command>,
    task: JoinHandle<()>,
}

impl OrchestratorHandle {
    /// Stop the owner task and wait for teardown to finish
    pub async fn shutdown(self) {
        if self.commands.send(Command::Shutdown).await.is_err() {
            debug!("Orchestrator already stopped");
        }
        if let Err(e) = self.task.await {
            error!("Orchestrator task failed: {}", e);
        }
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

/// Start the owner task; the returned receiver always holds the latest view
pub fn spawn(parts: OrchestratorParts) -> (OrchestratorHandle, watch::Receiver<RouteView>) {
    let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
    let (result_tx, result_rx) = mpsc::channel(RESULT_BUFFER);

    let state = SessionState::new(parts.local_id, parts.tracking, parts.stream_status);
    let initial = state.view(&Route::empty(), 0);
    let (view_tx, view_rx) = watch::channel(initial);

    let mut orchestrator = Orchestrator {
        state,
        route: Route::empty(),
        route_generation: 0,
        synthesizer: parts.synthesizer,
        positions: parts.positions,
        stream: parts.stream,
        stream_events: parts.stream_events,
        stream_open: true,
        results_tx: result_tx,
        results_rx: result_rx,
        in_flight: None,
        view: view_tx,
        commands: command_rx,
        entity_ttl: parts.entity_ttl,
        sweep_interval: parts.sweep_interval,
    };

    let mut seeded = false;
    for entity in parts.seed {
        seeded |= orchestrator.state.upsert(entity);
    }
    if seeded {
        orchestrator.publish();
    }

    let task = tokio::spawn(orchestrator.run());
    (
        OrchestratorHandle {
            commands: command_tx,
            task,
        },
        view_rx,
    )
}

struct Orchestrator {
    state: SessionState,
    route: Route,
    route_generation: u64,
    synthesizer: RouteSynthesizer,
    positions: Option<PositionSubscription>,
    stream: Option<StreamHandle>,
    stream_events: mpsc::Receiver<StreamEvent>,
    stream_open: bool,
    results_tx: mpsc::Sender<SynthesisResult>,
    results_rx: mpsc::Receiver<SynthesisResult>,
    in_flight: Option<JoinHandle<()>>,
    view: watch::Sender<RouteView>,
    commands: mpsc::Receiver<Command>,
    entity_ttl: Option<Duration>,
    sweep_interval: Duration,
}

impl Orchestrator {
    async fn run(mut self) {
        let mut sweep = tokio::time::interval(self.sweep_interval);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                },
                fix = next_fix(&mut self.positions), if self.positions.is_some() => match fix {
                    Some(Ok(fix)) => self.on_local_fix(fix),
                    Some(Err(e)) => self.on_positions_ended(Some(e)),
                    None => self.on_positions_ended(None),
                },
                event = self.stream_events.recv(), if self.stream_open => match event {
                    Some(event) => self.on_stream_event(event),
                    None => self.stream_open = false,
                },
                Some(result) = self.results_rx.recv() => self.on_synthesis(result),
                _ = sweep.tick(), if self.entity_ttl.is_some() => self.on_sweep(),
            }
        }

        self.teardown().await;
    }

    fn on_local_fix(&mut self, fix: Coordinate) {
        if let Some(stream) = &self.stream
            && let Err(e) = stream.publish(fix)
        {
            debug!("Local fix not forwarded: {}", e);
        }

        if self.state.set_local(fix) {
            self.recompute();
        } else {
            self.publish();
        }
    }

    fn on_positions_ended(&mut self, reason: Option<PositionError>) {
        self.positions = None;
        self.state.tracking = match reason {
            Some(PositionError::PermissionDenied) => {
                warn!("Location permission revoked; route updates stop until access is granted");
                TrackingStatus::PermissionDenied
            }
            Some(e) => {
                warn!("Position sensor stopped: {}", e);
                TrackingStatus::Unavailable
            }
            None => {
                warn!("Position sensor stopped delivering fixes");
                TrackingStatus::Unavailable
            }
        };
        self.publish();
    }

    fn on_stream_event(&mut self, event: StreamEvent) {
        let changed = match event {
            StreamEvent::Status(status) => {
                self.state.stream = status;
                false
            }
            StreamEvent::Location(payload) => self.state.apply_location(payload),
            StreamEvent::Departed(payload) => {
                let removed = self.state.apply_departure(&payload);
                if removed {
                    info!("Entity {} left", payload.user_id);
                }
                removed
            }
        };

        if changed {
            self.recompute();
        } else {
            self.publish();
        }
    }

    fn on_sweep(&mut self) {
        let Some(ttl) = self.entity_ttl else {
            return;
        };
        let cutoff = now_millis().saturating_sub(ttl.as_millis() as u64);
        let expired = self.state.expire(cutoff);
        if expired.is_empty() {
            return;
        }

        counter!("convoy_entities_expired_total").increment(expired.len() as u64);
        for id in &expired {
            info!("Entity {} expired after {:?} of silence", id, ttl);
        }
        self.recompute();
    }

    /// Start a new synthesis for the current waypoints, superseding any in flight
    fn recompute(&mut self) {
        let generation = self.state.next_generation();
        self.cancel_in_flight();

        let waypoints = self.state.waypoints();
        if waypoints.len() < 2 {
            self.route = Route::empty();
            self.route_generation = generation;
            self.publish();
            return;
        }

        debug!(
            "Synthesizing generation {} over {} waypoints",
            generation,
            waypoints.len()
        );
        let synthesizer = self.synthesizer.clone();
        let results = self.results_tx.clone();
        self.in_flight = Some(tokio::spawn(async move {
            let route = synthesizer.synthesize(&waypoints).await;
            let _ = results.send(SynthesisResult { generation, route }).await;
        }));

        // Entities are visible before their route segment is
        self.publish();
    }

    fn cancel_in_flight(&mut self) {
        if let Some(task) = self.in_flight.take()
            && !task.is_finished()
        {
            task.abort();
            counter!("convoy_syntheses_discarded_total").increment(1);
        }
    }

    fn on_synthesis(&mut self, result: SynthesisResult) {
        if result.generation != self.state.generation() {
            debug!(
                "Discarding stale route for generation {} (current {})",
                result.generation,
                self.state.generation()
            );
            counter!("convoy_syntheses_discarded_total").increment(1);
            return;
        }

        self.in_flight = None;
        self.route = result.route;
        self.route_generation = result.generation;
        gauge!("convoy_route_points").set(self.route.len() as f64);
        self.publish();
    }

    fn publish(&self) {
        gauge!("convoy_tracked_entities").set(self.state.store().len() as f64);
        self.view
            .send_replace(self.state.view(&self.route, self.route_generation));
    }

    async fn teardown(mut self) {
        if let Some(task) = self.in_flight.take() {
            task.abort();
        }
        if let Some(mut positions) = self.positions.take() {
            positions.release();
        }
        if let Some(stream) = self.stream.take() {
            stream.disconnect().await;
        }

        self.state.clear();
        self.state.stream = StreamStatus::Disconnected;
        self.route = Route::empty();
        self.publish();
        info!("Session state torn down");
    }
}

async fn next_fix(
    positions: &mut Option<PositionSubscription>,
) -> Option<Result<Coordinate, PositionError>> {
    match positions {
        Some(subscription) => subscription.next().await,
        None => future::pending().await,
    }
}
