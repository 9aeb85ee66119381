//! Test Utilities Module
//!
//! Shared fixtures for unit tests: coordinate helpers and a scripted
//! `RouteProvider`. This module is only compiled when running tests.

#![cfg(test)]

use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

use crate::geo::Coordinate;
use crate::routing::{ProviderError, Route, RouteProvider};
use crate::tracking::TrackedEntity;

/// Build a coordinate, panicking on invalid input
pub fn coord(lat: f64, lng: f64) -> Coordinate {
    Coordinate::new(lat, lng).expect("valid test coordinate")
}

/// Build a tracked entity stamped at `updated_at`
pub fn entity(id: &str, lat: f64, lng: f64, updated_at: u64) -> TrackedEntity {
    TrackedEntity::new(id, format!("user-{}", id), coord(lat, lng), updated_at)
        .expect("valid test entity")
}

// ============================================================================
// Mock Route Provider
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum MockMode {
    /// Return `[a, midpoint(a, b), b]`
    Midpoint,
    /// Always fail with HTTP 500
    Fail,
    /// Sleep before answering like `Midpoint`
    Delay(Duration),
    /// Earlier calls sleep longer than later ones
    Staggered(Duration),
}

/// Scripted provider that records every call it receives
pub struct MockProvider {
    mode: MockMode,
    calls: Mutex<Vec<(Coordinate, Coordinate)>>,
}

const STAGGER_STEPS: u32 = 4;

impl MockProvider {
    fn with_mode(mode: MockMode) -> Self {
        Self {
            mode,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn midpoint() -> Self {
        Self::with_mode(MockMode::Midpoint)
    }

    pub fn failing() -> Self {
        Self::with_mode(MockMode::Fail)
    }

    pub fn delayed(delay: Duration) -> Self {
        Self::with_mode(MockMode::Delay(delay))
    }

    pub fn staggered(step: Duration) -> Self {
        Self::with_mode(MockMode::Staggered(step))
    }

    /// The intermediate vertex this provider inserts between `a` and `b`
    pub fn midpoint_of(a: Coordinate, b: Coordinate) -> Coordinate {
        coord(
            (a.latitude() + b.latitude()) / 2.0,
            (a.longitude() + b.longitude()) / 2.0,
        )
    }

    pub fn calls(&self) -> Vec<(Coordinate, Coordinate)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl RouteProvider for MockProvider {
    async fn fetch_path(&self, a: Coordinate, b: Coordinate) -> Result<Route, ProviderError> {
        let index = {
            let mut calls = self.calls.lock().unwrap();
            calls.push((a, b));
            calls.len() as u32 - 1
        };

        match self.mode {
            MockMode::Fail => return Err(ProviderError::Status(500)),
            MockMode::Delay(delay) => tokio::time::sleep(delay).await,
            MockMode::Staggered(step) => {
                tokio::time::sleep(step * STAGGER_STEPS.saturating_sub(index)).await
            }
            MockMode::Midpoint => {}
        }

        Ok(Route::from(vec![a, Self::midpoint_of(a, b), b]))
    }
}
