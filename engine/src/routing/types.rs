//! Route type and provider error definitions

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::geo::Coordinate;

/// Errors returned by a `RouteProvider`
///
/// None of these ever reach the caller of the synthesizer; the segment
/// resolver turns each into a straight-line fallback.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Provider request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Provider timed out after {0:?}")]
    Timeout(Duration),

    #[error("Provider returned HTTP {0}")]
    Status(u16),

    #[error("Malformed provider response: {0}")]
    Malformed(String),
}

/// Ordered polyline of coordinates
///
/// Either empty or at least two points long once produced by the synthesizer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Route(Vec<Coordinate>);

impl Route {
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Two-point direct segment used whenever the provider is not consulted
    pub fn straight(a: Coordinate, b: Coordinate) -> Self {
        Self(vec![a, b])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn points(&self) -> &[Coordinate] {
        &self.0
    }

    pub fn into_points(self) -> Vec<Coordinate> {
        self.0
    }
}

impl From<Vec<Coordinate>> for Route {
    fn from(points: Vec<Coordinate>) -> Self {
        Self(points)
    }
}
