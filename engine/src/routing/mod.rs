//! Route synthesis
//!
//! This module provides:
//! - `RouteProvider` trait for abstracting the external routing service
//! - `OpenRouteServiceProvider`, the HTTP implementation of that trait
//! - `SegmentResolver`, which applies the region policy and falls back to straight lines
//! - `RouteSynthesizer`, which stitches per-pair segments into one polyline

mod openrouteservice;
mod provider;
mod resolver;
mod synthesizer;
mod types;

pub use openrouteservice::{OpenRouteServiceProvider, parse_directions};
pub use provider::RouteProvider;
pub use resolver::SegmentResolver;
pub use synthesizer::{RouteSynthesizer, stitch};
pub use types::{ProviderError, Route};
