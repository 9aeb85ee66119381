//! Geographic primitives and the provider-routing region policy
//!
//! This module provides:
//! - `Coordinate`, a validated latitude/longitude value
//! - `RegionBounds` and the `in_region` / `qualifies_for_provider_routing` policy
//! - great-circle distance used by the position filter

mod region;
mod types;

pub use region::{in_region, qualifies_for_provider_routing};
pub use types::{Coordinate, CoordinateError, RegionBounds};
