//! Region policy deciding when a segment may be routed by the provider

use super::types::{Coordinate, RegionBounds};

/// Whether `c` lies inside the closed box `bounds`
pub fn in_region(c: &Coordinate, bounds: &RegionBounds) -> bool {
    (bounds.min_lat..=bounds.max_lat).contains(&c.latitude())
        && (bounds.min_lng..=bounds.max_lng).contains(&c.longitude())
}

/// Both endpoints must be in-region for the provider to be asked
pub fn qualifies_for_provider_routing(
    a: &Coordinate,
    b: &Coordinate,
    bounds: &RegionBounds,
) -> bool {
    in_region(a, bounds) && in_region(b, bounds)
}
