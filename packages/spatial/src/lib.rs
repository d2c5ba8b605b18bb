#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! In-memory spatial indexes for the gridscore engine.
//!
//! Two structures, both built once at startup and immutable afterwards so
//! concurrent queries need no locking:
//!
//! - [`GreatCircleTree`] — a metric tree over point collections using
//!   great-circle (haversine) distance. Supports k-nearest-neighbor and
//!   radius queries in single-point and batched-array forms. Distances are
//!   returned in the index's native unit (radians on the unit sphere);
//!   callers convert via [`EARTH_RADIUS_KM`].
//! - [`ZoneIndex`] — an R-tree over zone boundary polygons providing
//!   "which polygon contains this point" lookups with a bounded
//!   nearest-polygon fallback for coastline edge-cases. One shared resolver
//!   serves both the scalar and batch prediction paths.

mod tree;
mod zone_index;

pub use tree::{EARTH_RADIUS_KM, GreatCircleTree, haversine_rad};
pub use zone_index::{NEAR_FALLBACK_DEG, ZoneIndex};
