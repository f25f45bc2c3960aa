// SPDX-License-Identifier: MPL-2.0
//! Visibility domain types.
//!
//! Geometry and trigger parameters, independent of any windowing system.

mod geometry;
mod newtypes;

pub use geometry::Bounds;
pub use newtypes::{visibility_bounds, ParseMarginError, ProximityMargin, VisibilityThreshold};
