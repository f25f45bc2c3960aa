// SPDX-License-Identifier: MPL-2.0
//! Visibility detection for deferred regions.
//!
//! Geometry lives in [`crate::domain::visibility`]; this module owns the
//! observer registry the host feeds with viewport updates.

mod trigger;

pub use trigger::{ObserveOptions, RegionId, Subscription, VisibilityEntry, VisibilityTrigger};
