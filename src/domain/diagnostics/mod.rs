// SPDX-License-Identifier: MPL-2.0
//! Diagnostics domain types.
//!
//! - [`EventCapacity`]: How many load events the diagnostics log retains

mod newtypes;

pub use newtypes::{event_capacity_bounds, EventCapacity};
