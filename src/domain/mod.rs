// SPDX-License-Identifier: MPL-2.0
//! Domain layer - value objects with ZERO external dependencies.
//!
//! Everything here is plain data with clamping constructors, so the loader,
//! trigger and controller never re-validate their inputs.
//!
//! # Modules
//!
//! - [`diagnostics`]: [`EventCapacity`](diagnostics::EventCapacity)
//! - [`loader`]: [`RetryCount`](loader::RetryCount), [`BaseDelay`](loader::BaseDelay)
//! - [`visibility`]: [`Bounds`](visibility::Bounds),
//!   [`VisibilityThreshold`](visibility::VisibilityThreshold),
//!   [`ProximityMargin`](visibility::ProximityMargin)

pub mod diagnostics;
pub mod loader;
pub mod visibility;
