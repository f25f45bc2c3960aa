// SPDX-License-Identifier: MPL-2.0
//! Centralized default values for all configuration constants.
//!
//! This module serves as the single source of truth for default values
//! used across the crate. Constants are organized by category.
//!
//! # Categories
//!
//! - **Retry**: Retry budget and backoff base delay
//! - **Visibility**: Trigger threshold and proximity margin
//! - **Mount**: Placeholder footprint and spinner animation

// ==========================================================================
// Retry Defaults
// ==========================================================================

/// Default number of retries after the first failed attempt.
pub const DEFAULT_RETRIES: u32 = 3;

/// Minimum number of retries (a single attempt, no backoff).
pub const MIN_RETRIES: u32 = 0;

/// Default backoff base delay in milliseconds.
pub const DEFAULT_BASE_DELAY_MS: u64 = 1000;

/// Minimum backoff base delay in milliseconds.
pub const MIN_BASE_DELAY_MS: u64 = 0;

// ==========================================================================
// Visibility Defaults
// ==========================================================================

/// Default visible fraction of a region that triggers loading.
pub const DEFAULT_VISIBILITY_THRESHOLD: f32 = 0.1;

/// Minimum visibility threshold. Zero is excluded: a region must be at
/// least partially inside the (expanded) viewport.
pub const MIN_VISIBILITY_THRESHOLD: f32 = 0.01;

/// Maximum visibility threshold (region fully visible).
pub const MAX_VISIBILITY_THRESHOLD: f32 = 1.0;

/// Default proximity margin in pixels around the viewport.
pub const DEFAULT_PROXIMITY_MARGIN_PX: f32 = 50.0;

/// Minimum proximity margin in pixels.
pub const MIN_PROXIMITY_MARGIN_PX: f32 = 0.0;

/// Maximum proximity margin in pixels.
pub const MAX_PROXIMITY_MARGIN_PX: f32 = 2000.0;

// ==========================================================================
// Mount Defaults
// ==========================================================================

/// Minimum height reserved by a placeholder before the module is requested.
pub const DEFAULT_PLACEHOLDER_MIN_HEIGHT: f32 = 400.0;

/// Spinner rotation speed in radians per tick.
pub const SPINNER_SPEED: f32 = 0.1;

// ==========================================================================
// Compile-time Validation
// ==========================================================================

const _: () = {
    // Retry validation
    assert!(DEFAULT_RETRIES >= MIN_RETRIES);
    assert!(DEFAULT_BASE_DELAY_MS >= MIN_BASE_DELAY_MS);

    // Visibility validation
    assert!(MIN_VISIBILITY_THRESHOLD > 0.0);
    assert!(MAX_VISIBILITY_THRESHOLD <= 1.0);
    assert!(DEFAULT_VISIBILITY_THRESHOLD >= MIN_VISIBILITY_THRESHOLD);
    assert!(DEFAULT_VISIBILITY_THRESHOLD <= MAX_VISIBILITY_THRESHOLD);
    assert!(MIN_PROXIMITY_MARGIN_PX >= 0.0);
    assert!(DEFAULT_PROXIMITY_MARGIN_PX <= MAX_PROXIMITY_MARGIN_PX);

    // Mount validation
    assert!(DEFAULT_PLACEHOLDER_MIN_HEIGHT > 0.0);
    assert!(SPINNER_SPEED > 0.0);
};
