// SPDX-License-Identifier: MPL-2.0
//! Load lifecycle events recorded for diagnostics.

use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Something that happened to a module load, a region or a mount.
///
/// Modules are identified by their factory id rendered as text; regions by
/// the numeric id handed out by the visibility trigger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LoadEvent {
    // ==========================================================================
    // Cache
    // ==========================================================================
    /// A handle was requested from the loader cache.
    Requested { module: String, cache_hit: bool },

    /// A settled entry was evicted to honor the cache bound.
    Evicted { module: String },

    /// A best-effort preload failed; the error never reaches a consumer.
    PreloadFailed { module: String, error: String },

    // ==========================================================================
    // Attempts
    // ==========================================================================
    AttemptStarted { module: String, attempt: u32 },

    AttemptFailed {
        module: String,
        attempt: u32,
        error: String,
        /// Backoff before the next attempt; absent when the budget is spent.
        #[serde(skip_serializing_if = "Option::is_none")]
        retry_in_ms: Option<u64>,
    },

    Resolved { module: String, attempts: u32 },

    Exhausted {
        module: String,
        attempts: u32,
        error: String,
    },

    // ==========================================================================
    // Regions and mounts
    // ==========================================================================
    /// A region crossed its visibility threshold.
    RegionTriggered { region: u64, fraction: f32 },

    /// A deferred mount changed phase.
    PhaseChanged {
        region: u64,
        from: String,
        to: String,
    },
}

impl LoadEvent {
    /// Short label used in report summaries.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            LoadEvent::Requested { .. } => "requested",
            LoadEvent::Evicted { .. } => "evicted",
            LoadEvent::PreloadFailed { .. } => "preload_failed",
            LoadEvent::AttemptStarted { .. } => "attempt_started",
            LoadEvent::AttemptFailed { .. } => "attempt_failed",
            LoadEvent::Resolved { .. } => "resolved",
            LoadEvent::Exhausted { .. } => "exhausted",
            LoadEvent::RegionTriggered { .. } => "region_triggered",
            LoadEvent::PhaseChanged { .. } => "phase_changed",
        }
    }
}

/// A [`LoadEvent`] stamped with the monotonic time it was recorded.
#[derive(Debug, Clone)]
pub struct DiagnosticEvent {
    pub timestamp: Instant,
    pub event: LoadEvent,
}

impl DiagnosticEvent {
    #[must_use]
    pub fn new(event: LoadEvent) -> Self {
        Self {
            timestamp: Instant::now(),
            event,
        }
    }
}
