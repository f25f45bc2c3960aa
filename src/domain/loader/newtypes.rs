// SPDX-License-Identifier: MPL-2.0
//! Retry newtypes.
//!
//! Type-safe wrappers for the retry budget and backoff base delay.

use std::time::Duration;

// =============================================================================
// Retry Bounds
// =============================================================================

/// Retry bounds. Only a floor: any budget or base delay above it is honored.
pub mod retry_bounds {
    use crate::config::defaults;

    /// Minimum retry count.
    pub const MIN: u32 = defaults::MIN_RETRIES;
    /// Default retry count.
    pub const DEFAULT: u32 = defaults::DEFAULT_RETRIES;
    /// Minimum base delay in milliseconds.
    pub const MIN_DELAY_MS: u64 = defaults::MIN_BASE_DELAY_MS;
    /// Default base delay in milliseconds.
    pub const DEFAULT_DELAY_MS: u64 = defaults::DEFAULT_BASE_DELAY_MS;
}

// =============================================================================
// RetryCount
// =============================================================================

/// Number of retries allowed after the first failed attempt.
///
/// `RetryCount::new(0)` means exactly one attempt. The total number of
/// factory invocations never exceeds [`RetryCount::max_attempts`].
///
/// # Example
///
/// ```
/// use lazy_mount::domain::loader::RetryCount;
///
/// let retries = RetryCount::new(3);
/// assert_eq!(retries.max_attempts(), 4);
///
/// // Large budgets are kept as given
/// assert_eq!(RetryCount::new(100).max_attempts(), 101);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryCount(u32);

impl RetryCount {
    #[must_use]
    pub fn new(value: u32) -> Self {
        Self(value.max(retry_bounds::MIN))
    }

    /// Returns the value as u32.
    #[must_use]
    pub fn value(self) -> u32 {
        self.0
    }

    /// Total invocation attempts this budget allows (`retries + 1`).
    #[must_use]
    pub fn max_attempts(self) -> u32 {
        self.0.saturating_add(1)
    }

    /// Returns true if no retry is allowed.
    #[must_use]
    pub fn is_min(self) -> bool {
        self.0 <= retry_bounds::MIN
    }
}

impl Default for RetryCount {
    fn default() -> Self {
        Self(retry_bounds::DEFAULT)
    }
}

// =============================================================================
// BaseDelay
// =============================================================================

/// Backoff base delay, the unit that doubles on every retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BaseDelay(u64);

impl BaseDelay {
    #[must_use]
    pub fn from_millis(ms: u64) -> Self {
        Self(ms.max(retry_bounds::MIN_DELAY_MS))
    }

    /// Returns the delay in milliseconds.
    #[must_use]
    pub fn as_millis(self) -> u64 {
        self.0
    }

    /// Returns the delay as a Duration.
    #[must_use]
    pub fn as_duration(self) -> Duration {
        Duration::from_millis(self.0)
    }

    /// Wait inserted before retry number `retry_index` (0 for the first retry):
    /// `base × 2^retry_index`, saturating instead of overflowing.
    #[must_use]
    pub fn backoff_for(self, retry_index: u32) -> Duration {
        let factor = 1u64.checked_shl(retry_index).unwrap_or(u64::MAX);
        Duration::from_millis(self.0.saturating_mul(factor))
    }
}

impl Default for BaseDelay {
    fn default() -> Self {
        Self(retry_bounds::DEFAULT_DELAY_MS)
    }
}
