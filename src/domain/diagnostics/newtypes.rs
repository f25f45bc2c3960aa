// SPDX-License-Identifier: MPL-2.0
//! Diagnostics newtypes.

// =============================================================================
// Event Capacity Bounds
// =============================================================================

/// Event log capacity bounds (16 to 10000 events).
pub mod event_capacity_bounds {
    /// Minimum capacity.
    pub const MIN: usize = 16;
    /// Maximum capacity.
    pub const MAX: usize = 10_000;
    /// Default capacity.
    pub const DEFAULT: usize = 1000;
}

// =============================================================================
// EventCapacity
// =============================================================================

/// Number of load events kept in memory before the oldest are dropped.
///
/// # Example
///
/// ```
/// use lazy_mount::domain::diagnostics::EventCapacity;
///
/// assert_eq!(EventCapacity::new(500).value(), 500);
/// assert_eq!(EventCapacity::new(0).value(), 16);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventCapacity(usize);

impl EventCapacity {
    /// Creates a new capacity, clamping to valid range.
    #[must_use]
    pub fn new(value: usize) -> Self {
        Self(value.clamp(event_capacity_bounds::MIN, event_capacity_bounds::MAX))
    }

    #[must_use]
    pub fn value(self) -> usize {
        self.0
    }
}

impl Default for EventCapacity {
    fn default() -> Self {
        Self(event_capacity_bounds::DEFAULT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_clamps() {
        assert_eq!(EventCapacity::new(0).value(), event_capacity_bounds::MIN);
        assert_eq!(
            EventCapacity::new(1_000_000).value(),
            event_capacity_bounds::MAX
        );
    }

    #[test]
    fn capacity_default() {
        assert_eq!(
            EventCapacity::default().value(),
            event_capacity_bounds::DEFAULT
        );
    }
}
