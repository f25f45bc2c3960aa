// SPDX-License-Identifier: MPL-2.0
//! Visibility newtypes.
//!
//! This module provides type-safe wrappers for trigger parameters,
//! ensuring they are always within valid ranges.

use std::fmt;
use std::str::FromStr;

// =============================================================================
// Visibility Bounds
// =============================================================================

/// Threshold and margin bounds.
pub mod visibility_bounds {
    use crate::config::defaults;

    /// Minimum visible fraction.
    pub const MIN_THRESHOLD: f32 = defaults::MIN_VISIBILITY_THRESHOLD;
    /// Maximum visible fraction.
    pub const MAX_THRESHOLD: f32 = defaults::MAX_VISIBILITY_THRESHOLD;
    /// Default visible fraction.
    pub const DEFAULT_THRESHOLD: f32 = defaults::DEFAULT_VISIBILITY_THRESHOLD;
    /// Minimum margin in pixels.
    pub const MIN_MARGIN_PX: f32 = defaults::MIN_PROXIMITY_MARGIN_PX;
    /// Maximum margin in pixels.
    pub const MAX_MARGIN_PX: f32 = defaults::MAX_PROXIMITY_MARGIN_PX;
    /// Default margin in pixels.
    pub const DEFAULT_MARGIN_PX: f32 = defaults::DEFAULT_PROXIMITY_MARGIN_PX;
}

// =============================================================================
// VisibilityThreshold
// =============================================================================

/// Visible fraction of a region, in `(0, 1]`, at which the trigger fires.
///
/// # Example
///
/// ```
/// use lazy_mount::domain::visibility::VisibilityThreshold;
///
/// assert_eq!(VisibilityThreshold::new(0.5).value(), 0.5);
/// assert_eq!(VisibilityThreshold::new(3.0).value(), 1.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisibilityThreshold(f32);

impl VisibilityThreshold {
    /// Creates a new threshold, clamping to valid range. NaN yields the default.
    #[must_use]
    pub fn new(value: f32) -> Self {
        if value.is_nan() {
            return Self::default();
        }
        Self(value.clamp(
            visibility_bounds::MIN_THRESHOLD,
            visibility_bounds::MAX_THRESHOLD,
        ))
    }

    #[must_use]
    pub fn value(self) -> f32 {
        self.0
    }

    /// Returns true if `fraction` satisfies this threshold.
    #[must_use]
    pub fn is_met_by(self, fraction: f32) -> bool {
        fraction >= self.0
    }
}

impl Default for VisibilityThreshold {
    fn default() -> Self {
        Self(visibility_bounds::DEFAULT_THRESHOLD)
    }
}

// =============================================================================
// ProximityMargin
// =============================================================================

/// Distance in pixels by which the viewport is grown before testing regions,
/// so that loading starts slightly before a region scrolls into view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProximityMargin(f32);

impl ProximityMargin {
    /// Creates a new margin in pixels, clamping to valid range. NaN yields the default.
    #[must_use]
    pub fn from_px(px: f32) -> Self {
        if px.is_nan() {
            return Self::default();
        }
        Self(px.clamp(
            visibility_bounds::MIN_MARGIN_PX,
            visibility_bounds::MAX_MARGIN_PX,
        ))
    }

    #[must_use]
    pub fn px(self) -> f32 {
        self.0
    }
}

impl Default for ProximityMargin {
    fn default() -> Self {
        Self(visibility_bounds::DEFAULT_MARGIN_PX)
    }
}

impl fmt::Display for ProximityMargin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}px", self.0)
    }
}

/// Error returned when a margin string is not a pixel length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseMarginError(String);

impl fmt::Display for ParseMarginError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid proximity margin: {:?}", self.0)
    }
}

impl std::error::Error for ParseMarginError {}

impl FromStr for ProximityMargin {
    type Err = ParseMarginError;

    /// Accepts `"50px"`, `"50 px"` and bare numbers.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let number = trimmed.strip_suffix("px").unwrap_or(trimmed).trim_end();
        number
            .parse::<f32>()
            .ok()
            .filter(|px| px.is_finite())
            .map(Self::from_px)
            .ok_or_else(|| ParseMarginError(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_clamps_to_valid_range() {
        assert_eq!(
            VisibilityThreshold::new(0.0).value(),
            visibility_bounds::MIN_THRESHOLD
        );
        assert_eq!(VisibilityThreshold::new(1.5).value(), 1.0);
    }

    #[test]
    fn threshold_nan_falls_back_to_default() {
        assert_eq!(VisibilityThreshold::new(f32::NAN), VisibilityThreshold::default());
    }

    #[test]
    fn threshold_is_met_inclusive() {
        let t = VisibilityThreshold::new(0.25);
        assert!(t.is_met_by(0.25));
        assert!(t.is_met_by(1.0));
        assert!(!t.is_met_by(0.2));
    }

    #[test]
    fn margin_parses_pixel_strings() {
        assert_eq!("50px".parse::<ProximityMargin>().unwrap().px(), 50.0);
        assert_eq!(" 12.5 px ".parse::<ProximityMargin>().unwrap().px(), 12.5);
        assert_eq!("200".parse::<ProximityMargin>().unwrap().px(), 200.0);
    }

    #[test]
    fn margin_rejects_garbage() {
        assert!("fifty".parse::<ProximityMargin>().is_err());
        assert!("10%".parse::<ProximityMargin>().is_err());
        assert!("inf".parse::<ProximityMargin>().is_err());
    }

    #[test]
    fn margin_display_round_trips() {
        let margin = ProximityMargin::from_px(75.0);
        assert_eq!(margin.to_string(), "75px");
        assert_eq!(margin.to_string().parse::<ProximityMargin>().unwrap(), margin);
    }

    #[test]
    fn margin_clamps_negative_to_zero() {
        assert_eq!(ProximityMargin::from_px(-10.0).px(), 0.0);
    }
}
