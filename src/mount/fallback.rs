// SPDX-License-Identifier: MPL-2.0
//! Placeholder shown while a deferred module is not yet available.

use crate::config::defaults::{DEFAULT_PLACEHOLDER_MIN_HEIGHT, SPINNER_SPEED};

/// What the placeholder draws.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FallbackKind {
    /// Animated loading indicator.
    #[default]
    Spinner,
    /// Static text.
    Label(String),
    /// Reserved space only.
    Blank,
}

/// Placeholder state for a deferred region.
#[derive(Debug, Clone, PartialEq)]
pub struct Fallback {
    kind: FallbackKind,
    /// Keeps the region's footprint so it can be observed before it renders.
    min_height: f32,
    /// Current spinner rotation angle in radians.
    spinner_rotation: f32,
}

impl Default for Fallback {
    fn default() -> Self {
        Self::new(FallbackKind::default())
    }
}

impl Fallback {
    #[must_use]
    pub fn new(kind: FallbackKind) -> Self {
        Self {
            kind,
            min_height: DEFAULT_PLACEHOLDER_MIN_HEIGHT,
            spinner_rotation: 0.0,
        }
    }

    #[must_use]
    pub fn spinner() -> Self {
        Self::new(FallbackKind::Spinner)
    }

    #[must_use]
    pub fn label(text: impl Into<String>) -> Self {
        Self::new(FallbackKind::Label(text.into()))
    }

    #[must_use]
    pub fn blank() -> Self {
        Self::new(FallbackKind::Blank)
    }

    #[must_use]
    pub fn with_min_height(mut self, min_height: f32) -> Self {
        self.min_height = if min_height.is_finite() {
            min_height.max(0.0)
        } else {
            DEFAULT_PLACEHOLDER_MIN_HEIGHT
        };
        self
    }

    #[must_use]
    pub fn kind(&self) -> &FallbackKind {
        &self.kind
    }

    #[must_use]
    pub fn min_height(&self) -> f32 {
        self.min_height
    }

    /// Get the current spinner rotation angle in radians.
    #[must_use]
    pub fn spinner_rotation(&self) -> f32 {
        self.spinner_rotation
    }

    /// Advances the spinner; other kinds ignore ticks.
    pub fn tick(&mut self) {
        if self.kind == FallbackKind::Spinner {
            self.spinner_rotation += SPINNER_SPEED;
            if self.spinner_rotation > std::f32::consts::TAU {
                self.spinner_rotation -= std::f32::consts::TAU;
            }
        }
    }

    pub(crate) fn reset(&mut self) {
        self.spinner_rotation = 0.0;
    }
}
