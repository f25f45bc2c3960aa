// SPDX-License-Identifier: MPL-2.0
//! Phase state machine for a deferred mount.
//!
//! ```text
//! Idle --RegionVisible--> Triggered --LoadSettled(Ok)--> Resolved
//!                                   \-LoadSettled(Err)-> Failed
//! ```
//!
//! Every other message is ignored; no transition leads back to `Idle` or
//! `Triggered`.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ModuleError;

/// Lifecycle phase of a deferred mount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Waiting for the region to become visible.
    Idle,
    /// Visible; the module has been requested.
    Triggered,
    Resolved,
    Failed,
}

impl Phase {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Triggered => "triggered",
            Phase::Resolved => "resolved",
            Phase::Failed => "failed",
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Resolved | Phase::Failed)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mount state with the data each phase owns.
pub enum MountState<M> {
    Idle,
    Triggered,
    Resolved(Arc<M>),
    Failed(ModuleError),
}

/// Messages for the mount state machine.
pub enum Message<M> {
    /// The observed region crossed its visibility threshold.
    RegionVisible,
    /// The shared handle settled.
    LoadSettled(Result<Arc<M>, ModuleError>),
}

/// Effects produced by the mount state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// No effect.
    None,
    /// Request the module from the cache and await it.
    RequestModule,
    /// Terminal phase reached; stop animating the fallback.
    Settled,
}

impl<M> Default for MountState<M> {
    fn default() -> Self {
        MountState::Idle
    }
}

impl<M> MountState<M> {
    /// Handle a mount message.
    pub fn handle(&mut self, msg: Message<M>) -> Effect {
        match (self.phase(), msg) {
            (Phase::Idle, Message::RegionVisible) => {
                *self = MountState::Triggered;
                Effect::RequestModule
            }
            (Phase::Triggered, Message::LoadSettled(result)) => {
                *self = match result {
                    Ok(module) => MountState::Resolved(module),
                    Err(error) => MountState::Failed(error),
                };
                Effect::Settled
            }
            _ => Effect::None,
        }
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        match self {
            MountState::Idle => Phase::Idle,
            MountState::Triggered => Phase::Triggered,
            MountState::Resolved(_) => Phase::Resolved,
            MountState::Failed(_) => Phase::Failed,
        }
    }

    #[must_use]
    pub fn module(&self) -> Option<&Arc<M>> {
        match self {
            MountState::Resolved(module) => Some(module),
            _ => None,
        }
    }

    #[must_use]
    pub fn error(&self) -> Option<&ModuleError> {
        match self {
            MountState::Failed(error) => Some(error),
            _ => None,
        }
    }
}

impl<M> fmt::Debug for MountState<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MountState::Failed(error) => f.debug_tuple("Failed").field(error).finish(),
            other => write!(f, "{:?}", other.phase()),
        }
    }
}
