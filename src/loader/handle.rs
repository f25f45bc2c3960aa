// SPDX-License-Identifier: MPL-2.0
//! Shared, lazily started load of one module.
//!
//! A handle runs its [`RetryableLoader`] at most once, in a detached task,
//! and publishes the outcome through a watch channel. Every clone observes
//! the same attempt sequence and the same final status. The task is never
//! cancelled: dropping every consumer leaves the load running so the result
//! is cached for later mounts. A factory that panics settles the handle as
//! failed instead of leaving it pending.

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use futures_util::future::FutureExt;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::warn;

use super::factory::FactoryId;
use super::retry::{AttemptEvent, RetryableLoader};
use crate::error::ModuleError;

/// Current state of a load.
pub enum LoadStatus<M> {
    Pending,
    Resolved(Arc<M>),
    Failed(ModuleError),
}

impl<M> LoadStatus<M> {
    #[must_use]
    pub fn kind(&self) -> StatusKind {
        match self {
            LoadStatus::Pending => StatusKind::Pending,
            LoadStatus::Resolved(_) => StatusKind::Resolved,
            LoadStatus::Failed(_) => StatusKind::Failed,
        }
    }

    #[must_use]
    pub fn is_settled(&self) -> bool {
        !matches!(self, LoadStatus::Pending)
    }
}

impl<M> Clone for LoadStatus<M> {
    fn clone(&self) -> Self {
        match self {
            LoadStatus::Pending => LoadStatus::Pending,
            LoadStatus::Resolved(module) => LoadStatus::Resolved(Arc::clone(module)),
            LoadStatus::Failed(error) => LoadStatus::Failed(error.clone()),
        }
    }
}

impl<M> fmt::Debug for LoadStatus<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadStatus::Pending => write!(f, "Pending"),
            LoadStatus::Resolved(_) => write!(f, "Resolved(..)"),
            LoadStatus::Failed(error) => f.debug_tuple("Failed").field(error).finish(),
        }
    }
}

/// Payload-free view of [`LoadStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    Pending,
    Resolved,
    Failed,
}

/// Error message of a load whose factory panicked.
pub const PANICKED: &str = "module factory panicked";

struct HandleInner<M> {
    loader: RetryableLoader<M>,
    started: AtomicBool,
    attempts: Arc<AtomicU32>,
    status: watch::Sender<LoadStatus<M>>,
}

/// Cheap-clone handle to a shared load.
pub struct LoadableHandle<M> {
    inner: Arc<HandleInner<M>>,
}

impl<M: Send + Sync + 'static> LoadableHandle<M> {
    /// Wraps `loader` without starting it.
    pub fn new(loader: RetryableLoader<M>) -> Self {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&attempts);
        let loader = loader.with_hook(move |event| {
            if let AttemptEvent::Started { .. } = event {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        let (status, _) = watch::channel(LoadStatus::Pending);

        Self {
            inner: Arc::new(HandleInner {
                loader,
                started: AtomicBool::new(false),
                attempts,
                status,
            }),
        }
    }

    /// Starts the attempt sequence unless it already started.
    ///
    /// Returns `true` if this call started it.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn start(&self) -> bool {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            return false;
        }

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let outcome = AssertUnwindSafe(inner.loader.load()).catch_unwind().await;
            let status = match outcome {
                Ok(Ok(module)) => LoadStatus::Resolved(Arc::new(module)),
                Ok(Err(error)) => LoadStatus::Failed(error),
                Err(_) => {
                    warn!(module = %inner.loader.factory().id(), "module factory panicked");
                    LoadStatus::Failed(ModuleError::new(PANICKED))
                }
            };
            inner.status.send_replace(status);
        });
        true
    }

    /// Starts the load if needed and waits for its outcome.
    ///
    /// # Errors
    ///
    /// Returns the terminal error once the retry budget is exhausted.
    pub async fn load(&self) -> Result<Arc<M>, ModuleError> {
        self.start();
        let mut rx = self.inner.status.subscribe();
        loop {
            let status = rx.borrow_and_update().clone();
            match status {
                LoadStatus::Resolved(module) => return Ok(module),
                LoadStatus::Failed(error) => return Err(error),
                LoadStatus::Pending => {}
            }
            if rx.changed().await.is_err() {
                // The sender lives in `inner`, which we hold.
                return Err(ModuleError::new("load handle closed"));
            }
        }
    }
}

impl<M> LoadableHandle<M> {
    #[must_use]
    pub fn id(&self) -> &FactoryId {
        self.inner.loader.factory().id()
    }

    #[must_use]
    pub fn status(&self) -> LoadStatus<M> {
        self.inner.status.borrow().clone()
    }

    #[must_use]
    pub fn status_kind(&self) -> StatusKind {
        self.inner.status.borrow().kind()
    }

    /// Number of factory invocations so far.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.inner.attempts.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn is_started(&self) -> bool {
        self.inner.started.load(Ordering::SeqCst)
    }

    /// Receiver notified on every status change, for render layers that
    /// re-render when a pending value settles.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<LoadStatus<M>> {
        self.inner.status.subscribe()
    }

    /// Returns true if both handles share the same load.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<M> Clone for LoadableHandle<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<M> fmt::Debug for LoadableHandle<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadableHandle")
            .field("id", self.id())
            .field("status", &self.status_kind())
            .field("attempts", &self.attempts())
            .finish()
    }
}
