// SPDX-License-Identifier: MPL-2.0
//! Deferred mount controller.
//!
//! A [`DeferredMount`] shows a [`Fallback`] for a region until the region
//! becomes visible, then requests its module from the shared
//! [`LoaderCache`] and reveals it once the load settles.
//!
//! # Usage
//!
//! ```ignore
//! let mut mount = DeferredMount::mount(
//!     Arc::clone(&cache),
//!     &trigger,
//!     Bounds::new(0.0, 2400.0, 800.0, 400.0),
//!     charts.clone(),
//!     MountOptions::default(),
//! );
//!
//! // Re-render whenever the phase moves
//! while !mount.changed().await.is_terminal() {}
//! match mount.placement() {
//!     Placement::Module(view) => render(&view),
//!     Placement::Fallback(fallback) => render_placeholder(fallback),
//!     Placement::Error(error) => render_error(&error),
//! }
//! ```

mod fallback;
mod state;

pub use fallback::{Fallback, FallbackKind};
pub use state::{Effect, Message, MountState, Phase};

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, Weak};

use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::debug;

use crate::config::Config;
use crate::diagnostics::LoadEvent;
use crate::domain::visibility::Bounds;
use crate::error::ModuleError;
use crate::loader::{LoaderCache, ModuleFactory, RetryPolicy};
use crate::visibility::{ObserveOptions, RegionId, Subscription, VisibilityTrigger};

/// What to show once the retry budget is spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Keep showing the placeholder.
    #[default]
    KeepFallback,
    /// Surface the terminal error.
    ShowError,
}

/// Per-mount settings.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MountOptions {
    /// Warm the cache at mount time; the phase still waits for visibility.
    pub preload: bool,
    /// Policy for a loader created by this mount. A cached handle keeps the
    /// policy it was created with.
    pub retry: RetryPolicy,
    pub observe: ObserveOptions,
    pub fallback: Fallback,
    pub failure: FailurePolicy,
}

impl MountOptions {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            preload: config.preload(),
            retry: config.retry_policy(),
            observe: config.observe_options(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_preload(mut self, preload: bool) -> Self {
        self.preload = preload;
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn with_observe(mut self, observe: ObserveOptions) -> Self {
        self.observe = observe;
        self
    }

    #[must_use]
    pub fn with_fallback(mut self, fallback: Fallback) -> Self {
        self.fallback = fallback;
        self
    }

    #[must_use]
    pub fn with_failure(mut self, failure: FailurePolicy) -> Self {
        self.failure = failure;
        self
    }
}

/// What the host should render for a mount right now.
pub enum Placement<'a, M> {
    Fallback(&'a Fallback),
    Module(Arc<M>),
    Error(ModuleError),
}

impl<M> fmt::Debug for Placement<'_, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Placement::Fallback(fallback) => f.debug_tuple("Fallback").field(fallback).finish(),
            Placement::Module(_) => write!(f, "Module(..)"),
            Placement::Error(error) => f.debug_tuple("Error").field(error).finish(),
        }
    }
}

/// State shared between the controller, its trigger callback and the task
/// awaiting the module.
struct MountShared<M> {
    state: Mutex<MountState<M>>,
    phase: watch::Sender<Phase>,
    /// Cleared once the state machine reports [`Effect::Settled`].
    animating: AtomicBool,
    region: OnceLock<RegionId>,
    cache: Arc<LoaderCache<M>>,
    factory: ModuleFactory<M>,
    retry: RetryPolicy,
    runtime: Handle,
}

impl<M: Send + Sync + 'static> MountShared<M> {
    fn dispatch(self: &Arc<Self>, msg: Message<M>) {
        let (from, to, effect) = {
            let mut state = self.lock();
            let from = state.phase();
            let effect = state.handle(msg);
            (from, state.phase(), effect)
        };

        if from != to {
            self.phase.send_replace(to);
            let region = self.region.get().map_or(0, |id| id.value());
            debug!(region, module = %self.factory.id(), %from, %to, "mount phase changed");
            if let Some(diagnostics) = self.cache.diagnostics() {
                diagnostics.record(LoadEvent::PhaseChanged {
                    region,
                    from: from.to_string(),
                    to: to.to_string(),
                });
            }
        }

        match effect {
            Effect::None => {}
            Effect::RequestModule => self.request_module(),
            Effect::Settled => self.animating.store(false, Ordering::SeqCst),
        }
    }

    fn request_module(self: &Arc<Self>) {
        let handle = self.cache.get_with_policy(&self.factory, self.retry);
        let shared = Arc::downgrade(self);
        self.runtime.spawn(async move {
            let result = handle.load().await;
            // An unmounted controller has nothing left to update; the load
            // itself keeps running in the cache.
            if let Some(shared) = shared.upgrade() {
                shared.dispatch(Message::LoadSettled(result));
            }
        });
    }
}

impl<M> MountShared<M> {
    fn lock(&self) -> MutexGuard<'_, MountState<M>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Controller for one deferred region.
///
/// Dropping it stops observing the region; a load already in flight is not
/// cancelled and stays in the cache.
pub struct DeferredMount<M> {
    shared: Arc<MountShared<M>>,
    subscription: Subscription,
    phase_rx: watch::Receiver<Phase>,
    fallback: Fallback,
    failure: FailurePolicy,
}

impl<M: Send + Sync + 'static> DeferredMount<M> {
    /// Observes `region` and loads `factory` through `cache` once the region
    /// is visible.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn mount(
        cache: Arc<LoaderCache<M>>,
        trigger: &VisibilityTrigger,
        region: Bounds,
        factory: ModuleFactory<M>,
        options: MountOptions,
    ) -> Self {
        let MountOptions {
            preload,
            retry,
            observe,
            fallback,
            failure,
        } = options;

        if preload {
            cache.preload(&factory);
        }

        let (phase, phase_rx) = watch::channel(Phase::Idle);
        let shared = Arc::new(MountShared {
            state: Mutex::new(MountState::Idle),
            phase,
            animating: AtomicBool::new(true),
            region: OnceLock::new(),
            cache,
            factory,
            retry,
            runtime: Handle::current(),
        });

        let weak: Weak<MountShared<M>> = Arc::downgrade(&shared);
        let subscription = trigger.observe(region, observe, move |entry| {
            if let Some(shared) = weak.upgrade() {
                let _ = shared.region.set(entry.region);
                shared.dispatch(Message::RegionVisible);
            }
        });
        let _ = shared.region.set(subscription.region());

        Self {
            shared,
            subscription,
            phase_rx,
            fallback,
            failure,
        }
    }

    /// What to render now.
    #[must_use]
    pub fn placement(&self) -> Placement<'_, M> {
        let state = self.shared.lock();
        match &*state {
            MountState::Resolved(module) => Placement::Module(Arc::clone(module)),
            MountState::Failed(error) if self.failure == FailurePolicy::ShowError => {
                Placement::Error(error.clone())
            }
            _ => Placement::Fallback(&self.fallback),
        }
    }

    /// Resolves on the next phase change and returns the new phase.
    ///
    /// Returns at once if a change has not been observed yet or if the
    /// phase is already terminal.
    pub async fn changed(&mut self) -> Phase {
        let unseen = self.phase_rx.has_changed().unwrap_or(false);
        if !unseen && self.phase().is_terminal() {
            return self.phase();
        }
        // The sender lives in `shared`, which we hold.
        let _ = self.phase_rx.changed().await;
        *self.phase_rx.borrow_and_update()
    }

    /// Waits until the mount resolved or failed.
    ///
    /// Never returns if the region never becomes visible.
    pub async fn settled(&mut self) -> Phase {
        let settled = self
            .phase_rx
            .wait_for(|phase| phase.is_terminal())
            .await
            .map(|phase| *phase);
        settled.unwrap_or_else(|_| self.phase())
    }
}

impl<M> DeferredMount<M> {
    #[must_use]
    pub fn phase(&self) -> Phase {
        *self.phase_rx.borrow()
    }

    /// True once the region triggered; drives the reveal transition.
    #[must_use]
    pub fn is_revealed(&self) -> bool {
        self.phase() != Phase::Idle
    }

    #[must_use]
    pub fn region(&self) -> RegionId {
        self.subscription.region()
    }

    /// True while the region is still waiting to become visible.
    #[must_use]
    pub fn is_observing(&self) -> bool {
        self.subscription.is_active()
    }

    #[must_use]
    pub fn fallback(&self) -> &Fallback {
        &self.fallback
    }

    #[must_use]
    pub fn failure_policy(&self) -> FailurePolicy {
        self.failure
    }

    /// Advances the fallback spinner until the mount settles.
    pub fn tick(&mut self) {
        if !self.shared.animating.load(Ordering::SeqCst) {
            self.fallback.reset();
        } else {
            self.fallback.tick();
        }
    }

    /// Stops observing the region. Safe to call repeatedly.
    pub fn unmount(&self) {
        self.subscription.unsubscribe();
    }
}

impl<M> fmt::Debug for DeferredMount<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredMount")
            .field("region", &self.region())
            .field("module", self.shared.factory.id())
            .field("phase", &self.phase())
            .field("failure", &self.failure)
            .finish()
    }
}
