// SPDX-License-Identifier: MPL-2.0
//! Identity-keyed cache of loadable handles.
//!
//! This module guarantees one load sequence per factory identity: every
//! `get` for an identity-equal factory returns the same [`LoadableHandle`],
//! whatever its state.
//!
//! # Design
//!
//! - **Identity-keyed**: entries indexed by [`FactoryId`], never by what the
//!   factory does
//! - **Atomic get-or-create**: the map lock is only held synchronously
//! - **Unbounded by default**: entries live as long as the cache
//! - **Optional LRU bound**: only settled entries are evicted, so a pending
//!   load is never duplicated
//!
//! # Usage
//!
//! ```ignore
//! let cache = Arc::new(LoaderCache::new(CacheConfig::default()));
//!
//! // Warm the cache without rendering anything
//! cache.preload(&factory);
//!
//! // Later, a mount asks for the shared handle
//! let module = cache.get(&factory).load().await?;
//! ```

use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard, PoisonError};

use lru::LruCache;
use tracing::debug;

use super::factory::{FactoryId, ModuleFactory};
use super::handle::{LoadableHandle, StatusKind};
use super::retry::{AttemptEvent, RetryPolicy, RetryableLoader};
use crate::diagnostics::{DiagnosticsHandle, LoadEvent};

/// Configuration for the loader cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheConfig {
    /// Retry policy for loaders created by [`LoaderCache::get`].
    pub retry: RetryPolicy,

    /// Maximum number of entries before settled ones are evicted.
    /// `None` keeps every entry for the lifetime of the cache.
    pub max_entries: Option<NonZeroUsize>,
}

impl CacheConfig {
    #[must_use]
    pub fn bounded(retry: RetryPolicy, max_entries: usize) -> Self {
        Self {
            retry,
            max_entries: NonZeroUsize::new(max_entries),
        }
    }
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of handles currently cached.
    pub entries: usize,

    /// Requests answered with an existing handle.
    pub hits: u64,

    /// Requests that created a handle.
    pub misses: u64,

    /// Handles created.
    pub insertions: u64,

    /// Settled handles evicted due to the bound.
    pub evictions: u64,
}

impl CacheStats {
    /// Returns the hit rate as a percentage (0.0 - 100.0).
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

struct CacheInner<M> {
    entries: LruCache<FactoryId, LoadableHandle<M>>,
    stats: CacheStats,
}

/// Shared memo of one [`LoadableHandle`] per factory identity.
///
/// Construct one per application (or per test) and share it behind an `Arc`.
pub struct LoaderCache<M> {
    inner: Mutex<CacheInner<M>>,
    config: CacheConfig,
    diagnostics: Option<DiagnosticsHandle>,
}

impl<M: Send + Sync + 'static> LoaderCache<M> {
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                entries: LruCache::unbounded(),
                stats: CacheStats::default(),
            }),
            config,
            diagnostics: None,
        }
    }

    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(CacheConfig::default())
    }

    /// Records cache and attempt events to `diagnostics`.
    #[must_use]
    pub fn with_diagnostics(mut self, diagnostics: DiagnosticsHandle) -> Self {
        self.diagnostics = Some(diagnostics);
        self
    }

    /// Returns the handle for `factory`, creating it with the cache's retry
    /// policy on first request. The handle is not started.
    pub fn get(&self, factory: &ModuleFactory<M>) -> LoadableHandle<M> {
        self.get_with_policy(factory, self.config.retry)
    }

    /// Like [`LoaderCache::get`], but a newly created loader uses `policy`.
    /// An existing handle keeps the policy it was created with.
    pub fn get_with_policy(
        &self,
        factory: &ModuleFactory<M>,
        policy: RetryPolicy,
    ) -> LoadableHandle<M> {
        let mut inner = self.lock();
        let id = factory.id();

        if let Some(handle) = inner.entries.get(id) {
            let handle = handle.clone();
            inner.stats.hits += 1;
            self.record(LoadEvent::Requested {
                module: id.to_string(),
                cache_hit: true,
            });
            return handle;
        }

        let handle = LoadableHandle::new(self.build_loader(factory, policy));
        inner.entries.put(id.clone(), handle.clone());
        inner.stats.misses += 1;
        inner.stats.insertions += 1;
        self.record(LoadEvent::Requested {
            module: id.to_string(),
            cache_hit: false,
        });
        debug!(module = %id, retries = policy.retries.value(), "loader created");

        self.enforce_bound(&mut inner);
        inner.stats.entries = inner.entries.len();
        handle
    }

    /// Starts loading `factory` in the background.
    ///
    /// Best effort: a terminal failure is logged and recorded, never returned.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn preload(&self, factory: &ModuleFactory<M>) {
        let handle = self.get(factory);
        let diagnostics = self.diagnostics.clone();
        tokio::spawn(async move {
            if let Err(error) = handle.load().await {
                debug!(module = %handle.id(), %error, "preload failed");
                if let Some(diagnostics) = diagnostics {
                    diagnostics.record(LoadEvent::PreloadFailed {
                        module: handle.id().to_string(),
                        error: error.to_string(),
                    });
                }
            }
        });
    }

    fn build_loader(&self, factory: &ModuleFactory<M>, policy: RetryPolicy) -> RetryableLoader<M> {
        let loader = RetryableLoader::new(factory.clone(), policy);
        let Some(diagnostics) = self.diagnostics.clone() else {
            return loader;
        };

        let module = factory.id().to_string();
        loader.with_hook(move |event| {
            let event = match *event {
                AttemptEvent::Started { attempt } => LoadEvent::AttemptStarted {
                    module: module.clone(),
                    attempt,
                },
                AttemptEvent::Succeeded { attempt } => LoadEvent::Resolved {
                    module: module.clone(),
                    attempts: attempt,
                },
                AttemptEvent::Failed {
                    attempt,
                    error,
                    retry_in: None,
                } => LoadEvent::Exhausted {
                    module: module.clone(),
                    attempts: attempt,
                    error: error.to_string(),
                },
                AttemptEvent::Failed {
                    attempt,
                    error,
                    retry_in: Some(delay),
                } => LoadEvent::AttemptFailed {
                    module: module.clone(),
                    attempt,
                    error: error.to_string(),
                    retry_in_ms: Some(u64::try_from(delay.as_millis()).unwrap_or(u64::MAX)),
                },
            };
            diagnostics.record(event);
        })
    }
}

impl<M> LoaderCache<M> {
    /// Checks for an entry without updating LRU order.
    #[must_use]
    pub fn contains(&self, id: &FactoryId) -> bool {
        self.lock().entries.contains(id)
    }

    /// Status of the cached handle for `id`, without updating LRU order.
    #[must_use]
    pub fn status(&self, id: &FactoryId) -> Option<StatusKind> {
        self.lock().entries.peek(id).map(LoadableHandle::status_kind)
    }

    /// Forgets the handle for `id` so the next `get` starts a fresh load.
    ///
    /// A load still running for the removed handle keeps running for the
    /// consumers already holding it.
    pub fn remove(&self, id: &FactoryId) -> Option<LoadableHandle<M>> {
        let mut inner = self.lock();
        let removed = inner.entries.pop(id);
        inner.stats.entries = inner.entries.len();
        removed
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.entries.clear();
        inner.stats.entries = 0;
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.lock().stats
    }

    #[must_use]
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub(crate) fn diagnostics(&self) -> Option<&DiagnosticsHandle> {
        self.diagnostics.as_ref()
    }

    fn enforce_bound(&self, inner: &mut CacheInner<M>) {
        let Some(max) = self.config.max_entries else {
            return;
        };

        while inner.entries.len() > max.get() {
            // Least recently requested first
            let victim = inner
                .entries
                .iter()
                .rev()
                .find(|(_, handle)| handle.status_kind() != StatusKind::Pending)
                .map(|(id, _)| id.clone());

            let Some(id) = victim else {
                // Everything is in flight; allow the overshoot.
                break;
            };
            inner.entries.pop(&id);
            inner.stats.evictions += 1;
            debug!(module = %id, "settled loader evicted");
            self.record(LoadEvent::Evicted {
                module: id.to_string(),
            });
        }
    }

    fn record(&self, event: LoadEvent) {
        if let Some(diagnostics) = &self.diagnostics {
            diagnostics.record(event);
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheInner<M>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<M> std::fmt::Debug for LoaderCache<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("LoaderCache")
            .field("entries", &inner.entries.len())
            .field("max_entries", &self.config.max_entries)
            .field("retry", &self.config.retry)
            .field("stats", &inner.stats)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::DiagnosticsCollector;
    use crate::error::ModuleError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn counted(key: &'static str, fail: bool) -> (ModuleFactory<String>, Arc<AtomicU32>) {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let factory = ModuleFactory::keyed(key, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                if fail {
                    Err(ModuleError::new("network error"))
                } else {
                    Ok(format!("{key} module"))
                }
            }
        });
        (factory, calls)
    }

    #[tokio::test(start_paused = true)]
    async fn same_identity_shares_one_load() {
        let cache = LoaderCache::with_defaults();
        let (factory, calls) = counted("charts", false);

        let a = cache.get(&factory);
        let b = cache.get(&factory.clone());
        assert!(a.ptr_eq(&b));

        let (ra, rb) = tokio::join!(a.load(), b.load());
        assert_eq!(*ra.unwrap(), "charts module");
        assert_eq!(*rb.unwrap(), "charts module");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
        assert!((stats.hit_rate() - 50.0).abs() < 0.01);
    }

    #[tokio::test(start_paused = true)]
    async fn distinct_instances_get_distinct_handles() {
        let cache: LoaderCache<u8> = LoaderCache::with_defaults();
        let a = ModuleFactory::new(|| async { Ok::<_, ModuleError>(1) });
        let b = ModuleFactory::new(|| async { Ok::<_, ModuleError>(1) });

        assert!(!cache.get(&a).ptr_eq(&cache.get(&b)));
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_handle_stays_failed() {
        let cache = LoaderCache::new(CacheConfig {
            retry: RetryPolicy::new(1, 10),
            max_entries: None,
        });
        let (factory, calls) = counted("broken", true);

        assert!(cache.get(&factory).load().await.is_err());
        assert_eq!(cache.status(factory.id()), Some(StatusKind::Failed));

        // The cache does not retry on its own
        assert!(cache.get(&factory).load().await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn remove_allows_a_fresh_attempt() {
        let cache = LoaderCache::new(CacheConfig {
            retry: RetryPolicy::no_retry(),
            max_entries: None,
        });
        let (factory, calls) = counted("flaky", true);

        assert!(cache.get(&factory).load().await.is_err());
        assert!(cache.remove(factory.id()).is_some());
        assert!(!cache.contains(factory.id()));

        assert!(cache.get(&factory).load().await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn preload_warms_cache_and_swallows_errors() {
        let mut collector = DiagnosticsCollector::default();
        let cache = LoaderCache::new(CacheConfig {
            retry: RetryPolicy::no_retry(),
            max_entries: None,
        })
        .with_diagnostics(collector.handle());
        let (ok, _) = counted("hero", false);
        let (bad, _) = counted("pricing", true);

        cache.preload(&ok);
        cache.preload(&bad);
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(cache.status(ok.id()), Some(StatusKind::Resolved));
        assert_eq!(cache.status(bad.id()), Some(StatusKind::Failed));

        collector.process_pending();
        assert_eq!(
            collector.count(|e| matches!(e, LoadEvent::PreloadFailed { .. })),
            1
        );
    }

    #[tokio::test(start_paused = true)]
    async fn bound_evicts_only_settled_entries() {
        let cache = LoaderCache::new(CacheConfig::bounded(RetryPolicy::no_retry(), 2));
        let (first, _) = counted("first", false);
        let (second, _) = counted("second", false);
        let (third, _) = counted("third", false);

        cache.get(&first).load().await.unwrap();
        let _pending = cache.get(&second);
        let _also_pending = cache.get(&third);

        // "first" was settled and least recently used
        assert!(!cache.contains(first.id()));
        assert!(cache.contains(second.id()));
        assert!(cache.contains(third.id()));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn bound_never_evicts_pending_entries() {
        let cache = LoaderCache::new(CacheConfig::bounded(RetryPolicy::no_retry(), 1));
        let (a, _) = counted("a", false);
        let (b, _) = counted("b", false);

        let _ha = cache.get(&a);
        let _hb = cache.get(&b);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.stats().evictions, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn diagnostics_record_attempts() {
        let mut collector = DiagnosticsCollector::default();
        let cache = LoaderCache::new(CacheConfig {
            retry: RetryPolicy::new(2, 100),
            max_entries: None,
        })
        .with_diagnostics(collector.handle());
        let (factory, _) = counted("reports", true);

        let _ = cache.get(&factory).load().await;
        collector.process_pending();

        assert_eq!(
            collector.count(|e| matches!(e, LoadEvent::AttemptStarted { .. })),
            3
        );
        assert_eq!(
            collector.count(|e| matches!(e, LoadEvent::AttemptFailed { .. })),
            2
        );
        assert_eq!(
            collector.count(|e| matches!(e, LoadEvent::Exhausted { attempts: 3, .. })),
            1
        );
    }
}
