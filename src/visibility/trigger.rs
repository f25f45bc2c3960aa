// SPDX-License-Identifier: MPL-2.0
//! One-shot visibility observers.
//!
//! The host reports viewport geometry; every observed region whose visible
//! fraction reaches its threshold fires its callback exactly once and is
//! forgotten. Callbacks always run after the trigger's lock is released, so
//! they may freely observe or unsubscribe other regions.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::{debug, trace};

use crate::diagnostics::{DiagnosticsHandle, LoadEvent};
use crate::domain::visibility::{Bounds, ProximityMargin, VisibilityThreshold};

/// Identifier handed out by [`VisibilityTrigger::observe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RegionId(u64);

impl RegionId {
    #[must_use]
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "region#{}", self.0)
    }
}

/// When a region counts as visible.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ObserveOptions {
    /// Minimum visible fraction of the region.
    pub threshold: VisibilityThreshold,
    /// Distance around the viewport that already counts as visible.
    pub margin: ProximityMargin,
}

impl ObserveOptions {
    #[must_use]
    pub fn new(threshold: f32, margin_px: f32) -> Self {
        Self {
            threshold: VisibilityThreshold::new(threshold),
            margin: ProximityMargin::from_px(margin_px),
        }
    }

    /// Visible fraction of `region` for `viewport`, margin included.
    #[must_use]
    pub fn fraction(&self, region: &Bounds, viewport: &Bounds) -> f32 {
        region.visible_fraction_in(&viewport.expand(self.margin.px()))
    }
}

/// Passed to the callback when a region triggers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisibilityEntry {
    pub region: RegionId,
    pub bounds: Bounds,
    pub fraction: f32,
}

type Callback = Box<dyn FnOnce(VisibilityEntry) + Send>;

struct Observer {
    bounds: Bounds,
    options: ObserveOptions,
    callback: Callback,
    fired: Arc<AtomicBool>,
}

#[derive(Default)]
struct TriggerInner {
    viewport: Option<Bounds>,
    next_id: u64,
    observers: BTreeMap<RegionId, Observer>,
}

type Due = (Callback, VisibilityEntry);

impl TriggerInner {
    /// Removes `id` and returns its callback if it is visible now.
    fn take_if_visible(&mut self, id: RegionId) -> Option<Due> {
        let viewport = self.viewport?;
        let observer = self.observers.get(&id)?;
        let fraction = observer.options.fraction(&observer.bounds, &viewport);
        if !observer.options.threshold.is_met_by(fraction) {
            return None;
        }

        let observer = self.observers.remove(&id)?;
        observer.fired.store(true, Ordering::SeqCst);
        Some((
            observer.callback,
            VisibilityEntry {
                region: id,
                bounds: observer.bounds,
                fraction,
            },
        ))
    }
}

/// Shared registry of observed regions.
///
/// Cheap to clone; clones observe the same viewport.
#[derive(Clone, Default)]
pub struct VisibilityTrigger {
    inner: Arc<Mutex<TriggerInner>>,
    diagnostics: Option<DiagnosticsHandle>,
}

impl VisibilityTrigger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Trigger with an initial viewport.
    #[must_use]
    pub fn with_viewport(viewport: Bounds) -> Self {
        let trigger = Self::new();
        trigger.lock().viewport = Some(viewport);
        trigger
    }

    #[must_use]
    pub fn with_diagnostics(mut self, diagnostics: DiagnosticsHandle) -> Self {
        self.diagnostics = Some(diagnostics);
        self
    }

    /// Watches `bounds` until it becomes visible, then runs `callback` once.
    ///
    /// If the viewport is already known and the region is visible, the
    /// callback runs before this returns.
    pub fn observe<F>(&self, bounds: Bounds, options: ObserveOptions, callback: F) -> Subscription
    where
        F: FnOnce(VisibilityEntry) + Send + 'static,
    {
        let fired = Arc::new(AtomicBool::new(false));
        let (id, due) = {
            let mut inner = self.lock();
            let id = RegionId(inner.next_id);
            inner.next_id += 1;
            inner.observers.insert(
                id,
                Observer {
                    bounds,
                    options,
                    callback: Box::new(callback),
                    fired: Arc::clone(&fired),
                },
            );
            (id, inner.take_if_visible(id))
        };
        trace!(region = %id, ?bounds, "region observed");

        if let Some(due) = due {
            self.fire(due);
        }

        Subscription {
            id,
            trigger: Arc::downgrade(&self.inner),
            fired,
        }
    }

    /// Reports new viewport geometry and fires every region now visible.
    ///
    /// Returns the number of callbacks run.
    pub fn update_viewport(&self, viewport: Bounds) -> usize {
        let due: Vec<Due> = {
            let mut inner = self.lock();
            inner.viewport = Some(viewport);
            let ids: Vec<RegionId> = inner.observers.keys().copied().collect();
            ids.into_iter()
                .filter_map(|id| inner.take_if_visible(id))
                .collect()
        };

        let fired = due.len();
        for entry in due {
            self.fire(entry);
        }
        fired
    }

    /// Reports that a region was laid out again.
    ///
    /// Returns `false` if the region is no longer observed.
    pub fn move_region(&self, id: RegionId, bounds: Bounds) -> bool {
        let due = {
            let mut inner = self.lock();
            let Some(observer) = inner.observers.get_mut(&id) else {
                return false;
            };
            observer.bounds = bounds;
            inner.take_if_visible(id)
        };

        if let Some(due) = due {
            self.fire(due);
        }
        true
    }

    #[must_use]
    pub fn viewport(&self) -> Option<Bounds> {
        self.lock().viewport
    }

    /// Number of observers still waiting to trigger.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.lock().observers.len()
    }

    #[must_use]
    pub fn is_observing(&self, id: RegionId) -> bool {
        self.lock().observers.contains_key(&id)
    }

    fn fire(&self, (callback, entry): Due) {
        debug!(region = %entry.region, fraction = entry.fraction, "region triggered");
        if let Some(diagnostics) = &self.diagnostics {
            diagnostics.record(LoadEvent::RegionTriggered {
                region: entry.region.value(),
                fraction: entry.fraction,
            });
        }
        callback(entry);
    }

    fn lock(&self) -> MutexGuard<'_, TriggerInner> {
        lock_inner(&self.inner)
    }
}

impl fmt::Debug for VisibilityTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("VisibilityTrigger")
            .field("viewport", &inner.viewport)
            .field("observers", &inner.observers.len())
            .finish()
    }
}

fn lock_inner(inner: &Mutex<TriggerInner>) -> MutexGuard<'_, TriggerInner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Registration returned by [`VisibilityTrigger::observe`].
///
/// Dropping it stops observation.
pub struct Subscription {
    id: RegionId,
    trigger: Weak<Mutex<TriggerInner>>,
    fired: Arc<AtomicBool>,
}

impl Subscription {
    #[must_use]
    pub fn region(&self) -> RegionId {
        self.id
    }

    /// Stops observing. Safe to call repeatedly and after the callback ran.
    pub fn unsubscribe(&self) {
        let Some(inner) = self.trigger.upgrade() else {
            return;
        };
        // Dropped after the lock is released; the callback may own a subscription.
        let removed = lock_inner(&inner).observers.remove(&self.id);
        if removed.is_some() {
            trace!(region = %self.id, "region unobserved");
        }
    }

    #[must_use]
    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }

    /// True while the region is still waiting to trigger.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.trigger
            .upgrade()
            .is_some_and(|inner| lock_inner(&inner).observers.contains_key(&self.id))
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("region", &self.id)
            .field("fired", &self.has_fired())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::DiagnosticsCollector;
    use std::sync::atomic::AtomicUsize;

    const VIEWPORT: Bounds = Bounds {
        x: 0.0,
        y: 0.0,
        width: 800.0,
        height: 600.0,
    };

    fn counter() -> (Arc<AtomicUsize>, impl FnOnce(VisibilityEntry) + Send + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let inner = Arc::clone(&count);
        (count, move |_: VisibilityEntry| {
            inner.fetch_add(1, Ordering::SeqCst);
        })
    }

    fn below_fold() -> Bounds {
        Bounds::new(0.0, 2000.0, 800.0, 400.0)
    }

    #[test]
    fn nothing_fires_without_viewport() {
        let trigger = VisibilityTrigger::new();
        let (count, callback) = counter();
        let sub = trigger.observe(
            Bounds::new(0.0, 0.0, 10.0, 10.0),
            ObserveOptions::default(),
            callback,
        );

        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(sub.is_active());
        assert_eq!(trigger.active_count(), 1);
    }

    #[test]
    fn visible_region_fires_immediately() {
        let trigger = VisibilityTrigger::with_viewport(VIEWPORT);
        let (count, callback) = counter();
        let sub = trigger.observe(
            Bounds::new(0.0, 100.0, 800.0, 400.0),
            ObserveOptions::default(),
            callback,
        );

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(sub.has_fired());
        assert!(!sub.is_active());
        assert_eq!(trigger.active_count(), 0);
    }

    #[test]
    fn fires_once_when_scrolled_into_view() {
        let trigger = VisibilityTrigger::with_viewport(VIEWPORT);
        let (count, callback) = counter();
        let _sub = trigger.observe(below_fold(), ObserveOptions::default(), callback);
        assert_eq!(count.load(Ordering::SeqCst), 0);

        assert_eq!(trigger.update_viewport(Bounds::new(0.0, 1800.0, 800.0, 600.0)), 1);
        assert_eq!(trigger.update_viewport(Bounds::new(0.0, 1900.0, 800.0, 600.0)), 0);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn margin_triggers_before_entering_viewport() {
        let trigger = VisibilityTrigger::with_viewport(VIEWPORT);
        let (count, callback) = counter();
        // 30px below the viewport; a 50px margin makes 20 of 100px visible
        let _sub = trigger.observe(
            Bounds::new(0.0, 630.0, 100.0, 100.0),
            ObserveOptions::new(0.1, 50.0),
            callback,
        );
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn threshold_must_be_reached() {
        let trigger = VisibilityTrigger::with_viewport(VIEWPORT);
        let (count, callback) = counter();
        // Bottom 50 of 1000px visible: 5%
        let _sub = trigger.observe(
            Bounds::new(0.0, 550.0, 800.0, 1000.0),
            ObserveOptions::new(0.1, 0.0),
            callback,
        );
        assert_eq!(count.load(Ordering::SeqCst), 0);

        // 150 of 1000px: 15%
        trigger.update_viewport(Bounds::new(0.0, 100.0, 800.0, 600.0));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn zero_area_region_inside_viewport_is_visible() {
        let trigger = VisibilityTrigger::with_viewport(VIEWPORT);
        let (count, callback) = counter();
        let _sub = trigger.observe(
            Bounds::new(10.0, 10.0, 0.0, 0.0),
            ObserveOptions::new(1.0, 0.0),
            callback,
        );
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unsubscribe_is_idempotent() {
        let trigger = VisibilityTrigger::with_viewport(VIEWPORT);
        let (count, callback) = counter();
        let sub = trigger.observe(below_fold(), ObserveOptions::default(), callback);

        sub.unsubscribe();
        sub.unsubscribe();
        assert_eq!(trigger.active_count(), 0);

        trigger.update_viewport(below_fold());
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn dropping_subscription_unsubscribes() {
        let trigger = VisibilityTrigger::with_viewport(VIEWPORT);
        let (count, callback) = counter();
        drop(trigger.observe(below_fold(), ObserveOptions::default(), callback));

        assert_eq!(trigger.active_count(), 0);
        trigger.update_viewport(below_fold());
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn subscription_outliving_trigger_is_harmless() {
        let trigger = VisibilityTrigger::with_viewport(VIEWPORT);
        let (_count, callback) = counter();
        let sub = trigger.observe(below_fold(), ObserveOptions::default(), callback);
        drop(trigger);

        sub.unsubscribe();
        assert!(!sub.is_active());
    }

    #[test]
    fn move_region_reevaluates() {
        let trigger = VisibilityTrigger::with_viewport(VIEWPORT);
        let (count, callback) = counter();
        let sub = trigger.observe(below_fold(), ObserveOptions::default(), callback);

        assert!(trigger.move_region(sub.region(), Bounds::new(0.0, 200.0, 800.0, 400.0)));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!trigger.move_region(sub.region(), below_fold()));
    }

    #[test]
    fn callback_may_observe_again() {
        let trigger = VisibilityTrigger::with_viewport(VIEWPORT);
        let nested = trigger.clone();
        let (count, callback) = counter();
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::default();
        let store = Arc::clone(&slot);

        let _sub = trigger.observe(below_fold(), ObserveOptions::default(), move |_| {
            let sub = nested.observe(
                Bounds::new(0.0, 5000.0, 10.0, 10.0),
                ObserveOptions::default(),
                callback,
            );
            *store.lock().unwrap() = Some(sub);
        });
        trigger.update_viewport(below_fold());

        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(trigger.active_count(), 1);
        assert!(slot.lock().unwrap().is_some());
    }

    #[test]
    fn triggered_regions_are_recorded() {
        let mut collector = DiagnosticsCollector::default();
        let trigger =
            VisibilityTrigger::with_viewport(VIEWPORT).with_diagnostics(collector.handle());
        let (_count, callback) = counter();
        let _sub = trigger.observe(
            Bounds::new(0.0, 0.0, 100.0, 100.0),
            ObserveOptions::default(),
            callback,
        );

        collector.process_pending();
        assert_eq!(
            collector.count(|e| matches!(e, LoadEvent::RegionTriggered { region: 0, .. })),
            1
        );
    }
}
