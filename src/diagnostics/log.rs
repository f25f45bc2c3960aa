// SPDX-License-Identifier: MPL-2.0
//! Bounded in-memory log of load events.

use std::collections::{BTreeMap, VecDeque};

use super::events::{DiagnosticEvent, LoadEvent};
use crate::domain::diagnostics::EventCapacity;

/// Keeps the most recent events up to its capacity.
///
/// Overflow drops the oldest event, but per-kind totals keep counting
/// everything ever recorded, so a long session still reports how many
/// attempts or evictions happened after the early events are gone.
///
/// # Example
///
/// ```
/// use lazy_mount::diagnostics::{DiagnosticEvent, EventLog, LoadEvent};
/// use lazy_mount::domain::diagnostics::EventCapacity;
///
/// let mut log = EventLog::new(EventCapacity::new(16));
/// for region in 0..20 {
///     log.record(DiagnosticEvent::new(LoadEvent::RegionTriggered { region, fraction: 1.0 }));
/// }
///
/// assert_eq!(log.len(), 16);
/// assert_eq!(log.dropped(), 4);
/// assert_eq!(log.total("region_triggered"), 20);
/// ```
#[derive(Debug, Clone)]
pub struct EventLog {
    events: VecDeque<DiagnosticEvent>,
    capacity: EventCapacity,
    totals: BTreeMap<&'static str, u64>,
    dropped: u64,
}

impl EventLog {
    #[must_use]
    pub fn new(capacity: EventCapacity) -> Self {
        Self {
            events: VecDeque::with_capacity(capacity.value()),
            capacity,
            totals: BTreeMap::new(),
            dropped: 0,
        }
    }

    pub fn record(&mut self, event: DiagnosticEvent) {
        *self.totals.entry(event.event.label()).or_insert(0) += 1;
        if self.events.len() >= self.capacity.value() {
            self.events.pop_front();
            self.dropped += 1;
        }
        self.events.push_back(event);
    }

    /// Retained events, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &DiagnosticEvent> {
        self.events.iter()
    }

    /// Retained events concerning `module`.
    pub fn for_module<'a>(&'a self, module: &'a str) -> impl Iterator<Item = &'a LoadEvent> {
        self.events
            .iter()
            .map(|e| &e.event)
            .filter(move |event| event_module(event) == Some(module))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity.value()
    }

    /// Events pushed out by newer ones.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Events of kind `label` recorded since creation, retained or not.
    #[must_use]
    pub fn total(&self, label: &str) -> u64 {
        self.totals.get(label).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn totals(&self) -> &BTreeMap<&'static str, u64> {
        &self.totals
    }

    /// Forgets retained events and totals.
    pub fn clear(&mut self) {
        self.events.clear();
        self.totals.clear();
        self.dropped = 0;
    }
}

fn event_module(event: &LoadEvent) -> Option<&str> {
    match event {
        LoadEvent::Requested { module, .. }
        | LoadEvent::Evicted { module }
        | LoadEvent::PreloadFailed { module, .. }
        | LoadEvent::AttemptStarted { module, .. }
        | LoadEvent::AttemptFailed { module, .. }
        | LoadEvent::Resolved { module, .. }
        | LoadEvent::Exhausted { module, .. } => Some(module),
        LoadEvent::RegionTriggered { .. } | LoadEvent::PhaseChanged { .. } => None,
    }
}
