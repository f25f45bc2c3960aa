// SPDX-License-Identifier: MPL-2.0
//! Diagnostics collector for aggregating and storing load events.
//!
//! Loaders, triggers and mounts record through cloneable
//! [`DiagnosticsHandle`]s; the collector drains them into a bounded
//! [`EventLog`] and exports a JSON report.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, Receiver, Sender};
use serde::Serialize;

use super::{DiagnosticEvent, EventLog, LoadEvent};
use crate::domain::diagnostics::EventCapacity;
use crate::error::Result;

/// Channel capacity between handles and the collector.
const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Handle for sending load events to the collector.
///
/// Cheap to clone and shareable across tasks. Sending never blocks: events
/// are dropped when the channel is full.
#[derive(Clone, Debug)]
pub struct DiagnosticsHandle {
    event_tx: Sender<DiagnosticEvent>,
}

impl DiagnosticsHandle {
    pub fn record(&self, event: LoadEvent) {
        let _ = self.event_tx.try_send(DiagnosticEvent::new(event));
    }
}

/// Report produced by [`DiagnosticsCollector::export_json`].
#[derive(Debug, Serialize)]
pub struct DiagnosticReport {
    pub generated_at: DateTime<Utc>,
    pub collection_duration_ms: u64,
    pub event_count: usize,
    pub dropped_events: u64,
    /// Number of retained events per kind.
    pub summary: BTreeMap<&'static str, u64>,
    /// Number of events per kind since collection started, dropped ones included.
    pub totals: BTreeMap<&'static str, u64>,
    pub events: Vec<ReportEvent>,
}

/// Event with its offset from the start of collection.
#[derive(Debug, Serialize)]
pub struct ReportEvent {
    pub offset_ms: u64,
    #[serde(flatten)]
    pub event: LoadEvent,
}

/// Stores events in a bounded [`EventLog`] until exported.
pub struct DiagnosticsCollector {
    log: EventLog,
    event_rx: Receiver<DiagnosticEvent>,
    event_tx: Sender<DiagnosticEvent>,
    started_at: Instant,
    started_at_utc: DateTime<Utc>,
}

impl DiagnosticsCollector {
    #[must_use]
    pub fn new(capacity: EventCapacity) -> Self {
        let (event_tx, event_rx) = bounded(DEFAULT_CHANNEL_CAPACITY);
        Self {
            log: EventLog::new(capacity),
            event_rx,
            event_tx,
            started_at: Instant::now(),
            started_at_utc: Utc::now(),
        }
    }

    #[must_use]
    pub fn handle(&self) -> DiagnosticsHandle {
        DiagnosticsHandle {
            event_tx: self.event_tx.clone(),
        }
    }

    /// Drains the channel into the log. Call periodically, e.g. once per
    /// frame or before exporting.
    pub fn process_pending(&mut self) {
        while let Ok(event) = self.event_rx.try_recv() {
            self.log.record(event);
        }
    }

    /// Records directly, bypassing the channel.
    pub fn record(&mut self, event: LoadEvent) {
        self.log.record(DiagnosticEvent::new(event));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.log.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DiagnosticEvent> {
        self.log.iter()
    }

    /// Number of retained events matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&LoadEvent) -> bool) -> usize {
        self.log.iter().filter(|e| predicate(&e.event)).count()
    }

    pub fn clear(&mut self) {
        self.log.clear();
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.log.capacity()
    }

    #[allow(clippy::cast_possible_truncation)] // Duration in ms fits comfortably in u64
    #[must_use]
    pub fn build_report(&self) -> DiagnosticReport {
        let mut summary = BTreeMap::new();
        let events = self
            .log
            .iter()
            .map(|e| {
                *summary.entry(e.event.label()).or_insert(0) += 1;
                ReportEvent {
                    offset_ms: e.timestamp.saturating_duration_since(self.started_at).as_millis()
                        as u64,
                    event: e.event.clone(),
                }
            })
            .collect();

        DiagnosticReport {
            generated_at: Utc::now(),
            collection_duration_ms: self.started_at.elapsed().as_millis() as u64,
            event_count: self.log.len(),
            dropped_events: self.log.dropped(),
            summary,
            totals: self.log.totals().clone(),
            events,
        }
    }

    /// Exports all retained events as a pretty-printed JSON report.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn export_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.build_report())
    }

    /// Writes the JSON report to `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or any filesystem operation fails.
    pub fn export_to_file(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.export_json()?)?;
        Ok(path.to_path_buf())
    }

    /// When collection started (wall clock).
    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at_utc
    }
}

impl Default for DiagnosticsCollector {
    fn default() -> Self {
        Self::new(EventCapacity::default())
    }
}

impl std::fmt::Debug for DiagnosticsCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiagnosticsCollector")
            .field("events", &self.log.len())
            .field("capacity", &self.log.capacity())
            .field("dropped", &self.log.dropped())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn requested(module: &str, cache_hit: bool) -> LoadEvent {
        LoadEvent::Requested {
            module: module.into(),
            cache_hit,
        }
    }

    #[test]
    fn handle_events_arrive_after_processing() {
        let mut collector = DiagnosticsCollector::default();
        let handle = collector.handle();

        handle.record(requested("charts", false));
        handle.clone().record(requested("charts", true));
        assert!(collector.is_empty());

        collector.process_pending();
        assert_eq!(collector.len(), 2);
        assert_eq!(
            collector.count(|e| matches!(e, LoadEvent::Requested { cache_hit: true, .. })),
            1
        );
    }

    #[test]
    fn report_summarizes_by_kind() {
        let mut collector = DiagnosticsCollector::default();
        collector.record(requested("a", false));
        collector.record(LoadEvent::AttemptStarted {
            module: "a".into(),
            attempt: 1,
        });
        collector.record(LoadEvent::AttemptStarted {
            module: "a".into(),
            attempt: 2,
        });

        let report = collector.build_report();
        assert_eq!(report.event_count, 3);
        assert_eq!(report.summary.get("attempt_started"), Some(&2));
        assert_eq!(report.summary.get("requested"), Some(&1));
    }

    #[test]
    fn report_totals_survive_overflow() {
        let mut collector = DiagnosticsCollector::new(EventCapacity::new(16));
        for i in 0..40 {
            collector.record(requested(&format!("m{i}"), false));
        }

        let report = collector.build_report();
        assert_eq!(report.event_count, 16);
        assert_eq!(report.dropped_events, 24);
        assert_eq!(report.summary.get("requested"), Some(&16));
        assert_eq!(report.totals.get("requested"), Some(&40));
    }

    #[test]
    fn export_json_flattens_events() {
        let mut collector = DiagnosticsCollector::default();
        collector.record(LoadEvent::RegionTriggered {
            region: 3,
            fraction: 0.5,
        });

        let json: serde_json::Value =
            serde_json::from_str(&collector.export_json().unwrap()).unwrap();
        assert_eq!(json["events"][0]["event"], "region_triggered");
        assert_eq!(json["events"][0]["region"], 3);
        assert!(json["events"][0]["offset_ms"].is_u64());
    }

    #[test]
    fn export_to_file_creates_directories() {
        let dir = tempdir().expect("failed to create temp dir");
        let path = dir.path().join("nested").join("report.json");
        let mut collector = DiagnosticsCollector::default();
        collector.record(requested("x", false));

        let written = collector.export_to_file(&path).expect("export should succeed");
        assert_eq!(written, path);
        assert!(fs::read_to_string(&path).unwrap().contains("\"requested\""));
    }
}
