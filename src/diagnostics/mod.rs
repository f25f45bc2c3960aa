// SPDX-License-Identifier: MPL-2.0
//! Diagnostics module for recording load activity.
//!
//! Complements `tracing` logs with a memory-bounded, exportable event log:
//! which modules were requested, how many attempts each took, which regions
//! triggered and how mounts moved through their phases.
//!
//! # Architecture
//!
//! - [`EventLog`]: Bounded event storage with lifetime per-kind totals
//! - [`LoadEvent`]: What happened
//! - [`DiagnosticsCollector`] / [`DiagnosticsHandle`]: Storage and cheap
//!   senders handed to caches, triggers and mounts

mod collector;
mod events;
mod log;

pub use collector::{DiagnosticReport, DiagnosticsCollector, DiagnosticsHandle, ReportEvent};
pub use events::{DiagnosticEvent, LoadEvent};
pub use log::EventLog;
