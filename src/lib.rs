// SPDX-License-Identifier: MPL-2.0
//! `lazy_mount` defers loading of expensive modules until the region that
//! shows them scrolls into view.
//!
//! Loads are retried with exponential backoff, deduplicated per factory
//! identity through a shared cache, and surfaced to the host as a small
//! phase machine with a placeholder while pending.
//!
//! # Modules
//!
//! - [`loader`]: factories, retry, shared handles and the loader cache
//! - [`visibility`]: one-shot viewport observers
//! - [`mount`]: the deferred mount controller
//! - [`config`]: `settings.toml` loading and defaults
//! - [`diagnostics`]: bounded, exportable event log

#![doc(html_root_url = "https://docs.rs/lazy_mount/0.3.0")]

pub mod config;
pub mod diagnostics;
pub mod domain;
pub mod error;
pub mod loader;
pub mod mount;
pub mod visibility;
