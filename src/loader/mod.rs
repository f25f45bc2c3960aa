// SPDX-License-Identifier: MPL-2.0
//! Module loading: factories, retry with exponential backoff, shared
//! handles and the identity-keyed cache.
//!
//! # Architecture
//!
//! - [`ModuleFactory`]: zero-argument async constructor with an identity
//! - [`RetryableLoader`]: runs a factory up to `retries + 1` times
//! - [`LoadableHandle`]: one shared, lazily started load
//! - [`LoaderCache`]: one handle per factory identity

mod cache;
mod factory;
mod handle;
mod retry;

pub use cache::{CacheConfig, CacheStats, LoaderCache};
pub use factory::{FactoryId, ModuleFactory};
pub use handle::{LoadStatus, LoadableHandle, StatusKind};
pub use retry::{AttemptEvent, RetryPolicy, RetryableLoader};
