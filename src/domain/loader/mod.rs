// SPDX-License-Identifier: MPL-2.0
//! Loader domain types.
//!
//! - [`RetryCount`]: Retries allowed after the first failed attempt
//! - [`BaseDelay`]: Backoff unit doubled on every retry

mod newtypes;

pub use newtypes::{retry_bounds, BaseDelay, RetryCount};
