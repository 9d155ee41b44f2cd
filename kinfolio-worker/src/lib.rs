//! In-process execution of read-count increment tasks.
//!
//! Front-door code enqueues an [`IncrementTask`](kinfolio_core::IncrementTask)
//! through a [`QueueHandle`] and returns immediately. A [`WorkerPool`] of
//! Tokio tasks drains the queue, runs each task through an
//! [`IncrementHandler`](kinfolio_scorer::IncrementHandler) and retries
//! transient failures with exponential backoff.

#![forbid(unsafe_code)]

mod config;
mod error;
mod pool;
mod report;

pub use config::{RetryPolicy, WorkerConfig};
pub use error::WorkerError;
pub use pool::{QueueHandle, WorkerPool};
pub use report::WorkerReport;

#[cfg(test)]
mod tests;
