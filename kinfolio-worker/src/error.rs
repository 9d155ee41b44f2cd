//! Errors raised while starting or stopping a worker pool.

use thiserror::Error;

/// Errors returned by [`WorkerPool`](crate::WorkerPool).
#[derive(Debug, Error)]
pub enum WorkerError {
    /// The pool was configured with zero workers.
    #[error("worker pool needs at least one worker")]
    NoWorkers,
    /// The retry policy allows zero attempts.
    #[error("retry policy must allow at least one attempt")]
    NoAttempts,
    /// The pool was started outside a Tokio runtime.
    #[error("worker pool must be spawned inside a Tokio runtime")]
    NoRuntime {
        /// Error reported by Tokio.
        #[source]
        source: tokio::runtime::TryCurrentError,
    },
    /// A worker task panicked or was cancelled.
    #[error("worker task ended abnormally: {source}")]
    Join {
        /// Join failure reported by Tokio.
        #[source]
        source: tokio::task::JoinError,
    },
}
