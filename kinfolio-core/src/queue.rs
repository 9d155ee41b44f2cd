//! Task descriptors for asynchronous read-count increments.
//!
//! A "page viewed" or "song played" request does not touch the ranking
//! itself. It enqueues an [`IncrementTask`] and returns immediately; a worker
//! applies the increment later.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::EntityKind;

/// A request to apply one rank-aware increment to one entity.
///
/// # Examples
///
/// ```
/// use kinfolio_core::{EntityKind, IncrementTask};
///
/// let task = IncrementTask::new(EntityKind::Page, 12);
/// assert_eq!(task.to_string(), "page 12");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IncrementTask {
    /// Kind of the entity to increment.
    pub kind: EntityKind,
    /// Identifier of the entity within its kind.
    pub id: u64,
}

impl IncrementTask {
    /// Construct a task for `kind` and `id`.
    #[must_use]
    pub const fn new(kind: EntityKind, id: u64) -> Self {
        Self { kind, id }
    }
}

impl std::fmt::Display for IncrementTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.kind, self.id)
    }
}

/// Errors raised while enqueuing a task.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum QueueError {
    /// The queue no longer accepts work.
    #[error("task queue is closed; dropped {task}")]
    Closed {
        /// Task that could not be delivered.
        task: IncrementTask,
    },
}

/// Accepts increment tasks for out-of-band execution.
///
/// Delivery is at-least-once. `enqueue` must not block on the increment
/// itself; implementers only hand the task over.
pub trait TaskQueue: Send + Sync {
    /// Hand `task` to the queue.
    ///
    /// # Errors
    /// Returns [`QueueError::Closed`] when the queue has shut down.
    fn enqueue(&self, task: IncrementTask) -> Result<(), QueueError>;
}
