//! Shared FIFO of pending jobs.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::job::SendJob;

/// Unbounded, non-blocking work queue shared by all workers.
#[derive(Debug, Default)]
pub struct DispatchQueue {
    jobs: Mutex<VecDeque<SendJob>>,
}

impl DispatchQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a job. Never blocks on capacity.
    pub fn push(&self, job: SendJob) {
        self.lock().push_back(job);
    }

    /// Takes the next job, or `None` when the queue is drained.
    pub fn try_pop(&self) -> Option<SendJob> {
        self.lock().pop_front()
    }

    /// Number of jobs still waiting.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` if no job is waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // A panicking worker never leaves the deque half-modified.
    fn lock(&self) -> MutexGuard<'_, VecDeque<SendJob>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl FromIterator<SendJob> for DispatchQueue {
    fn from_iter<I: IntoIterator<Item = SendJob>>(iter: I) -> Self {
        Self {
            jobs: Mutex::new(iter.into_iter().collect()),
        }
    }
}
