//! Run-wide success and failure accounting.

use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::sync::watch;

use crate::attempt::AttemptOutcome;

/// Point-in-time counts of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Progress {
    /// Jobs with a terminal outcome.
    pub processed: usize,
    /// Jobs enqueued.
    pub total: usize,
    /// Jobs delivered.
    pub succeeded: usize,
    /// Jobs that exhausted their attempts.
    pub failed: usize,
}

impl Progress {
    /// Completed share in `0.0..=1.0`; an empty run counts as done.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.processed as f64 / self.total as f64
        }
    }

    /// Returns `true` once every job has an outcome.
    #[must_use]
    pub const fn is_done(&self) -> bool {
        self.processed >= self.total
    }
}

/// A recipient that could not be reached, with the last error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    /// Recipient address.
    pub recipient: String,
    /// Last transport error, or the cancellation note.
    pub reason: String,
}

#[derive(Debug, Default)]
struct Tally {
    succeeded: usize,
    failed: usize,
    failures: Vec<Failure>,
}

/// Collects outcomes from all workers under a single lock.
///
/// Each record also publishes the new [`Progress`] to subscribers.
#[derive(Debug)]
pub struct ResultAggregator {
    total: usize,
    tally: Mutex<Tally>,
    progress: watch::Sender<Progress>,
}

impl ResultAggregator {
    /// Creates an aggregator expecting `total` outcomes.
    #[must_use]
    pub fn new(total: usize) -> Self {
        let (progress, _rx) = watch::channel(Progress {
            total,
            ..Progress::default()
        });
        Self {
            total,
            tally: Mutex::new(Tally::default()),
            progress,
        }
    }

    /// Counts a delivered job.
    pub fn record_success(&self) {
        let mut tally = self.lock();
        tally.succeeded += 1;
        self.publish(&tally);
    }

    /// Counts a failed job and remembers why.
    pub fn record_failure(&self, recipient: impl Into<String>, reason: impl Into<String>) {
        let mut tally = self.lock();
        tally.failed += 1;
        tally.failures.push(Failure {
            recipient: recipient.into(),
            reason: reason.into(),
        });
        self.publish(&tally);
    }

    /// Records the outcome of the job for `recipient`.
    pub fn record(&self, recipient: &str, outcome: AttemptOutcome) {
        match outcome {
            AttemptOutcome::Success => self.record_success(),
            AttemptOutcome::Failed(reason) => self.record_failure(recipient, reason),
        }
    }

    /// Consistent counts at this instant.
    #[must_use]
    pub fn snapshot(&self) -> Progress {
        self.progress_of(&self.lock())
    }

    /// Receiver that sees every update.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Progress> {
        self.progress.subscribe()
    }

    /// Failures recorded so far, in completion order.
    #[must_use]
    pub fn failures(&self) -> Vec<Failure> {
        self.lock().failures.clone()
    }

    /// Number of outcomes expected.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.total
    }

    // Published while the lock is held so subscribers never see counts go
    // backwards.
    fn publish(&self, tally: &Tally) {
        self.progress.send_replace(self.progress_of(tally));
    }

    const fn progress_of(&self, tally: &Tally) -> Progress {
        Progress {
            processed: tally.succeeded + tally.failed,
            total: self.total,
            succeeded: tally.succeeded,
            failed: tally.failed,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Tally> {
        self.tally.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
