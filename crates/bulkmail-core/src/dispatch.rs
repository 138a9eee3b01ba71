//! Dispatch engine: one instance per run.
//!
//! A [`Dispatcher`] owns the account and transport. [`Dispatcher::start`]
//! validates a [`Batch`], enqueues one job per recipient and spawns the
//! workers; the returned [`DispatchHandle`] exposes progress, cancellation and
//! the final [`DispatchReport`].

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::account::Account;
use crate::aggregate::{Failure, Progress, ResultAggregator};
use crate::attempt::DeliveryAttempter;
use crate::cancel::CancellationToken;
use crate::error::{Error, Result};
use crate::job::Batch;
use crate::pool::{WorkerContext, WorkerPool};
use crate::queue::DispatchQueue;
use crate::rate_limiter::RateLimiter;
use crate::retry::RetryPolicy;
use crate::transport::Transport;
use crate::validation::{ValidationError, ValidationResult, validate_run};

/// Tuning of a dispatch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Concurrent workers.
    ///
    /// Default: 2. Zero is treated as one.
    #[serde(default = "defaults::workers")]
    pub workers: usize,

    /// Minimum seconds between two sends from the account.
    ///
    /// Default: 2
    #[serde(default = "defaults::min_interval_secs")]
    pub min_interval_secs: u64,

    /// Attempts and backoff per recipient.
    #[serde(default)]
    pub retry: RetryPolicy,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            workers: defaults::workers(),
            min_interval_secs: defaults::min_interval_secs(),
            retry: RetryPolicy::default(),
        }
    }
}

impl DispatchConfig {
    /// Spacing enforced by the rate limiter.
    #[must_use]
    pub const fn min_interval(&self) -> Duration {
        Duration::from_secs(self.min_interval_secs)
    }

    /// Checks the tuning values a run cannot work with.
    ///
    /// # Errors
    ///
    /// Returns every problem found.
    pub fn validate(&self) -> ValidationResult {
        let max = RateLimiter::MAX_INTERVAL;
        if self.min_interval() > max {
            return Err(vec![ValidationError::IntervalTooLong {
                max_secs: max.as_secs(),
            }]);
        }
        Ok(())
    }
}

mod defaults {
    pub const fn workers() -> usize {
        crate::pool::WorkerPool::DEFAULT_SIZE
    }

    pub const fn min_interval_secs() -> u64 {
        2
    }
}

/// Final tallies of a run, available once every worker has exited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    /// Jobs enqueued.
    pub total: usize,
    /// Jobs delivered.
    pub succeeded: usize,
    /// Jobs that failed, cancelled ones included.
    pub failed: usize,
    /// Failed recipients with their last error.
    pub failures: Vec<Failure>,
    /// Jobs never started because the run was cancelled.
    pub unsent: usize,
    /// Whether cancellation was requested.
    pub cancelled: bool,
    /// Wall time from start to the last worker exiting.
    pub elapsed: Duration,
}

impl DispatchReport {
    /// Returns `true` if every recipient was delivered.
    #[must_use]
    pub const fn all_succeeded(&self) -> bool {
        self.succeeded == self.total
    }
}

/// Sends batches for one account.
pub struct Dispatcher {
    account: Arc<Account>,
    transport: Arc<dyn Transport>,
    config: DispatchConfig,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("account", &self.account)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Creates a dispatcher.
    #[must_use]
    pub fn new<T: Transport + 'static>(
        account: Account,
        transport: Arc<T>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            account: Arc::new(account),
            transport,
            config,
        }
    }

    /// Run configuration.
    #[must_use]
    pub const fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Validates `batch`, enqueues it and starts the workers.
    ///
    /// Must be called within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] without enqueueing anything if the
    /// account or the batch is incomplete, or the configuration is out of
    /// range.
    pub fn start(&self, batch: Batch) -> Result<DispatchHandle> {
        let mut errors = validate_run(&self.account, &batch).err().unwrap_or_default();
        if let Err(config_errors) = self.config.validate() {
            errors.extend(config_errors);
        }
        if !errors.is_empty() {
            warn!(problems = errors.len(), "dispatch rejected by validation");
            return Err(Error::Validation(errors));
        }

        let started = Instant::now();
        let queue: Arc<DispatchQueue> = Arc::new(batch.into_jobs().into_iter().collect());
        let total = queue.len();
        let cancel = CancellationToken::new();
        let results = Arc::new(ResultAggregator::new(total));

        let attempter = DeliveryAttempter::new(
            Arc::clone(&self.account),
            Arc::clone(&self.transport),
            Arc::new(RateLimiter::new(self.config.min_interval())),
            self.config.retry,
        )
        .with_cancellation(cancel.clone());

        let ctx = WorkerContext {
            queue: Arc::clone(&queue),
            attempter: Arc::new(attempter),
            results: Arc::clone(&results),
            cancel: cancel.clone(),
        };
        let pool = WorkerPool::spawn(self.config.workers, &ctx);

        info!(
            total,
            workers = pool.len(),
            min_interval_secs = self.config.min_interval_secs,
            max_attempts = self.config.retry.attempts(),
            "dispatch started"
        );

        Ok(DispatchHandle {
            queue,
            results,
            cancel,
            pool,
            started,
        })
    }

    /// Starts `batch` and waits for the report.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the run could not start.
    pub async fn run(&self, batch: Batch) -> Result<DispatchReport> {
        Ok(self.start(batch)?.wait().await)
    }
}

/// A running dispatch.
#[derive(Debug)]
pub struct DispatchHandle {
    queue: Arc<DispatchQueue>,
    results: Arc<ResultAggregator>,
    cancel: CancellationToken,
    pool: WorkerPool,
    started: Instant,
}

impl DispatchHandle {
    /// Current counts.
    #[must_use]
    pub fn progress(&self) -> Progress {
        self.results.snapshot()
    }

    /// Receiver notified on every recorded outcome.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Progress> {
        self.results.subscribe()
    }

    /// Stops workers from taking new jobs and interrupts pending backoffs.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Token that cancels this run, e.g. from a signal handler.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Waits for all workers and returns the final tallies.
    pub async fn wait(self) -> DispatchReport {
        self.pool.join().await;

        let progress = self.results.snapshot();
        let report = DispatchReport {
            total: progress.total,
            succeeded: progress.succeeded,
            failed: progress.failed,
            failures: self.results.failures(),
            unsent: self.queue.len(),
            cancelled: self.cancel.is_cancelled(),
            elapsed: self.started.elapsed(),
        };

        info!(
            succeeded = report.succeeded,
            failed = report.failed,
            unsent = report.unsent,
            cancelled = report.cancelled,
            elapsed_secs = report.elapsed.as_secs(),
            "dispatch finished"
        );
        report
    }
}
