//! Fixed-size set of workers draining the dispatch queue.

use std::sync::Arc;

use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error};

use crate::aggregate::ResultAggregator;
use crate::attempt::{AttemptOutcome, DeliveryAttempter};
use crate::cancel::CancellationToken;
use crate::job::SendJob;
use crate::queue::DispatchQueue;

/// Everything a worker shares with its siblings.
#[derive(Debug, Clone)]
pub struct WorkerContext {
    /// Pending jobs.
    pub queue: Arc<DispatchQueue>,
    /// Delivery with rate limiting and retries.
    pub attempter: Arc<DeliveryAttempter>,
    /// Outcome sink.
    pub results: Arc<ResultAggregator>,
    /// Stop signal.
    pub cancel: CancellationToken,
}

/// Running workers of one dispatch.
#[derive(Debug)]
pub struct WorkerPool {
    workers: JoinSet<()>,
}

impl WorkerPool {
    /// Default number of workers.
    pub const DEFAULT_SIZE: usize = 2;

    /// Spawns `size` workers (at least one) on the current runtime.
    #[must_use]
    pub fn spawn(size: usize, ctx: &WorkerContext) -> Self {
        let mut workers = JoinSet::new();
        for id in 0..size.max(1) {
            workers.spawn(run_worker(id, ctx.clone()));
        }
        Self { workers }
    }

    /// Number of workers still running.
    #[must_use]
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    /// Returns `true` once every worker has been joined.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Waits for every worker to exit.
    ///
    /// Panics during delivery are recorded as failures by the worker itself;
    /// anything escaping a worker is logged and the others are still awaited.
    pub async fn join(mut self) {
        while let Some(result) = self.workers.join_next().await {
            if let Err(err) = result {
                error!(error = %err, "worker terminated abnormally");
            }
        }
    }
}

async fn run_worker(id: usize, ctx: WorkerContext) {
    debug!(worker = id, "worker started");
    let mut handled = 0_usize;

    loop {
        if ctx.cancel.is_cancelled() {
            debug!(worker = id, "worker stopping: cancelled");
            break;
        }
        let Some(job) = ctx.queue.try_pop() else {
            break;
        };
        let recipient = job.recipient().to_string();
        let outcome = deliver(Arc::clone(&ctx.attempter), job).await;
        ctx.results.record(&recipient, outcome);
        handled += 1;
    }

    debug!(worker = id, handled, "worker finished");
}

/// Runs one delivery on its own task so a panic is recorded against the job
/// instead of taking the worker down with it.
async fn deliver(attempter: Arc<DeliveryAttempter>, job: SendJob) -> AttemptOutcome {
    let recipient = job.recipient().to_string();
    match tokio::spawn(async move { attempter.attempt(&job).await }).await {
        Ok(outcome) => outcome,
        Err(err) => {
            error!(recipient = %recipient, error = %err, "delivery task aborted");
            AttemptOutcome::Failed(abort_reason(err))
        }
    }
}

fn abort_reason(err: JoinError) -> String {
    if !err.is_panic() {
        return "delivery task cancelled".to_string();
    }
    let payload = err.into_panic();
    let message = payload
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    format!("delivery task panicked: {message}")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::account::Account;
    use crate::job::{Batch, SendJob};
    use crate::rate_limiter::RateLimiter;
    use crate::retry::RetryPolicy;
    use crate::transport::{Transport, TransportError};

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Transport for Recorder {
        async fn send_once(&self, _: &Account, job: &SendJob) -> Result<(), TransportError> {
            if job.recipient().starts_with("panic") {
                panic!("transport blew up");
            }
            self.sent.lock().unwrap().push(job.recipient().to_string());
            Ok(())
        }
    }

    fn context(recipients: &[&str], transport: Arc<Recorder>) -> WorkerContext {
        let jobs = Batch::new(recipients.iter().copied(), "S", "B").into_jobs();
        let total = jobs.len();
        let attempter = DeliveryAttempter::new(
            Arc::new(Account::new("me@example.com", "pw")),
            transport,
            Arc::new(RateLimiter::new(Duration::from_secs(2))),
            RetryPolicy::default(),
        );
        WorkerContext {
            queue: Arc::new(jobs.into_iter().collect()),
            attempter: Arc::new(attempter),
            results: Arc::new(ResultAggregator::new(total)),
            cancel: CancellationToken::new(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn drains_queue_exactly_once() {
        let transport = Arc::new(Recorder::default());
        let recipients: Vec<String> = (0..7).map(|i| format!("r{i}@example.com")).collect();
        let refs: Vec<&str> = recipients.iter().map(String::as_str).collect();
        let ctx = context(&refs, Arc::clone(&transport));

        let pool = WorkerPool::spawn(3, &ctx);
        assert_eq!(pool.len(), 3);
        pool.join().await;

        let sent = transport.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 7);
        assert_eq!(sent.iter().collect::<HashSet<_>>().len(), 7);
        assert!(ctx.queue.is_empty());
        assert_eq!(ctx.results.snapshot().succeeded, 7);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_workers_means_one() {
        let transport = Arc::new(Recorder::default());
        let ctx = context(&["a@example.com"], Arc::clone(&transport));
        let pool = WorkerPool::spawn(0, &ctx);
        assert_eq!(pool.len(), 1);
        pool.join().await;
        assert_eq!(ctx.results.snapshot().processed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_pool_leaves_jobs_queued() {
        let transport = Arc::new(Recorder::default());
        let ctx = context(&["a@example.com", "b@example.com"], Arc::clone(&transport));
        ctx.cancel.cancel();
        WorkerPool::spawn(2, &ctx).join().await;
        assert_eq!(ctx.queue.len(), 2);
        assert!(transport.sent.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_delivery_is_recorded_as_failure() {
        let transport = Arc::new(Recorder::default());
        let ctx = context(
            &["panic@example.com", "a@example.com", "b@example.com"],
            Arc::clone(&transport),
        );
        WorkerPool::spawn(2, &ctx).join().await;

        let progress = ctx.results.snapshot();
        assert_eq!(progress.processed, 3);
        assert_eq!(progress.succeeded, 2);
        assert_eq!(progress.failed, 1);
        assert!(ctx.queue.is_empty());

        let failures = ctx.results.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].recipient, "panic@example.com");
        assert_eq!(failures[0].reason, "delivery task panicked: transport blew up");
    }

    #[tokio::test(start_paused = true)]
    async fn single_worker_survives_a_panic() {
        let transport = Arc::new(Recorder::default());
        let ctx = context(
            &["panic@example.com", "a@example.com"],
            Arc::clone(&transport),
        );
        WorkerPool::spawn(1, &ctx).join().await;
        assert_eq!(ctx.results.snapshot().processed, 2);
        assert_eq!(transport.sent.lock().unwrap().as_slice(), ["a@example.com"]);
    }
}
