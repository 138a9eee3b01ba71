//! Rate-limited, bounded-retry delivery of a single job.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::account::Account;
use crate::cancel::CancellationToken;
use crate::job::SendJob;
use crate::rate_limiter::RateLimiter;
use crate::retry::RetryPolicy;
use crate::transport::Transport;

/// Terminal result for one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The transport accepted the message.
    Success,
    /// Every attempt failed; carries the last error.
    Failed(String),
}

impl AttemptOutcome {
    /// Returns `true` for [`AttemptOutcome::Success`].
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Sends jobs through the rate limiter, retrying with backoff.
///
/// Every attempt, the last one included, waits for the limiter first.
pub struct DeliveryAttempter {
    account: Arc<Account>,
    transport: Arc<dyn Transport>,
    limiter: Arc<RateLimiter>,
    policy: RetryPolicy,
    cancel: CancellationToken,
}

impl std::fmt::Debug for DeliveryAttempter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryAttempter")
            .field("account", &self.account)
            .field("limiter", &self.limiter)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl DeliveryAttempter {
    /// Creates an attempter that is never cancelled.
    #[must_use]
    pub fn new(
        account: Arc<Account>,
        transport: Arc<dyn Transport>,
        limiter: Arc<RateLimiter>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            account,
            transport,
            limiter,
            policy,
            cancel: CancellationToken::new(),
        }
    }

    /// Stops waiting out backoffs once `cancel` fires.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Retry policy in use.
    #[must_use]
    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Delivers `job`, retrying until success or the attempt limit.
    pub async fn attempt(&self, job: &SendJob) -> AttemptOutcome {
        let recipient = job.recipient();
        let max_attempts = self.policy.attempts();
        let mut last_error = String::new();

        for attempt in 0..max_attempts {
            let number = attempt + 1;
            self.limiter.acquire().await;

            match self.transport.send_once(&self.account, job).await {
                Ok(()) => {
                    info!(recipient, attempt = number, "message sent");
                    return AttemptOutcome::Success;
                }
                Err(err) => {
                    warn!(
                        recipient,
                        attempt = number,
                        max_attempts,
                        error = %err,
                        "delivery attempt failed"
                    );
                    last_error = err.0;
                }
            }

            if self.policy.is_final_attempt(attempt) {
                break;
            }

            if !self.backoff(self.policy.delay_for(attempt)).await {
                warn!(recipient, attempt = number, "cancelled before retry");
                return AttemptOutcome::Failed(format!(
                    "cancelled after {number} attempt(s): {last_error}"
                ));
            }
        }

        error!(
            recipient,
            attempts = max_attempts,
            error = %last_error,
            "giving up on recipient"
        );
        AttemptOutcome::Failed(last_error)
    }

    /// Sleeps for `delay`; returns `false` if cancelled first.
    async fn backoff(&self, delay: Duration) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        tokio::select! {
            () = tokio::time::sleep(delay) => true,
            () = self.cancel.cancelled() => false,
        }
    }
}
