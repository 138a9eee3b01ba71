//! Shared test helpers.
#![allow(dead_code)]

pub mod mock_server;

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use bulkmail_core::{Account, SendJob, Transport, TransportError};
use tokio::time::Instant;

/// One call made to [`StubTransport`].
#[derive(Debug, Clone)]
pub struct Call {
    pub recipient: String,
    pub at: Instant,
}

/// Transport that records calls and always fails for chosen recipients.
#[derive(Debug, Default)]
pub struct StubTransport {
    failing: HashSet<String>,
    panicking: HashSet<String>,
    calls: Mutex<Vec<Call>>,
}

impl StubTransport {
    /// Every recipient succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The listed recipients fail on every attempt.
    #[must_use]
    pub fn failing(recipients: &[&str]) -> Self {
        Self {
            failing: recipients.iter().map(|r| (*r).to_string()).collect(),
            ..Self::default()
        }
    }

    /// The listed recipients make the transport panic.
    #[must_use]
    pub fn panicking(recipients: &[&str]) -> Self {
        Self {
            panicking: recipients.iter().map(|r| (*r).to_string()).collect(),
            ..Self::default()
        }
    }

    /// All calls in the order they were made.
    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of calls for one recipient.
    #[must_use]
    pub fn calls_for(&self, recipient: &str) -> usize {
        self.calls().iter().filter(|c| c.recipient == recipient).count()
    }
}

#[async_trait]
impl Transport for StubTransport {
    async fn send_once(&self, _: &Account, job: &SendJob) -> Result<(), TransportError> {
        self.calls.lock().unwrap().push(Call {
            recipient: job.recipient().to_string(),
            at: Instant::now(),
        });
        if self.panicking.contains(job.recipient()) {
            panic!("connection state corrupted");
        }
        if self.failing.contains(job.recipient()) {
            Err(TransportError::new("550 5.1.1 mailbox unavailable"))
        } else {
            Ok(())
        }
    }
}

/// Account accepted by validation.
#[must_use]
pub fn account() -> Account {
    Account::new("sender@example.com", "app-password")
}

/// `recipient1@example.com` .. `recipient{n}@example.com`.
#[must_use]
pub fn recipients(n: usize) -> Vec<String> {
    (1..=n).map(|i| format!("recipient{i}@example.com")).collect()
}
