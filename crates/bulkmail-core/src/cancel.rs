//! Cooperative cancellation for a dispatch run.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

/// Cloneable stop signal shared by a dispatch handle and its workers.
///
/// Workers check it between jobs and while waiting out a backoff; an attempt
/// already talking to the server is allowed to finish.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    tx: Arc<watch::Sender<bool>>,
}

impl CancellationToken {
    /// Create a new, not yet cancelled token.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Check if cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        if !self.tx.send_replace(true) {
            debug!("cancellation requested");
        }
    }

    /// Resolves once cancellation has been requested.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this only returns on cancel.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}
