//! # bulkmail-core
//!
//! Dispatch engine for sending one message to many recipients through a
//! single rate-limited account.
//!
//! This crate provides:
//! - Account and settings models
//! - Recipient list loading and pre-flight validation
//! - A shared rate limiter and a bounded retry policy
//! - A worker pool draining a shared queue, with result aggregation
//! - The [`Transport`] seam and its SMTP implementation
//!
//! ```ignore
//! use std::sync::Arc;
//! use bulkmail_core::{Account, Batch, DispatchConfig, Dispatcher, SmtpTransport};
//!
//! let account = Account::new("me@contoso.com", "app-password");
//! let dispatcher = Dispatcher::new(account, Arc::new(SmtpTransport::new()), DispatchConfig::default());
//! let report = dispatcher
//!     .run(Batch::new(["a@example.com", "b@example.com"], "Hello", "Hi there"))
//!     .await?;
//! println!("{} sent, {} failed", report.succeeded, report.failed);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod account;
pub mod aggregate;
pub mod attempt;
pub mod cancel;
pub mod config;
pub mod dispatch;
mod error;
pub mod job;
pub mod message;
pub mod pool;
pub mod queue;
pub mod rate_limiter;
pub mod recipients;
pub mod retry;
pub mod transport;
pub mod validation;

pub use account::{Account, Security, SmtpConfig};
pub use aggregate::{Failure, Progress, ResultAggregator};
pub use attempt::{AttemptOutcome, DeliveryAttempter};
pub use cancel::CancellationToken;
pub use config::Settings;
pub use dispatch::{DispatchConfig, DispatchHandle, DispatchReport, Dispatcher};
pub use error::{Error, Result};
pub use job::{Batch, SendJob};
pub use message::compose_message;
pub use pool::WorkerPool;
pub use queue::DispatchQueue;
pub use rate_limiter::RateLimiter;
pub use recipients::{RecipientError, load_recipients, load_recipients_file};
pub use retry::{Backoff, RetryPolicy};
pub use transport::{SmtpTransport, Transport, TransportError};
pub use validation::{ValidationError, ValidationResult, validate_run};
