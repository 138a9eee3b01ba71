//! Pre-flight validation of a dispatch run.
//!
//! Everything here runs before the first job is enqueued. All problems are
//! collected so the caller can show them together.

use crate::account::Account;
use crate::job::Batch;

/// A reason the run cannot start.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// No recipients at all.
    #[error("No valid emails found in the recipient list")]
    EmptyRecipientList,
    /// A recipient is not email-shaped.
    #[error("Invalid recipient address: {0}")]
    InvalidRecipient(String),
    /// Subject is empty or whitespace.
    #[error("Subject is required")]
    EmptySubject,
    /// Subject would break out of its header line.
    #[error("Subject must be a single line")]
    MultilineSubject,
    /// Body is empty or whitespace.
    #[error("Message body is required")]
    EmptyBody,
    /// Account address is empty.
    #[error("Sender email address is required")]
    EmptySenderEmail,
    /// Account address is not email-shaped.
    #[error("Invalid sender email address")]
    InvalidSenderEmail,
    /// Account has no password.
    #[error("SMTP password is required")]
    EmptyPassword,
    /// SMTP host is empty.
    #[error("SMTP server is required")]
    EmptySmtpHost,
    /// SMTP port is zero.
    #[error("SMTP port must be 1-65535")]
    InvalidSmtpPort,
    /// Send interval is longer than the limiter accepts.
    #[error("Minimum send interval must be at most {max_secs} seconds")]
    IntervalTooLong {
        /// Largest accepted interval.
        max_secs: u64,
    },
}

impl ValidationError {
    /// Get the field name this error relates to.
    #[must_use]
    pub const fn field(&self) -> &'static str {
        match self {
            Self::EmptyRecipientList | Self::InvalidRecipient(_) => "recipients",
            Self::EmptySubject | Self::MultilineSubject => "subject",
            Self::EmptyBody => "body",
            Self::EmptySenderEmail | Self::InvalidSenderEmail => "email",
            Self::EmptyPassword => "password",
            Self::EmptySmtpHost => "smtp_host",
            Self::InvalidSmtpPort => "smtp_port",
            Self::IntervalTooLong { .. } => "min_interval_secs",
        }
    }
}

/// Result of validating a run.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// Validate the account and the batch together.
///
/// # Errors
///
/// Returns every problem found, in field order.
pub fn validate_run(account: &Account, batch: &Batch) -> ValidationResult {
    let mut errors = Vec::new();
    check_account(account, &mut errors);
    check_batch(batch, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_account(account: &Account, errors: &mut Vec<ValidationError>) {
    if account.email.trim().is_empty() {
        errors.push(ValidationError::EmptySenderEmail);
    } else if !is_valid_email(&account.email) {
        errors.push(ValidationError::InvalidSenderEmail);
    }
    if account.password.is_empty() {
        errors.push(ValidationError::EmptyPassword);
    }
    if account.smtp.host.trim().is_empty() {
        errors.push(ValidationError::EmptySmtpHost);
    }
    if account.smtp.port == 0 {
        errors.push(ValidationError::InvalidSmtpPort);
    }
}

fn check_batch(batch: &Batch, errors: &mut Vec<ValidationError>) {
    if batch.recipients.is_empty() {
        errors.push(ValidationError::EmptyRecipientList);
    }
    errors.extend(
        batch
            .recipients
            .iter()
            .filter(|r| !is_valid_email(r))
            .map(|r| ValidationError::InvalidRecipient(r.clone())),
    );

    if batch.subject.trim().is_empty() {
        errors.push(ValidationError::EmptySubject);
    } else if batch.subject.contains(['\r', '\n']) {
        errors.push(ValidationError::MultilineSubject);
    }
    if batch.body.trim().is_empty() {
        errors.push(ValidationError::EmptyBody);
    }
}

/// Basic email validation: a usable envelope address with a dotted domain.
#[must_use]
pub fn is_valid_email(email: &str) -> bool {
    let Ok(addr) = bulkmail_smtp::Address::new(email) else {
        return false;
    };
    let domain = addr.domain();
    domain.contains('.') && domain.split('.').all(|label| !label.is_empty())
}
