//! Units of work for a dispatch run.

use std::sync::Arc;

/// One message to one recipient.
///
/// Subject and body are shared by every job of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendJob {
    recipient: String,
    subject: Arc<str>,
    body: Arc<str>,
}

impl SendJob {
    /// Creates a job.
    #[must_use]
    pub fn new(recipient: impl Into<String>, subject: Arc<str>, body: Arc<str>) -> Self {
        Self {
            recipient: recipient.into(),
            subject,
            body,
        }
    }

    /// Recipient address.
    #[must_use]
    pub fn recipient(&self) -> &str {
        &self.recipient
    }

    /// Subject line.
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Plain text body.
    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }
}

/// Everything the caller supplies for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    /// Ordered, de-duplicated recipient addresses.
    pub recipients: Vec<String>,
    /// Subject line shared by all messages.
    pub subject: String,
    /// Body shared by all messages.
    pub body: String,
}

impl Batch {
    /// Creates a batch.
    #[must_use]
    pub fn new(
        recipients: impl IntoIterator<Item = impl Into<String>>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            recipients: recipients.into_iter().map(Into::into).collect(),
            subject: subject.into(),
            body: body.into(),
        }
    }

    /// Splits the batch into one job per recipient, in order.
    #[must_use]
    pub fn into_jobs(self) -> Vec<SendJob> {
        let subject: Arc<str> = Arc::from(self.subject);
        let body: Arc<str> = Arc::from(self.body);
        self.recipients
            .into_iter()
            .map(|recipient| SendJob::new(recipient, Arc::clone(&subject), Arc::clone(&body)))
            .collect()
    }
}
