//! The mail transport capability and its SMTP implementation.

use async_trait::async_trait;
use bulkmail_smtp::connection::{SmtpStream, connect, connect_tls};
use bulkmail_smtp::{Address, Authenticated, Client};
use thiserror::Error;
use tracing::debug;

use crate::account::{Account, Security};
use crate::job::SendJob;
use crate::message::compose_message;

/// Any failure to connect, authenticate or transmit.
///
/// The message is opaque to the engine; every transport error is retried the
/// same way.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct TransportError(pub String);

impl TransportError {
    /// Creates an error from anything printable.
    pub fn new(message: impl std::fmt::Display) -> Self {
        Self(message.to_string())
    }
}

impl From<bulkmail_smtp::Error> for TransportError {
    fn from(err: bulkmail_smtp::Error) -> Self {
        Self::new(err)
    }
}

/// Sends a single message for an account.
///
/// Implementations open their own session per call. They must be safe to call
/// from several workers at once.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Delivers `job` using `account`.
    async fn send_once(&self, account: &Account, job: &SendJob) -> Result<(), TransportError>;
}

/// [`Transport`] that submits each message over a fresh SMTP session.
#[derive(Debug, Clone)]
pub struct SmtpTransport {
    client_hostname: String,
}

impl Default for SmtpTransport {
    fn default() -> Self {
        Self {
            client_hostname: "localhost".to_string(),
        }
    }
}

impl SmtpTransport {
    /// Creates a transport that announces itself as `localhost` in EHLO.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the name sent with EHLO.
    #[must_use]
    pub fn with_client_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.client_hostname = hostname.into();
        self
    }

    async fn open(&self, account: &Account) -> bulkmail_smtp::Result<Client<Authenticated>> {
        let smtp = &account.smtp;
        let timeouts = smtp.timeouts();

        let stream: SmtpStream = match smtp.security {
            Security::Tls => connect_tls(&smtp.host, smtp.port, timeouts).await?,
            Security::StartTls | Security::None => {
                connect(&smtp.host, smtp.port, timeouts).await?
            }
        };
        debug!(host = %smtp.host, port = smtp.port, tls = stream.is_tls(), "connected");

        let mut client = Client::greet(stream, &self.client_hostname).await?;
        if smtp.security == Security::StartTls {
            client = client.starttls(&smtp.host).await?;
        }
        client.authenticate(account.username(), &account.password).await
    }
}

#[async_trait]
impl Transport for SmtpTransport {
    async fn send_once(&self, account: &Account, job: &SendJob) -> Result<(), TransportError> {
        let from = Address::new(account.email.as_str())?;
        let to = Address::new(job.recipient())?;
        let message = compose_message(&account.email, job, chrono::Local::now().fixed_offset());

        let mut client = self.open(account).await?;
        client.send_mail(&from, &[to], message.as_bytes()).await?;

        // The message is accepted at this point; a failed QUIT must not
        // trigger a resend.
        if let Err(err) = client.quit().await {
            debug!(recipient = job.recipient(), error = %err, "QUIT failed after delivery");
        }
        Ok(())
    }
}
