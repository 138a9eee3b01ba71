//! Low-level SMTP stream handling.

use crate::error::{Error, Result};
use rustls::pki_types::ServerName;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio_rustls::{
    TlsConnector,
    rustls::{ClientConfig, RootCertStore},
};
use tracing::trace;

/// Longest reply line accepted, terminator included.
pub const MAX_REPLY_LINE: u64 = 4096;

/// Connection timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Limit on TCP connect plus TLS handshake.
    pub connect: Duration,
    /// Limit on any single read or write.
    pub io: Duration,
}

impl Timeouts {
    /// Uses the same limit for connecting and for I/O.
    #[must_use]
    pub const fn uniform(limit: Duration) -> Self {
        Self {
            connect: limit,
            io: limit,
        }
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self::uniform(Duration::from_secs(30))
    }
}

/// SMTP stream (TCP or TLS).
#[derive(Debug)]
pub struct SmtpStream {
    inner: Inner,
    io_timeout: Duration,
}

#[derive(Debug)]
enum Inner {
    Tcp(BufReader<TcpStream>),
    Tls(Box<BufReader<tokio_rustls::client::TlsStream<TcpStream>>>),
}

impl SmtpStream {
    /// Returns true once the stream is encrypted.
    #[must_use]
    pub const fn is_tls(&self) -> bool {
        matches!(self.inner, Inner::Tls(_))
    }

    /// Reads one line, stripping the line terminator.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] on EOF, [`Error::Timeout`] if the
    /// server stays silent past the I/O timeout, and [`Error::Protocol`] for a
    /// line longer than [`MAX_REPLY_LINE`].
    pub async fn read_line(&mut self) -> Result<String> {
        let mut line = String::new();
        let read = match &mut self.inner {
            Inner::Tcp(reader) => {
                let mut limited = reader.take(MAX_REPLY_LINE);
                with_timeout(self.io_timeout, limited.read_line(&mut line)).await?
            }
            Inner::Tls(reader) => {
                let mut limited = reader.as_mut().take(MAX_REPLY_LINE);
                with_timeout(self.io_timeout, limited.read_line(&mut line)).await?
            }
        };
        if read == 0 {
            return Err(Error::ConnectionClosed);
        }
        if !line.ends_with('\n') && read as u64 >= MAX_REPLY_LINE {
            return Err(Error::Protocol(format!(
                "Reply line exceeds {MAX_REPLY_LINE} bytes"
            )));
        }
        let line = line.trim_end_matches(['\r', '\n']).to_string();
        trace!(line = %line, "S:");
        Ok(line)
    }

    /// Writes and flushes data.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails or times out.
    pub async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        let io_timeout = self.io_timeout;
        match &mut self.inner {
            Inner::Tcp(reader) => {
                let stream = reader.get_mut();
                with_timeout(io_timeout, async {
                    stream.write_all(data).await?;
                    stream.flush().await
                })
                .await
            }
            Inner::Tls(reader) => {
                let stream = reader.get_mut();
                with_timeout(io_timeout, async {
                    stream.write_all(data).await?;
                    stream.flush().await
                })
                .await
            }
        }
    }

    /// Upgrades a TCP stream to TLS.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream is already encrypted or the handshake fails.
    pub async fn upgrade_to_tls(self, hostname: &str) -> Result<Self> {
        let Inner::Tcp(reader) = self.inner else {
            return Err(Error::Protocol("Already using TLS".into()));
        };
        if !reader.buffer().is_empty() {
            // Anything buffered before the handshake was injected in plaintext.
            return Err(Error::Protocol("Unexpected data before TLS handshake".into()));
        }

        let tls_stream = tls_handshake(hostname, reader.into_inner(), self.io_timeout).await?;
        Ok(Self {
            inner: Inner::Tls(Box::new(BufReader::new(tls_stream))),
            io_timeout: self.io_timeout,
        })
    }
}

async fn with_timeout<T>(
    limit: Duration,
    fut: impl Future<Output = std::io::Result<T>>,
) -> Result<T> {
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| Error::Timeout(limit))?
        .map_err(Error::from)
}

/// Connects to an SMTP server over plain TCP.
///
/// # Errors
///
/// Returns an error if the connection fails or times out.
pub async fn connect(hostname: &str, port: u16, timeouts: Timeouts) -> Result<SmtpStream> {
    let stream = with_timeout(timeouts.connect, TcpStream::connect((hostname, port))).await?;
    Ok(SmtpStream {
        inner: Inner::Tcp(BufReader::new(stream)),
        io_timeout: timeouts.io,
    })
}

/// Connects to an SMTP server over TLS (implicit TLS on port 465).
///
/// # Errors
///
/// Returns an error if the connection or TLS handshake fails or times out.
pub async fn connect_tls(hostname: &str, port: u16, timeouts: Timeouts) -> Result<SmtpStream> {
    let tcp_stream = with_timeout(timeouts.connect, TcpStream::connect((hostname, port))).await?;
    let tls_stream = tls_handshake(hostname, tcp_stream, timeouts.connect).await?;
    Ok(SmtpStream {
        inner: Inner::Tls(Box::new(BufReader::new(tls_stream))),
        io_timeout: timeouts.io,
    })
}

async fn tls_handshake(
    hostname: &str,
    tcp_stream: TcpStream,
    limit: Duration,
) -> Result<tokio_rustls::client::TlsStream<TcpStream>> {
    let server_name = ServerName::try_from(hostname.to_string())?;
    with_timeout(limit, create_tls_connector().connect(server_name, tcp_stream)).await
}

/// Creates a TLS connector trusting the bundled web PKI roots.
fn create_tls_connector() -> TlsConnector {
    let root_store = RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };

    let config = ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    TlsConnector::from(Arc::new(config))
}
