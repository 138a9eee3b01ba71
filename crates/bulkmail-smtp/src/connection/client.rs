//! Type-state SMTP submission client.

use super::{ServerInfo, SmtpStream};
use crate::command::Command;
use crate::error::{Error, Result};
use crate::parser::ReplyParser;
use crate::types::{Address, AuthMechanism, Extension, Reply, ReplyCode};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use std::marker::PhantomData;
use tracing::debug;

/// Type-state marker: greeting read and EHLO accepted.
#[derive(Debug)]
pub struct Greeted;

/// Type-state marker: authentication succeeded.
#[derive(Debug)]
pub struct Authenticated;

/// SMTP client with type-state pattern.
#[derive(Debug)]
pub struct Client<State> {
    stream: SmtpStream,
    server_info: ServerInfo,
    client_hostname: String,
    _state: PhantomData<State>,
}

/// Connection trait for all states.
pub trait SmtpConnection {
    /// Returns the server information.
    fn server_info(&self) -> &ServerInfo;
}

impl<S> SmtpConnection for Client<S> {
    fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }
}

impl Client<Greeted> {
    /// Reads the server greeting and introduces the client with EHLO.
    ///
    /// # Errors
    ///
    /// Returns an error if the server does not greet with 220 or refuses EHLO.
    pub async fn greet(mut stream: SmtpStream, client_hostname: &str) -> Result<Self> {
        let greeting = read_reply(&mut stream)
            .await?
            .expect_code(ReplyCode::SERVICE_READY)?;

        let hostname = greeting
            .lines
            .first()
            .and_then(|line| line.split_whitespace().next())
            .unwrap_or("unknown")
            .to_string();
        debug!(server = %hostname, "SMTP greeting received");

        let mut client = Self {
            stream,
            server_info: ServerInfo {
                hostname,
                extensions: Vec::new(),
            },
            client_hostname: client_hostname.to_string(),
            _state: PhantomData,
        };
        client.ehlo().await?;
        Ok(client)
    }

    async fn ehlo(&mut self) -> Result<()> {
        let ehlo = Command::Ehlo {
            hostname: self.client_hostname.clone(),
        };
        let reply = self.send_command(&ehlo).await?.expect_success()?;

        // First line is the server's greeting, the rest are keywords.
        self.server_info.extensions = reply
            .lines
            .iter()
            .skip(1)
            .map(|line| Extension::parse(line))
            .collect();
        Ok(())
    }

    /// Upgrades the connection to TLS and repeats EHLO over the secure channel.
    ///
    /// # Errors
    ///
    /// Returns an error if STARTTLS is not advertised or the upgrade fails.
    pub async fn starttls(mut self, tls_hostname: &str) -> Result<Self> {
        if !self.server_info.supports_starttls() {
            return Err(Error::NotSupported("STARTTLS".into()));
        }

        self.send_command(&Command::StartTls)
            .await?
            .expect_code(ReplyCode::SERVICE_READY)?;

        self.stream = self.stream.upgrade_to_tls(tls_hostname).await?;
        debug!(server = %tls_hostname, "TLS established");

        // Capabilities learned in plaintext must be discarded.
        self.server_info.extensions.clear();
        self.ehlo().await?;
        Ok(self)
    }

    /// Authenticates with the best mechanism the server offers.
    ///
    /// PLAIN is preferred; LOGIN is used when it is the only supported
    /// option. A server that advertises nothing is tried with PLAIN.
    ///
    /// # Errors
    ///
    /// Returns an error if no usable mechanism exists or the server rejects
    /// the credentials.
    pub async fn authenticate(
        self,
        username: &str,
        password: &str,
    ) -> Result<Client<Authenticated>> {
        let offered = self.server_info.auth_mechanisms();
        if offered.is_empty() || offered.contains(&AuthMechanism::Plain) {
            self.auth_plain(username, password).await
        } else if offered.contains(&AuthMechanism::Login) {
            self.auth_login(username, password).await
        } else {
            Err(Error::NotSupported("AUTH PLAIN or AUTH LOGIN".into()))
        }
    }

    /// Authenticates using PLAIN mechanism.
    ///
    /// # Errors
    ///
    /// Returns an error if authentication fails.
    pub async fn auth_plain(
        mut self,
        username: &str,
        password: &str,
    ) -> Result<Client<Authenticated>> {
        let credentials = format!("\0{username}\0{password}");
        let cmd = Command::Auth {
            mechanism: AuthMechanism::Plain,
            initial_response: Some(BASE64.encode(credentials.as_bytes())),
        };

        self.send_command(&cmd)
            .await?
            .expect_code(ReplyCode::AUTH_SUCCEEDED)?;
        debug!(mechanism = "PLAIN", "authenticated");
        Ok(self.into_state())
    }

    /// Authenticates using the LOGIN challenge/response exchange.
    ///
    /// # Errors
    ///
    /// Returns an error if authentication fails.
    pub async fn auth_login(
        mut self,
        username: &str,
        password: &str,
    ) -> Result<Client<Authenticated>> {
        let cmd = Command::Auth {
            mechanism: AuthMechanism::Login,
            initial_response: None,
        };
        self.send_command(&cmd)
            .await?
            .expect_code(ReplyCode::AUTH_CONTINUE)?;

        self.send_secret(username)
            .await?
            .expect_code(ReplyCode::AUTH_CONTINUE)?;
        self.send_secret(password)
            .await?
            .expect_code(ReplyCode::AUTH_SUCCEEDED)?;
        debug!(mechanism = "LOGIN", "authenticated");
        Ok(self.into_state())
    }

    async fn send_secret(&mut self, secret: &str) -> Result<Reply> {
        let mut line = BASE64.encode(secret.as_bytes()).into_bytes();
        line.extend_from_slice(b"\r\n");
        self.stream.write_all(&line).await?;
        read_reply(&mut self.stream).await
    }
}

impl Client<Authenticated> {
    /// Runs one complete mail transaction: MAIL FROM, RCPT TO for each
    /// recipient, DATA and the message itself.
    ///
    /// The message is normalized to CRLF line endings and dot-stuffed. The
    /// client stays authenticated afterwards and can send again.
    ///
    /// # Errors
    ///
    /// Returns an error if the message exceeds the server's SIZE limit or any
    /// step of the transaction is rejected.
    pub async fn send_mail(
        &mut self,
        from: &Address,
        to: &[Address],
        message: &[u8],
    ) -> Result<()> {
        if to.is_empty() {
            return Err(Error::InvalidAddress("No recipients specified".into()));
        }

        let data = encode_data(message);
        let limit = self.server_info.max_message_size();
        if let Some(limit) = limit.filter(|&limit| limit > 0 && data.len() > limit) {
            return Err(Error::MessageTooLarge {
                size: data.len(),
                limit,
            });
        }

        let mail_from = Command::MailFrom {
            from: from.clone(),
            size: limit.map(|_| data.len()),
        };
        self.send_command(&mail_from).await?.expect_success()?;

        for rcpt in to {
            self.send_command(&Command::RcptTo { to: rcpt.clone() })
                .await?
                .expect_success()?;
        }

        self.send_command(&Command::Data)
            .await?
            .expect_code(ReplyCode::START_DATA)?;

        self.stream.write_all(&data).await?;
        let reply = read_reply(&mut self.stream).await?.expect_success()?;
        debug!(recipients = to.len(), reply = %reply.text(), "message accepted");
        Ok(())
    }
}

// Common implementation for all states
impl<S> Client<S> {
    fn into_state<T>(self) -> Client<T> {
        Client {
            stream: self.stream,
            server_info: self.server_info,
            client_hostname: self.client_hostname,
            _state: PhantomData,
        }
    }

    async fn send_command(&mut self, cmd: &Command) -> Result<Reply> {
        debug!(command = %cmd.redacted(), "C:");
        self.stream.write_all(&cmd.to_bytes()).await?;
        read_reply(&mut self.stream).await
    }

    /// Sends QUIT and closes the connection (available in any state).
    ///
    /// # Errors
    ///
    /// Returns an error if the QUIT command fails.
    pub async fn quit(mut self) -> Result<()> {
        let reply = self.send_command(&Command::Quit).await?;
        if !reply.is_success() {
            return Err(Error::rejected(reply.code.as_u16(), reply.text()));
        }
        Ok(())
    }
}

async fn read_reply(stream: &mut SmtpStream) -> Result<Reply> {
    let mut parser = ReplyParser::new();
    loop {
        let line = stream.read_line().await?;
        if let Some(reply) = parser.push_line(&line)? {
            return Ok(reply);
        }
    }
}

/// Prepares message content for the DATA phase.
///
/// Line endings are normalized to CRLF, lines starting with `.` get an extra
/// leading dot, and the terminating `.` line is appended.
#[must_use]
pub fn encode_data(message: &[u8]) -> Vec<u8> {
    let body = message.strip_suffix(b"\n").unwrap_or(message);
    let body = body.strip_suffix(b"\r").unwrap_or(body);

    let mut out = Vec::with_capacity(message.len() + message.len() / 32 + 5);
    if !body.is_empty() {
        for line in body.split(|&b| b == b'\n') {
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            if line.first() == Some(&b'.') {
                out.push(b'.');
            }
            out.extend_from_slice(line);
            out.extend_from_slice(b"\r\n");
        }
    }
    out.extend_from_slice(b".\r\n");
    out
}
