//! Mock SMTP submission server.
//!
//! Serves any number of sessions on a local port, answering each command
//! from its configuration and recording what clients sent.
#![allow(dead_code)] // Not every test uses every knob

use std::fmt::Write;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
struct Config {
    capabilities: Vec<String>,
    auth_reply: String,
    rcpt_reply: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capabilities: vec!["mock.example.com".into(), "AUTH PLAIN LOGIN".into()],
            auth_reply: "235 2.7.0 Authentication successful".into(),
            rcpt_reply: "250 2.1.5 OK".into(),
        }
    }
}

/// Builder for [`MockSmtpServer`].
#[derive(Debug, Default)]
pub struct MockSmtpServerBuilder {
    config: Config,
}

impl MockSmtpServerBuilder {
    /// EHLO keywords after the greeting line.
    #[must_use]
    pub fn with_capabilities(mut self, capabilities: &[&str]) -> Self {
        self.config.capabilities = std::iter::once("mock.example.com")
            .chain(capabilities.iter().copied())
            .map(String::from)
            .collect();
        self
    }

    /// Final reply to AUTH, e.g. `535 5.7.8 bad credentials`.
    #[must_use]
    pub fn with_auth_reply(mut self, reply: &str) -> Self {
        self.config.auth_reply = reply.into();
        self
    }

    /// Reply to RCPT TO.
    #[must_use]
    pub fn with_rcpt_reply(mut self, reply: &str) -> Self {
        self.config.rcpt_reply = reply.into();
        self
    }

    /// Binds to an ephemeral port and starts serving.
    pub async fn build(self) -> MockSmtpServer {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let config = Arc::new(self.config);
        let commands = Arc::new(Mutex::new(Vec::new()));
        let messages = Arc::new(Mutex::new(Vec::new()));

        let task = tokio::spawn({
            let commands = Arc::clone(&commands);
            let messages = Arc::clone(&messages);
            async move {
                while let Ok((socket, _)) = listener.accept().await {
                    tokio::spawn(session(
                        socket,
                        Arc::clone(&config),
                        Arc::clone(&commands),
                        Arc::clone(&messages),
                    ));
                }
            }
        });

        MockSmtpServer {
            addr,
            commands,
            messages,
            task,
        }
    }
}

/// A running mock server; stops when dropped.
pub struct MockSmtpServer {
    addr: SocketAddr,
    commands: Arc<Mutex<Vec<String>>>,
    messages: Arc<Mutex<Vec<String>>>,
    task: JoinHandle<()>,
}

impl MockSmtpServer {
    /// Create a new builder for configuring the mock server.
    #[must_use]
    pub fn builder() -> MockSmtpServerBuilder {
        MockSmtpServerBuilder::default()
    }

    /// Port the server listens on.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Every command line received, across sessions.
    #[must_use]
    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    /// DATA contents accepted, with CRLF line endings and dot-stuffing undone.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

impl Drop for MockSmtpServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn session(
    socket: TcpStream,
    config: Arc<Config>,
    commands: Arc<Mutex<Vec<String>>>,
    messages: Arc<Mutex<Vec<String>>>,
) {
    let (read, mut write) = socket.into_split();
    let mut lines = BufReader::new(read).lines();

    if write.write_all(b"220 mock.example.com ESMTP\r\n").await.is_err() {
        return;
    }

    while let Ok(Some(line)) = lines.next_line().await {
        commands.lock().unwrap().push(line.clone());
        let verb = line
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_ascii_uppercase();

        let reply = match verb.as_str() {
            "EHLO" => ehlo_reply(&config.capabilities),
            "AUTH" if line.to_ascii_uppercase().starts_with("AUTH LOGIN") => {
                // Username and password challenges.
                let mut ok = true;
                for challenge in ["334 VXNlcm5hbWU6\r\n", "334 UGFzc3dvcmQ6\r\n"] {
                    ok = write.write_all(challenge.as_bytes()).await.is_ok()
                        && matches!(lines.next_line().await, Ok(Some(_)));
                    if !ok {
                        break;
                    }
                }
                if !ok {
                    return;
                }
                format!("{}\r\n", config.auth_reply)
            }
            "AUTH" => format!("{}\r\n", config.auth_reply),
            "MAIL" => "250 2.1.0 OK\r\n".to_string(),
            "RCPT" => format!("{}\r\n", config.rcpt_reply),
            "DATA" => {
                if write.write_all(b"354 End data with <CR><LF>.<CR><LF>\r\n").await.is_err() {
                    return;
                }
                let mut body = String::new();
                while let Ok(Some(data)) = lines.next_line().await {
                    if data == "." {
                        break;
                    }
                    body.push_str(data.strip_prefix('.').unwrap_or(&data));
                    body.push_str("\r\n");
                }
                messages.lock().unwrap().push(body);
                "250 2.0.0 Queued\r\n".to_string()
            }
            "QUIT" => {
                let _ = write.write_all(b"221 2.0.0 Bye\r\n").await;
                return;
            }
            _ => "502 5.5.2 Command not recognized\r\n".to_string(),
        };

        if write.write_all(reply.as_bytes()).await.is_err() {
            return;
        }
    }
}

fn ehlo_reply(capabilities: &[String]) -> String {
    let mut reply = String::new();
    let last = capabilities.len().saturating_sub(1);
    for (i, capability) in capabilities.iter().enumerate() {
        let sep = if i == last { ' ' } else { '-' };
        let _ = write!(reply, "250{sep}{capability}\r\n");
    }
    reply
}
