//! # bulkmail-smtp
//!
//! An async SMTP submission client (RFC 5321) for sending mail through an
//! authenticated account.
//!
//! ## Features
//!
//! - **Type-state connection management**: a [`Client`] can only send once it
//!   is [`Authenticated`]
//! - **TLS support**: implicit TLS (port 465) and STARTTLS (port 587)
//! - **Authentication**: PLAIN, with LOGIN as fallback
//! - **Timeouts**: bounded connect and per-read/write waits
//!
//! ## Quick Start
//!
//! ```ignore
//! use bulkmail_smtp::{Address, Client, Timeouts};
//! use bulkmail_smtp::connection::connect;
//!
//! #[tokio::main]
//! async fn main() -> bulkmail_smtp::Result<()> {
//!     let stream = connect("smtp.office365.com", 587, Timeouts::default()).await?;
//!     let client = Client::greet(stream, "localhost").await?;
//!     let client = client.starttls("smtp.office365.com").await?;
//!     let mut client = client.authenticate("user@example.com", "password").await?;
//!
//!     let from = Address::new("user@example.com")?;
//!     let to = Address::new("recipient@example.com")?;
//!     client
//!         .send_mail(&from, &[to], b"Subject: Test\r\n\r\nHello, World!\r\n")
//!         .await?;
//!
//!     client.quit().await
//! }
//! ```
//!
//! ## Connection States
//!
//! ```text
//! ┌──────────┐  starttls()   ┌──────────┐
//! │ Greeted  │ ────────────→ │ Greeted  │ (TLS)
//! └──────────┘               └──────────┘
//!       │ authenticate()           │ authenticate()
//!       ↓                          ↓
//! ┌───────────────┐
//! │ Authenticated │ ── send_mail() ──→ Authenticated
//! └───────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod parser;
pub mod types;

pub use connection::{Authenticated, Client, Greeted, ServerInfo, SmtpConnection, Timeouts};
pub use error::{Error, Result};
pub use types::{Address, AuthMechanism, Extension, Reply, ReplyCode};
