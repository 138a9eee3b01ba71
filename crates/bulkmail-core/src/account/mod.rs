//! Sending account configuration.

mod model;

pub use model::{Account, Security, SmtpConfig};
