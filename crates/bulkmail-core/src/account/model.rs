//! Account model types.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Security/encryption mode for the submission connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Security {
    /// No encryption (not recommended).
    None,
    /// Implicit TLS (connect directly with TLS).
    Tls,
    /// STARTTLS upgrade after plaintext connect.
    #[default]
    StartTls,
}

impl Security {
    /// Default submission port for the security mode.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::None => 25,
            Self::StartTls => 587,
            Self::Tls => 465,
        }
    }
}

/// SMTP server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmtpConfig {
    /// Server hostname.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Security mode.
    pub security: Security,
    /// Login name, when it differs from the account address.
    pub username: Option<String>,
    /// Limit on connecting and on each server reply, in seconds.
    pub timeout_secs: u64,
}

impl Default for SmtpConfig {
    /// Office 365 submission endpoint.
    fn default() -> Self {
        Self {
            host: "smtp.office365.com".to_string(),
            port: 587,
            security: Security::StartTls,
            username: None,
            timeout_secs: 30,
        }
    }
}

impl SmtpConfig {
    /// Connect and I/O limits for the SMTP client.
    #[must_use]
    pub const fn timeouts(&self) -> bulkmail_smtp::Timeouts {
        bulkmail_smtp::Timeouts::uniform(Duration::from_secs(self.timeout_secs))
    }
}

/// The single sending identity of a dispatch run.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Sender address, used in `From:` and `MAIL FROM`.
    pub email: String,
    /// Password or app password.
    #[serde(default, skip_serializing)]
    pub password: String,
    /// SMTP configuration.
    #[serde(default)]
    pub smtp: SmtpConfig,
}

impl std::fmt::Debug for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Account")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("smtp", &self.smtp)
            .finish()
    }
}

impl Account {
    /// Create an account with explicit credentials and the default server.
    #[must_use]
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            smtp: SmtpConfig::default(),
        }
    }

    /// Create account with server settings for well-known providers.
    ///
    /// Unknown domains keep the default (Office 365) endpoint, which also
    /// serves custom domains hosted there.
    #[must_use]
    pub fn with_email(email: &str) -> Self {
        let mut account = Self {
            email: email.to_string(),
            ..Default::default()
        };

        if let Some(domain) = email.rsplit_once('@').map(|(_, d)| d.to_lowercase()) {
            let preset = match domain.as_str() {
                "gmail.com" | "googlemail.com" => Some(("smtp.gmail.com", Security::Tls)),
                "outlook.com" | "hotmail.com" | "live.com" => {
                    Some(("smtp.office365.com", Security::StartTls))
                }
                "yahoo.com" | "ymail.com" => Some(("smtp.mail.yahoo.com", Security::Tls)),
                "icloud.com" | "me.com" | "mac.com" => {
                    Some(("smtp.mail.me.com", Security::StartTls))
                }
                _ => None,
            };
            if let Some((host, security)) = preset {
                account.smtp.host = host.to_string();
                account.smtp.security = security;
                account.smtp.port = security.default_port();
            }
        }

        account
    }

    /// Login name for SMTP authentication.
    #[must_use]
    pub fn username(&self) -> &str {
        self.smtp.username.as_deref().unwrap_or(&self.email)
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    mod security_tests {
        use super::*;

        #[test]
        fn default_is_starttls() {
            assert_eq!(Security::default(), Security::StartTls);
        }

        #[test]
        fn default_ports() {
            assert_eq!(Security::Tls.default_port(), 465);
            assert_eq!(Security::StartTls.default_port(), 587);
            assert_eq!(Security::None.default_port(), 25);
        }

        #[test]
        fn serde_names() {
            assert_eq!(serde_json::to_string(&Security::StartTls).unwrap(), "\"starttls\"");
            let parsed: Security = serde_json::from_str("\"tls\"").unwrap();
            assert_eq!(parsed, Security::Tls);
        }
    }

    mod account_tests {
        use super::*;

        #[test]
        fn default_server_is_office365() {
            let account = Account::new("me@contoso.com", "pw");
            assert_eq!(account.smtp.host, "smtp.office365.com");
            assert_eq!(account.smtp.port, 587);
            assert_eq!(account.smtp.security, Security::StartTls);
            assert_eq!(account.smtp.timeouts().connect.as_secs(), 30);
        }

        #[test]
        fn with_email_gmail() {
            let account = Account::with_email("user@gmail.com");
            assert_eq!(account.smtp.host, "smtp.gmail.com");
            assert_eq!(account.smtp.port, 465);
            assert_eq!(account.smtp.security, Security::Tls);
        }

        #[test]
        fn with_email_icloud() {
            let account = Account::with_email("user@ME.com");
            assert_eq!(account.smtp.host, "smtp.mail.me.com");
            assert_eq!(account.smtp.port, 587);
        }

        #[test]
        fn with_email_unknown_domain_keeps_default() {
            let account = Account::with_email("user@example.org");
            assert_eq!(account.smtp, SmtpConfig::default());
        }

        #[test]
        fn username_defaults_to_email() {
            let mut account = Account::new("me@example.com", "pw");
            assert_eq!(account.username(), "me@example.com");
            account.smtp.username = Some("login-name".into());
            assert_eq!(account.username(), "login-name");
        }

        #[test]
        fn debug_hides_password() {
            let account = Account::new("me@example.com", "hunter2");
            let printed = format!("{account:?}");
            assert!(printed.contains("me@example.com"));
            assert!(!printed.contains("hunter2"));
        }

        #[test]
        fn password_is_never_serialized() {
            let account = Account::new("me@example.com", "hunter2");
            let json = serde_json::to_string(&account).unwrap();
            assert!(!json.contains("hunter2"));
        }

        #[test]
        fn deserializes_with_defaults() {
            let account: Account =
                serde_json::from_str(r#"{"email":"me@example.com","smtp":{"port":2525}}"#).unwrap();
            assert_eq!(account.smtp.port, 2525);
            assert_eq!(account.smtp.host, "smtp.office365.com");
            assert!(account.password.is_empty());
        }
    }
}
