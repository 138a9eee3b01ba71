//! Envelope address type.

use crate::error::{Error, Result};

/// Email address as used in `MAIL FROM` and `RCPT TO`.
///
/// Only the envelope-level shape is checked: one `@`, non-empty local and
/// domain parts, and no characters that would break out of the `<...>`
/// command argument.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address(String);

impl Address {
    /// Creates a new address from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid.
    pub fn new(addr: impl Into<String>) -> Result<Self> {
        let addr = addr.into();
        Self::validate(&addr)?;
        Ok(Self(addr))
    }

    /// Returns the address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the part after the `@`.
    #[must_use]
    pub fn domain(&self) -> &str {
        self.0.rsplit_once('@').map_or("", |(_, domain)| domain)
    }

    fn validate(addr: &str) -> Result<()> {
        if addr.is_empty() {
            return Err(Error::InvalidAddress("Address cannot be empty".into()));
        }

        if addr
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || matches!(c, '<' | '>'))
        {
            return Err(Error::InvalidAddress(format!(
                "Address contains forbidden characters: {addr:?}"
            )));
        }

        let Some((local, domain)) = addr.split_once('@') else {
            return Err(Error::InvalidAddress(format!("Address must contain @: {addr}")));
        };

        if domain.contains('@') {
            return Err(Error::InvalidAddress(format!(
                "Address must have exactly one @: {addr}"
            )));
        }

        if local.is_empty() || domain.is_empty() {
            return Err(Error::InvalidAddress(format!(
                "Local and domain parts cannot be empty: {addr}"
            )));
        }

        Ok(())
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_valid_address() {
        let addr = Address::new("user@example.com").unwrap();
        assert_eq!(addr.as_str(), "user@example.com");
        assert_eq!(addr.domain(), "example.com");
    }

    #[test]
    fn test_invalid_address_no_at() {
        assert!(Address::new("userexample.com").is_err());
    }

    #[test]
    fn test_invalid_address_empty() {
        assert!(Address::new("").is_err());
    }

    #[test]
    fn test_invalid_address_empty_parts() {
        assert!(Address::new("@example.com").is_err());
        assert!(Address::new("user@").is_err());
    }

    #[test]
    fn test_invalid_address_double_at() {
        assert!(Address::new("a@b@example.com").is_err());
    }

    #[test]
    fn test_rejects_command_injection() {
        assert!(Address::new("user@example.com>\r\nRCPT TO:<x@y.z").is_err());
        assert!(Address::new("user name@example.com").is_err());
    }

    #[test]
    fn test_from_str() {
        let addr: Address = "ops@example.org".parse().unwrap();
        assert_eq!(addr.to_string(), "ops@example.org");
    }

    proptest! {
        #[test]
        fn simple_addresses_round_trip(local in "[a-z0-9._]{1,16}", domain in "[a-z0-9]{1,12}\\.[a-z]{2,4}") {
            let raw = format!("{local}@{domain}");
            let addr = Address::new(raw.clone()).unwrap();
            prop_assert_eq!(addr.as_str(), raw.as_str());
            prop_assert_eq!(addr.domain(), domain.as_str());
        }

        #[test]
        fn whitespace_is_never_accepted(prefix in "[a-z]{1,8}", suffix in "[a-z]{1,8}") {
            let raw = format!("{prefix} {suffix}@example.com");
            prop_assert!(Address::new(raw).is_err());
        }
    }
}
