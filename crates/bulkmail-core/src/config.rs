//! Persistent settings: the sending account and dispatch tuning.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::account::Account;
use crate::dispatch::DispatchConfig;
use crate::error::{Error, Result};

/// Contents of the settings file.
///
/// ```json
/// {
///   "account": { "email": "me@contoso.com", "smtp": { "host": "smtp.office365.com" } },
///   "dispatch": { "workers": 2, "min_interval_secs": 2 }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Sending account. The password is normally supplied from the environment.
    pub account: Account,
    /// Dispatch tuning.
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

impl Settings {
    /// Parses settings from JSON text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid settings JSON.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Loads settings from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, unreadable or invalid.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::Config(format!(
                "settings file {} not found",
                path.display()
            )));
        }
        let text = std::fs::read_to_string(path)?;
        let settings = Self::from_json(&text)?;
        tracing::debug!(path = %path.display(), "loaded settings");
        Ok(settings)
    }
}
