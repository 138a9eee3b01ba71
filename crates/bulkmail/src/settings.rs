//! Settings resolution: file, then environment, then flags.

use std::path::PathBuf;

use anyhow::{Context, Result};
use bulkmail_core::{Account, Settings};

use crate::cli::Args;

/// `<config dir>/bulkmail/config.json`.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("bulkmail")
        .join("config.json")
}

/// Loads the settings file and applies command-line overrides.
///
/// An explicit `--config` must exist; the default location is optional.
pub fn resolve(args: &Args) -> Result<Settings> {
    let settings = match &args.config {
        Some(path) => Settings::load(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => {
            let path = default_config_path();
            if path.exists() {
                Settings::load(&path)
                    .with_context(|| format!("Failed to load settings from {}", path.display()))?
            } else {
                tracing::debug!(path = %path.display(), "no settings file, using defaults");
                Settings::default()
            }
        }
    };
    Ok(apply_overrides(settings, args))
}

/// Flags win over the settings file.
pub fn apply_overrides(mut settings: Settings, args: &Args) -> Settings {
    if let Some(from) = &args.from {
        if settings.account.email.is_empty() {
            let password = std::mem::take(&mut settings.account.password);
            settings.account = Account::with_email(from);
            settings.account.password = password;
        } else {
            settings.account.email.clone_from(from);
        }
    }
    if let Some(password) = &args.password {
        settings.account.password.clone_from(password);
    }
    if let Some(workers) = args.workers {
        settings.dispatch.workers = workers;
    }
    if let Some(secs) = args.min_interval {
        settings.dispatch.min_interval_secs = secs;
    }
    if let Some(attempts) = args.max_attempts {
        settings.dispatch.retry.max_attempts = attempts;
    }
    settings
}
