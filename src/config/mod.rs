//! Configuration management.
//!
//! Settings live in `~/.reqlist/config.json` (override with `RQL_CONFIG`).
//! Every field is optional in the file; values resolve with the priority
//! CLI flag > environment variable > config file > default.
//!
//! The write credential is not part of [`Settings`]: it is
//! supplied per invocation and never persisted.

mod listing;

pub use listing::{Listing, listing_path, read_listing, write_listing};

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::ops::DEFAULT_MAX_RETRIES;
use crate::remote::{Credential, GistEndpoint};

pub const DEFAULT_FILE_NAME: &str = "request_list.txt";
pub const DEFAULT_API_BASE: &str = "https://api.github.com";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Persisted settings. Field names match the JSON file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gist_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue_path: Option<PathBuf>,
}

impl Settings {
    /// Overlay `update` on `self`: set fields in `update` win.
    #[must_use]
    pub fn merged_with(self, update: Self) -> Self {
        Self {
            owner: update.owner.or(self.owner),
            gist_id: update.gist_id.or(self.gist_id),
            file_name: update.file_name.or(self.file_name),
            raw_url: update.raw_url.or(self.raw_url),
            api_base: update.api_base.or(self.api_base),
            max_retries: update.max_retries.or(self.max_retries),
            timeout_secs: update.timeout_secs.or(self.timeout_secs),
            queue_path: update.queue_path.or(self.queue_path),
        }
    }
}

/// Values given on the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub gist_id: Option<String>,
    pub queue_path: Option<PathBuf>,
}

/// Fully resolved runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    /// `None` when no gist is configured; only the local queue is usable.
    pub endpoint: Option<GistEndpoint>,
    pub queue_path: PathBuf,
    pub max_retries: u32,
    pub timeout: Duration,
}

/// The `~/.reqlist` directory.
#[must_use]
pub fn base_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".reqlist"))
}

/// Config file path, honouring `RQL_CONFIG`.
///
/// # Errors
///
/// Returns `Error::Config` if the home directory cannot be determined.
pub fn config_path() -> Result<PathBuf> {
    if let Some(path) = env_var("RQL_CONFIG") {
        return Ok(PathBuf::from(path));
    }
    base_dir()
        .map(|dir| dir.join("config.json"))
        .ok_or_else(|| Error::Config("Could not determine home directory".into()))
}

/// Load settings from `path`; a missing file yields defaults.
///
/// # Errors
///
/// Returns `Error::Config` if the file exists but cannot be read or parsed.
pub fn load_config_from(path: &Path) -> Result<Settings> {
    if !path.exists() {
        return Ok(Settings::default());
    }

    let content = fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read config file: {e}")))?;

    serde_json::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse config file: {e}")))
}

/// Save settings to `path`, creating parent directories.
///
/// # Errors
///
/// Returns `Error::Config` if the file cannot be written.
pub fn save_config_to(path: &Path, settings: &Settings) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| Error::Config(format!("Failed to create config directory: {e}")))?;
    }

    let content = serde_json::to_string_pretty(settings)
        .map_err(|e| Error::Config(format!("Failed to serialize config: {e}")))?;

    fs::write(path, content).map_err(|e| Error::Config(format!("Failed to write config file: {e}")))
}

/// Load settings from the default location.
///
/// # Errors
///
/// See [`load_config_from`].
pub fn load_config() -> Result<Settings> {
    load_config_from(&config_path()?)
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Resolve settings against the process environment.
///
/// # Errors
///
/// See [`resolve_with`].
pub fn resolve(settings: &Settings, overrides: &Overrides) -> Result<Resolved> {
    resolve_with(settings, overrides, env_var)
}

/// Resolve settings with an explicit environment lookup.
///
/// # Errors
///
/// Returns `Error::Config` if a gist is configured but no read URL can be
/// built (neither `raw_url` nor `owner`), or if no home directory exists for
/// the default queue path.
pub fn resolve_with(
    settings: &Settings,
    overrides: &Overrides,
    env: impl Fn(&str) -> Option<String>,
) -> Result<Resolved> {
    let gist_id = overrides
        .gist_id
        .clone()
        .or_else(|| env("RQL_GIST_ID"))
        .or_else(|| settings.gist_id.clone());

    let endpoint = match gist_id {
        Some(gist_id) => {
            let file_name = env("RQL_FILE_NAME")
                .or_else(|| settings.file_name.clone())
                .unwrap_or_else(|| DEFAULT_FILE_NAME.to_string());
            let api_base = env("RQL_API_BASE")
                .or_else(|| settings.api_base.clone())
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
            let raw_url = env("RQL_RAW_URL").or_else(|| settings.raw_url.clone());
            let owner = env("RQL_OWNER").or_else(|| settings.owner.clone());

            let endpoint = match (raw_url, owner) {
                (Some(raw_url), owner) => {
                    GistEndpoint::new(owner.as_deref().unwrap_or_default(), &gist_id, &file_name, &api_base)
                        .with_raw_url(raw_url)
                }
                (None, Some(owner)) => GistEndpoint::new(&owner, &gist_id, &file_name, &api_base),
                (None, None) => {
                    return Err(Error::Config(
                        "gist is set but neither raw_url nor owner is configured".to_string(),
                    ));
                }
            };
            Some(endpoint)
        }
        None => None,
    };

    let queue_path = match overrides
        .queue_path
        .clone()
        .or_else(|| env("RQL_QUEUE").map(PathBuf::from))
        .or_else(|| settings.queue_path.clone())
    {
        Some(path) => path,
        None => base_dir()
            .map(|dir| dir.join("queue.json"))
            .ok_or_else(|| Error::Config("Could not determine home directory".into()))?,
    };

    Ok(Resolved {
        endpoint,
        queue_path,
        max_retries: settings.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
        timeout: Duration::from_secs(settings.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
    })
}

/// Resolve the write credential: `--token` / `RQL_TOKEN`, then `GITHUB_TOKEN`.
///
/// # Errors
///
/// Returns `Error::Config` if no credential is available.
pub fn require_credential(explicit: Option<&str>) -> Result<Credential> {
    explicit
        .map(ToString::to_string)
        .filter(|t| !t.trim().is_empty())
        .or_else(|| env_var("GITHUB_TOKEN"))
        .map(Credential::new)
        .ok_or_else(|| Error::Config("no token given for a remote write".to_string()))
}
