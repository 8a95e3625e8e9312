//! Export configuration.
//!
//! | Environment Variable | Description |
//! |---------------------|-------------|
//! | `TALLY_SYNC_WORK_DIR` | Parent directory for export work areas (default: system temp dir) |
//! | `TALLY_PREFIX_WEBURL` | Web URL prefix written to `consumer.json` |
//! | `TALLY_PREFIX_APIURL` | API URL prefix written to `consumer.json` |
//! | `TALLY_VERSION` | Version string written to `meta.json` |
//! | `TALLY_LEGACY_RULES` | Override file for `rules/default-rules.js` |
//! | `TALLY_ENTRY_NAMING` | `flat` or `relative` inner archive entry names |
//! | `TALLY_SIGNING_KEY` | PEM private key used to sign manifests |

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::archive::EntryNaming;

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Export configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SyncConfig {
    /// Parent directory of per-export work areas.
    pub work_dir: PathBuf,

    /// Web URL prefix used when no override is given.
    pub prefix_web_url: Option<String>,

    /// API URL prefix used when no override is given.
    pub prefix_api_url: Option<String>,

    /// Server version recorded in `meta.json`.
    pub version: String,

    /// Legacy rules file; the embedded copy is used when unset.
    pub legacy_rules_path: Option<PathBuf>,

    /// How files are named inside `consumer_export.zip`.
    pub entry_naming: EntryNaming,

    /// Private key used by the CLI to sign manifests.
    pub signing_key_path: Option<PathBuf>,
}

fn default_prefix_url() -> Option<String> {
    Some("localhost:8443/tally".to_string())
}

fn default_version() -> String {
    concat!(env!("CARGO_PKG_VERSION"), "-1").to_string()
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            work_dir: std::env::temp_dir(),
            prefix_web_url: default_prefix_url(),
            prefix_api_url: default_prefix_url(),
            version: default_version(),
            legacy_rules_path: None,
            entry_naming: EntryNaming::default(),
            signing_key_path: None,
        }
    }
}

impl SyncConfig {
    /// Create config from environment variables, on top of the defaults.
    pub fn from_env() -> Self {
        Self::default().merge_env()
    }

    /// Load a YAML config file. Missing keys take their defaults.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self, serde_yaml::Error> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw)
    }

    /// Apply any `TALLY_*` environment variables over this config.
    pub fn merge_env(self) -> Self {
        self.merge_vars(|key| std::env::var(key).ok())
    }

    fn merge_vars(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(dir) = var("TALLY_SYNC_WORK_DIR") {
            self.work_dir = PathBuf::from(dir);
        }
        if let Some(url) = var("TALLY_PREFIX_WEBURL") {
            self.prefix_web_url = Some(url);
        }
        if let Some(url) = var("TALLY_PREFIX_APIURL") {
            self.prefix_api_url = Some(url);
        }
        if let Some(version) = var("TALLY_VERSION") {
            self.version = version;
        }
        if let Some(path) = var("TALLY_LEGACY_RULES") {
            self.legacy_rules_path = Some(PathBuf::from(path));
        }
        if let Some(raw) = var("TALLY_ENTRY_NAMING") {
            match raw.parse() {
                Ok(naming) => self.entry_naming = naming,
                Err(reason) => warn!(
                    "Ignoring TALLY_ENTRY_NAMING, keeping {}: {reason}",
                    self.entry_naming
                ),
            }
        }
        if let Some(path) = var("TALLY_SIGNING_KEY") {
            self.signing_key_path = Some(PathBuf::from(path));
        }
        self
    }

    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = dir.into();
        self
    }

    pub fn with_prefix_urls(mut self, web: Option<String>, api: Option<String>) -> Self {
        self.prefix_web_url = web;
        self.prefix_api_url = api;
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_legacy_rules_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.legacy_rules_path = Some(path.into());
        self
    }

    pub fn with_entry_naming(mut self, naming: EntryNaming) -> Self {
        self.entry_naming = naming;
        self
    }
}
