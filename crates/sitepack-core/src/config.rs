//! Config from `<app-root>/config.json` (JSON). Missing keys fall back to defaults.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{PackError, Result};

pub const DEFAULT_TERMUX_REPO: &str = "https://packages.termux.dev/apt/termux-main";
pub const DEFAULT_PYPI_INDEX_URL: &str = "https://pypi.org/simple";
pub const DEFAULT_PYPI_TRUSTED_HOST: &str = "pypi.org";
pub const DEFAULT_PYTHON_VERSION: &str = "3.11";

/// Which index link is assumed to be the latest release when no exact pin applies.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkOrder {
    /// First listed link wins.
    #[default]
    First,
    /// Last listed link wins (indexes that list oldest first, like PyPI simple).
    Last,
}

/// Installer configuration. Loaded once by the caller and passed down.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_termux_repo")]
    pub termux_repo: String,
    #[serde(default = "default_pypi_index_url")]
    pub pypi_index_url: String,
    #[serde(default = "default_pypi_trusted_host")]
    pub pypi_trusted_host: String,
    /// Termux architecture override; detected from the build target when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arch: Option<String>,
    /// Python version whose `site-packages` is looked up inside binary packages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub python_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pypi_link_order: Option<LinkOrder>,
    /// Keys this crate does not know about; written back untouched.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

fn default_termux_repo() -> String {
    DEFAULT_TERMUX_REPO.to_string()
}

fn default_pypi_index_url() -> String {
    DEFAULT_PYPI_INDEX_URL.to_string()
}

fn default_pypi_trusted_host() -> String {
    DEFAULT_PYPI_TRUSTED_HOST.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            termux_repo: default_termux_repo(),
            pypi_index_url: default_pypi_index_url(),
            pypi_trusted_host: default_pypi_trusted_host(),
            arch: None,
            python_version: None,
            pypi_link_order: None,
            extra: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Load config from `path`. Missing file = defaults; unreadable or invalid file =
    /// defaults plus a warning.
    pub fn load(path: &Path) -> Self {
        if !path.is_file() {
            return Self::default();
        }
        match Self::try_load(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!("failed to load {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Strict variant of [`Config::load`]: surfaces read and parse errors.
    pub fn try_load(path: &Path) -> Result<Self> {
        let s = fs::read_to_string(path).map_err(|e| PackError::io_at(path, e))?;
        Ok(serde_json::from_str(&s)?)
    }

    /// Write config as pretty JSON, creating the parent directory if needed.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| PackError::io_at(parent, e))?;
        }
        let body = serde_json::to_string_pretty(self)?;
        fs::write(path, body).map_err(|e| PackError::io_at(path, e))
    }

    pub fn arch(&self) -> String {
        self.arch.clone().unwrap_or_else(|| termux_arch().to_string())
    }

    pub fn python_version(&self) -> &str {
        self.python_version.as_deref().unwrap_or(DEFAULT_PYTHON_VERSION)
    }

    pub fn link_order(&self) -> LinkOrder {
        self.pypi_link_order.unwrap_or_default()
    }

    /// Look up any key as a string, recognized or not.
    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "termux_repo" => Some(self.termux_repo.clone()),
            "pypi_index_url" => Some(self.pypi_index_url.clone()),
            "pypi_trusted_host" => Some(self.pypi_trusted_host.clone()),
            "arch" => self.arch.clone(),
            "python_version" => self.python_version.clone(),
            "pypi_link_order" => self.pypi_link_order.map(|o| match o {
                LinkOrder::First => "first".to_string(),
                LinkOrder::Last => "last".to_string(),
            }),
            other => self.extra.get(other).map(|v| match v {
                serde_json::Value::String(s) => s.clone(),
                v => v.to_string(),
            }),
        }
    }

    /// Set a key from its string form. Unknown keys are stored as strings.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "termux_repo" => self.termux_repo = value.trim_end_matches('/').to_string(),
            "pypi_index_url" => self.pypi_index_url = value.trim_end_matches('/').to_string(),
            "pypi_trusted_host" => self.pypi_trusted_host = value.to_string(),
            "arch" => self.arch = Some(value.to_string()),
            "python_version" => self.python_version = Some(value.to_string()),
            "pypi_link_order" => {
                self.pypi_link_order = Some(match value.to_ascii_lowercase().as_str() {
                    "first" => LinkOrder::First,
                    "last" => LinkOrder::Last,
                    other => {
                        return Err(PackError::Format(format!(
                            "pypi_link_order must be 'first' or 'last', got '{other}'"
                        )))
                    }
                })
            }
            other => {
                self.extra.insert(
                    other.to_string(),
                    serde_json::Value::String(value.to_string()),
                );
            }
        }
        Ok(())
    }
}

/// Termux architecture name for the running build target.
pub fn termux_arch() -> &'static str {
    match std::env::consts::ARCH {
        "aarch64" => "aarch64",
        "arm" => "arm",
        "x86" => "i686",
        "x86_64" => "x86_64",
        // Termux has no other architectures; aarch64 is by far the most common device.
        _ => "aarch64",
    }
}
