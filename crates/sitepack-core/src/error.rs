//! Error type shared by every sitepack-core component.

use std::io;
use std::path::Path;

use thiserror::Error;

/// Main error type for sitepack operations.
#[derive(Error, Debug)]
pub enum PackError {
    /// Malformed requirement string. Always a caller bug; never retried.
    #[error("invalid requirement '{input}': {reason}")]
    InvalidRequirement { input: String, reason: String },

    /// Archive does not match the expected container/compression structure.
    #[error("format error: {0}")]
    Format(String),

    /// No matching artifact on the selected source.
    #[error("not found: {0}")]
    NotFound(String),

    /// Transport failure, timeout or non-success status.
    #[error("network error for {url}: {reason}")]
    Network { url: String, reason: String },

    /// Filesystem failure during extraction or linking.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Config file could not be (de)serialized.
    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PackError>;

impl PackError {
    pub fn invalid_requirement(input: &str, reason: impl Into<String>) -> Self {
        Self::InvalidRequirement {
            input: input.to_string(),
            reason: reason.into(),
        }
    }

    pub fn network(url: &str, reason: impl std::fmt::Display) -> Self {
        Self::Network {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Wrap an I/O error with the path it happened on.
    pub fn io_at(path: &Path, source: io::Error) -> Self {
        Self::Io(io::Error::new(
            source.kind(),
            format!("{}: {}", path.display(), source),
        ))
    }

    pub fn is_invalid_requirement(&self) -> bool {
        matches!(self, Self::InvalidRequirement { .. })
    }
}

impl From<zip::result::ZipError> for PackError {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(e) => Self::Io(e),
            other => Self::Format(other.to_string()),
        }
    }
}
