//! Core library for sitepack: requirement parsing, version checks, Termux deb and
//! PyPI sdist fetching, the shared extraction cache and per-project site linking.
//! Used by the CLI binary; embeddable in an app that runs Python projects.

pub mod config;
pub mod deb;
pub mod error;
pub mod http_client;
pub mod install;
pub mod layout;
pub mod pypi;
pub mod requirement;
pub mod sdist;
pub mod search_path;
pub mod site;
pub mod termux;
pub mod utils;
pub mod version;

#[cfg(test)]
pub(crate) mod testing;

// Re-export main API for CLI
pub use config::{Config, LinkOrder};
pub use error::{PackError, Result};
pub use http_client::{HttpClient, Transport};
pub use install::{InstallState, Installer, Source};
pub use layout::{default_project_name, Layout};
pub use requirement::{Operator, Requirement};
pub use site::{installed_version, materialize_into_project};
pub use version::satisfies;
