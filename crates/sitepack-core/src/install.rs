//! Install orchestration: satisfaction check, source selection, fetch, link.

use std::fmt;
use std::str::FromStr;

use tracing::{debug, error, info};

use crate::config::Config;
use crate::error::{PackError, Result};
use crate::http_client::{HttpClient, Transport};
use crate::layout::Layout;
use crate::pypi::PypiClient;
use crate::requirement::Requirement;
use crate::site;
use crate::termux::TermuxClient;

/// Where a package may be fetched from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Source {
    /// Termux binary repository if it has the package, PyPI otherwise.
    #[default]
    Auto,
    Termux,
    Pypi,
}

impl FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" | "" => Ok(Source::Auto),
            "termux" => Ok(Source::Termux),
            "pypi" => Ok(Source::Pypi),
            other => Err(format!("unknown source '{other}' (expected auto, termux or pypi)")),
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Source::Auto => "auto",
            Source::Termux => "termux",
            Source::Pypi => "pypi",
        })
    }
}

/// Steps of one install. `Failed` is reachable from source selection and fetching.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InstallState {
    CheckingSatisfied,
    SelectingSource,
    Fetching(Source),
    Linking,
    Done,
    Failed,
}

/// Installs requirements into per-project site directories through a shared cache.
pub struct Installer<T: Transport = HttpClient> {
    config: Config,
    layout: Layout,
    transport: T,
}

impl Installer<HttpClient> {
    pub fn with_http(config: Config, layout: Layout) -> Self {
        Self::new(config, layout, HttpClient::new())
    }
}

impl<T: Transport> Installer<T> {
    pub fn new(config: Config, layout: Layout, transport: T) -> Self {
        Self {
            config,
            layout,
            transport,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Is a version satisfying `requirement` visible in `project`'s site directory?
    /// Touches neither the network nor the filesystem beyond reads. Malformed
    /// requirements are never satisfied.
    pub fn is_installed(&self, requirement: &str, project: &str) -> bool {
        match Requirement::parse(requirement) {
            Ok(req) => self.check_satisfied(&req, project),
            Err(e) => {
                debug!("{}", e);
                false
            }
        }
    }

    fn check_satisfied(&self, req: &Requirement, project: &str) -> bool {
        let site = self.layout.site_packages_path(project);
        match site::installed_version(&site, req) {
            Some(found) => {
                let ok = req.is_satisfied_by(&found);
                debug!("{} found at {} (wants {}): {}", req.name, found, req, ok);
                ok
            }
            None => false,
        }
    }

    /// Make `requirement` importable in `project`. `Ok(true)` when it is (already
    /// or now) installed, `Ok(false)` when fetching or linking failed; the cause is
    /// logged. Only a malformed requirement is an `Err`.
    pub fn install(&self, requirement: &str, project: &str, source: Source) -> Result<bool> {
        let mut state = InstallState::CheckingSatisfied;
        debug!("{}: {:?}", requirement, state);
        let req = Requirement::parse(requirement)?;
        if self.check_satisfied(&req, project) {
            info!("{} already satisfied in project {}", req, project);
            return Ok(true);
        }

        state = InstallState::SelectingSource;
        debug!("{}: {:?}", req, state);
        let chosen = self.select_source(&req, source);

        state = InstallState::Fetching(chosen);
        debug!("{}: {:?}", req, state);
        if let Err(e) = self.fetch(&req, chosen) {
            state = InstallState::Failed;
            debug!("{}: {:?}", req, state);
            error!("failed to install {} from {}: {}", req, chosen, e);
            return Ok(false);
        }

        state = InstallState::Linking;
        debug!("{}: {:?}", req, state);
        if let Err(e) = self.link(&req, project) {
            state = InstallState::Failed;
            debug!("{}: {:?}", req, state);
            error!("failed to link {} into project {}: {}", req, project, e);
            return Ok(false);
        }

        state = InstallState::Done;
        debug!("{}: {:?}", req, state);
        info!("installed {} into project {}", req, project);
        Ok(true)
    }

    fn termux(&self) -> TermuxClient<'_> {
        TermuxClient::new(&self.transport, &self.config, &self.layout)
    }

    fn pypi(&self) -> PypiClient<'_> {
        PypiClient::new(&self.transport, &self.config, &self.layout)
    }

    fn select_source(&self, req: &Requirement, requested: Source) -> Source {
        match requested {
            Source::Auto if self.layout.cache_entry(&req.name).is_dir() => {
                // Either client short-circuits on a cached entry; skip the probe.
                Source::Pypi
            }
            Source::Auto if self.termux().has(&req.name) => Source::Termux,
            Source::Auto => Source::Pypi,
            explicit => explicit,
        }
    }

    fn fetch(&self, req: &Requirement, source: Source) -> Result<()> {
        match source {
            Source::Termux => self.termux().install(&req.name).map(|_| ()),
            Source::Pypi | Source::Auto => self
                .pypi()
                .install(&req.name, req.pinned_version())
                .map(|_| ()),
        }
    }

    fn link(&self, req: &Requirement, project: &str) -> Result<usize> {
        self.layout.ensure_project_site_packages(project)?;
        let n = site::materialize_into_project(&self.layout, &req.name, project)?;
        if n == 0 && !self.layout.cache_entry(&req.name).is_dir() {
            return Err(PackError::NotFound(format!("no cache entry for {}", req.name)));
        }
        Ok(n)
    }
}
