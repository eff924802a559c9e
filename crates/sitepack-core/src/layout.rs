//! On-disk layout under the app-private root:
//!
//! ```text
//! <root>/config.json
//! <root>/logs.txt
//! <root>/cache/<package>/            shared extraction cache
//! <root>/projects/<project>/site-packages
//! ```

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{PackError, Result};
use crate::search_path;

pub const CONFIG_FILE: &str = "config.json";
pub const LOG_FILE: &str = "logs.txt";

/// Resolved directories for one app-private root.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    /// A relative `root` is resolved against the current directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let root = if root.is_relative() {
            env::current_dir().map(|cwd| cwd.join(&root)).unwrap_or(root)
        } else {
            root
        };
        Self { root }
    }

    /// Uses SITEPACK_HOME if set; otherwise the Android private files dir when
    /// running inside an app sandbox; otherwise the platform data dir.
    pub fn detect() -> Self {
        if let Ok(dir) = env::var("SITEPACK_HOME") {
            if !dir.trim().is_empty() {
                return Self::new(dir);
            }
        }
        if let Some(dir) = android_files_dir() {
            return Self::new(dir);
        }
        let base = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::new(base.join("sitepack"))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    pub fn log_path(&self) -> PathBuf {
        self.root.join(LOG_FILE)
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.root.join("cache")
    }

    /// Cache entry for a canonical package name.
    pub fn cache_entry(&self, package: &str) -> PathBuf {
        self.cache_dir().join(package)
    }

    pub fn projects_dir(&self) -> PathBuf {
        self.root.join("projects")
    }

    /// `<root>/projects/<project>/site-packages`, without creating it.
    pub fn site_packages_path(&self, project: &str) -> PathBuf {
        self.projects_dir().join(project).join("site-packages")
    }

    /// Site directory for `project`, created if absent.
    pub fn project_site_packages(&self, project: &str) -> Result<PathBuf> {
        validate_project_name(project)?;
        let dir = self.site_packages_path(project);
        fs::create_dir_all(&dir).map_err(|e| PackError::io_at(&dir, e))?;
        Ok(dir)
    }

    /// Create the site directory and register it on this process's module search
    /// path. Registration happens at most once per process.
    pub fn ensure_project_site_packages(&self, project: &str) -> Result<PathBuf> {
        let dir = self.project_site_packages(project)?;
        search_path::prepend_once(&dir);
        Ok(dir)
    }

    /// Names of cache entries (one per installed package), sorted.
    pub fn cached_packages(&self) -> Result<Vec<String>> {
        let dir = self.cache_dir();
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(&dir).map_err(|e| PackError::io_at(&dir, e))? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') || !entry.file_type()?.is_dir() {
                continue;
            }
            names.push(name);
        }
        names.sort();
        Ok(names)
    }
}

/// Project names become a single path component.
fn validate_project_name(project: &str) -> Result<()> {
    let ok = !project.is_empty()
        && project != "."
        && project != ".."
        && !project.contains(['/', '\\']);
    if ok {
        Ok(())
    } else {
        Err(PackError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("invalid project name '{project}'"),
        )))
    }
}

/// Project used when the caller does not name one: SITEPACK_PROJECT, else the
/// current directory's name.
pub fn default_project_name() -> String {
    if let Ok(p) = env::var("SITEPACK_PROJECT") {
        if !p.trim().is_empty() {
            return p.trim().to_string();
        }
    }
    env::current_dir()
        .ok()
        .and_then(|d| d.file_name().map(|n| n.to_string_lossy().to_string()))
        .unwrap_or_else(|| "default".to_string())
}

/// `/data/data/<package>/files` when ANDROID_ARGUMENT points into an app sandbox.
fn android_files_dir() -> Option<PathBuf> {
    let arg = env::var("ANDROID_ARGUMENT").ok()?;
    let package = android_package_from_argument(&arg)?;
    Some(PathBuf::from(format!("/data/data/{package}/files")))
}

/// `/data/user/0/org.example.app/files` -> `org.example.app`
fn android_package_from_argument(arg: &str) -> Option<String> {
    let rest = arg.strip_prefix("/data/user/0/")?;
    let package = rest.split('/').next()?;
    (!package.is_empty() && package.contains('.')).then(|| package.to_string())
}
