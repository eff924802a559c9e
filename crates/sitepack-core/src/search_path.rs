//! Process-local module search path handed to spawned project processes.
//!
//! Entries are only ever prepended, each at most once per process.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

static SEARCH_PATH: OnceLock<Mutex<Vec<PathBuf>>> = OnceLock::new();

fn registry() -> &'static Mutex<Vec<PathBuf>> {
    SEARCH_PATH.get_or_init(|| Mutex::new(Vec::new()))
}

/// Put `dir` at the front of the search path. Returns false if it was
/// already registered (the order is then left unchanged).
pub fn prepend_once(dir: &Path) -> bool {
    let mut paths = registry().lock().unwrap_or_else(|e| e.into_inner());
    if paths.iter().any(|p| p == dir) {
        return false;
    }
    paths.insert(0, dir.to_path_buf());
    true
}

pub fn entries() -> Vec<PathBuf> {
    registry()
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .clone()
}

pub fn contains(dir: &Path) -> bool {
    entries().iter().any(|p| p == dir)
}

/// Registered entries followed by `existing` (e.g. the inherited PYTHONPATH),
/// joined with the platform separator. `None` if a path contains the separator.
pub fn to_env_value(existing: Option<OsString>) -> Option<OsString> {
    let mut all = entries();
    if let Some(existing) = existing {
        for p in std::env::split_paths(&existing) {
            if !all_contains(&all, &p) {
                all.push(p);
            }
        }
    }
    std::env::join_paths(all).ok()
}

fn all_contains(all: &[PathBuf], p: &Path) -> bool {
    p.as_os_str().is_empty() || all.iter().any(|q| q == p)
}
