//! Cache entries and project site directories.
//!
//! A cache entry (`<root>/cache/<package>/`) holds the importable contents of one
//! package. Projects see it through symlinks in their own `site-packages`.

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::error::{PackError, Result};
use crate::layout::Layout;
use crate::requirement::{canonical_name, Requirement};
use crate::utils::{copy_dir_all, copy_item, entry_exists};

/// Version assumed for a module that is present but declares none.
pub const UNKNOWN_VERSION: &str = "0.0.0";

/// Move a fully extracted tree into the cache as `package`'s entry.
///
/// The rename is atomic, so readers never see a half-populated entry. If another
/// install got there first the staged files are merged on top (last extraction
/// wins for files present in both).
pub fn commit_entry(layout: &Layout, package: &str, staged: &Path) -> Result<PathBuf> {
    let entry = layout.cache_entry(package);
    if !entry_exists(&entry) {
        match fs::rename(staged, &entry) {
            Ok(()) => {
                debug!("cached {} at {}", package, entry.display());
                return Ok(entry);
            }
            Err(e) if entry_exists(&entry) => {
                debug!("lost rename race for {}: {}", package, e);
            }
            Err(e) => {
                // Staging and cache on different filesystems.
                debug!("rename failed ({}), copying {}", e, staged.display());
            }
        }
    }
    if has_content(&entry) {
        warn!(
            "{} is already cached; merging new files over the existing entry",
            package
        );
    }
    copy_dir_all(staged, &entry).map_err(|e| PackError::io_at(&entry, e))?;
    Ok(entry)
}

fn has_content(dir: &Path) -> bool {
    fs::read_dir(dir)
        .map(|mut it| it.next().is_some())
        .unwrap_or(false)
}

/// SITEPACK_LINK=0 forces copies instead of symlinks.
fn use_link() -> bool {
    env::var("SITEPACK_LINK")
        .map(|v| v != "0" && !v.is_empty())
        .unwrap_or(true)
}

fn symlink(src: &Path, dest: &Path) -> io::Result<()> {
    if !use_link() {
        return Err(io::Error::new(io::ErrorKind::Unsupported, "SITEPACK_LINK=0"));
    }
    platform_symlink(src, dest)
}

#[cfg(unix)]
fn platform_symlink(src: &Path, dest: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(src, dest)
}

#[cfg(windows)]
fn platform_symlink(src: &Path, dest: &Path) -> io::Result<()> {
    if src.is_dir() {
        std::os::windows::fs::symlink_dir(src, dest)
    } else {
        std::os::windows::fs::symlink_file(src, dest)
    }
}

#[cfg(not(any(unix, windows)))]
fn platform_symlink(_src: &Path, _dest: &Path) -> io::Result<()> {
    Err(io::Error::new(io::ErrorKind::Unsupported, "no symlinks on this platform"))
}

/// Expose every top-level item of `package`'s cache entry in `project`'s site
/// directory. Existing destinations (including dangling links) are left alone.
/// Returns the number of items newly linked or copied; 0 if nothing is cached.
pub fn materialize_into_project(layout: &Layout, package: &str, project: &str) -> Result<usize> {
    let entry = layout.cache_entry(package);
    if !entry.is_dir() {
        debug!("nothing cached for {}", package);
        return Ok(0);
    }
    let site = layout.project_site_packages(project)?;

    let mut items: Vec<_> = fs::read_dir(&entry)
        .map_err(|e| PackError::io_at(&entry, e))?
        .collect::<io::Result<_>>()?;
    items.sort_by_key(|e| e.file_name());

    let mut linked = 0;
    for item in items {
        let src = item.path();
        let dest = site.join(item.file_name());
        if entry_exists(&dest) {
            debug!("{} already present, skipping", dest.display());
            continue;
        }
        if let Err(e) = symlink(&src, &dest) {
            warn!("symlink {} failed ({}); copying instead", dest.display(), e);
            copy_item(&src, &dest).map_err(|e| PackError::io_at(&dest, e))?;
        }
        linked += 1;
    }
    debug!("linked {} items of {} into {}", linked, package, site.display());
    Ok(linked)
}

fn version_assign_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?m)^__version__\s*(?::\s*\w+\s*)?=\s*['"]([^'"]+)['"]"#).ok()
    })
    .as_ref()
}

/// `Version:` header of a METADATA / PKG-INFO file (headers end at the first
/// blank line).
fn metadata_version(text: &str) -> Option<String> {
    text.lines()
        .take_while(|l| !l.trim().is_empty())
        .find_map(|l| l.strip_prefix("Version:"))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// `six-1.16.0.dist-info` -> `six`; `attrs.egg-info` -> `attrs`.
fn dist_name(dir_name: &str) -> Option<&str> {
    let stem = dir_name
        .strip_suffix(".dist-info")
        .or_else(|| dir_name.strip_suffix(".egg-info"))?;
    Some(stem.split_once('-').map_or(stem, |(name, _)| name))
}

fn from_metadata(site: &Path, name: &str) -> Option<String> {
    let mut dirs: Vec<_> = fs::read_dir(site)
        .ok()?
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().to_string())
        .collect();
    dirs.sort();
    dirs.iter().find_map(|dir| {
        let dist = dist_name(dir)?;
        if canonical_name(dist) != name {
            return None;
        }
        let file = if dir.ends_with(".dist-info") { "METADATA" } else { "PKG-INFO" };
        let text = fs::read_to_string(site.join(dir).join(file)).ok()?;
        metadata_version(&text)
    })
}

fn from_module(site: &Path, module: &str) -> Option<String> {
    let candidates = [
        site.join(module).join("__init__.py"),
        site.join(format!("{module}.py")),
    ];
    let source = candidates.iter().find(|p| p.is_file())?;
    let text = fs::read_to_string(source).unwrap_or_default();
    let version = version_assign_re()
        .and_then(|re| re.captures(&text))
        .map(|c| c[1].to_string())
        .unwrap_or_else(|| UNKNOWN_VERSION.to_string());
    Some(version)
}

/// Version of `req`'s package visible in `site`, read from packaging metadata
/// or a `__version__` assignment. `None` if the package is not there at all.
pub fn installed_version(site: &Path, req: &Requirement) -> Option<String> {
    if !site.is_dir() {
        return None;
    }
    if let Some(v) = from_metadata(site, &req.name) {
        return Some(v);
    }
    let import_name = req.import_name();
    from_module(site, &import_name).or_else(|| from_module(site, &req.name))
}
