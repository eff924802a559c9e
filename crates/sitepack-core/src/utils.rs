//! Filesystem helpers shared by the extractors and the link manager.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use walkdir::WalkDir;

/// Recursively copy `src` into `dest`, overwriting files that already exist.
/// Returns the number of files written.
pub fn copy_dir_all(src: &Path, dest: &Path) -> io::Result<usize> {
    fs::create_dir_all(dest)?;
    let mut copied = 0;
    for entry in WalkDir::new(src).min_depth(1).follow_links(false) {
        let entry = entry.map_err(io::Error::other)?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(io::Error::other)?;
        let target = dest.join(rel);
        let ft = entry.file_type();
        if ft.is_dir() {
            fs::create_dir_all(&target)?;
        } else if ft.is_symlink() {
            copy_symlink(entry.path(), &target)?;
            copied += 1;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
            copied += 1;
        }
    }
    Ok(copied)
}

#[cfg(unix)]
fn copy_symlink(src: &Path, dest: &Path) -> io::Result<()> {
    let target = fs::read_link(src)?;
    if fs::symlink_metadata(dest).is_ok() {
        fs::remove_file(dest)?;
    }
    std::os::unix::fs::symlink(target, dest)
}

#[cfg(not(unix))]
fn copy_symlink(src: &Path, dest: &Path) -> io::Result<()> {
    fs::copy(src, dest).map(|_| ())
}

/// Copy a file or directory tree to `dest`.
pub fn copy_item(src: &Path, dest: &Path) -> io::Result<()> {
    if src.is_dir() {
        copy_dir_all(src, dest).map(|_| ())
    } else {
        fs::copy(src, dest).map(|_| ())
    }
}

/// True if `path` names anything, including a dangling symlink.
pub fn entry_exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Remove a file or directory tree, ignoring "not found".
pub fn remove_quietly(path: &Path) {
    let result = match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(_) => return,
    };
    if let Err(e) = result {
        tracing::debug!("could not remove {}: {}", path.display(), e);
    }
}

/// `archive/path` with its first segment removed, as a relative path that stays
/// inside the destination. `None` for the root itself or anything escaping it.
/// A `.` root means the archive has no wrapping directory: members are taken
/// as-is, with or without their `./` prefix.
pub fn strip_root(name: &str, root: &str) -> Option<PathBuf> {
    let rest = if root == "." {
        name.trim_start_matches("./")
    } else {
        name.strip_prefix(root)?.strip_prefix('/')?
    };
    let rel = Path::new(rest);
    let mut out = PathBuf::new();
    for comp in rel.components() {
        match comp {
            Component::Normal(c) => out.push(c),
            Component::CurDir => {}
            _ => return None,
        }
    }
    (!out.as_os_str().is_empty()).then_some(out)
}

/// First path segment of an archive member name (`pkg-1.0/setup.py` -> `pkg-1.0`,
/// `./setup.py` -> `.`).
pub fn root_segment(name: &str) -> &str {
    name.split('/').next().unwrap_or(name)
}
