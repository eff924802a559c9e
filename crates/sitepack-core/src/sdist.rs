//! Source distribution unpacking: `.tar.gz` and `.zip` archives whose single
//! top-level directory (`pkg-1.0/`) is stripped on the way out.

use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::Path;

use flate2::read::GzDecoder;
use tracing::debug;
use zip::ZipArchive;

use crate::error::{PackError, Result};
use crate::utils::{root_segment, strip_root};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SdistFormat {
    TarGz,
    Zip,
}

impl SdistFormat {
    /// Format from a file name or URL path. `None` if unrecognized.
    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
            Some(Self::TarGz)
        } else if lower.ends_with(".zip") {
            Some(Self::Zip)
        } else {
            None
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::TarGz => "tar.gz",
            Self::Zip => "zip",
        }
    }
}

/// Unpack `archive` into `dest`, stripping the root directory named by the first
/// member. Returns the number of files written.
pub fn extract_stripped(archive: &Path, format: SdistFormat, dest: &Path) -> Result<usize> {
    fs::create_dir_all(dest).map_err(|e| PackError::io_at(dest, e))?;
    match format {
        SdistFormat::TarGz => extract_tar_gz(archive, dest),
        SdistFormat::Zip => extract_zip(archive, dest),
    }
}

/// Unpack by file name suffix.
pub fn extract_auto(archive: &Path, dest: &Path) -> Result<usize> {
    let name = archive.to_string_lossy();
    let format = SdistFormat::from_name(&name)
        .ok_or_else(|| PackError::Format(format!("unrecognized archive type: {name}")))?;
    extract_stripped(archive, format, dest)
}

/// Pax headers carry metadata for the archive or the next member, never content.
fn is_pax_header(kind: tar::EntryType) -> bool {
    matches!(kind, tar::EntryType::XGlobalHeader | tar::EntryType::XHeader)
}

fn extract_tar_gz(archive: &Path, dest: &Path) -> Result<usize> {
    let f = File::open(archive).map_err(|e| PackError::io_at(archive, e))?;
    let mut tar = tar::Archive::new(GzDecoder::new(BufReader::new(f)));
    let entries = tar
        .entries()
        .map_err(|e| PackError::Format(format!("not a tar archive: {e}")))?;

    let mut root: Option<String> = None;
    let mut written = 0;
    for entry in entries {
        let mut entry = entry.map_err(|e| PackError::Format(format!("corrupt tar: {e}")))?;
        let kind = entry.header().entry_type();
        if is_pax_header(kind) {
            continue;
        }
        let name = entry.path()?.to_string_lossy().to_string();
        let root = root.get_or_insert_with(|| root_segment(&name).to_string());
        if !kind.is_file() {
            continue;
        }
        let Some(rel) = strip_root(&name, root.as_str()) else {
            debug!("skipping member outside root: {}", name);
            continue;
        };
        let target = dest.join(rel);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        entry.unpack(&target).map_err(|e| PackError::io_at(&target, e))?;
        written += 1;
    }
    match root {
        None => Err(PackError::Format("empty archive".to_string())),
        Some(root) if written == 0 => Err(PackError::Format(format!(
            "no files under archive root '{root}'"
        ))),
        Some(_) => Ok(written),
    }
}

fn extract_zip(archive: &Path, dest: &Path) -> Result<usize> {
    let f = File::open(archive).map_err(|e| PackError::io_at(archive, e))?;
    let mut zip = ZipArchive::new(BufReader::new(f))?;
    if zip.len() == 0 {
        return Err(PackError::Format("empty archive".to_string()));
    }
    let root = root_segment(zip.by_index(0)?.name()).to_string();

    let mut written = 0;
    for i in 0..zip.len() {
        let mut file = zip.by_index(i)?;
        let name = file.name().to_string();
        if name.ends_with('/') {
            continue;
        }
        let Some(rel) = strip_root(&name, &root) else {
            debug!("skipping member outside root: {}", name);
            continue;
        };
        let target = dest.join(rel);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&target).map_err(|e| PackError::io_at(&target, e))?;
        io::copy(&mut file, &mut out)?;
        written += 1;
    }
    if written == 0 {
        return Err(PackError::Format(format!("no files under archive root '{root}'")));
    }
    Ok(written)
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! In-memory source distributions for tests.

    use std::io::{Cursor, Write};

    use flate2::write::GzEncoder;
    use flate2::Compression;
    use zip::write::SimpleFileOptions;

    /// `.tar.gz` with the given directories and files, in order.
    pub fn tar_gz(dirs: &[&str], files: &[(&str, &[u8])]) -> Vec<u8> {
        let enc = GzEncoder::new(Vec::new(), Compression::default());
        let mut builder = tar::Builder::new(enc);
        for dir in dirs {
            let mut header = tar::Header::new_gnu();
            header.set_entry_type(tar::EntryType::Directory);
            header.set_size(0);
            header.set_mode(0o755);
            header.set_cksum();
            builder.append_data(&mut header, dir, &[][..]).unwrap();
        }
        for (path, content) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, path, *content).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }

    /// `.tar.gz` whose member names are written byte for byte, so `./` prefixes
    /// survive and pax headers can be placed ahead of the content.
    pub fn tar_gz_raw(members: &[(&str, tar::EntryType, &[u8])]) -> Vec<u8> {
        let enc = GzEncoder::new(Vec::new(), Compression::default());
        let mut builder = tar::Builder::new(enc);
        for (name, kind, content) in members {
            let mut header = tar::Header::new_ustar();
            header.as_old_mut().name[..name.len()].copy_from_slice(name.as_bytes());
            header.set_entry_type(*kind);
            header.set_size(content.len() as u64);
            header.set_mode(if kind.is_dir() { 0o755 } else { 0o644 });
            header.set_cksum();
            builder.append(&header, *content).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }

    /// `.zip` with the given entries; names ending in `/` become directories.
    pub fn zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let opts = SimpleFileOptions::default();
        for (name, content) in entries {
            if let Some(dir) = name.strip_suffix('/') {
                writer.add_directory(dir, opts).unwrap();
            } else {
                writer.start_file(*name, opts).unwrap();
                writer.write_all(content).unwrap();
            }
        }
        writer.finish().unwrap().into_inner()
    }
}
