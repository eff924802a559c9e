//! Structural extraction of Termux `.deb` packages.
//!
//! A `.deb` is a Unix `ar` container:
//!
//! ```text
//! "!<arch>\n"
//! [60-byte header][content][pad to even] ...
//! ```
//!
//! Header layout: name in bytes 0..16, size in bytes 48..58 (decimal ASCII).
//! Only the `data.tar.*` member matters; it holds the installed file tree.

use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use xz2::read::XzDecoder;

use crate::error::{PackError, Result};

pub const AR_MAGIC: &[u8; 8] = b"!<arch>\n";
pub const AR_HEADER_LEN: usize = 60;
/// Substring identifying the payload member.
pub const DATA_MEMBER: &str = "data.tar";
/// Prefix of the Termux install tree inside the payload.
pub const TERMUX_LIB_DIR: &str = "data/data/com.termux/files/usr/lib";

/// One member pulled out of an ar container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArMember {
    pub name: String,
    pub data: Vec<u8>,
}

/// Read until `buf` is full or EOF. Returns bytes read.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

fn parse_header(header: &[u8; AR_HEADER_LEN]) -> Result<(String, u64)> {
    let name = String::from_utf8_lossy(&header[..16])
        .trim_end_matches([' ', '\0'])
        .trim_end_matches('/')
        .to_string();
    let size_field = String::from_utf8_lossy(&header[48..58]);
    let size = size_field
        .trim()
        .parse::<u64>()
        .map_err(|_| PackError::Format(format!("bad ar size field '{}' for member '{}'", size_field.trim(), name)))?;
    Ok((name, size))
}

/// Scan an ar container and return the first member whose name contains
/// `pattern`. Scanning stops at that member; earlier members are skipped
/// without being buffered.
pub fn find_member<R: Read>(mut reader: R, pattern: &str) -> Result<ArMember> {
    let mut magic = [0u8; 8];
    if read_full(&mut reader, &mut magic)? != magic.len() || &magic != AR_MAGIC {
        return Err(PackError::Format("not an ar archive (bad magic)".to_string()));
    }

    let mut header = [0u8; AR_HEADER_LEN];
    loop {
        if read_full(&mut reader, &mut header)? < AR_HEADER_LEN {
            break;
        }
        let (name, size) = parse_header(&header)?;

        if name.contains(pattern) {
            let mut data = Vec::with_capacity(size.min(64 * 1024 * 1024) as usize);
            (&mut reader).take(size).read_to_end(&mut data)?;
            if (data.len() as u64) < size {
                return Err(PackError::Format(format!("member '{name}' is truncated")));
            }
            return Ok(ArMember { name, data });
        }

        let skipped = io::copy(&mut (&mut reader).take(size), &mut io::sink())?;
        if skipped < size {
            return Err(PackError::Format(format!("member '{name}' is truncated")));
        }
        // Members are 2-byte aligned.
        if size % 2 == 1 {
            let mut pad = [0u8; 1];
            read_full(&mut reader, &mut pad)?;
        }
    }
    Err(PackError::NotFound(format!("no '{pattern}' member in archive")))
}

/// Pull the payload tarball out of a `.deb` file.
pub fn read_data_member(deb_path: &Path) -> Result<ArMember> {
    let f = File::open(deb_path).map_err(|e| PackError::io_at(deb_path, e))?;
    find_member(BufReader::new(f), DATA_MEMBER)
}

/// Unpack a payload tarball (named like `data.tar.xz`) into `dest`.
pub fn unpack_data_tar(member_name: &str, tarball: &Path, dest: &Path) -> Result<()> {
    let f = BufReader::new(File::open(tarball).map_err(|e| PackError::io_at(tarball, e))?);
    fs::create_dir_all(dest).map_err(|e| PackError::io_at(dest, e))?;
    let result = if member_name.ends_with(".xz") {
        tar::Archive::new(XzDecoder::new(f)).unpack(dest)
    } else if member_name.ends_with(".gz") {
        tar::Archive::new(GzDecoder::new(f)).unpack(dest)
    } else if member_name.ends_with(".tar") {
        tar::Archive::new(f).unpack(dest)
    } else {
        return Err(PackError::Format(format!(
            "unsupported payload compression: {member_name}"
        )));
    };
    result.map_err(|e| PackError::Format(format!("cannot unpack {member_name}: {e}")))
}

/// Find the `site-packages` directory inside an unpacked payload. Prefers the
/// configured Python version, then any `python*` sibling in name order.
pub fn locate_site_packages(root: &Path, python_version: &str) -> Result<PathBuf> {
    let lib_dir = root.join(TERMUX_LIB_DIR);
    let preferred = lib_dir
        .join(format!("python{python_version}"))
        .join("site-packages");
    if preferred.is_dir() {
        return Ok(preferred);
    }

    let mut candidates: Vec<PathBuf> = match fs::read_dir(&lib_dir) {
        Ok(rd) => rd
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with("python"))
            .map(|e| e.path().join("site-packages"))
            .collect(),
        Err(_) => Vec::new(),
    };
    candidates.sort();
    candidates
        .into_iter()
        .find(|p| p.is_dir())
        .ok_or_else(|| PackError::NotFound("Python site-packages not found in package".to_string()))
}
