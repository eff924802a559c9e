//! PyPI-style "simple" index: scrape the package page for source archives.
//!
//! Only pure-Python source distributions are usable (no compiler on device), so
//! wheels and everything else on the page are ignored.

use std::fs;
use std::path::PathBuf;
use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, info};
use url::Url;

use crate::config::{Config, LinkOrder};
use crate::error::{PackError, Result};
use crate::http_client::Transport;
use crate::layout::Layout;
use crate::sdist::{self, SdistFormat};
use crate::site;
use crate::utils::remove_quietly;

fn href_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?i)href\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+))"#).ok())
        .as_ref()
}

/// Source-archive links on an index page, `.tar.gz` first then `.zip`, each in
/// page order. Fragments (`#sha256=...`) are dropped.
pub fn find_links(html: &str) -> Vec<String> {
    let mut tar_links = Vec::new();
    let mut zip_links = Vec::new();
    let Some(re) = href_re() else {
        return tar_links;
    };
    for cap in re.captures_iter(html) {
        let Some(raw) = cap.get(1).or_else(|| cap.get(2)).or_else(|| cap.get(3)) else {
            continue;
        };
        let link = raw.as_str().split('#').next().unwrap_or_default().trim();
        let lower = link.to_ascii_lowercase();
        if lower.ends_with(".tar.gz") {
            tar_links.push(link.to_string());
        } else if lower.ends_with(".zip") {
            zip_links.push(link.to_string());
        }
    }
    tar_links.extend(zip_links);
    tar_links
}

fn file_name(link: &str) -> &str {
    link.rsplit('/').next().unwrap_or(link)
}

/// Pick the link to download. An exact pin selects the first file named
/// `...<version>.tar.gz`, `...<version>.zip` or `...<version>.postN.<ext>`;
/// otherwise `order` decides which end of the preferred group is "latest".
pub fn select_link<'l>(links: &'l [String], pin: Option<&str>, order: LinkOrder) -> Option<&'l str> {
    if let Some(version) = pin.filter(|v| !v.is_empty()) {
        let pattern = format!(r"(?i){}(?:\.post\d+)?\.(?:tar\.gz|zip)$", regex::escape(version));
        if let Ok(re) = Regex::new(&pattern) {
            if let Some(hit) = links.iter().find(|l| re.is_match(file_name(l))) {
                return Some(hit);
            }
        }
        debug!("no link matches version {}, falling back to default pick", version);
    }

    // Tar links sort before zip links; only fall through to zips when there are no tars.
    let is_tar = |l: &&String| l.to_ascii_lowercase().ends_with(".tar.gz");
    let group: Vec<&String> = if links.iter().any(|l| is_tar(&l)) {
        links.iter().filter(is_tar).collect()
    } else {
        links.iter().collect()
    };
    let pick = match order {
        LinkOrder::First => group.first(),
        LinkOrder::Last => group.last(),
    };
    pick.map(|l| l.as_str())
}

pub struct PypiClient<'a> {
    transport: &'a dyn Transport,
    config: &'a Config,
    layout: &'a Layout,
}

impl<'a> PypiClient<'a> {
    pub fn new(transport: &'a dyn Transport, config: &'a Config, layout: &'a Layout) -> Self {
        Self {
            transport,
            config,
            layout,
        }
    }

    /// `<index>/<escaped lowercase name>/`
    pub fn index_page_url(&self, package: &str) -> Result<Url> {
        let base = self.config.pypi_index_url.trim_end_matches('/');
        let mut url = Url::parse(&format!("{base}/"))
            .map_err(|e| PackError::network(&self.config.pypi_index_url, e))?;
        url.path_segments_mut()
            .map_err(|()| PackError::network(base, "index URL cannot be a base"))?
            .pop_if_empty()
            .push(&package.to_lowercase())
            .push("");
        Ok(url)
    }

    /// Fetch and unpack a source distribution into the shared cache. No-op if the
    /// cache entry already exists.
    pub fn install(&self, package: &str, pin: Option<&str>) -> Result<PathBuf> {
        let entry = self.layout.cache_entry(package);
        if entry.exists() {
            debug!("{} already in cache", package);
            return Ok(entry);
        }

        info!("Downloading {} from PyPI...", package);
        let page_url = self.index_page_url(package)?;
        let html = self.transport.get_text(page_url.as_str())?;
        let links = find_links(&html);
        if links.is_empty() {
            return Err(PackError::NotFound(format!(
                "no source distributions for {package} at {page_url}"
            )));
        }
        let selected = select_link(&links, pin, self.config.link_order())
            .ok_or_else(|| PackError::NotFound(format!("no usable link for {package}")))?;
        let download_url = page_url
            .join(selected)
            .map_err(|e| PackError::network(selected, e))?;
        let format = SdistFormat::from_name(download_url.path())
            .ok_or_else(|| PackError::Format(format!("unrecognized archive: {download_url}")))?;
        debug!("selected {}", download_url);

        let cache_dir = self.layout.cache_dir();
        fs::create_dir_all(&cache_dir).map_err(|e| PackError::io_at(&cache_dir, e))?;
        let archive = cache_dir.join(format!("{package}_source.{}", format.extension()));
        self.transport.download(download_url.as_str(), &archive)?;

        let staging = tempfile::Builder::new()
            .prefix(&format!(".staging-{package}-"))
            .tempdir_in(&cache_dir)
            .map_err(|e| PackError::io_at(&cache_dir, e))?;
        let unpacked = staging.path().join(package);
        let files = sdist::extract_stripped(&archive, format, &unpacked)?;
        debug!("unpacked {} files from {}", files, archive.display());
        let entry = site::commit_entry(self.layout, package, &unpacked)?;

        remove_quietly(&archive);
        Ok(entry)
    }
}
