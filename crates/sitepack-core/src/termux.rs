//! Termux binary repository: prebuilt `python-<pkg>` debs per architecture.

use std::fs;
use std::path::PathBuf;

use tracing::{debug, info};

use crate::config::Config;
use crate::deb;
use crate::error::{PackError, Result};
use crate::http_client::Transport;
use crate::layout::Layout;
use crate::site;
use crate::utils::remove_quietly;

pub struct TermuxClient<'a> {
    transport: &'a dyn Transport,
    config: &'a Config,
    layout: &'a Layout,
}

impl<'a> TermuxClient<'a> {
    pub fn new(transport: &'a dyn Transport, config: &'a Config, layout: &'a Layout) -> Self {
        Self {
            transport,
            config,
            layout,
        }
    }

    /// `<repo>/<arch>/python-<package>_<arch>.deb`
    pub fn deb_url(&self, package: &str) -> String {
        let arch = self.config.arch();
        format!(
            "{}/{arch}/python-{package}_{arch}.deb",
            self.config.termux_repo.trim_end_matches('/')
        )
    }

    /// Metadata-only probe: does the repository carry this package?
    pub fn has(&self, package: &str) -> bool {
        self.transport.head_ok(&self.deb_url(package))
    }

    /// Download the package's deb and extract its `site-packages` payload into the
    /// shared cache. No-op if the cache entry already exists.
    pub fn install(&self, package: &str) -> Result<PathBuf> {
        let entry = self.layout.cache_entry(package);
        if entry.exists() {
            debug!("{} already in cache", package);
            return Ok(entry);
        }
        let cache_dir = self.layout.cache_dir();
        fs::create_dir_all(&cache_dir).map_err(|e| PackError::io_at(&cache_dir, e))?;

        let url = self.deb_url(package);
        info!("Downloading {} from Termux...", package);
        let deb_path = cache_dir.join(format!("{package}.deb"));
        self.transport.download(&url, &deb_path)?;

        let member = deb::read_data_member(&deb_path)?;
        let data_tar = cache_dir.join(format!("{package}_{}", member.name));
        fs::write(&data_tar, &member.data).map_err(|e| PackError::io_at(&data_tar, e))?;
        let member_name = member.name;

        let scratch = tempfile::Builder::new()
            .prefix(&format!(".tmp_{package}-"))
            .tempdir_in(&cache_dir)
            .map_err(|e| PackError::io_at(&cache_dir, e))?;
        let result = deb::unpack_data_tar(&member_name, &data_tar, scratch.path())
            .and_then(|()| deb::locate_site_packages(scratch.path(), self.config.python_version()))
            .and_then(|site_pkgs| site::commit_entry(self.layout, package, &site_pkgs));

        // Scratch and payload go whether or not a site-packages dir was found.
        remove_quietly(&data_tar);
        if let Err(e) = scratch.close() {
            debug!("could not remove scratch dir: {}", e);
        }
        let entry = result?;

        remove_quietly(&deb_path);
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deb::fixtures::{ar_archive, termux_deb};
    use crate::testing::FakeTransport;

    fn setup() -> (tempfile::TempDir, Layout, Config) {
        let td = tempfile::tempdir().unwrap();
        let layout = Layout::new(td.path());
        let mut config = Config::default();
        config.termux_repo = "https://termux.test/apt/main/".to_string();
        config.arch = Some("aarch64".to_string());
        (td, layout, config)
    }

    #[test]
    fn test_deb_url() {
        let (_td, layout, config) = setup();
        let transport = FakeTransport::default();
        let client = TermuxClient::new(&transport, &config, &layout);
        assert_eq!(
            client.deb_url("numpy"),
            "https://termux.test/apt/main/aarch64/python-numpy_aarch64.deb"
        );
    }

    #[test]
    fn test_has_uses_head_probe() {
        let (_td, layout, config) = setup();
        let transport = FakeTransport::default().with_file(
            "https://termux.test/apt/main/aarch64/python-six_aarch64.deb",
            b"deb".to_vec(),
        );
        let client = TermuxClient::new(&transport, &config, &layout);
        assert!(client.has("six"));
        assert!(!client.has("requests"));
        assert_eq!(transport.downloads(), 0);
    }

    #[test]
    fn test_install_extracts_site_packages_and_cleans_up() {
        let (_td, layout, config) = setup();
        let deb = termux_deb(
            "python3.11",
            &[
                ("six.py", b"__version__ = \"1.16.0\"\n"),
                ("six-1.16.0.dist-info/METADATA", b"Name: six\nVersion: 1.16.0\n"),
            ],
        );
        let transport = FakeTransport::default()
            .with_file("https://termux.test/apt/main/aarch64/python-six_aarch64.deb", deb);
        let client = TermuxClient::new(&transport, &config, &layout);

        let entry = client.install("six").unwrap();
        assert_eq!(entry, layout.cache_entry("six"));
        assert!(entry.join("six.py").is_file());
        assert!(entry.join("six-1.16.0.dist-info/METADATA").is_file());

        let leftovers: Vec<String> = fs::read_dir(layout.cache_dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(leftovers, vec!["six".to_string()]);

        // Second call is served from the cache.
        client.install("six").unwrap();
        assert_eq!(transport.downloads(), 1);
    }

    #[test]
    fn test_install_without_site_packages_is_not_found() {
        let (_td, layout, config) = setup();
        let payload = {
            let mut builder = tar::Builder::new(Vec::new());
            let mut header = tar::Header::new_gnu();
            header.set_size(2);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(&mut header, "data/data/com.termux/files/usr/bin/tool", &b"#!"[..])
                .unwrap();
            builder.into_inner().unwrap()
        };
        let deb = ar_archive(&[("debian-binary", b"2.0\n"), ("data.tar", &payload)]);
        let transport = FakeTransport::default()
            .with_file("https://termux.test/apt/main/aarch64/python-tool_aarch64.deb", deb);
        let client = TermuxClient::new(&transport, &config, &layout);

        let err = client.install("tool").unwrap_err();
        assert!(matches!(err, PackError::NotFound(_)), "{err:?}");
        assert!(!layout.cache_entry("tool").exists());
        // Only the downloaded deb is left behind for inspection.
        let leftovers: Vec<String> = fs::read_dir(layout.cache_dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(leftovers, vec!["tool.deb".to_string()]);
    }

    #[test]
    fn test_install_rejects_non_ar_download() {
        let (_td, layout, config) = setup();
        let transport = FakeTransport::default().with_file(
            "https://termux.test/apt/main/aarch64/python-bad_aarch64.deb",
            b"<html>error page</html>".to_vec(),
        );
        let client = TermuxClient::new(&transport, &config, &layout);
        let err = client.install("bad").unwrap_err();
        assert!(matches!(err, PackError::Format(_)), "{err:?}");
        assert!(!layout.cache_entry("bad").exists());
    }

    #[test]
    fn test_install_network_failure() {
        let (_td, layout, config) = setup();
        let transport = FakeTransport::default();
        let client = TermuxClient::new(&transport, &config, &layout);
        let err = client.install("missing").unwrap_err();
        assert!(matches!(err, PackError::Network { .. }), "{err:?}");
    }
}
