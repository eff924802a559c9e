//! Blocking HTTP: one shared ureq Agent, bounded timeouts, no retries.
//! A failed or timed-out request is reported once; the caller decides what next.

use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use tracing::debug;

use crate::error::{PackError, Result};

/// Existence probes against the binary repository.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(10);
/// Index pages and archive downloads.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(15);

pub const USER_AGENT: &str = concat!("sitepack/", env!("CARGO_PKG_VERSION"));

/// What the source clients need from the network. Implemented by [`HttpClient`];
/// tests substitute in-memory fixtures.
pub trait Transport {
    /// HEAD `url`; true only for a 2xx answer.
    fn head_ok(&self, url: &str) -> bool;

    /// GET `url` and return the body as text.
    fn get_text(&self, url: &str) -> Result<String>;

    /// GET `url` and stream the body into `dest`. Returns bytes written.
    fn download(&self, url: &str, dest: &Path) -> Result<u64>;
}

/// HTTP client: one Agent (connection reuse).
#[derive(Clone)]
pub struct HttpClient {
    agent: ureq::Agent,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient").finish_non_exhaustive()
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient {
    pub fn new() -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(PROBE_TIMEOUT)
            .timeout(FETCH_TIMEOUT)
            .build();
        Self { agent }
    }

    fn call(&self, req: ureq::Request, url: &str) -> Result<ureq::Response> {
        match req.set("User-Agent", USER_AGENT).call() {
            Ok(resp) => Ok(resp),
            Err(ureq::Error::Status(code, _)) => Err(PackError::network(url, format!("HTTP {code}"))),
            Err(e) => Err(PackError::network(url, e)),
        }
    }
}

impl Transport for HttpClient {
    fn head_ok(&self, url: &str) -> bool {
        let req = self.agent.head(url).timeout(PROBE_TIMEOUT);
        match self.call(req, url) {
            Ok(resp) => (200..300).contains(&resp.status()),
            Err(e) => {
                debug!("probe failed: {}", e);
                false
            }
        }
    }

    fn get_text(&self, url: &str) -> Result<String> {
        let resp = self.call(self.agent.get(url), url)?;
        resp.into_string().map_err(|e| PackError::network(url, e))
    }

    fn download(&self, url: &str, dest: &Path) -> Result<u64> {
        let resp = self.call(self.agent.get(url), url)?;
        let mut out = File::create(dest).map_err(|e| PackError::io_at(dest, e))?;
        let mut reader = resp.into_reader();
        let n = std::io::copy(&mut reader, &mut out).map_err(|e| PackError::network(url, e))?;
        out.flush()?;
        debug!("downloaded {} bytes from {}", n, url);
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    #[test]
    fn test_head_ok_follows_status() {
        let mut server = Server::new();
        let found = server.mock("HEAD", "/aarch64/python-six_aarch64.deb").with_status(200).create();
        let missing = server.mock("HEAD", "/aarch64/python-nope_aarch64.deb").with_status(404).create();

        let client = HttpClient::new();
        assert!(client.head_ok(&format!("{}/aarch64/python-six_aarch64.deb", server.url())));
        assert!(!client.head_ok(&format!("{}/aarch64/python-nope_aarch64.deb", server.url())));
        found.assert();
        missing.assert();
    }

    #[test]
    fn test_head_ok_false_on_connection_error() {
        let client = HttpClient::new();
        assert!(!client.head_ok("http://127.0.0.1:9/unreachable"));
    }

    #[test]
    fn test_get_text_and_download() {
        let mut server = Server::new();
        let page = server
            .mock("GET", "/simple/six/")
            .match_header("user-agent", USER_AGENT)
            .with_status(200)
            .with_body("<a href=\"six-1.0.tar.gz\">six</a>")
            .create();
        let file = server
            .mock("GET", "/files/six-1.0.tar.gz")
            .with_status(200)
            .with_body(b"archive-bytes")
            .create();

        let client = HttpClient::new();
        let body = client.get_text(&format!("{}/simple/six/", server.url())).unwrap();
        assert!(body.contains("six-1.0.tar.gz"));

        let td = tempfile::tempdir().unwrap();
        let dest = td.path().join("six.tar.gz");
        let n = client
            .download(&format!("{}/files/six-1.0.tar.gz", server.url()), &dest)
            .unwrap();
        assert_eq!(n, 13);
        assert_eq!(std::fs::read(&dest).unwrap(), b"archive-bytes");
        page.assert();
        file.assert();
    }

    #[test]
    fn test_non_success_status_is_network_error() {
        let mut server = Server::new();
        let _m = server.mock("GET", "/simple/missing/").with_status(404).create();
        let err = HttpClient::new()
            .get_text(&format!("{}/simple/missing/", server.url()))
            .unwrap_err();
        match err {
            PackError::Network { reason, .. } => assert_eq!(reason, "HTTP 404"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
