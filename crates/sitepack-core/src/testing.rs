//! In-memory transport for unit tests.

use std::cell::Cell;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::{PackError, Result};
use crate::http_client::Transport;

/// Serves fixed pages and files by exact URL; anything else is a 404.
#[derive(Default)]
pub struct FakeTransport {
    files: HashMap<String, Vec<u8>>,
    pages: HashMap<String, String>,
    heads: Cell<usize>,
    gets: Cell<usize>,
    downloads: Cell<usize>,
}

impl FakeTransport {
    pub fn with_file(mut self, url: &str, bytes: Vec<u8>) -> Self {
        self.files.insert(url.to_string(), bytes);
        self
    }

    pub fn with_page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), html.to_string());
        self
    }

    pub fn heads(&self) -> usize {
        self.heads.get()
    }

    pub fn gets(&self) -> usize {
        self.gets.get()
    }

    pub fn downloads(&self) -> usize {
        self.downloads.get()
    }

    /// Every request that touched the network, probes included.
    pub fn requests(&self) -> usize {
        self.heads() + self.gets() + self.downloads()
    }
}

fn not_found(url: &str) -> PackError {
    PackError::network(url, "HTTP 404")
}

impl Transport for FakeTransport {
    fn head_ok(&self, url: &str) -> bool {
        self.heads.set(self.heads.get() + 1);
        self.files.contains_key(url) || self.pages.contains_key(url)
    }

    fn get_text(&self, url: &str) -> Result<String> {
        self.gets.set(self.gets.get() + 1);
        self.pages.get(url).cloned().ok_or_else(|| not_found(url))
    }

    fn download(&self, url: &str, dest: &Path) -> Result<u64> {
        self.downloads.set(self.downloads.get() + 1);
        let bytes = self.files.get(url).ok_or_else(|| not_found(url))?;
        fs::write(dest, bytes).map_err(|e| PackError::io_at(dest, e))?;
        Ok(bytes.len() as u64)
    }
}
