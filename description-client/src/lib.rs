//! Description document access for UPnP control points
//!
//! A [`DocAccess`] resolves a numeric document URL, downloads the document over a
//! raw blocking socket and answers extraction queries over the cached XML text.
//! Root devices own one accessor per device tree; every service derives its own
//! accessor from a copy of the device document plus the service's relative path.

mod error;
mod fetch;
mod model;
mod query;
mod url;

pub use error::{DocError, Result};
pub use model::{ArgumentInfo, IconParam, VariableInfo};
pub use url::join_url;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Options applied to a document fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    /// Receive timeout, applied to loopback peers only; zero disables it
    ///
    /// Default: 100 ms
    pub timeout: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(100),
        }
    }
}

/// Resolved location and cached text of one description document
#[derive(Debug, Default)]
pub struct DocAccess {
    addr: Option<SocketAddr>,
    path: String,
    url: String,
    base_url: String,
    document: String,
    queries: AtomicUsize,
}

impl Clone for DocAccess {
    fn clone(&self) -> Self {
        Self {
            addr: self.addr,
            path: self.path.clone(),
            url: self.url.clone(),
            base_url: self.base_url.clone(),
            document: self.document.clone(),
            queries: AtomicUsize::new(0),
        }
    }
}

impl DocAccess {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accessor over an already available document, without a network location
    pub fn from_document(document: impl Into<String>) -> Self {
        Self {
            document: document.into(),
            ..Self::default()
        }
    }

    /// Resolve `url`, fetch it and settle the base URL.
    ///
    /// The base URL comes from the document's `URLBase` element when present,
    /// otherwise it is derived from `url`.
    pub fn load(&mut self, url: &str, options: &FetchOptions) -> Result<()> {
        self.resolve(url)?;
        self.fetch(options)?;

        match self.root_tag("URLBase") {
            Ok(base) => self.base_url = base,
            Err(_) => self.derive_base_url()?,
        }
        Ok(())
    }

    /// Parse `url` into socket address and request path.
    ///
    /// # Errors
    ///
    /// Returns `DocError::Address` when the host is not a numeric IP address.
    pub fn resolve(&mut self, url: &str) -> Result<()> {
        let resolved = url::resolve(url)?;
        self.addr = Some(resolved.addr);
        self.path = resolved.path;
        self.url = url.trim().to_string();
        Ok(())
    }

    /// Derive the base URL by stripping the path from the document URL.
    pub fn derive_base_url(&mut self) -> Result<()> {
        self.base_url = url::derive_base(&self.url)?;
        Ok(())
    }

    /// Download the document at the resolved address.
    ///
    /// The cached document is replaced only on success. Response heads must be
    /// UTF-8; a body in another encoding is kept with invalid sequences replaced.
    pub fn fetch(&mut self, options: &FetchOptions) -> Result<()> {
        let addr = self
            .addr
            .ok_or_else(|| DocError::Address("no address resolved".to_string()))?;
        if self.path.is_empty() {
            return Err(DocError::Address("no path resolved".to_string()));
        }

        match fetch::http_get(addr, &self.path, options.timeout) {
            Ok(body) => {
                tracing::debug!("Fetched {} bytes from {}", body.len(), self.url);
                self.document = body;
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Failed to fetch {}: {}", self.url, e);
                Err(e)
            }
        }
    }

    /// Override the base URL used to join relative resource paths
    pub fn set_base_url(&mut self, base_url: impl Into<String>) {
        self.base_url = base_url.into();
    }

    pub fn address(&self) -> Option<SocketAddr> {
        self.addr
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Full document URL as passed to [`DocAccess::resolve`]
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Cached document text; empty until a fetch succeeds
    pub fn document(&self) -> &str {
        &self.document
    }

    pub fn is_loaded(&self) -> bool {
        !self.document.is_empty()
    }

    /// Number of extraction queries run against this accessor
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::Relaxed)
    }
}
