//! SSDP/SOAP/GENA implementation of the transport contracts.
//!
//! [`NetworkTransport`] owns the shared HTTP clients and the lazily started
//! event callback server. Devices found through [`SsdpFinder`] or loaded with
//! [`NetworkTransport::device`] keep the transport alive while they exist.

mod config;
mod description;
mod device;
mod finder;
mod gena;
mod soap;
mod ssdp;

pub use config::NetworkConfig;
pub use description::{DescriptionRoot, DeviceDescription, ScpdDescription};
pub use device::{NetworkDevice, NetworkService};
pub use finder::SsdpFinder;

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Result, TransportError};
use gena::EventServer;
use soap::SoapClient;

pub(crate) struct NetworkContext {
    config: NetworkConfig,
    soap: SoapClient,
    http: reqwest::blocking::Client,
    events: Mutex<Option<Arc<EventServer>>>,
}

impl NetworkContext {
    pub(crate) fn config(&self) -> &NetworkConfig {
        &self.config
    }

    pub(crate) fn soap(&self) -> &SoapClient {
        &self.soap
    }

    /// Download a description or SCPD document
    pub(crate) fn fetch_text(&self, url: &str) -> Result<String> {
        tracing::debug!("Fetching {}", url);
        let response = self
            .http
            .get(url)
            .send()
            .map_err(|e| TransportError::Network(format!("GET {url} failed: {e}")))?;

        if !response.status().is_success() {
            return Err(TransportError::Network(format!(
                "GET {url} returned {}",
                response.status()
            )));
        }

        response
            .text()
            .map_err(|e| TransportError::Network(format!("Failed to read {url}: {e}")))
    }

    /// The event callback server, started on first use
    pub(crate) fn event_server(&self) -> Result<Arc<EventServer>> {
        let mut events = self.events.lock();
        if let Some(server) = events.as_ref() {
            return Ok(Arc::clone(server));
        }
        let server = Arc::new(EventServer::start(&self.config, self.soap.clone())?);
        *events = Some(Arc::clone(&server));
        Ok(server)
    }

    /// The event callback server if one is running
    pub(crate) fn running_event_server(&self) -> Option<Arc<EventServer>> {
        self.events.lock().clone()
    }
}

/// Entry point of the network transport
#[derive(Clone)]
pub struct NetworkTransport {
    context: Arc<NetworkContext>,
}

impl NetworkTransport {
    pub fn new(config: NetworkConfig) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(config.description_timeout)
            .build()
            .map_err(|e| TransportError::Network(format!("Failed to create HTTP client: {e}")))?;
        let soap = SoapClient::new(&config);

        Ok(Self {
            context: Arc::new(NetworkContext {
                config,
                soap,
                http,
                events: Mutex::new(None),
            }),
        })
    }

    pub fn config(&self) -> &NetworkConfig {
        self.context.config()
    }

    /// Load the root device described at `location`
    pub fn device(&self, location: &str) -> Result<Arc<NetworkDevice>> {
        let xml = self.context.fetch_text(location)?;
        self.parse_device(&xml, location)
    }

    /// Build the root device from an already downloaded description
    pub fn parse_device(&self, xml: &str, location: &str) -> Result<Arc<NetworkDevice>> {
        let root = DescriptionRoot::from_xml(xml)?;
        NetworkDevice::from_description(root, location, &self.context)
    }

    /// A finder issuing SSDP searches through this transport
    pub fn finder(&self) -> SsdpFinder {
        SsdpFinder::new(self.clone())
    }

    /// Port of the event callback server, if it has been started
    pub fn callback_port(&self) -> Option<u16> {
        self.context.running_event_server().map(|s| s.port())
    }
}

impl std::fmt::Debug for NetworkTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkTransport")
            .field("config", self.config())
            .field("callback_port", &self.callback_port())
            .finish()
    }
}
