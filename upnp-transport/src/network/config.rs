//! Configuration for the network transport

use std::ops::RangeInclusive;
use std::time::Duration;

/// Tunables for SSDP search, SOAP control and GENA eventing
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// How long a search keeps listening for responses after the last one arrived
    ///
    /// Default: 3 seconds
    pub search_window: Duration,

    /// `MX` header of the M-SEARCH request, the maximum response delay in seconds
    ///
    /// Default: 2
    pub search_mx: u8,

    /// Timeout for description and SCPD downloads
    ///
    /// Default: 5 seconds
    pub description_timeout: Duration,

    /// Connect timeout for SOAP and GENA requests
    ///
    /// Default: 5 seconds
    pub connect_timeout: Duration,

    /// Read timeout for SOAP and GENA requests
    ///
    /// Default: 10 seconds
    pub read_timeout: Duration,

    /// Requested event subscription lifetime in seconds
    ///
    /// Default: 1800
    pub subscription_timeout_secs: u32,

    /// Ports tried, in order, for the event callback server
    ///
    /// Default: 3400..=3500
    pub callback_ports: RangeInclusive<u16>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            search_window: Duration::from_secs(3),
            search_mx: 2,
            description_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(10),
            subscription_timeout_secs: 1800,
            callback_ports: 3400..=3500,
        }
    }
}

impl NetworkConfig {
    pub fn with_search_window(mut self, window: Duration) -> Self {
        self.search_window = window;
        self
    }

    pub fn with_callback_ports(mut self, ports: RangeInclusive<u16>) -> Self {
        self.callback_ports = ports;
        self
    }
}
