//! Control point configuration

use std::time::Duration;

use description_client::FetchOptions;

use crate::dispatch::DispatchMode;

/// Icon format requested from the transport by the canonical icon lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconRequest {
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

impl Default for IconRequest {
    fn default() -> Self {
        Self {
            mime_type: "image/png".to_string(),
            width: 32,
            height: 32,
            depth: 16,
        }
    }
}

/// Configuration for device construction and notification dispatch
#[derive(Debug, Clone)]
pub struct CpConfig {
    /// Receive timeout for description document fetches from loopback hosts
    ///
    /// Fetches from other hosts, and all fetches when this is zero, wait
    /// without a timeout.
    ///
    /// Default: 100 milliseconds
    pub fetch_timeout: Duration,

    /// How transport notifications reach client handlers
    ///
    /// Default: [`DispatchMode::Detached`]
    pub dispatch: DispatchMode,

    /// Format used by [`crate::Device::device_icon_url`] when no size is given
    ///
    /// Default: `image/png`, 32x32, 16 bit
    pub icon_request: IconRequest,
}

impl Default for CpConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_millis(100),
            dispatch: DispatchMode::default(),
            icon_request: IconRequest::default(),
        }
    }
}

impl CpConfig {
    pub fn with_dispatch(mut self, dispatch: DispatchMode) -> Self {
        self.dispatch = dispatch;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub(crate) fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            timeout: self.fetch_timeout,
        }
    }
}
