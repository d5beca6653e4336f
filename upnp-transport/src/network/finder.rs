//! Asynchronous SSDP search.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;

use super::ssdp::SsdpClient;
use super::NetworkTransport;
use crate::error::{Result, TransportError};
use crate::handle::{DeviceFinder, DeviceHandle, FindHandle, FinderListener};

struct Search {
    filter: String,
    listener: Arc<dyn FinderListener>,
    cancelled: Arc<AtomicBool>,
    started: bool,
}

/// [`DeviceFinder`] that multicasts one M-SEARCH per started search.
///
/// Each search runs on its own thread: responses are deduplicated by UDN, the
/// description of every new device is downloaded and reported through
/// `device_added`, and `search_complete` follows once the response window
/// closes. Devices leaving the network are not tracked, so `device_removed` is
/// never emitted.
pub struct SsdpFinder {
    transport: NetworkTransport,
    next_handle: AtomicU64,
    searches: Mutex<HashMap<FindHandle, Search>>,
}

impl SsdpFinder {
    pub fn new(transport: NetworkTransport) -> Self {
        Self {
            transport,
            next_handle: AtomicU64::new(1),
            searches: Mutex::new(HashMap::new()),
        }
    }
}

impl DeviceFinder for SsdpFinder {
    fn create_async_find(&self, filter: &str, listener: Arc<dyn FinderListener>) -> Result<FindHandle> {
        let handle = FindHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        self.searches.lock().insert(
            handle,
            Search {
                filter: filter.to_string(),
                listener,
                cancelled: Arc::new(AtomicBool::new(false)),
                started: false,
            },
        );
        tracing::debug!("Created search {} for {}", handle, filter);
        Ok(handle)
    }

    fn start_async_find(&self, find: FindHandle) -> Result<()> {
        let (filter, listener, cancelled) = {
            let mut searches = self.searches.lock();
            let search = searches.get_mut(&find).ok_or(TransportError::InvalidHandle(find))?;
            if search.started {
                return Ok(());
            }
            search.started = true;
            (
                search.filter.clone(),
                Arc::clone(&search.listener),
                Arc::clone(&search.cancelled),
            )
        };

        let transport = self.transport.clone();
        thread::Builder::new()
            .name(format!("upnp-search-{}", find.0))
            .spawn(move || run_search(&transport, find, &filter, listener.as_ref(), &cancelled))
            .map_err(|e| TransportError::Network(format!("Failed to spawn search thread: {e}")))?;
        Ok(())
    }

    fn cancel_async_find(&self, find: FindHandle) -> Result<()> {
        let search = self
            .searches
            .lock()
            .remove(&find)
            .ok_or(TransportError::InvalidHandle(find))?;
        search.cancelled.store(true, Ordering::SeqCst);
        tracing::debug!("Cancelled search {}", find);
        Ok(())
    }
}

impl Drop for SsdpFinder {
    fn drop(&mut self) {
        for search in self.searches.get_mut().values() {
            search.cancelled.store(true, Ordering::SeqCst);
        }
    }
}

fn run_search(
    transport: &NetworkTransport,
    find: FindHandle,
    filter: &str,
    listener: &dyn FinderListener,
    cancelled: &AtomicBool,
) {
    let is_cancelled = || cancelled.load(Ordering::SeqCst);
    let config = transport.config();

    match SsdpClient::new(config.search_window) {
        Ok(client) => match client.search(filter, config.search_mx) {
            Ok(responses) => {
                let mut seen = HashSet::new();
                for response in responses {
                    if is_cancelled() {
                        return;
                    }
                    let response = match response {
                        Ok(response) => response,
                        Err(e) => {
                            tracing::warn!("Search {} aborted: {}", find, e);
                            break;
                        }
                    };
                    if !seen.insert(response.udn().to_string()) {
                        continue;
                    }
                    match transport.device(&response.location) {
                        Ok(device) if !is_cancelled() => {
                            tracing::info!("Found {} at {}", response.udn(), response.location);
                            listener.device_added(find, device as Arc<dyn DeviceHandle>);
                        }
                        Ok(_) => return,
                        Err(e) => tracing::warn!("Skipping {}: {}", response.location, e),
                    }
                }
            }
            Err(e) => tracing::warn!("Search {} failed: {}", find, e),
        },
        Err(e) => tracing::warn!("Search {} failed: {}", find, e),
    }

    if !is_cancelled() {
        listener.search_complete(find);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::NetworkConfig;

    struct Silent;

    impl FinderListener for Silent {
        fn device_added(&self, _: FindHandle, _: Arc<dyn DeviceHandle>) {}
        fn device_removed(&self, _: FindHandle, _: &str) {}
        fn search_complete(&self, _: FindHandle) {}
    }

    fn finder() -> SsdpFinder {
        NetworkTransport::new(NetworkConfig::default()).unwrap().finder()
    }

    #[test]
    fn test_handles_are_unique() {
        let finder = finder();
        let a = finder.create_async_find("upnp:rootdevice", Arc::new(Silent)).unwrap();
        let b = finder.create_async_find("upnp:rootdevice", Arc::new(Silent)).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_unknown_handle_is_rejected() {
        let finder = finder();
        assert!(matches!(
            finder.start_async_find(FindHandle(99)),
            Err(TransportError::InvalidHandle(FindHandle(99)))
        ));
        assert!(finder.cancel_async_find(FindHandle(99)).is_err());
    }

    #[test]
    fn test_cancel_unregisters() {
        let finder = finder();
        let find = finder.create_async_find("ssdp:all", Arc::new(Silent)).unwrap();
        finder.cancel_async_find(find).unwrap();
        assert!(finder.cancel_async_find(find).is_err());
        assert!(finder.start_async_find(find).is_err());
    }
}
