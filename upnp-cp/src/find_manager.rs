//! Discovery sessions.
//!
//! A [`FindManager`] owns at most one search at a time. In internal mode it
//! builds a [`Device`] tree for every device the transport reports and keeps
//! the roots in an ordered collection, reporting changes to a
//! [`FinderManagerClient`]. In external mode the raw notifications go straight
//! to a [`FinderCallbackClient`] and the session holds no collection.
//!
//! The collection is guarded by a reentrant session lock, so manager callbacks
//! may read it while a notification is being processed.

use std::cell::RefCell;
use std::sync::{Arc, Weak};

use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use upnp_transport::{DeviceFinder, DeviceHandle, FindHandle, FinderListener};

use crate::callback::{FinderAdapter, FinderCallbackClient, FinderManagerClient, ServiceCallbackClient};
use crate::config::CpConfig;
use crate::device::Device;
use crate::device_types::ROOT_DEVICE;
use crate::dispatch::Dispatcher;
use crate::error::{CpError, Result};

/// Lifecycle of the session's search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchState {
    /// No search registered, or the last one was stopped or completed
    #[default]
    Idle,
    /// A search is registered but not started
    Configured,
    Searching,
    /// The transport reported the end of the search; listeners are being told
    Completing,
}

/// Who owns the discovered device collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionMode {
    /// The session builds and keeps the devices
    Internal,
    /// The caller's client receives raw notifications and keeps its own devices
    External,
}

#[derive(Default)]
struct SessionState {
    find: Option<FindHandle>,
    registered: bool,
    search: SearchState,
    mode: Option<CollectionMode>,
    adapter: Option<Arc<FinderAdapter>>,
    manager: Option<Arc<dyn FinderManagerClient>>,
    devices: Vec<Arc<Device>>,
    service_client: Option<Arc<dyn ServiceCallbackClient>>,
}

impl SessionState {
    fn accepts(&self, find: FindHandle) -> bool {
        self.find == Some(find) && self.mode == Some(CollectionMode::Internal)
    }
}

struct Session {
    finder: Arc<dyn DeviceFinder>,
    config: CpConfig,
    dispatcher: Arc<Dispatcher>,
    state: ReentrantMutex<RefCell<SessionState>>,
}

type StateGuard<'a> = ReentrantMutexGuard<'a, RefCell<SessionState>>;

/// Forwards search notifications into the owning session
struct SessionClient(Weak<Session>);

impl FinderCallbackClient for SessionClient {
    fn device_added(&self, find: FindHandle, device: Arc<dyn DeviceHandle>) {
        if let Some(session) = self.0.upgrade() {
            session.on_device_added(find, device);
        }
    }

    fn device_removed(&self, find: FindHandle, udn: &str) {
        if let Some(session) = self.0.upgrade() {
            session.on_device_removed(find, udn);
        }
    }

    fn search_complete(&self, find: FindHandle) {
        if let Some(session) = self.0.upgrade() {
            session.on_search_complete(find);
        }
    }
}

impl Session {
    /// Cancel the registered search and drop everything tied to it.
    ///
    /// Must be called with the session lock held.
    fn teardown(&self, guard: &StateGuard<'_>) {
        let (find, registered, adapter, devices) = {
            let mut state = guard.borrow_mut();
            let registered = std::mem::take(&mut state.registered);
            state.search = SearchState::Idle;
            state.mode = None;
            state.manager = None;
            (
                state.find.take(),
                registered,
                state.adapter.take(),
                std::mem::take(&mut state.devices),
            )
        };

        if let (Some(find), true) = (find, registered) {
            if let Err(e) = self.finder.cancel_async_find(find) {
                tracing::debug!("Cancelling {} during teardown: {}", find, e);
            }
        }
        if let Some(adapter) = adapter {
            adapter.release();
        }
        if !devices.is_empty() {
            tracing::debug!("Discarding {} discovered devices", devices.len());
        }
    }

    fn configure(
        self: &Arc<Self>,
        target: Arc<dyn FinderCallbackClient>,
        mode: CollectionMode,
        manager: Option<Arc<dyn FinderManagerClient>>,
        filter: &str,
    ) -> Result<()> {
        if filter.trim().is_empty() {
            return Err(CpError::Configuration("empty device type filter".to_string()));
        }

        let guard = self.state.lock();
        self.teardown(&guard);

        let adapter = FinderAdapter::new(target, Arc::clone(&self.dispatcher));
        let listener: Arc<dyn FinderListener> = adapter.clone();
        let find = match self.finder.create_async_find(filter, listener) {
            Ok(find) => find,
            Err(e) => {
                adapter.release();
                return Err(e.into());
            }
        };

        let mut state = guard.borrow_mut();
        state.find = Some(find);
        state.registered = true;
        state.search = SearchState::Configured;
        state.mode = Some(mode);
        state.adapter = Some(adapter);
        state.manager = manager;
        tracing::info!("Configured {} for '{}' ({:?})", find, filter, mode);
        Ok(())
    }

    fn on_device_added(&self, find: FindHandle, handle: Arc<dyn DeviceHandle>) {
        let service_client = {
            let guard = self.state.lock();
            let state = guard.borrow();
            if !state.accepts(find) {
                tracing::debug!("Dropping stale device_added for {}", find);
                return;
            }
            state.service_client.clone()
        };

        let device = match Device::build_root(handle, &self.config, &self.dispatcher) {
            Ok(device) => device,
            Err(e) => {
                tracing::warn!("Discarding device found by {}: {}", find, e);
                return;
            }
        };

        if let Some(client) = service_client {
            device.enumerate_devices(&mut |d: &Arc<Device>| {
                for service in d.services() {
                    if let Err(e) = service.set_event_callback(Arc::clone(&client)) {
                        tracing::warn!("No events from {}: {}", service.id(), e);
                    }
                }
            });
        }

        let guard = self.state.lock();
        let (index, manager) = {
            let mut state = guard.borrow_mut();
            if !state.accepts(find) {
                tracing::debug!("Search {} was replaced while building {}", find, device.udn());
                return;
            }
            state.devices.push(Arc::clone(&device));
            (state.devices.len() - 1, state.manager.clone())
        };
        tracing::info!("Added {} at index {}", device.friendly_name(), index);

        if let Some(manager) = manager {
            manager.on_device_added(find, &device, index);
        }
    }

    fn on_device_removed(&self, find: FindHandle, udn: &str) {
        let guard = self.state.lock();
        let (removed, index, manager) = {
            let mut state = guard.borrow_mut();
            if !state.accepts(find) {
                tracing::debug!("Dropping stale device_removed for {}", find);
                return;
            }
            let Some(index) = state.devices.iter().position(|d| d.udn() == udn) else {
                tracing::debug!("Removed device {} is not in the collection", udn);
                return;
            };
            (state.devices.remove(index), index, state.manager.clone())
        };
        let name = removed.friendly_name().to_string();
        drop(removed);
        tracing::info!("Removed {} from index {}", name, index);

        if let Some(manager) = manager {
            manager.on_device_removed(find, udn, &name, index);
        }
    }

    fn on_search_complete(&self, find: FindHandle) {
        let guard = self.state.lock();
        let manager = {
            let mut state = guard.borrow_mut();
            if !state.accepts(find) {
                tracing::debug!("Dropping stale search_complete for {}", find);
                return;
            }
            state.search = SearchState::Completing;
            state.manager.clone()
        };
        tracing::info!("Search {} complete", find);

        if let Some(manager) = manager {
            manager.on_stop(find, false);
        }

        let mut state = guard.borrow_mut();
        if state.find == Some(find) && state.search == SearchState::Completing {
            state.search = SearchState::Idle;
        }
    }
}

/// Discovery session holding at most one search
///
/// # Example
///
/// ```rust,ignore
/// let manager = FindManager::new(Arc::new(transport.finder()));
/// manager.configure_internal(Arc::new(MyClient), device_types::ROOT_DEVICE)?;
/// manager.start()?;
/// ```
pub struct FindManager {
    session: Arc<Session>,
}

impl FindManager {
    pub fn new(finder: Arc<dyn DeviceFinder>) -> Self {
        Self::with_config(finder, CpConfig::default())
    }

    pub fn with_config(finder: Arc<dyn DeviceFinder>, config: CpConfig) -> Self {
        let dispatcher = Arc::new(Dispatcher::new(config.dispatch));
        Self {
            session: Arc::new(Session {
                finder,
                config,
                dispatcher,
                state: ReentrantMutex::new(RefCell::new(SessionState::default())),
            }),
        }
    }

    pub fn config(&self) -> &CpConfig {
        &self.session.config
    }

    /// Register a search whose devices the session builds and keeps.
    ///
    /// Any previous search is cancelled and its devices are discarded.
    pub fn configure_internal(&self, client: Arc<dyn FinderManagerClient>, filter: &str) -> Result<()> {
        let target: Arc<dyn FinderCallbackClient> = Arc::new(SessionClient(Arc::downgrade(&self.session)));
        self.session
            .configure(target, CollectionMode::Internal, Some(client), filter)
    }

    /// Register a search whose notifications go straight to `client`.
    ///
    /// Any previous search is cancelled and its devices are discarded.
    pub fn configure_external(&self, client: Arc<dyn FinderCallbackClient>, filter: &str) -> Result<()> {
        self.session
            .configure(client, CollectionMode::External, None, filter)
    }

    /// [`FindManager::configure_internal`] searching for root devices
    pub fn configure_root_search(&self, client: Arc<dyn FinderManagerClient>) -> Result<()> {
        self.configure_internal(client, ROOT_DEVICE)
    }

    /// Start the configured search.
    ///
    /// # Errors
    ///
    /// Returns `CpError::State` when no search is configured or it already ran.
    pub fn start(&self) -> Result<()> {
        let guard = self.session.state.lock();
        let (find, mode, manager) = {
            let state = guard.borrow();
            match (state.find, state.search) {
                (Some(find), SearchState::Configured) => (find, state.mode, state.manager.clone()),
                (None, _) => return Err(CpError::State("no search configured".to_string())),
                (Some(find), search) => {
                    return Err(CpError::State(format!("{find} cannot start while {search:?}")))
                }
            }
        };

        self.session.finder.start_async_find(find)?;
        guard.borrow_mut().search = SearchState::Searching;
        tracing::info!("Started {}", find);

        if let (Some(CollectionMode::Internal), Some(manager)) = (mode, manager) {
            manager.on_start(find);
        }
        Ok(())
    }

    /// Cancel the search.
    ///
    /// The handle stays current so notifications already in flight are still
    /// accepted.
    pub fn stop(&self) -> Result<()> {
        let guard = self.session.state.lock();
        let (find, mode, manager) = {
            let state = guard.borrow();
            match state.find {
                Some(find) if state.registered => (find, state.mode, state.manager.clone()),
                _ => return Err(CpError::State("no search to stop".to_string())),
            }
        };

        self.session.finder.cancel_async_find(find)?;
        {
            let mut state = guard.borrow_mut();
            state.registered = false;
            state.search = SearchState::Idle;
        }
        tracing::info!("Stopped {}", find);

        if let (Some(CollectionMode::Internal), Some(manager)) = (mode, manager) {
            manager.on_stop(find, true);
        }
        Ok(())
    }

    fn internal_state(&self) -> Result<StateGuard<'_>> {
        let guard = self.session.state.lock();
        if guard.borrow().mode == Some(CollectionMode::External) {
            return Err(CpError::State(
                "the device collection is managed by the external client".to_string(),
            ));
        }
        Ok(guard)
    }

    /// Number of devices in the collection
    pub fn len(&self) -> Result<usize> {
        Ok(self.internal_state()?.borrow().devices.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.internal_state()?.borrow().devices.is_empty())
    }

    pub fn device(&self, index: usize) -> Result<Arc<Device>> {
        self.internal_state()?
            .borrow()
            .devices
            .get(index)
            .cloned()
            .ok_or_else(|| CpError::NotFound(format!("device {index}")))
    }

    /// Snapshot of the collection
    pub fn devices(&self) -> Result<Vec<Arc<Device>>> {
        Ok(self.internal_state()?.borrow().devices.clone())
    }

    /// Route state changes of services on devices added from now on to `client`
    pub fn set_service_event_client(&self, client: Option<Arc<dyn ServiceCallbackClient>>) {
        self.session.state.lock().borrow_mut().service_client = client;
    }

    pub fn find_handle(&self) -> Option<FindHandle> {
        self.session.state.lock().borrow().find
    }

    pub fn search_state(&self) -> SearchState {
        self.session.state.lock().borrow().search
    }

    pub fn mode(&self) -> Option<CollectionMode> {
        self.session.state.lock().borrow().mode
    }
}

impl Drop for FindManager {
    fn drop(&mut self) {
        let guard = self.session.state.lock();
        self.session.teardown(&guard);
    }
}

impl std::fmt::Debug for FindManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let guard = self.session.state.lock();
        let state = guard.borrow();
        f.debug_struct("FindManager")
            .field("find", &state.find)
            .field("search", &state.search)
            .field("mode", &state.mode)
            .field("devices", &state.devices.len())
            .finish()
    }
}
