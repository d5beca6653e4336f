//! In-memory transport doubles for tests.
//!
//! Enabled for this crate's own tests and, through the `test-support` feature,
//! for crates that build on the transport contracts.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicI32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::codes;
use crate::error::{Result, TransportError};
use crate::handle::{
    DeviceFinder, DeviceHandle, DeviceProperty, Enumeration, FindHandle, FinderListener, InvokeFailure,
    InvokeOutput, ServiceHandle, ServiceListener,
};
use crate::value::WireValue;

/// Scripted device handle
#[derive(Debug, Default)]
pub struct MockDevice {
    udn: String,
    device_type: String,
    properties: HashMap<DeviceProperty, String>,
    document_url: Option<String>,
    children: Vec<Arc<MockDevice>>,
    services: Vec<Arc<MockService>>,
    reported_children: Option<usize>,
    reported_services: Option<usize>,
    icon: Option<String>,
    icon_requests: Mutex<Vec<(String, u32, u32, u32)>>,
}

impl MockDevice {
    pub fn new(udn: &str, device_type: &str) -> Self {
        Self {
            udn: udn.to_string(),
            device_type: device_type.to_string(),
            ..Self::default()
        }
    }

    pub fn with_property(mut self, property: DeviceProperty, value: &str) -> Self {
        self.properties.insert(property, value.to_string());
        self
    }

    pub fn with_document_url(mut self, url: &str) -> Self {
        self.document_url = Some(url.to_string());
        self
    }

    pub fn with_child(mut self, child: MockDevice) -> Self {
        self.children.push(Arc::new(child));
        self
    }

    pub fn with_service(mut self, service: Arc<MockService>) -> Self {
        self.services.push(service);
        self
    }

    /// Report a child count different from the children actually enumerated
    pub fn with_reported_children(mut self, count: usize) -> Self {
        self.reported_children = Some(count);
        self
    }

    /// Report a service count different from the services actually enumerated
    pub fn with_reported_services(mut self, count: usize) -> Self {
        self.reported_services = Some(count);
        self
    }

    /// URL answered by every icon lookup
    pub fn with_icon(mut self, url: &str) -> Self {
        self.icon = Some(url.to_string());
        self
    }

    /// Parameters of every icon lookup so far
    pub fn icon_requests(&self) -> Vec<(String, u32, u32, u32)> {
        self.icon_requests.lock().clone()
    }
}

impl DeviceHandle for MockDevice {
    fn udn(&self) -> String {
        self.udn.clone()
    }

    fn device_type(&self) -> String {
        self.device_type.clone()
    }

    fn property(&self, property: DeviceProperty) -> Option<String> {
        self.properties.get(&property).cloned()
    }

    fn document_url(&self) -> Option<String> {
        self.document_url.clone()
    }

    fn has_children(&self) -> bool {
        !self.children.is_empty() || self.reported_children.is_some_and(|n| n > 0)
    }

    fn children(&self) -> Result<Enumeration<Arc<dyn DeviceHandle>>> {
        let items: Vec<Arc<dyn DeviceHandle>> = self
            .children
            .iter()
            .map(|c| Arc::clone(c) as Arc<dyn DeviceHandle>)
            .collect();
        Ok(Enumeration {
            reported: self.reported_children.unwrap_or(items.len()),
            items,
        })
    }

    fn services(&self) -> Result<Enumeration<Arc<dyn ServiceHandle>>> {
        let items: Vec<Arc<dyn ServiceHandle>> = self
            .services
            .iter()
            .map(|s| Arc::clone(s) as Arc<dyn ServiceHandle>)
            .collect();
        Ok(Enumeration {
            reported: self.reported_services.unwrap_or(items.len()),
            items,
        })
    }

    fn icon_url(&self, mime_type: &str, width: u32, height: u32, depth: u32) -> Option<String> {
        self.icon_requests
            .lock()
            .push((mime_type.to_string(), width, height, depth));
        self.icon.clone()
    }
}

type Responder = dyn Fn(&str, &[WireValue]) -> std::result::Result<InvokeOutput, InvokeFailure> + Send + Sync;

/// Scripted service handle
pub struct MockService {
    id: String,
    service_type: String,
    responder: Mutex<Box<Responder>>,
    calls: Mutex<Vec<(String, Vec<WireValue>)>>,
    listeners: Mutex<Vec<Arc<dyn ServiceListener>>>,
    status: AtomicI32,
    reject_callbacks: bool,
}

impl MockService {
    /// A service whose actions all succeed with no outputs
    pub fn new(id: &str, service_type: &str) -> Self {
        Self {
            id: id.to_string(),
            service_type: service_type.to_string(),
            responder: Mutex::new(Box::new(|_: &str, _: &[WireValue]| Ok::<_, InvokeFailure>(InvokeOutput::default()))),
            calls: Mutex::new(Vec::new()),
            listeners: Mutex::new(Vec::new()),
            status: AtomicI32::new(0),
            reject_callbacks: false,
        }
    }

    /// Answer invocations with `responder`
    pub fn responding<F>(self, responder: F) -> Self
    where
        F: Fn(&str, &[WireValue]) -> std::result::Result<InvokeOutput, InvokeFailure> + Send + Sync + 'static,
    {
        *self.responder.lock() = Box::new(responder);
        self
    }

    /// Refuse every listener registration
    pub fn rejecting_callbacks(mut self) -> Self {
        self.reject_callbacks = true;
        self
    }

    pub fn set_status(&self, status: i32) {
        self.status.store(status, Ordering::Relaxed);
    }

    /// Every invocation so far, with its inputs
    pub fn calls(&self) -> Vec<(String, Vec<WireValue>)> {
        self.calls.lock().clone()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    /// Deliver a state variable change to every registered listener
    pub fn emit_change(&self, variable: &str, value: WireValue) {
        for listener in self.listeners.lock().clone() {
            listener.state_variable_changed(variable, &value);
        }
    }

    pub fn emit_died(&self) {
        for listener in self.listeners.lock().clone() {
            listener.service_instance_died();
        }
    }
}

impl fmt::Debug for MockService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockService")
            .field("id", &self.id)
            .field("service_type", &self.service_type)
            .finish()
    }
}

impl ServiceHandle for MockService {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn service_type(&self) -> String {
        self.service_type.clone()
    }

    fn last_transport_status(&self) -> i32 {
        self.status.load(Ordering::Relaxed)
    }

    fn invoke_action(&self, action: &str, inputs: &[WireValue]) -> std::result::Result<InvokeOutput, InvokeFailure> {
        self.calls.lock().push((action.to_string(), inputs.to_vec()));
        let result = {
            let responder = self.responder.lock();
            (**responder)(action, inputs)
        };
        if let Err(failure) = &result {
            if failure.code == codes::TRANSPORT_ERROR {
                self.status.store(-1, Ordering::Relaxed);
            }
        }
        result
    }

    fn add_callback(&self, listener: Arc<dyn ServiceListener>) -> Result<()> {
        if self.reject_callbacks {
            return Err(TransportError::Subscription(format!("{} does not send events", self.id)));
        }
        self.listeners.lock().push(listener);
        Ok(())
    }
}

#[derive(Clone)]
struct Registration {
    filter: String,
    listener: Arc<dyn FinderListener>,
}

/// Finder that records registrations and lets tests inject notifications
#[derive(Default)]
pub struct MockFinder {
    next_handle: AtomicU64,
    registrations: Mutex<BTreeMap<FindHandle, Registration>>,
    started: Mutex<Vec<FindHandle>>,
    created: AtomicUsize,
    fail_start: bool,
}

impl MockFinder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A finder whose `start_async_find` always fails
    pub fn failing_start() -> Self {
        Self {
            fail_start: true,
            ..Self::default()
        }
    }

    /// Listener registered for `find`, if the search is still registered
    pub fn listener(&self, find: FindHandle) -> Option<Arc<dyn FinderListener>> {
        self.registrations.lock().get(&find).map(|r| Arc::clone(&r.listener))
    }

    pub fn filter(&self, find: FindHandle) -> Option<String> {
        self.registrations.lock().get(&find).map(|r| r.filter.clone())
    }

    /// Number of searches currently registered
    pub fn active_registrations(&self) -> usize {
        self.registrations.lock().len()
    }

    /// Number of searches ever created
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn is_started(&self, find: FindHandle) -> bool {
        self.started.lock().contains(&find)
    }

    /// Most recently created search handle
    pub fn last_handle(&self) -> Option<FindHandle> {
        self.registrations.lock().keys().next_back().copied()
    }

    /// Deliver `device_added` to the listener of `find` as if the transport found `device`
    pub fn emit_added(&self, find: FindHandle, device: Arc<dyn DeviceHandle>) {
        if let Some(listener) = self.listener(find) {
            listener.device_added(find, device);
        }
    }

    pub fn emit_removed(&self, find: FindHandle, udn: &str) {
        if let Some(listener) = self.listener(find) {
            listener.device_removed(find, udn);
        }
    }

    pub fn emit_complete(&self, find: FindHandle) {
        if let Some(listener) = self.listener(find) {
            listener.search_complete(find);
        }
    }
}

impl DeviceFinder for MockFinder {
    fn create_async_find(&self, filter: &str, listener: Arc<dyn FinderListener>) -> Result<FindHandle> {
        let handle = FindHandle(self.next_handle.fetch_add(1, Ordering::SeqCst) + 1);
        self.created.fetch_add(1, Ordering::SeqCst);
        self.registrations.lock().insert(
            handle,
            Registration {
                filter: filter.to_string(),
                listener,
            },
        );
        Ok(handle)
    }

    fn start_async_find(&self, find: FindHandle) -> Result<()> {
        if self.fail_start {
            return Err(TransportError::Network("search could not be started".to_string()));
        }
        if !self.registrations.lock().contains_key(&find) {
            return Err(TransportError::InvalidHandle(find));
        }
        self.started.lock().push(find);
        Ok(())
    }

    fn cancel_async_find(&self, find: FindHandle) -> Result<()> {
        self.started.lock().retain(|f| *f != find);
        self.registrations
            .lock()
            .remove(&find)
            .map(|_| ())
            .ok_or(TransportError::InvalidHandle(find))
    }
}
