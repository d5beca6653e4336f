//! Client callback contracts and the adapters that bridge transport listeners to them.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use upnp_transport::{DeviceHandle, FindHandle, FinderListener, ServiceListener, WireValue};

use crate::device::Device;
use crate::dispatch::Dispatcher;
use crate::service::Service;

/// Receiver of service state notifications
pub trait ServiceCallbackClient: Send + Sync {
    fn variable_changed(&self, service: &Arc<Service>, variable: &str, value: &WireValue);

    fn instance_died(&self, service: &Arc<Service>);
}

/// Receiver of raw search notifications for a caller-managed device collection.
///
/// `lock` and `unlock` bracket every add and remove notification so the
/// client can guard its own collection.
pub trait FinderCallbackClient: Send + Sync {
    fn device_added(&self, find: FindHandle, device: Arc<dyn DeviceHandle>);

    fn device_removed(&self, find: FindHandle, udn: &str);

    fn search_complete(&self, find: FindHandle);

    fn lock(&self) {}

    fn unlock(&self) {}
}

/// Receiver of session notifications when the session manages the collection
pub trait FinderManagerClient: Send + Sync {
    fn on_start(&self, find: FindHandle);

    /// `cancelled` is true when the search was stopped by the caller
    fn on_stop(&self, find: FindHandle, cancelled: bool);

    fn on_device_added(&self, find: FindHandle, device: &Arc<Device>, index: usize);

    fn on_device_removed(&self, find: FindHandle, udn: &str, friendly_name: &str, index: usize);
}

/// Holds the client lock for the duration of one notification
struct ClientLock<'a> {
    client: &'a dyn FinderCallbackClient,
}

impl<'a> ClientLock<'a> {
    fn acquire(client: &'a dyn FinderCallbackClient) -> Self {
        client.lock();
        Self { client }
    }
}

impl Drop for ClientLock<'_> {
    fn drop(&mut self) {
        self.client.unlock();
    }
}

/// Search listener registered with the transport on behalf of one session
pub(crate) struct FinderAdapter {
    target: Mutex<Option<Arc<dyn FinderCallbackClient>>>,
    dispatcher: Arc<Dispatcher>,
}

impl FinderAdapter {
    pub fn new(target: Arc<dyn FinderCallbackClient>, dispatcher: Arc<Dispatcher>) -> Arc<Self> {
        Arc::new(Self {
            target: Mutex::new(Some(target)),
            dispatcher,
        })
    }

    /// Detach from the client; notifications arriving afterwards are dropped
    pub fn release(&self) {
        self.target.lock().take();
    }

    pub fn is_released(&self) -> bool {
        self.target.lock().is_none()
    }

    fn target(&self, event: &str, find: FindHandle) -> Option<Arc<dyn FinderCallbackClient>> {
        let target = self.target.lock().clone();
        if target.is_none() {
            tracing::debug!("Dropping {} for {}: listener released", event, find);
        }
        target
    }
}

impl FinderListener for FinderAdapter {
    fn device_added(&self, find: FindHandle, device: Arc<dyn DeviceHandle>) {
        let Some(client) = self.target("device_added", find) else {
            return;
        };
        self.dispatcher.dispatch(
            "device-added",
            Box::new(move || {
                let _guard = ClientLock::acquire(client.as_ref());
                client.device_added(find, device);
            }),
        );
    }

    fn device_removed(&self, find: FindHandle, udn: &str) {
        let Some(client) = self.target("device_removed", find) else {
            return;
        };
        let udn = udn.to_string();
        self.dispatcher.dispatch(
            "device-removed",
            Box::new(move || {
                let _guard = ClientLock::acquire(client.as_ref());
                client.device_removed(find, &udn);
            }),
        );
    }

    fn search_complete(&self, find: FindHandle) {
        let Some(client) = self.target("search_complete", find) else {
            return;
        };
        self.dispatcher
            .dispatch("search-complete", Box::new(move || client.search_complete(find)));
    }
}

/// State listener registered with the transport on behalf of one service
pub(crate) struct ServiceEventAdapter {
    service: Weak<Service>,
    client: Mutex<Option<Arc<dyn ServiceCallbackClient>>>,
    dispatcher: Arc<Dispatcher>,
}

impl ServiceEventAdapter {
    pub fn new(service: Weak<Service>, dispatcher: Arc<Dispatcher>) -> Arc<Self> {
        Arc::new(Self {
            service,
            client: Mutex::new(None),
            dispatcher,
        })
    }

    pub fn set_client(&self, client: Arc<dyn ServiceCallbackClient>) {
        *self.client.lock() = Some(client);
    }

    pub fn has_client(&self) -> bool {
        self.client.lock().is_some()
    }

    fn recipient(&self) -> Option<(Arc<Service>, Arc<dyn ServiceCallbackClient>)> {
        let client = self.client.lock().clone()?;
        let service = self.service.upgrade()?;
        Some((service, client))
    }
}

impl ServiceListener for ServiceEventAdapter {
    fn state_variable_changed(&self, variable: &str, value: &WireValue) {
        let Some((service, client)) = self.recipient() else {
            tracing::debug!("Dropping change of {}: no recipient", variable);
            return;
        };
        let variable = variable.to_string();
        let value = value.clone();
        self.dispatcher.dispatch(
            "variable-changed",
            Box::new(move || client.variable_changed(&service, &variable, &value)),
        );
    }

    fn service_instance_died(&self) {
        let Some((service, client)) = self.recipient() else {
            return;
        };
        tracing::warn!("Service {} reported instance died", service.id());
        self.dispatcher
            .dispatch("instance-died", Box::new(move || client.instance_died(&service)));
    }
}
