//! Services of a device, built from their SCPD documents.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use description_client::{join_url, DocAccess, FetchOptions};
use upnp_transport::{ServiceHandle, ServiceListener};

use crate::action::Action;
use crate::callback::{ServiceCallbackClient, ServiceEventAdapter};
use crate::device::Device;
use crate::dispatch::Dispatcher;
use crate::error::{CpError, Result};

/// A service of a [`Device`] with its actions
pub struct Service {
    handle: Arc<dyn ServiceHandle>,
    parent: Weak<Device>,
    id: String,
    service_type: String,
    access: DocAccess,
    actions: Vec<Arc<Action>>,
    events: Arc<ServiceEventAdapter>,
    subscribed: AtomicBool,
}

impl Service {
    /// Build a service from its handle, fetching its description relative to
    /// the owning device's document.
    pub(crate) fn build(
        handle: Arc<dyn ServiceHandle>,
        parent: Weak<Device>,
        device_access: &DocAccess,
        options: &FetchOptions,
        dispatcher: &Arc<Dispatcher>,
    ) -> Result<Arc<Service>> {
        let id = handle.id();
        let service_type = handle.service_type();
        if id.is_empty() || service_type.is_empty() {
            return Err(CpError::Configuration(
                "service handle without id or type".to_string(),
            ));
        }

        let access = service_document(device_access, &id, options)
            .map_err(|e| CpError::Configuration(format!("description of {id}: {e}")))?;
        let names = access
            .action_names()
            .map_err(|e| CpError::Configuration(format!("actions of {id}: {e}")))?;
        tracing::debug!("Service {} declares {} actions", id, names.len());

        Ok(Arc::new_cyclic(|this: &Weak<Service>| Service {
            actions: names
                .into_iter()
                .map(|name| Arc::new(Action::new(name, this.clone())))
                .collect(),
            events: ServiceEventAdapter::new(this.clone(), Arc::clone(dispatcher)),
            subscribed: AtomicBool::new(false),
            handle,
            parent,
            id,
            service_type,
            access,
        }))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn service_type(&self) -> &str {
        &self.service_type
    }

    pub fn actions(&self) -> &[Arc<Action>] {
        &self.actions
    }

    pub fn action(&self, index: usize) -> Result<Arc<Action>> {
        self.actions
            .get(index)
            .cloned()
            .ok_or_else(|| CpError::NotFound(format!("action {index} of {}", self.id)))
    }

    pub fn action_by_name(&self, name: &str) -> Option<Arc<Action>> {
        self.actions.iter().find(|a| a.name() == name).cloned()
    }

    /// Absolute URL of the service description
    pub fn scpd_url(&self) -> &str {
        self.access.url()
    }

    pub fn scpd_content(&self) -> &str {
        self.access.document()
    }

    pub fn access_data(&self) -> &DocAccess {
        &self.access
    }

    pub fn last_transport_status(&self) -> i32 {
        self.handle.last_transport_status()
    }

    pub fn parent_device(&self) -> Option<Arc<Device>> {
        self.parent.upgrade()
    }

    pub fn handle(&self) -> &Arc<dyn ServiceHandle> {
        &self.handle
    }

    /// Route state change notifications of this service to `client`.
    ///
    /// The listener is registered with the transport on the first call; later
    /// calls only replace the recipient.
    pub fn set_event_callback(&self, client: Arc<dyn ServiceCallbackClient>) -> Result<()> {
        self.events.set_client(client);
        if self.subscribed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let listener: Arc<dyn ServiceListener> = self.events.clone();
        if let Err(e) = self.handle.add_callback(listener) {
            self.subscribed.store(false, Ordering::SeqCst);
            tracing::warn!("Event registration for {} failed: {}", self.id, e);
            return Err(e.into());
        }
        tracing::debug!("Registered event listener for {}", self.id);
        Ok(())
    }

    pub fn has_event_callback(&self) -> bool {
        self.subscribed.load(Ordering::SeqCst) && self.events.has_client()
    }

    /// Labelled service fields for display
    pub fn service_info(&self) -> Vec<(&'static str, String)> {
        let status = self.last_transport_status();
        vec![
            ("Service ID", self.id.clone()),
            ("Service type", self.service_type.clone()),
            ("SCPD URL", self.scpd_url().to_string()),
            (
                "Last status",
                if status > 0 { status.to_string() } else { String::new() },
            ),
        ]
    }

    /// State variable names mapped to whether they are evented
    pub fn service_variables(&self) -> Result<BTreeMap<String, bool>> {
        let variables = self.access.state_variables()?;
        Ok(variables
            .into_iter()
            .map(|(name, events)| {
                let evented = events.trim().eq_ignore_ascii_case("yes");
                (name, evented)
            })
            .collect())
    }
}

impl std::fmt::Debug for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Service")
            .field("id", &self.id)
            .field("service_type", &self.service_type)
            .field("scpd_url", &self.access.url())
            .field("actions", &self.actions.len())
            .finish()
    }
}

/// Derive and fetch the SCPD document of `service_id` from the device document.
fn service_document(device_access: &DocAccess, service_id: &str, options: &FetchOptions) -> Result<DocAccess> {
    let mut access = device_access.clone();
    let path = access.service_doc_path(service_id)?;
    let url = join_url(device_access.base_url(), &path);
    access.resolve(&url)?;
    access.set_base_url(device_access.base_url());
    access.fetch(options)?;
    Ok(access)
}
