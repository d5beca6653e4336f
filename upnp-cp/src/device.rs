//! Device trees built from transport device handles.
//!
//! A root [`Device`] downloads its description document and then builds its
//! services and embedded devices top-down. Every device in one tree shares the
//! root's document accessor; services derive their own accessor from it.
//! Construction is all-or-nothing: any failing service or child fails the
//! whole tree.

use std::sync::{Arc, Weak};

use description_client::{join_url, DocAccess, FetchOptions, IconParam};
use upnp_transport::{DeviceHandle, DeviceProperty};

use crate::config::{CpConfig, IconRequest};
use crate::dispatch::Dispatcher;
use crate::error::{CpError, Result};
use crate::service::Service;

/// Visitor for [`Device::enumerate_devices`]
pub trait DeviceVisitor {
    fn visit(&mut self, device: &Arc<Device>);
}

impl<F> DeviceVisitor for F
where
    F: FnMut(&Arc<Device>),
{
    fn visit(&mut self, device: &Arc<Device>) {
        self(device)
    }
}

/// A root or embedded device with its services and children
pub struct Device {
    handle: Arc<dyn DeviceHandle>,
    parent: Weak<Device>,
    root: bool,
    udn: String,
    name: String,
    device_type: String,
    access: Arc<DocAccess>,
    icons: Vec<IconParam>,
    devices: Vec<Arc<Device>>,
    services: Vec<Arc<Service>>,
    icon_request: IconRequest,
}

struct BuildContext<'a> {
    access: &'a Arc<DocAccess>,
    options: FetchOptions,
    icon_request: &'a IconRequest,
    dispatcher: &'a Arc<Dispatcher>,
}

impl Device {
    /// Build the device tree rooted at `handle`.
    ///
    /// Notifications of the tree's services are delivered according to
    /// `config.dispatch`.
    ///
    /// # Errors
    ///
    /// Fails when the description document cannot be fetched, when the device
    /// has no UDN or type, or when any service or embedded device fails.
    pub fn new_root(handle: Arc<dyn DeviceHandle>, config: &CpConfig) -> Result<Arc<Device>> {
        let dispatcher = Arc::new(Dispatcher::new(config.dispatch));
        Self::build_root(handle, config, &dispatcher)
    }

    pub(crate) fn build_root(
        handle: Arc<dyn DeviceHandle>,
        config: &CpConfig,
        dispatcher: &Arc<Dispatcher>,
    ) -> Result<Arc<Device>> {
        let url = handle
            .document_url()
            .ok_or_else(|| CpError::Configuration("root device without document URL".to_string()))?;

        let options = config.fetch_options();
        let mut access = DocAccess::new();
        access.load(&url, &options)?;
        let icons = access.icon_list().unwrap_or_else(|e| {
            tracing::debug!("Ignoring icon list of {}: {}", handle.udn(), e);
            Vec::new()
        });
        tracing::debug!("Loaded description of {} from {}", handle.udn(), url);

        let access = Arc::new(access);
        let context = BuildContext {
            access: &access,
            options,
            icon_request: &config.icon_request,
            dispatcher,
        };
        Self::build(handle, Weak::new(), Some(icons), &context)
    }

    fn build(
        handle: Arc<dyn DeviceHandle>,
        parent: Weak<Device>,
        icons: Option<Vec<IconParam>>,
        context: &BuildContext<'_>,
    ) -> Result<Arc<Device>> {
        let udn = handle.udn();
        let device_type = handle.device_type();
        if udn.is_empty() || device_type.is_empty() {
            return Err(CpError::Configuration("device handle without UDN or type".to_string()));
        }
        let name = display_name(handle.as_ref(), &udn);

        let mut failure = None;
        let device = Arc::new_cyclic(|this: &Weak<Device>| {
            let (services, devices) = match build_members(handle.as_ref(), this, context) {
                Ok(members) => members,
                Err(e) => {
                    failure = Some(e);
                    (Vec::new(), Vec::new())
                }
            };
            Device {
                handle: Arc::clone(&handle),
                parent,
                root: icons.is_some(),
                udn,
                name,
                device_type,
                access: Arc::clone(context.access),
                icons: icons.unwrap_or_default(),
                devices,
                services,
                icon_request: context.icon_request.clone(),
            }
        });

        match failure {
            Some(e) => {
                tracing::warn!("Failed to build device {}: {}", device.udn, e);
                Err(e)
            }
            None => Ok(device),
        }
    }

    pub fn udn(&self) -> &str {
        &self.udn
    }

    /// Display name: model name, else friendly name, else UDN, followed by ` (<udn>)`
    pub fn friendly_name(&self) -> &str {
        &self.name
    }

    pub fn device_type(&self) -> &str {
        &self.device_type
    }

    pub fn is_root(&self) -> bool {
        self.root
    }

    pub fn parent_device(&self) -> Option<Arc<Device>> {
        self.parent.upgrade()
    }

    pub fn root_device(self: &Arc<Self>) -> Arc<Device> {
        let mut current = Arc::clone(self);
        while let Some(parent) = current.parent.upgrade() {
            current = parent;
        }
        current
    }

    pub fn devices(&self) -> &[Arc<Device>] {
        &self.devices
    }

    pub fn device(&self, index: usize) -> Result<Arc<Device>> {
        self.devices
            .get(index)
            .cloned()
            .ok_or_else(|| CpError::NotFound(format!("device {index} of {}", self.udn)))
    }

    pub fn services(&self) -> &[Arc<Service>] {
        &self.services
    }

    pub fn service(&self, index: usize) -> Result<Arc<Service>> {
        self.services
            .get(index)
            .cloned()
            .ok_or_else(|| CpError::NotFound(format!("service {index} of {}", self.udn)))
    }

    /// Icons declared by the root device; empty for embedded devices
    pub fn icons(&self) -> &[IconParam] {
        &self.icons
    }

    pub fn icon(&self, index: usize) -> Result<IconParam> {
        self.icons
            .get(index)
            .cloned()
            .ok_or_else(|| CpError::NotFound(format!("icon {index} of {}", self.udn)))
    }

    /// URL of an icon of the root device.
    ///
    /// A width and height of 0 asks the transport for its preferred icon in the
    /// configured format. Otherwise the declared icons are searched for an exact
    /// size; a `depth` of 0 matches any depth. Embedded devices have no icons.
    pub fn device_icon_url(&self, width: u32, height: u32, depth: u32) -> Option<String> {
        if !self.is_root() {
            return None;
        }
        if width == 0 && height == 0 {
            let request = &self.icon_request;
            return self
                .handle
                .icon_url(&request.mime_type, request.width, request.height, request.depth);
        }
        self.icons
            .iter()
            .find(|icon| icon.matches(width, height, depth))
            .map(|icon| join_url(self.access.base_url(), &icon.url))
    }

    /// Visit this device and then every embedded device, depth-first in discovery order
    pub fn enumerate_devices(self: &Arc<Self>, visitor: &mut dyn DeviceVisitor) {
        visitor.visit(self);
        for child in &self.devices {
            child.enumerate_devices(visitor);
        }
    }

    /// Location of the description document; embedded devices report the root's
    pub fn document_url(&self) -> &str {
        self.access.url()
    }

    pub fn document(&self) -> &str {
        self.access.document()
    }

    pub fn access_data(&self) -> &DocAccess {
        &self.access
    }

    pub fn handle(&self) -> &Arc<dyn DeviceHandle> {
        &self.handle
    }

    /// Labelled device fields for display; optional fields only when present
    pub fn device_info(&self) -> Vec<(&'static str, String)> {
        let mut info = vec![
            ("Friendly name", self.name.clone()),
            ("Type", self.device_type.clone()),
            ("UDN", self.udn.clone()),
            ("Document URL", self.document_url().to_string()),
        ];
        let optional = [
            ("Description", DeviceProperty::Description),
            ("Manufacturer", DeviceProperty::Manufacturer),
            ("Manufacturer URL", DeviceProperty::ManufacturerUrl),
            ("Model URL", DeviceProperty::ModelUrl),
            ("Model number", DeviceProperty::ModelNumber),
            ("Serial number", DeviceProperty::SerialNumber),
            ("UPC", DeviceProperty::Upc),
            ("Presentation URL", DeviceProperty::PresentationUrl),
        ];
        for (label, property) in optional {
            if let Some(value) = non_empty(self.handle.property(property)) {
                info.push((label, value));
            }
        }
        info
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("udn", &self.udn)
            .field("name", &self.name)
            .field("device_type", &self.device_type)
            .field("devices", &self.devices)
            .field("services", &self.services)
            .finish()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn display_name(handle: &dyn DeviceHandle, udn: &str) -> String {
    let base = non_empty(handle.property(DeviceProperty::ModelName))
        .or_else(|| non_empty(handle.property(DeviceProperty::FriendlyName)))
        .unwrap_or_else(|| udn.to_string());
    format!("{base} ({udn})")
}

type Members = (Vec<Arc<Service>>, Vec<Arc<Device>>);

fn build_members(handle: &dyn DeviceHandle, this: &Weak<Device>, context: &BuildContext<'_>) -> Result<Members> {
    let enumeration = handle.services()?;
    let mut services = Vec::with_capacity(enumeration.items.len());
    for service in enumeration.items {
        services.push(Service::build(
            service,
            this.clone(),
            context.access,
            &context.options,
            context.dispatcher,
        )?);
    }
    check_reported("services", enumeration.reported, services.len())?;

    let mut devices = Vec::new();
    if handle.has_children() {
        let enumeration = handle.children()?;
        for child in enumeration.items {
            devices.push(Device::build(child, this.clone(), None, context)?);
        }
        check_reported("devices", enumeration.reported, devices.len())?;
    }
    Ok((services, devices))
}

fn check_reported(what: &str, reported: usize, built: usize) -> Result<()> {
    if reported != built {
        return Err(CpError::Configuration(format!(
            "transport reported {reported} {what}, {built} built"
        )));
    }
    Ok(())
}
