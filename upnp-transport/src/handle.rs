//! Contracts between the control point and a discovery/RPC transport.
//!
//! Device and service handles are opaque live objects owned by the transport.
//! Notifications flow back through listener objects registered with the transport;
//! listeners may be invoked on any thread.

use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::value::WireValue;

/// Identifier of one asynchronous search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FindHandle(pub u64);

impl fmt::Display for FindHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "find#{}", self.0)
    }
}

/// Descriptive fields a device handle may expose
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceProperty {
    FriendlyName,
    ModelName,
    ModelNumber,
    ModelUrl,
    Description,
    Manufacturer,
    ManufacturerUrl,
    SerialNumber,
    Upc,
    PresentationUrl,
}

/// Items returned by a live enumeration together with the count the transport reported
#[derive(Debug, Clone)]
pub struct Enumeration<T> {
    pub reported: usize,
    pub items: Vec<T>,
}

impl<T> Enumeration<T> {
    /// Enumeration whose reported count equals its item count
    pub fn complete(items: Vec<T>) -> Self {
        Self {
            reported: items.len(),
            items,
        }
    }
}

impl<T> Default for Enumeration<T> {
    fn default() -> Self {
        Self {
            reported: 0,
            items: Vec::new(),
        }
    }
}

/// Successful action invocation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InvokeOutput {
    /// Positional output arguments
    pub outputs: Vec<WireValue>,
    /// Return value, `WireValue::Empty` when the action has none
    pub return_value: WireValue,
}

/// Failed action invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvokeFailure {
    /// Code from [`crate::codes`]
    pub code: u32,
    /// Error description returned by the device, if any
    pub description: Option<String>,
}

impl InvokeFailure {
    pub fn new(code: u32) -> Self {
        Self {
            code,
            description: None,
        }
    }

    pub fn with_description(code: u32, description: impl Into<String>) -> Self {
        Self {
            code,
            description: Some(description.into()),
        }
    }
}

/// A live device object
pub trait DeviceHandle: Send + Sync + fmt::Debug {
    /// Unique device name; empty when the device did not advertise one
    fn udn(&self) -> String;

    /// Device type URI; empty when unknown
    fn device_type(&self) -> String;

    fn property(&self, property: DeviceProperty) -> Option<String>;

    /// Location of the description document; only root devices have one
    fn document_url(&self) -> Option<String>;

    fn has_children(&self) -> bool;

    fn children(&self) -> Result<Enumeration<Arc<dyn DeviceHandle>>>;

    fn services(&self) -> Result<Enumeration<Arc<dyn ServiceHandle>>>;

    /// URL of the icon best matching the requested format
    fn icon_url(&self, mime_type: &str, width: u32, height: u32, depth: u32) -> Option<String>;
}

/// A live service object
pub trait ServiceHandle: Send + Sync + fmt::Debug {
    fn id(&self) -> String;

    fn service_type(&self) -> String;

    /// Status of the last transport operation, 0 when none failed
    fn last_transport_status(&self) -> i32;

    fn invoke_action(
        &self,
        action: &str,
        inputs: &[WireValue],
    ) -> std::result::Result<InvokeOutput, InvokeFailure>;

    /// Register a listener for state variable changes
    fn add_callback(&self, listener: Arc<dyn ServiceListener>) -> Result<()>;
}

/// Receiver of service state notifications
pub trait ServiceListener: Send + Sync {
    fn state_variable_changed(&self, variable: &str, value: &WireValue);

    fn service_instance_died(&self);
}

/// Receiver of search notifications
pub trait FinderListener: Send + Sync {
    fn device_added(&self, find: FindHandle, device: Arc<dyn DeviceHandle>);

    fn device_removed(&self, find: FindHandle, udn: &str);

    fn search_complete(&self, find: FindHandle);
}

/// Search lifecycle primitive
pub trait DeviceFinder: Send + Sync {
    /// Register a pending search for devices matching `filter`.
    fn create_async_find(&self, filter: &str, listener: Arc<dyn FinderListener>) -> Result<FindHandle>;

    fn start_async_find(&self, find: FindHandle) -> Result<()>;

    /// Stop a search and drop its listener registration
    fn cancel_async_find(&self, find: FindHandle) -> Result<()>;
}
