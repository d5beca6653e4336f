//! Discovery and RPC transport for UPnP control points
//!
//! This crate defines the contracts a control point consumes from a discovery/RPC
//! transport ([`DeviceFinder`], [`DeviceHandle`], [`ServiceHandle`] and the listener
//! traits), the typed wire value model used for action arguments and events, and
//! the table of control point error codes.
//!
//! The [`network`] module provides an implementation of the contracts over SSDP,
//! SOAP and GENA.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use upnp_transport::network::{NetworkConfig, NetworkTransport};
//! use upnp_transport::{DeviceFinder, FinderListener};
//!
//! let transport = NetworkTransport::new(NetworkConfig::default())?;
//! let finder = transport.finder();
//! let find = finder.create_async_find("upnp:rootdevice", Arc::new(MyListener))?;
//! finder.start_async_find(find)?;
//! ```

pub mod codes;
mod error;
mod handle;
pub mod network;
mod value;

#[cfg(any(test, feature = "test-support"))]
pub mod mock;

pub use error::{Result, TransportError};
pub use handle::{
    DeviceFinder, DeviceHandle, DeviceProperty, Enumeration, FindHandle, FinderListener, InvokeFailure,
    InvokeOutput, ServiceHandle, ServiceListener,
};
pub use value::{type_description, wire_type, BinaryEncoding, WireType, WireValue};
