//! UPnP control point
//!
//! Builds navigable device trees from the devices a discovery transport
//! reports, invokes service actions with typed arguments and manages
//! asynchronous discovery sessions.
//!
//! - [`Device`] / [`Service`] / [`Action`]: the device tree, built from
//!   description documents fetched over HTTP
//! - [`FindManager`]: one discovery session, keeping the discovered devices
//!   itself or handing raw notifications to the caller
//! - [`DispatchMode`]: how notifications reach client callbacks
//!
//! The transport contracts and a network implementation live in
//! `upnp_transport`.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use upnp_cp::{device_types, FindManager, FinderManagerClient};
//! use upnp_transport::network::{NetworkConfig, NetworkTransport};
//!
//! let transport = NetworkTransport::new(NetworkConfig::default())?;
//! let manager = FindManager::new(Arc::new(transport.finder()));
//! manager.configure_internal(Arc::new(Printer), device_types::ROOT_DEVICE)?;
//! manager.start()?;
//! ```

mod action;
mod callback;
mod config;
mod device;
pub mod device_types;
mod dispatch;
mod error;
mod find_manager;
pub mod logging;
mod service;

pub use action::{Action, InputArgument, Invocation, INVOKE_FAILED, RETURN_VALUE_ONLY};
pub use callback::{FinderCallbackClient, FinderManagerClient, ServiceCallbackClient};
pub use config::{CpConfig, IconRequest};
pub use device::{Device, DeviceVisitor};
pub use dispatch::DispatchMode;
pub use error::{CpError, Result};
pub use find_manager::{CollectionMode, FindManager, SearchState};
pub use service::Service;
