//! Shared fixtures for control point integration tests

#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use mockito::{Mock, ServerGuard};
use upnp_transport::mock::{MockDevice, MockService};
use upnp_transport::DeviceProperty;

pub const ROOT_UDN: &str = "uuid:root-0001";
pub const CHILD_UDN: &str = "uuid:child-0002";
pub const RENDERER: &str = "urn:schemas-upnp-org:device:MediaRenderer:1";
pub const RENDERING_CONTROL_ID: &str = "urn:upnp-org:serviceId:RenderingControl";
pub const RENDERING_CONTROL: &str = "urn:schemas-upnp-org:service:RenderingControl:1";
pub const AV_TRANSPORT_ID: &str = "urn:upnp-org:serviceId:AVTransport";
pub const AV_TRANSPORT: &str = "urn:schemas-upnp-org:service:AVTransport:1";

/// Load a fixture from the fixtures directory
pub fn load_fixture(filename: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests/fixtures");
    path.push(filename);

    fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("Failed to load fixture {}: {}", filename, e))
}

fn serve(server: &mut ServerGuard, path: &str, fixture: &str) -> Mock {
    server
        .mock("GET", path)
        .with_status(200)
        .with_header("content-type", "text/xml")
        .with_body(load_fixture(fixture))
        .create()
}

/// Serve the root description and both SCPDs; returns the description location
pub fn serve_tree(server: &mut ServerGuard) -> (String, Vec<Mock>) {
    serve_tree_with(server, load_fixture("root_device.xml"))
}

/// Serve `description` in place of `root_device.xml`, with both SCPDs
pub fn serve_tree_with(server: &mut ServerGuard, description: String) -> (String, Vec<Mock>) {
    let mocks = vec![
        server
            .mock("GET", "/description.xml")
            .with_status(200)
            .with_header("content-type", "text/xml")
            .with_body(description)
            .create(),
        serve(server, "/RenderingControl/scpd.xml", "rendering_control_scpd.xml"),
        serve(server, "/AVTransport/scpd.xml", "av_transport_scpd.xml"),
    ];
    (format!("{}/description.xml", server.url()), mocks)
}

/// Transport handles matching `root_device.xml`
pub struct TreeHandles {
    pub root: Arc<MockDevice>,
    pub rendering_control: Arc<MockService>,
    pub av_transport: Arc<MockService>,
}

pub fn tree_handles(location: &str) -> TreeHandles {
    tree_handles_with(location, MockService::new(RENDERING_CONTROL_ID, RENDERING_CONTROL))
}

/// Handles whose RenderingControl service is `rendering_control`
pub fn tree_handles_with(location: &str, rendering_control: MockService) -> TreeHandles {
    let rendering_control = Arc::new(rendering_control);
    let av_transport = Arc::new(MockService::new(AV_TRANSPORT_ID, AV_TRANSPORT));

    let child = MockDevice::new(CHILD_UDN, RENDERER)
        .with_property(DeviceProperty::FriendlyName, "Study Renderer Zone")
        .with_service(av_transport.clone());
    let root = MockDevice::new(ROOT_UDN, RENDERER)
        .with_property(DeviceProperty::FriendlyName, "Study Renderer")
        .with_property(DeviceProperty::ModelName, "Renderer One")
        .with_property(DeviceProperty::Manufacturer, "Study Audio")
        .with_document_url(location)
        .with_service(rendering_control.clone())
        .with_child(child);

    TreeHandles {
        root: Arc::new(root),
        rendering_control,
        av_transport,
    }
}
