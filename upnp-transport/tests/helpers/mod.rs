//! Test helpers for network transport integration tests

#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;

use mockito::{Mock, ServerGuard};

pub const RENDERING_CONTROL: &str = "urn:schemas-upnp-org:service:RenderingControl:1";

/// Load a fixture from the fixtures directory
pub fn load_fixture(filename: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests/fixtures");
    path.push(filename);

    fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("Failed to load fixture {}: {}", filename, e))
}

/// Serve the renderer description and its SCPD; returns the description location
pub fn serve_renderer(server: &mut ServerGuard) -> (String, Vec<Mock>) {
    let description = server
        .mock("GET", "/description.xml")
        .with_status(200)
        .with_header("content-type", "text/xml")
        .with_body(load_fixture("renderer_description.xml"))
        .create();
    let scpd = server
        .mock("GET", "/RenderingControl/scpd.xml")
        .with_status(200)
        .with_header("content-type", "text/xml")
        .with_body(load_fixture("rendering_control_scpd.xml"))
        .create();

    (format!("{}/description.xml", server.url()), vec![description, scpd])
}

/// SOAP envelope wrapping `body`
pub fn soap_envelope(body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?><s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/" s:encodingStyle="http://schemas.xmlsoap.org/soap/encoding/"><s:Body>{body}</s:Body></s:Envelope>"#
    )
}

/// SOAP fault carrying a UPnP error
pub fn upnp_fault(code: u16, description: &str) -> String {
    soap_envelope(&format!(
        r#"<s:Fault><faultcode>s:Client</faultcode><faultstring>UPnPError</faultstring><detail><UPnPError xmlns="urn:schemas-upnp-org:control-1-0"><errorCode>{code}</errorCode><errorDescription>{description}</errorDescription></UPnPError></detail></s:Fault>"#
    ))
}
