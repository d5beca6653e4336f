//! Network transport tests against mock HTTP servers.

mod helpers;

use helpers::{serve_renderer, soap_envelope, upnp_fault, RENDERING_CONTROL};
use mockito::{Matcher, Server};
use upnp_transport::codes;
use upnp_transport::network::{NetworkConfig, NetworkTransport};
use upnp_transport::{DeviceHandle, DeviceProperty, ServiceHandle, WireValue};

fn transport() -> NetworkTransport {
    NetworkTransport::new(NetworkConfig::default()).unwrap()
}

#[test]
fn test_load_device_from_location() {
    let mut server = Server::new();
    let (location, _mocks) = serve_renderer(&mut server);

    let device = transport().device(&location).unwrap();
    assert_eq!(device.udn(), "uuid:study-renderer-0001");
    assert_eq!(device.device_type(), "urn:schemas-upnp-org:device:MediaRenderer:1");
    assert_eq!(device.property(DeviceProperty::ModelName).as_deref(), Some("Renderer Two"));
    assert_eq!(device.document_url().as_deref(), Some(location.as_str()));

    let services = device.services().unwrap();
    assert_eq!(services.reported, 1);
    assert_eq!(services.items[0].service_type(), RENDERING_CONTROL);
}

#[test]
fn test_missing_description_is_network_error() {
    let mut server = Server::new();
    let _mock = server.mock("GET", "/description.xml").with_status(404).create();

    let location = format!("{}/description.xml", server.url());
    assert!(transport().device(&location).is_err());
}

#[test]
fn test_invoke_returns_typed_outputs() {
    let mut server = Server::new();
    let (location, _mocks) = serve_renderer(&mut server);
    let control = server
        .mock("POST", "/RenderingControl/control")
        .match_header("soapaction", format!("\"{RENDERING_CONTROL}#GetVolume\"").as_str())
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex("<InstanceID>0</InstanceID>".to_string()),
            Matcher::Regex("<Channel>Master</Channel>".to_string()),
        ]))
        .with_status(200)
        .with_header("content-type", "text/xml")
        .with_body(soap_envelope(&format!(
            r#"<u:GetVolumeResponse xmlns:u="{RENDERING_CONTROL}"><CurrentVolume>27</CurrentVolume></u:GetVolumeResponse>"#
        )))
        .create();

    let device = transport().device(&location).unwrap();
    let service = device.services().unwrap().items[0].clone();
    let output = service
        .invoke_action("GetVolume", &[WireValue::Ui4(0), WireValue::from("Master")])
        .unwrap();

    control.assert();
    assert_eq!(output.outputs, vec![WireValue::Ui2(27)]);
    assert!(output.return_value.is_empty());
    assert_eq!(service.last_transport_status(), 200);
}

#[test]
fn test_invoke_return_value() {
    let mut server = Server::new();
    let (location, _mocks) = serve_renderer(&mut server);
    let _control = server
        .mock("POST", "/RenderingControl/control")
        .with_status(200)
        .with_body(soap_envelope(&format!(
            r#"<u:GetMuteResponse xmlns:u="{RENDERING_CONTROL}"><CurrentMute>1</CurrentMute></u:GetMuteResponse>"#
        )))
        .create();

    let device = transport().device(&location).unwrap();
    let service = device.services().unwrap().items[0].clone();
    let output = service.invoke_action("GetMute", &[WireValue::Ui4(0)]).unwrap();

    assert!(output.outputs.is_empty());
    assert_eq!(output.return_value, WireValue::Bool(true));
}

#[test]
fn test_invoke_fault_maps_error_code() {
    let mut server = Server::new();
    let (location, _mocks) = serve_renderer(&mut server);
    let _control = server
        .mock("POST", "/RenderingControl/control")
        .with_status(500)
        .with_body(upnp_fault(718, "Invalid InstanceID"))
        .create();

    let device = transport().device(&location).unwrap();
    let service = device.services().unwrap().items[0].clone();
    let failure = service
        .invoke_action("GetVolume", &[WireValue::Ui4(9), WireValue::from("Master")])
        .unwrap_err();

    assert_eq!(failure.code, codes::ACTION_SPECIFIC_BASE + 118);
    assert_eq!(failure.description.as_deref(), Some("Invalid InstanceID"));
    assert_eq!(service.last_transport_status(), 500);
}

#[test]
fn test_invoke_checks_signature_before_sending() {
    let mut server = Server::new();
    let (location, _mocks) = serve_renderer(&mut server);
    let control = server
        .mock("POST", "/RenderingControl/control")
        .expect(0)
        .create();

    let device = transport().device(&location).unwrap();
    let service = device.services().unwrap().items[0].clone();

    let unknown = service.invoke_action("SetVolume", &[]).unwrap_err();
    assert_eq!(unknown.code, codes::INVALID_ACTION);

    let short = service.invoke_action("GetVolume", &[WireValue::Ui4(0)]).unwrap_err();
    assert_eq!(short.code, codes::INVALID_ARGUMENTS);

    control.assert();
    assert_eq!(service.last_transport_status(), 0);
}
