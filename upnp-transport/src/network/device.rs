//! Device and service handles backed by description documents and SOAP.

use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use reqwest::Url;

use super::description::{
    ActionDescription, DescriptionRoot, DeviceDescription, IconDescription, ScpdDescription, ServiceDescription,
};
use super::gena::detect_local_ip;
use super::soap::{response_values, SoapError};
use super::NetworkContext;
use crate::codes;
use crate::error::{Result, TransportError};
use crate::handle::{
    DeviceHandle, DeviceProperty, Enumeration, InvokeFailure, InvokeOutput, ServiceHandle, ServiceListener,
};
use crate::value::WireValue;

/// A device from a fetched description document
#[derive(Debug)]
pub struct NetworkDevice {
    description: DeviceDescription,
    base_url: Url,
    location: Option<String>,
    children: Vec<Arc<NetworkDevice>>,
    services: Vec<Arc<NetworkService>>,
}

impl NetworkDevice {
    pub(crate) fn from_description(
        root: DescriptionRoot,
        location: &str,
        context: &Arc<NetworkContext>,
    ) -> Result<Arc<Self>> {
        let base = root.url_base.as_deref().filter(|b| !b.trim().is_empty()).unwrap_or(location);
        let base_url = Url::parse(base.trim())
            .map_err(|e| TransportError::Parse(format!("Invalid base URL '{base}': {e}")))?;
        Self::build(root.device, &base_url, Some(location.to_string()), context)
    }

    fn build(
        mut description: DeviceDescription,
        base_url: &Url,
        location: Option<String>,
        context: &Arc<NetworkContext>,
    ) -> Result<Arc<Self>> {
        let children = description
            .device_list
            .take()
            .map(|l| l.devices)
            .unwrap_or_default()
            .into_iter()
            .map(|child| Self::build(child, base_url, None, context))
            .collect::<Result<Vec<_>>>()?;

        let services = description
            .service_list
            .take()
            .map(|l| l.services)
            .unwrap_or_default()
            .into_iter()
            .map(|service| NetworkService::new(service, base_url, context).map(Arc::new))
            .collect::<Result<Vec<_>>>()?;

        Ok(Arc::new(Self {
            description,
            base_url: base_url.clone(),
            location,
            children,
            services,
        }))
    }

    pub fn description(&self) -> &DeviceDescription {
        &self.description
    }

    fn icons(&self) -> &[IconDescription] {
        self.description
            .icon_list
            .as_ref()
            .map(|l| l.icons.as_slice())
            .unwrap_or_default()
    }
}

impl DeviceHandle for NetworkDevice {
    fn udn(&self) -> String {
        self.description.udn.trim().to_string()
    }

    fn device_type(&self) -> String {
        self.description.device_type.trim().to_string()
    }

    fn property(&self, property: DeviceProperty) -> Option<String> {
        let d = &self.description;
        let value = match property {
            DeviceProperty::FriendlyName => &d.friendly_name,
            DeviceProperty::ModelName => &d.model_name,
            DeviceProperty::ModelNumber => &d.model_number,
            DeviceProperty::ModelUrl => &d.model_url,
            DeviceProperty::Description => &d.model_description,
            DeviceProperty::Manufacturer => &d.manufacturer,
            DeviceProperty::ManufacturerUrl => &d.manufacturer_url,
            DeviceProperty::SerialNumber => &d.serial_number,
            DeviceProperty::Upc => &d.upc,
            DeviceProperty::PresentationUrl => &d.presentation_url,
        };
        value.as_ref().map(|v| v.trim().to_string())
    }

    fn document_url(&self) -> Option<String> {
        self.location.clone()
    }

    fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    fn children(&self) -> Result<Enumeration<Arc<dyn DeviceHandle>>> {
        Ok(Enumeration::complete(
            self.children
                .iter()
                .map(|c| Arc::clone(c) as Arc<dyn DeviceHandle>)
                .collect(),
        ))
    }

    fn services(&self) -> Result<Enumeration<Arc<dyn ServiceHandle>>> {
        Ok(Enumeration::complete(
            self.services
                .iter()
                .map(|s| Arc::clone(s) as Arc<dyn ServiceHandle>)
                .collect(),
        ))
    }

    fn icon_url(&self, mime_type: &str, width: u32, height: u32, depth: u32) -> Option<String> {
        let icons = self.icons();
        let same_mime = |i: &&IconDescription| i.mimetype.trim().eq_ignore_ascii_case(mime_type);
        let icon = icons
            .iter()
            .filter(same_mime)
            .find(|i| i.width == width && i.height == height && (depth == 0 || i.depth == depth))
            .or_else(|| icons.iter().find(same_mime))
            .or_else(|| icons.first())?;
        self.base_url.join(icon.url.trim()).ok().map(String::from)
    }
}

/// A service whose actions are invoked over SOAP
pub struct NetworkService {
    description: ServiceDescription,
    scpd_url: String,
    control_url: String,
    event_url: String,
    context: Arc<NetworkContext>,
    scpd: Mutex<Option<Arc<ScpdDescription>>>,
    status: AtomicI32,
    subscriptions: Mutex<Vec<u64>>,
}

impl NetworkService {
    fn new(description: ServiceDescription, base_url: &Url, context: &Arc<NetworkContext>) -> Result<Self> {
        let absolute = |relative: &str| {
            base_url
                .join(relative.trim())
                .map(String::from)
                .map_err(|e| TransportError::Parse(format!("Invalid service URL '{relative}': {e}")))
        };

        Ok(Self {
            scpd_url: absolute(&description.scpd_url)?,
            control_url: absolute(&description.control_url)?,
            event_url: absolute(&description.event_sub_url)?,
            description,
            context: Arc::clone(context),
            scpd: Mutex::new(None),
            status: AtomicI32::new(0),
            subscriptions: Mutex::new(Vec::new()),
        })
    }

    pub fn scpd_url(&self) -> &str {
        &self.scpd_url
    }

    pub fn control_url(&self) -> &str {
        &self.control_url
    }

    pub fn event_url(&self) -> &str {
        &self.event_url
    }

    /// The service description, downloaded on first use
    pub fn scpd(&self) -> Result<Arc<ScpdDescription>> {
        let mut cached = self.scpd.lock();
        if let Some(scpd) = cached.as_ref() {
            return Ok(Arc::clone(scpd));
        }
        let xml = self.context.fetch_text(&self.scpd_url)?;
        let scpd = Arc::new(ScpdDescription::from_xml(&xml)?);
        *cached = Some(Arc::clone(&scpd));
        Ok(scpd)
    }

    fn record_failure(&self, error: SoapError) -> InvokeFailure {
        let (status, failure) = match error {
            SoapError::Fault {
                status,
                code,
                description,
            } => (
                i32::from(status),
                InvokeFailure {
                    code: codes::from_upnp_fault(code),
                    description,
                },
            ),
            SoapError::Http(status) => (i32::from(status), InvokeFailure::new(codes::PROTOCOL_ERROR)),
            SoapError::Network(msg) => (-1, InvokeFailure::with_description(codes::TRANSPORT_ERROR, msg)),
            SoapError::Parse(msg) => (
                200,
                InvokeFailure::with_description(codes::ERROR_PROCESSING_RESPONSE, msg),
            ),
        };
        self.status.store(status, Ordering::Relaxed);
        failure
    }

    fn typed_outputs(
        scpd: &ScpdDescription,
        action: &ActionDescription,
        values: Vec<(String, String)>,
    ) -> InvokeOutput {
        let mut output = InvokeOutput::default();
        for (index, argument) in action.outputs().enumerate() {
            let text = values
                .iter()
                .find(|(name, _)| name == &argument.name)
                .or_else(|| values.get(index))
                .map(|(_, text)| text.clone())
                .unwrap_or_default();
            let value = scpd
                .data_type(&argument.related_state_variable)
                .and_then(|declared| WireValue::parse(declared, &text).ok())
                .unwrap_or(WireValue::String(text));

            if argument.retval.is_some() {
                output.return_value = value;
            } else {
                output.outputs.push(value);
            }
        }
        output
    }

    fn variable_types(&self) -> HashMap<String, String> {
        match self.scpd() {
            Ok(scpd) => scpd
                .service_state_table
                .as_ref()
                .map(|t| {
                    t.variables
                        .iter()
                        .map(|v| (v.name.clone(), v.data_type.clone()))
                        .collect()
                })
                .unwrap_or_default(),
            Err(e) => {
                tracing::debug!("No variable types for {}: {}", self.description.service_id, e);
                HashMap::new()
            }
        }
    }

    fn callback_ip(&self) -> Option<IpAddr> {
        let host = Url::parse(&self.event_url).ok()?.host_str()?.trim_matches(['[', ']']).to_string();
        let peer = host.parse().ok()?;
        detect_local_ip(peer)
    }
}

impl fmt::Debug for NetworkService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkService")
            .field("id", &self.description.service_id)
            .field("service_type", &self.description.service_type)
            .field("control_url", &self.control_url)
            .finish()
    }
}

impl ServiceHandle for NetworkService {
    fn id(&self) -> String {
        self.description.service_id.trim().to_string()
    }

    fn service_type(&self) -> String {
        self.description.service_type.trim().to_string()
    }

    fn last_transport_status(&self) -> i32 {
        self.status.load(Ordering::Relaxed)
    }

    fn invoke_action(&self, action: &str, inputs: &[WireValue]) -> std::result::Result<InvokeOutput, InvokeFailure> {
        let scpd = self
            .scpd()
            .map_err(|e| InvokeFailure::with_description(codes::INVALID_DOCUMENT, e.to_string()))?;
        let description = scpd
            .action(action)
            .ok_or_else(|| InvokeFailure::new(codes::INVALID_ACTION))?;

        let declared: Vec<_> = description.inputs().collect();
        if declared.len() != inputs.len() {
            return Err(InvokeFailure::with_description(
                codes::INVALID_ARGUMENTS,
                format!("{action} takes {} input arguments, got {}", declared.len(), inputs.len()),
            ));
        }
        let arguments: Vec<(&str, String)> = declared
            .iter()
            .zip(inputs)
            .map(|(argument, value)| (argument.name.as_str(), value.to_string()))
            .collect();

        match self.context.soap().call(
            &self.control_url,
            self.description.service_type.trim(),
            action,
            &arguments,
        ) {
            Ok(response) => {
                self.status.store(200, Ordering::Relaxed);
                Ok(Self::typed_outputs(&scpd, description, response_values(&response)))
            }
            Err(e) => {
                tracing::warn!("{} on {} failed: {}", action, self.description.service_id, e);
                Err(self.record_failure(e))
            }
        }
    }

    fn add_callback(&self, listener: Arc<dyn ServiceListener>) -> Result<()> {
        let server = self.context.event_server()?;
        let local_ip = self
            .callback_ip()
            .ok_or_else(|| TransportError::Subscription(format!("no local route to {}", self.event_url)))?;
        let token = server.subscribe(&self.event_url, local_ip, listener, self.variable_types())?;
        self.subscriptions.lock().push(token);
        Ok(())
    }
}

impl Drop for NetworkService {
    fn drop(&mut self) {
        let tokens = std::mem::take(&mut *self.subscriptions.lock());
        if tokens.is_empty() {
            return;
        }
        if let Some(server) = self.context.running_event_server() {
            for token in tokens {
                server.unsubscribe(token);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{NetworkConfig, NetworkTransport};

    const LOCATION: &str = "http://192.168.1.60:1400/xml/device_description.xml";

    const DEVICE_XML: &str = r#"<?xml version="1.0"?>
<root xmlns="urn:schemas-upnp-org:device-1-0">
  <device>
    <deviceType>urn:schemas-upnp-org:device:MediaRenderer:1</deviceType>
    <friendlyName> Living Room </friendlyName>
    <modelNumber>S12</modelNumber>
    <UDN>uuid:renderer-0001</UDN>
    <iconList>
      <icon><mimetype>image/png</mimetype><width>48</width><height>48</height><depth>24</depth><url>/img/icon48.png</url></icon>
      <icon><mimetype>image/png</mimetype><width>32</width><height>32</height><depth>16</depth><url>/img/icon32.png</url></icon>
      <icon><mimetype>image/jpeg</mimetype><width>32</width><height>32</height><depth>16</depth><url>icon.jpg</url></icon>
    </iconList>
    <serviceList>
      <service>
        <serviceType>urn:schemas-upnp-org:service:RenderingControl:1</serviceType>
        <serviceId>urn:upnp-org:serviceId:RenderingControl</serviceId>
        <SCPDURL>/xml/RenderingControl1.xml</SCPDURL>
        <controlURL>/MediaRenderer/RenderingControl/Control</controlURL>
        <eventSubURL>/MediaRenderer/RenderingControl/Event</eventSubURL>
      </service>
    </serviceList>
    <deviceList>
      <device>
        <deviceType>urn:schemas-upnp-org:device:MediaServer:1</deviceType>
        <UDN>uuid:server-0002</UDN>
      </device>
    </deviceList>
  </device>
</root>"#;

    fn load() -> Arc<NetworkDevice> {
        NetworkTransport::new(NetworkConfig::default())
            .unwrap()
            .parse_device(DEVICE_XML, LOCATION)
            .unwrap()
    }

    #[test]
    fn test_device_properties() {
        let device = load();
        assert_eq!(device.udn(), "uuid:renderer-0001");
        assert_eq!(device.property(DeviceProperty::FriendlyName).as_deref(), Some("Living Room"));
        assert_eq!(device.property(DeviceProperty::ModelNumber).as_deref(), Some("S12"));
        assert_eq!(device.property(DeviceProperty::Upc), None);
        assert_eq!(device.document_url().as_deref(), Some(LOCATION));
    }

    #[test]
    fn test_children_have_no_document_url() {
        let device = load();
        assert!(device.has_children());
        let children = device.children().unwrap();
        assert_eq!(children.reported, 1);
        assert_eq!(children.items[0].udn(), "uuid:server-0002");
        assert_eq!(children.items[0].document_url(), None);
        assert!(!children.items[0].has_children());
    }

    #[test]
    fn test_service_urls_are_absolute() {
        let device = load();
        let service = &device.services[0];
        assert_eq!(service.scpd_url(), "http://192.168.1.60:1400/xml/RenderingControl1.xml");
        assert_eq!(
            service.control_url(),
            "http://192.168.1.60:1400/MediaRenderer/RenderingControl/Control"
        );
        assert_eq!(service.id(), "urn:upnp-org:serviceId:RenderingControl");
        assert_eq!(service.last_transport_status(), 0);
    }

    #[test]
    fn test_icon_selection() {
        let device = load();
        assert_eq!(
            device.icon_url("image/png", 32, 32, 16).as_deref(),
            Some("http://192.168.1.60:1400/img/icon32.png")
        );
        assert_eq!(
            device.icon_url("image/png", 32, 32, 0).as_deref(),
            Some("http://192.168.1.60:1400/img/icon32.png")
        );
        // No exact size: first icon of the requested type
        assert_eq!(
            device.icon_url("image/png", 120, 120, 24).as_deref(),
            Some("http://192.168.1.60:1400/img/icon48.png")
        );
        assert_eq!(
            device.icon_url("image/jpeg", 32, 32, 16).as_deref(),
            Some("http://192.168.1.60:1400/xml/icon.jpg")
        );
        assert_eq!(
            device.icon_url("image/gif", 16, 16, 8).as_deref(),
            Some("http://192.168.1.60:1400/img/icon48.png")
        );
    }

    #[test]
    fn test_typed_outputs() {
        let scpd = ScpdDescription::from_xml(
            r#"<scpd>
  <actionList>
    <action>
      <name>GetPosition</name>
      <argumentList>
        <argument><name>Track</name><direction>out</direction><relatedStateVariable>CurrentTrack</relatedStateVariable></argument>
        <argument><name>Title</name><direction>out</direction><relatedStateVariable>Title</relatedStateVariable></argument>
        <argument><name>Ok</name><direction>out</direction><retval/><relatedStateVariable>Flag</relatedStateVariable></argument>
      </argumentList>
    </action>
  </actionList>
  <serviceStateTable>
    <stateVariable><name>CurrentTrack</name><dataType>ui4</dataType></stateVariable>
    <stateVariable><name>Title</name><dataType>string</dataType></stateVariable>
    <stateVariable><name>Flag</name><dataType>boolean</dataType></stateVariable>
  </serviceStateTable>
</scpd>"#,
        )
        .unwrap();
        let action = scpd.action("GetPosition").unwrap();
        let values = vec![
            ("Track".to_string(), "3".to_string()),
            ("Title".to_string(), "Intro".to_string()),
            ("Ok".to_string(), "1".to_string()),
        ];

        let output = NetworkService::typed_outputs(&scpd, action, values);
        assert_eq!(
            output.outputs,
            vec![WireValue::Ui4(3), WireValue::String("Intro".to_string())]
        );
        assert_eq!(output.return_value, WireValue::Bool(true));
    }

    #[test]
    fn test_unreachable_scpd_is_invalid_document() {
        let device = NetworkTransport::new(NetworkConfig::default())
            .unwrap()
            .parse_device(DEVICE_XML, "http://127.0.0.1:9/description.xml")
            .unwrap();
        let failure = device.services[0].invoke_action("GetVolume", &[]).unwrap_err();
        assert_eq!(failure.code, codes::INVALID_DOCUMENT);
    }

    #[test]
    fn test_url_base_overrides_location() {
        let xml = DEVICE_XML.replace(
            "<device>\n    <deviceType>urn:schemas-upnp-org:device:MediaRenderer:1",
            "<URLBase>http://10.0.0.5:8080/base/</URLBase><device>\n    <deviceType>urn:schemas-upnp-org:device:MediaRenderer:1",
        );
        let device = NetworkTransport::new(NetworkConfig::default())
            .unwrap()
            .parse_device(&xml, LOCATION)
            .unwrap();
        assert_eq!(device.services[0].scpd_url(), "http://10.0.0.5:8080/xml/RenderingControl1.xml");
        assert_eq!(
            device.icon_url("image/jpeg", 32, 32, 16).as_deref(),
            Some("http://10.0.0.5:8080/base/icon.jpg")
        );
    }
}
