//! Device and service description parsing.
//!
//! Only the fields the network transport needs are modelled; anything else in
//! the documents is ignored.

use serde::Deserialize;

use crate::error::{Result, TransportError};

/// Root of a device description document
#[derive(Debug, Clone, Deserialize)]
pub struct DescriptionRoot {
    #[serde(rename = "URLBase", default)]
    pub url_base: Option<String>,
    pub device: DeviceDescription,
}

impl DescriptionRoot {
    pub fn from_xml(xml: &str) -> Result<Self> {
        quick_xml::de::from_str(xml)
            .map_err(|e| TransportError::Parse(format!("Failed to parse device description: {e}")))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeviceDescription {
    pub device_type: String,
    pub friendly_name: Option<String>,
    pub manufacturer: Option<String>,
    #[serde(rename = "manufacturerURL")]
    pub manufacturer_url: Option<String>,
    pub model_description: Option<String>,
    pub model_name: Option<String>,
    pub model_number: Option<String>,
    #[serde(rename = "modelURL")]
    pub model_url: Option<String>,
    pub serial_number: Option<String>,
    #[serde(rename = "UDN")]
    pub udn: String,
    #[serde(rename = "UPC")]
    pub upc: Option<String>,
    #[serde(rename = "presentationURL")]
    pub presentation_url: Option<String>,
    pub icon_list: Option<IconList>,
    pub service_list: Option<ServiceList>,
    pub device_list: Option<DeviceList>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IconList {
    #[serde(rename = "icon", default)]
    pub icons: Vec<IconDescription>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct IconDescription {
    pub mimetype: String,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceList {
    #[serde(rename = "service", default)]
    pub services: Vec<ServiceDescription>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServiceDescription {
    #[serde(rename = "serviceType")]
    pub service_type: String,
    #[serde(rename = "serviceId")]
    pub service_id: String,
    #[serde(rename = "SCPDURL")]
    pub scpd_url: String,
    #[serde(rename = "controlURL")]
    pub control_url: String,
    #[serde(rename = "eventSubURL")]
    pub event_sub_url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeviceList {
    #[serde(rename = "device", default)]
    pub devices: Vec<DeviceDescription>,
}

/// Service control protocol description: action signatures and variable types
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScpdDescription {
    pub action_list: Option<ActionList>,
    pub service_state_table: Option<StateTable>,
}

impl ScpdDescription {
    pub fn from_xml(xml: &str) -> Result<Self> {
        quick_xml::de::from_str(xml)
            .map_err(|e| TransportError::Parse(format!("Failed to parse service description: {e}")))
    }

    pub fn action(&self, name: &str) -> Option<&ActionDescription> {
        self.action_list
            .as_ref()?
            .actions
            .iter()
            .find(|a| a.name == name)
    }

    /// Declared data type of a state variable
    pub fn data_type(&self, variable: &str) -> Option<&str> {
        self.service_state_table
            .as_ref()?
            .variables
            .iter()
            .find(|v| v.name == variable)
            .map(|v| v.data_type.as_str())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActionList {
    #[serde(rename = "action", default)]
    pub actions: Vec<ActionDescription>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ActionDescription {
    pub name: String,
    pub argument_list: Option<ArgumentList>,
}

impl ActionDescription {
    pub fn arguments(&self) -> &[ArgumentDescription] {
        self.argument_list
            .as_ref()
            .map(|l| l.arguments.as_slice())
            .unwrap_or_default()
    }

    pub fn inputs(&self) -> impl Iterator<Item = &ArgumentDescription> {
        self.arguments().iter().filter(|a| a.is_input())
    }

    pub fn outputs(&self) -> impl Iterator<Item = &ArgumentDescription> {
        self.arguments().iter().filter(|a| !a.is_input())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArgumentList {
    #[serde(rename = "argument", default)]
    pub arguments: Vec<ArgumentDescription>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ArgumentDescription {
    pub name: String,
    pub direction: String,
    pub related_state_variable: String,
    /// Present (as an empty element) on the argument carrying the return value
    pub retval: Option<Retval>,
}

impl ArgumentDescription {
    pub fn is_input(&self) -> bool {
        self.direction.trim().eq_ignore_ascii_case("in")
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Retval {}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StateTable {
    #[serde(rename = "stateVariable", default)]
    pub variables: Vec<StateVariableDescription>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StateVariableDescription {
    pub name: String,
    pub data_type: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEVICE_XML: &str = r#"<?xml version="1.0"?>
<root xmlns="urn:schemas-upnp-org:device-1-0">
  <specVersion><major>1</major><minor>0</minor></specVersion>
  <URLBase>http://192.168.1.60:8080/</URLBase>
  <device>
    <deviceType>urn:schemas-upnp-org:device:MediaRenderer:1</deviceType>
    <friendlyName>Kitchen Speaker</friendlyName>
    <manufacturer>Example Audio</manufacturer>
    <manufacturerURL>http://example.com</manufacturerURL>
    <modelName>Speaker One</modelName>
    <modelURL>http://example.com/one</modelURL>
    <UDN>uuid:renderer-0001</UDN>
    <iconList>
      <icon><mimetype>image/png</mimetype><width>32</width><height>32</height><depth>16</depth><url>/icon32.png</url></icon>
    </iconList>
    <serviceList>
      <service>
        <serviceType>urn:schemas-upnp-org:service:RenderingControl:1</serviceType>
        <serviceId>urn:upnp-org:serviceId:RenderingControl</serviceId>
        <SCPDURL>/rc.xml</SCPDURL>
        <controlURL>/rc/control</controlURL>
        <eventSubURL>/rc/event</eventSubURL>
      </service>
    </serviceList>
    <deviceList>
      <device>
        <deviceType>urn:schemas-upnp-org:device:Basic:1</deviceType>
        <UDN>uuid:child-0002</UDN>
      </device>
    </deviceList>
  </device>
</root>"#;

    #[test]
    fn test_parse_device_description() {
        let root = DescriptionRoot::from_xml(DEVICE_XML).unwrap();
        assert_eq!(root.url_base.as_deref(), Some("http://192.168.1.60:8080/"));

        let device = &root.device;
        assert_eq!(device.udn, "uuid:renderer-0001");
        assert_eq!(device.manufacturer_url.as_deref(), Some("http://example.com"));
        assert_eq!(device.model_url.as_deref(), Some("http://example.com/one"));
        assert_eq!(device.icon_list.as_ref().unwrap().icons[0].depth, 16);

        let services = &device.service_list.as_ref().unwrap().services;
        assert_eq!(services[0].control_url, "/rc/control");

        let children = &device.device_list.as_ref().unwrap().devices;
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].udn, "uuid:child-0002");
        assert!(children[0].service_list.is_none());
    }

    #[test]
    fn test_parse_scpd() {
        let xml = r#"<scpd xmlns="urn:schemas-upnp-org:service-1-0">
  <actionList>
    <action>
      <name>GetVolume</name>
      <argumentList>
        <argument><name>InstanceID</name><direction>in</direction><relatedStateVariable>A_ARG_TYPE_InstanceID</relatedStateVariable></argument>
        <argument><name>CurrentVolume</name><direction>out</direction><retval/><relatedStateVariable>Volume</relatedStateVariable></argument>
      </argumentList>
    </action>
  </actionList>
  <serviceStateTable>
    <stateVariable sendEvents="no"><name>Volume</name><dataType>ui2</dataType></stateVariable>
  </serviceStateTable>
</scpd>"#;

        let scpd = ScpdDescription::from_xml(xml).unwrap();
        let action = scpd.action("GetVolume").unwrap();
        assert_eq!(action.inputs().count(), 1);
        let output = action.outputs().next().unwrap();
        assert_eq!(output.name, "CurrentVolume");
        assert!(output.retval.is_some());
        assert_eq!(scpd.data_type("Volume"), Some("ui2"));
        assert!(scpd.action("Missing").is_none());
    }

    #[test]
    fn test_malformed_description() {
        assert!(DescriptionRoot::from_xml("<root><device>").is_err());
    }
}
