//! Well-known device type filters for discovery searches

/// Search filter matching every root device
pub const ROOT_DEVICE: &str = "upnp:rootdevice";

/// Standard device types, root device filter first
pub const DEVICE_TYPES: [&str; 16] = [
    ROOT_DEVICE,
    "urn:schemas-upnp-org:device:Basic:1.0",
    "urn:schemas-upnp-org:device:DigitalSecurityCamera:1",
    "urn:schemas-upnp-org:device:HVAC_System:1",
    "urn:schemas-upnp-org:device:InternetGatewayDevice:1",
    "urn:schemas-upnp-org:device:BinaryLight:1",
    "urn:schemas-upnp-org:device:DimmableLight:1",
    "urn:schemas-upnp-org:device:WLANAccessPointDevice:1",
    "urn:schemas-upnp-org:device:Printer:1",
    "urn:schemas-upnp-org:device:RemoteUIClientDevice:1",
    "urn:schemas-upnp-org:device:RemoteUIServerDevice:1",
    "urn:schemas-upnp-org:device:Scanner:1",
    "urn:schemas-upnp-org:device:MediaServer:2",
    "urn:schemas-upnp-org:device:MediaRenderer:2",
    "urn:schemas-upnp-org:device:MediaServer:1",
    "urn:schemas-upnp-org:device:MediaRenderer:1",
];

pub fn root_device_type() -> &'static str {
    DEVICE_TYPES[0]
}

pub fn types_count() -> usize {
    DEVICE_TYPES.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table() {
        assert_eq!(root_device_type(), "upnp:rootdevice");
        assert_eq!(types_count(), 16);
        assert!(DEVICE_TYPES.iter().skip(1).all(|t| t.starts_with("urn:schemas-upnp-org:device:")));
    }
}
