//! UPnP control point error codes and their messages.
//!
//! Codes are reported by [`crate::ServiceHandle::invoke_action`] failures and map
//! the UPnP SOAP fault codes onto a 32-bit facility range.

pub const ROOT_ELEMENT_EXPECTED: u32 = 0x8004_0200;
pub const DEVICE_ELEMENT_EXPECTED: u32 = 0x8004_0201;
pub const SERVICE_ELEMENT_EXPECTED: u32 = 0x8004_0202;
pub const SERVICE_NODE_INCOMPLETE: u32 = 0x8004_0203;
pub const DEVICE_NODE_INCOMPLETE: u32 = 0x8004_0204;
pub const ICON_ELEMENT_EXPECTED: u32 = 0x8004_0205;
pub const ICON_NODE_INCOMPLETE: u32 = 0x8004_0206;
pub const INVALID_ACTION: u32 = 0x8004_0207;
pub const INVALID_ARGUMENTS: u32 = 0x8004_0208;
pub const OUT_OF_SYNC: u32 = 0x8004_0209;
pub const ACTION_REQUEST_FAILED: u32 = 0x8004_0210;
pub const TRANSPORT_ERROR: u32 = 0x8004_0211;
pub const VARIABLE_VALUE_UNKNOWN: u32 = 0x8004_0212;
pub const INVALID_VARIABLE: u32 = 0x8004_0213;
pub const DEVICE_ERROR: u32 = 0x8004_0214;
pub const PROTOCOL_ERROR: u32 = 0x8004_0215;
pub const ERROR_PROCESSING_RESPONSE: u32 = 0x8004_0216;
pub const DEVICE_TIMEOUT: u32 = 0x8004_0217;
pub const INVALID_DOCUMENT: u32 = 0x8004_0500;
pub const EVENT_SUBSCRIPTION_FAILED: u32 = 0x8004_0501;

/// First and last code of the action specific range (UPnP faults 600-899)
pub const ACTION_SPECIFIC_BASE: u32 = 0x8004_0300;
pub const ACTION_SPECIFIC_MAX: u32 = 0x8004_03FF;

/// Human readable message for an error code; `"Unknown error"` for anything unmapped.
pub fn error_message(code: u32) -> &'static str {
    match code {
        ROOT_ELEMENT_EXPECTED => "Root Element Expected",
        DEVICE_ELEMENT_EXPECTED => "Device Element Expected",
        SERVICE_ELEMENT_EXPECTED => "Service Element Expected",
        SERVICE_NODE_INCOMPLETE => "Service Node Incomplete",
        DEVICE_NODE_INCOMPLETE => "Device Node Incomplete",
        ICON_ELEMENT_EXPECTED => "Icon Element Expected",
        ICON_NODE_INCOMPLETE => "Icon Node Incomplete",
        INVALID_ACTION => "Invalid Action",
        INVALID_ARGUMENTS => "Invalid Arguments",
        OUT_OF_SYNC => "Out of Sync",
        ACTION_REQUEST_FAILED => "Action Request Failed",
        TRANSPORT_ERROR => "Transport Error",
        VARIABLE_VALUE_UNKNOWN => "Variable Value Unknown",
        INVALID_VARIABLE => "Invalid Variable",
        DEVICE_ERROR => "Device Error",
        PROTOCOL_ERROR => "Protocol Error",
        ERROR_PROCESSING_RESPONSE => "Error Processing Response",
        DEVICE_TIMEOUT => "Device Timeout",
        INVALID_DOCUMENT => "Invalid Document",
        EVENT_SUBSCRIPTION_FAILED => "Event Subscription Failed",
        ACTION_SPECIFIC_BASE..=ACTION_SPECIFIC_MAX => "Action Specific Error",
        _ => "Unknown error",
    }
}

/// Map a UPnP SOAP fault `errorCode` onto the code table.
///
/// Action specific faults beyond the range saturate at [`ACTION_SPECIFIC_MAX`].
pub fn from_upnp_fault(fault: u16) -> u32 {
    match fault {
        401 => INVALID_ACTION,
        402 => INVALID_ARGUMENTS,
        403 => OUT_OF_SYNC,
        404 => INVALID_VARIABLE,
        501 => ACTION_REQUEST_FAILED,
        600..=899 => (ACTION_SPECIFIC_BASE + u32::from(fault - 600)).min(ACTION_SPECIFIC_MAX),
        _ => DEVICE_ERROR,
    }
}
