//! SOAP control and GENA subscription requests

use std::time::Duration;

use quick_xml::escape::escape;
use xmltree::{Element, XMLNode};

use super::config::NetworkConfig;

/// Failure of a SOAP or GENA exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SoapError {
    /// No HTTP response was received
    Network(String),
    /// The response could not be understood
    Parse(String),
    /// The device answered with a non-success status and no SOAP fault
    Http(u16),
    /// The device returned a UPnP fault
    Fault {
        status: u16,
        code: u16,
        description: Option<String>,
    },
}

impl std::fmt::Display for SoapError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Network(msg) => write!(f, "network error: {msg}"),
            Self::Parse(msg) => write!(f, "parse error: {msg}"),
            Self::Http(status) => write!(f, "HTTP status {status}"),
            Self::Fault { code, .. } => write!(f, "UPnP fault {code}"),
        }
    }
}

/// Granted event subscription
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Subscription {
    pub sid: String,
    pub timeout_secs: u32,
}

#[derive(Debug, Clone)]
pub(crate) struct SoapClient {
    agent: ureq::Agent,
}

impl SoapClient {
    pub fn new(config: &NetworkConfig) -> Self {
        Self {
            agent: ureq::AgentBuilder::new()
                .timeout_connect(config.connect_timeout)
                .timeout_read(config.read_timeout)
                .build(),
        }
    }

    /// Invoke `action` and return the `<{action}Response>` element
    pub fn call(
        &self,
        control_url: &str,
        service_type: &str,
        action: &str,
        arguments: &[(&str, String)],
    ) -> Result<Element, SoapError> {
        let body = envelope(service_type, action, arguments);
        let soap_action = format!("\"{service_type}#{action}\"");
        tracing::debug!("SOAP {} -> {}", action, control_url);

        let text = match self
            .agent
            .post(control_url)
            .set("Content-Type", "text/xml; charset=\"utf-8\"")
            .set("SOAPACTION", &soap_action)
            .send_string(&body)
        {
            Ok(response) => response
                .into_string()
                .map_err(|e| SoapError::Network(e.to_string()))?,
            Err(ureq::Error::Status(status, response)) => {
                let text = response.into_string().unwrap_or_default();
                return Err(parse_fault(&text).map_or(SoapError::Http(status), |(code, description)| {
                    SoapError::Fault {
                        status,
                        code,
                        description,
                    }
                }));
            }
            Err(e) => return Err(SoapError::Network(e.to_string())),
        };

        let xml = Element::parse(text.as_bytes()).map_err(|e| SoapError::Parse(e.to_string()))?;
        extract_response(&xml, action)
    }

    pub fn subscribe(&self, event_url: &str, callback_url: &str, timeout_secs: u32) -> Result<Subscription, SoapError> {
        let response = self
            .agent
            .request("SUBSCRIBE", event_url)
            .set("CALLBACK", &format!("<{callback_url}>"))
            .set("NT", "upnp:event")
            .set("TIMEOUT", &format!("Second-{timeout_secs}"))
            .call()
            .map_err(status_error)?;

        let sid = response
            .header("SID")
            .ok_or_else(|| SoapError::Parse("Missing SID header in SUBSCRIBE response".to_string()))?
            .to_string();
        let timeout_secs = response
            .header("TIMEOUT")
            .and_then(parse_timeout)
            .unwrap_or(timeout_secs);

        Ok(Subscription { sid, timeout_secs })
    }

    pub fn renew(&self, event_url: &str, sid: &str, timeout_secs: u32) -> Result<u32, SoapError> {
        let response = self
            .agent
            .request("SUBSCRIBE", event_url)
            .set("SID", sid)
            .set("TIMEOUT", &format!("Second-{timeout_secs}"))
            .call()
            .map_err(status_error)?;

        Ok(response
            .header("TIMEOUT")
            .and_then(parse_timeout)
            .unwrap_or(timeout_secs))
    }

    pub fn unsubscribe(&self, event_url: &str, sid: &str) -> Result<(), SoapError> {
        self.agent
            .request("UNSUBSCRIBE", event_url)
            .set("SID", sid)
            .call()
            .map_err(status_error)?;
        Ok(())
    }
}

fn status_error(error: ureq::Error) -> SoapError {
    match error {
        ureq::Error::Status(status, _) => SoapError::Http(status),
        other => SoapError::Network(other.to_string()),
    }
}

/// Parse `Second-1800`; `infinite` has no numeric value
fn parse_timeout(header: &str) -> Option<u32> {
    header.trim().strip_prefix("Second-")?.parse().ok()
}

/// Refresh interval for a granted subscription lifetime
pub(crate) fn renewal_interval(timeout_secs: u32) -> Duration {
    Duration::from_secs(u64::from(timeout_secs.max(60)) / 2)
}

fn envelope(service_type: &str, action: &str, arguments: &[(&str, String)]) -> String {
    let payload: String = arguments
        .iter()
        .map(|(name, value)| format!("<{name}>{}</{name}>", escape(value.as_str())))
        .collect();

    format!(
        r#"<?xml version="1.0" encoding="utf-8"?><s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/" s:encodingStyle="http://schemas.xmlsoap.org/soap/encoding/"><s:Body><u:{action} xmlns:u="{service_type}">{payload}</u:{action}></s:Body></s:Envelope>"#
    )
}

fn child<'a>(element: &'a Element, name: &str) -> Option<&'a Element> {
    element
        .children
        .iter()
        .filter_map(XMLNode::as_element)
        .find(|e| e.name.eq_ignore_ascii_case(name))
}

/// `(errorCode, errorDescription)` of a SOAP fault body
fn parse_fault(text: &str) -> Option<(u16, Option<String>)> {
    let xml = Element::parse(text.as_bytes()).ok()?;
    fault_details(&xml)
}

fn fault_details(xml: &Element) -> Option<(u16, Option<String>)> {
    let fault = child(child(xml, "Body")?, "Fault")?;
    let error = child(child(fault, "detail")?, "UPnPError");
    let code = error
        .and_then(|e| child(e, "errorCode"))
        .and_then(|c| c.get_text())
        .and_then(|t| t.trim().parse::<u16>().ok())
        .unwrap_or(501);
    let description = error
        .and_then(|e| child(e, "errorDescription"))
        .and_then(|d| d.get_text())
        .map(|t| t.trim().to_string());
    Some((code, description))
}

fn extract_response(xml: &Element, action: &str) -> Result<Element, SoapError> {
    let body = child(xml, "Body").ok_or_else(|| SoapError::Parse("Missing SOAP Body".to_string()))?;

    if child(body, "Fault").is_some() {
        let (code, description) = fault_details(xml).unwrap_or((501, None));
        return Err(SoapError::Fault {
            status: 200,
            code,
            description,
        });
    }

    let response_name = format!("{action}Response");
    child(body, &response_name)
        .cloned()
        .ok_or_else(|| SoapError::Parse(format!("Missing {response_name} element")))
}

/// Text of each child of a response element, keyed by element name
pub(crate) fn response_values(response: &Element) -> Vec<(String, String)> {
    response
        .children
        .iter()
        .filter_map(XMLNode::as_element)
        .map(|e| {
            let text = e.get_text().map(|t| t.into_owned()).unwrap_or_default();
            (e.name.clone(), text)
        })
        .collect()
}
