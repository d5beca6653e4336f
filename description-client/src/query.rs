//! Extraction queries over the cached description document.
//!
//! Every query parses the cached text afresh and walks the resulting tree without
//! shared state. Element and attribute names compare case-insensitively. A query
//! fails as a whole when a required element is missing or when fewer items were
//! extracted than elements were iterated.

use std::collections::BTreeMap;
use std::sync::atomic::Ordering;

use xmltree::{Element, XMLNode};

use crate::error::{DocError, Result};
use crate::model::{ArgumentInfo, IconParam, VariableInfo};
use crate::DocAccess;

fn child<'a>(element: &'a Element, name: &str) -> Option<&'a Element> {
    element
        .children
        .iter()
        .filter_map(XMLNode::as_element)
        .find(|e| e.name.eq_ignore_ascii_case(name))
}

fn children<'a>(element: &'a Element, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
    element
        .children
        .iter()
        .filter_map(XMLNode::as_element)
        .filter(move |e| e.name.eq_ignore_ascii_case(name))
}

fn text(element: &Element) -> Option<String> {
    let text = element.get_text()?;
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn child_text(element: &Element, name: &str) -> Option<String> {
    children(element, name).find_map(text)
}

fn attribute<'a>(element: &'a Element, name: &str) -> Option<&'a str> {
    element
        .attributes
        .iter()
        .find(|(key, value)| key.eq_ignore_ascii_case(name) && !value.trim().is_empty())
        .map(|(_, value)| value.trim())
}

fn required<'a>(element: &'a Element, name: &str) -> Result<&'a Element> {
    child(element, name).ok_or_else(|| DocError::NotFound(format!("<{name}> under <{}>", element.name)))
}

fn check_count(expected: usize, extracted: usize) -> Result<()> {
    if expected == extracted {
        Ok(())
    } else {
        Err(DocError::Inconsistent { expected, extracted })
    }
}

/// Leading decimal digits, like C `atoi`; anything unparsable reads as 0.
fn leading_number(value: &str) -> u32 {
    let digits: String = value.trim().chars().take_while(char::is_ascii_digit).collect();
    digits.parse().unwrap_or(0)
}

fn find_action<'a>(root: &'a Element, action: &str) -> Result<&'a Element> {
    let list = required(root, "actionList")?;
    children(list, "action")
        .find(|a| child_text(a, "name").as_deref() == Some(action))
        .ok_or_else(|| DocError::NotFound(format!("action '{action}'")))
}

/// Depth-first search for a service id over nested `deviceList` elements.
fn find_scpd_url(device: &Element, service_id: &str) -> Option<String> {
    let in_services = child(device, "serviceList").and_then(|list| {
        children(list, "service")
            .filter(|s| child_text(s, "serviceId").as_deref() == Some(service_id))
            .find_map(|s| child_text(s, "SCPDURL"))
    });
    if in_services.is_some() {
        return in_services;
    }

    child(device, "deviceList").and_then(|list| {
        children(list, "device").find_map(|nested| find_scpd_url(nested, service_id))
    })
}

fn variable_in(root: &Element, variable: &str) -> Result<VariableInfo> {
    let table = required(root, "serviceStateTable")?;
    let element = children(table, "stateVariable")
        .find(|v| child_text(v, "name").as_deref() == Some(variable))
        .ok_or_else(|| DocError::NotFound(format!("state variable '{variable}'")))?;

    let send_events = attribute(element, "sendEvents")
        .ok_or_else(|| DocError::NotFound(format!("sendEvents attribute of '{variable}'")))?;
    let data_type = child_text(element, "dataType")
        .ok_or_else(|| DocError::NotFound(format!("dataType of '{variable}'")))?;

    let range = child(element, "allowedValueRange");
    let bound = |name: &str| range.and_then(|r| child_text(r, name));

    let allowed_values = child(element, "allowedValueList")
        .map(|list| children(list, "allowedValue").filter_map(text).collect())
        .unwrap_or_default();

    Ok(VariableInfo {
        send_events: send_events.to_string(),
        data_type,
        default_value: child_text(element, "defaultValue"),
        minimum: bound("minimum"),
        maximum: bound("maximum"),
        step: bound("step"),
        allowed_values,
    })
}

impl DocAccess {
    fn parse_document(&self) -> Result<Element> {
        self.queries.fetch_add(1, Ordering::Relaxed);
        if self.document.is_empty() {
            return Err(DocError::NotFound("no document cached".to_string()));
        }
        Element::parse(self.document.as_bytes()).map_err(|e| DocError::Parse(e.to_string()))
    }

    /// Text of the first child of the document root named `tag` with non-empty content.
    pub fn root_tag(&self, tag: &str) -> Result<String> {
        let root = self.parse_document()?;
        child_text(&root, tag).ok_or_else(|| DocError::NotFound(format!("<{tag}>")))
    }

    /// Relative description path (`SCPDURL`) of the service with the given id.
    ///
    /// Nested devices are searched depth-first in document order; the first match wins.
    pub fn service_doc_path(&self, service_id: &str) -> Result<String> {
        let root = self.parse_document()?;
        let device = required(&root, "device")?;
        find_scpd_url(device, service_id)
            .ok_or_else(|| DocError::NotFound(format!("SCPDURL for service '{service_id}'")))
    }

    /// State variable names mapped to their `sendEvents` attribute.
    pub fn state_variables(&self) -> Result<BTreeMap<String, String>> {
        let root = self.parse_document()?;
        let table = required(&root, "serviceStateTable")?;

        let mut iterated = 0;
        let mut variables = BTreeMap::new();
        for variable in children(table, "stateVariable") {
            iterated += 1;
            if let (Some(name), Some(events)) =
                (child_text(variable, "name"), attribute(variable, "sendEvents"))
            {
                variables.insert(name, events.to_string());
            }
        }

        if iterated == 0 {
            return Err(DocError::NotFound("<stateVariable>".to_string()));
        }
        check_count(iterated, variables.len())?;
        Ok(variables)
    }

    /// Action names in document order; empty when the service declares no `actionList`.
    pub fn action_names(&self) -> Result<Vec<String>> {
        let root = self.parse_document()?;
        let Some(list) = child(&root, "actionList") else {
            return Ok(Vec::new());
        };

        let iterated = children(list, "action").count();
        if iterated == 0 {
            return Err(DocError::NotFound("<action>".to_string()));
        }
        let names: Vec<String> = children(list, "action")
            .filter_map(|a| child_text(a, "name"))
            .collect();
        check_count(iterated, names.len())?;
        Ok(names)
    }

    /// Arguments of `action` with the metadata of their related state variables.
    pub fn action_arguments(&self, action: &str) -> Result<Vec<ArgumentInfo>> {
        let root = self.parse_document()?;
        let element = find_action(&root, action)?;
        let Some(list) = child(element, "argumentList") else {
            return Ok(Vec::new());
        };

        let mut iterated = 0;
        let mut arguments = Vec::new();
        for argument in children(list, "argument") {
            iterated += 1;
            let name = child_text(argument, "name");
            let direction = child_text(argument, "direction");
            let related = child_text(argument, "relatedStateVariable");
            if let (Some(name), Some(direction), Some(related_variable)) = (name, direction, related) {
                let variable = variable_in(&root, &related_variable)?;
                arguments.push(ArgumentInfo {
                    name,
                    direction,
                    related_variable,
                    variable,
                });
            }
        }

        if iterated == 0 {
            return Err(DocError::NotFound(format!("<argument> of '{action}'")));
        }
        check_count(iterated, arguments.len())?;
        Ok(arguments)
    }

    /// Number of `<argument>` elements declared for `action`.
    pub fn argument_count(&self, action: &str) -> Result<usize> {
        let root = self.parse_document()?;
        let element = find_action(&root, action)?;
        let Some(list) = child(element, "argumentList") else {
            return Ok(0);
        };
        match children(list, "argument").count() {
            0 => Err(DocError::NotFound(format!("<argument> of '{action}'"))),
            count => Ok(count),
        }
    }

    /// Metadata of one state variable.
    pub fn variable_info(&self, variable: &str) -> Result<VariableInfo> {
        let root = self.parse_document()?;
        variable_in(&root, variable)
    }

    /// Icons of the root device; empty when no `iconList` is declared.
    pub fn icon_list(&self) -> Result<Vec<IconParam>> {
        let root = self.parse_document()?;
        let device = required(&root, "device")?;
        let Some(list) = child(device, "iconList") else {
            return Ok(Vec::new());
        };

        let mut iterated = 0;
        let mut icons = Vec::new();
        for icon in children(list, "icon") {
            iterated += 1;
            let fields = (
                child_text(icon, "mimetype"),
                child_text(icon, "width"),
                child_text(icon, "height"),
                child_text(icon, "depth"),
                child_text(icon, "url"),
            );
            if let (Some(mime_type), Some(width), Some(height), Some(depth), Some(url)) = fields {
                icons.push(IconParam {
                    url,
                    mime_type,
                    width: leading_number(&width),
                    height: leading_number(&height),
                    depth: leading_number(&depth),
                });
            }
        }

        check_count(iterated, icons.len())?;
        Ok(icons)
    }
}
