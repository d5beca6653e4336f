//! Structured results returned by the extraction queries

/// Metadata of a state variable as declared in a service description
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariableInfo {
    /// Raw value of the `sendEvents` attribute
    pub send_events: String,
    /// Declared data type, e.g. `ui4` or `string`
    pub data_type: String,
    pub default_value: Option<String>,
    pub minimum: Option<String>,
    pub maximum: Option<String>,
    pub step: Option<String>,
    /// Values of `allowedValueList`, in document order
    pub allowed_values: Vec<String>,
}

impl VariableInfo {
    /// Whether the variable is evented (`sendEvents="yes"`)
    pub fn sends_events(&self) -> bool {
        self.send_events.trim().eq_ignore_ascii_case("yes")
    }
}

/// One argument of an action together with its related state variable
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArgumentInfo {
    pub name: String,
    /// `in` or `out`
    pub direction: String,
    pub related_variable: String,
    pub variable: VariableInfo,
}

impl ArgumentInfo {
    pub fn is_input(&self) -> bool {
        self.direction.trim().eq_ignore_ascii_case("in")
    }

    /// Flatten into labelled fields for display.
    ///
    /// Optional fields are omitted when absent; allowed values are joined with `, `.
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            ("Arg name", self.name.clone()),
            ("Direction", self.direction.clone()),
            ("Var name", self.related_variable.clone()),
            ("Events", self.variable.send_events.clone()),
            ("Type", self.variable.data_type.clone()),
        ];
        let optional = [
            ("Default", &self.variable.default_value),
            ("Min", &self.variable.minimum),
            ("Max", &self.variable.maximum),
            ("Step", &self.variable.step),
        ];
        for (label, value) in optional {
            if let Some(value) = value {
                fields.push((label, value.clone()));
            }
        }
        if !self.variable.allowed_values.is_empty() {
            fields.push(("Allowed values", self.variable.allowed_values.join(", ")));
        }
        fields
    }
}

/// Icon entry of a root device description
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IconParam {
    /// Icon path as declared, relative to the base URL
    pub url: String,
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

impl IconParam {
    /// Exact width/height match; a `depth` of 0 matches any depth.
    pub fn matches(&self, width: u32, height: u32, depth: u32) -> bool {
        self.width == width && self.height == height && (depth == 0 || self.depth == depth)
    }
}
