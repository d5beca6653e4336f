//! Actions of a service and their invocation.

use std::sync::{Arc, Weak};

use description_client::ArgumentInfo;
use parking_lot::Mutex;
use upnp_transport::codes::{self, error_message};
use upnp_transport::{InvokeFailure, InvokeOutput, WireValue};

use crate::error::{CpError, Result};
use crate::service::Service;

/// Status of an invocation that produced only a return value
pub const RETURN_VALUE_ONLY: i32 = -2;

/// Status of a failed invocation
pub const INVOKE_FAILED: i32 = -1;

/// One input slot of an action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputArgument {
    pub name: String,
    /// Declared data type of the related state variable
    pub data_type: String,
    /// Current value as text; converted to the declared type on invocation
    pub value: String,
}

/// Result of [`Action::invoke`]
///
/// On success `outputs` holds `(type tag, value)` pairs, followed by the return
/// value rendered as `Return value: <value>` when the action has one. On failure
/// `status` is [`INVOKE_FAILED`] and `outputs` holds the error code, its message
/// and the device's own error description when it sent one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Number of entries in `outputs`, [`RETURN_VALUE_ONLY`] or [`INVOKE_FAILED`]
    pub status: i32,
    pub outputs: Vec<(String, String)>,
}

impl Invocation {
    fn failure(failure: &InvokeFailure) -> Self {
        let mut outputs = vec![
            ("string".to_string(), format!("ERROR: 0x{:x}", failure.code)),
            ("string".to_string(), error_message(failure.code).to_string()),
        ];
        if let Some(description) = &failure.description {
            outputs.push(("string".to_string(), description.clone()));
        }
        Self {
            status: INVOKE_FAILED,
            outputs,
        }
    }

    fn success(output: InvokeOutput) -> Self {
        let mut outputs: Vec<(String, String)> = output
            .outputs
            .iter()
            .map(|v| (v.wire_type().description().to_string(), v.to_string()))
            .collect();
        let count = outputs.len();

        let has_return = !output.return_value.is_empty();
        if has_return {
            outputs.push((
                output.return_value.wire_type().description().to_string(),
                format!("Return value: {}", output.return_value),
            ));
        }

        let status = match (count, has_return) {
            (0, true) => RETURN_VALUE_ONLY,
            (n, true) => i32::try_from(n + 1).unwrap_or(i32::MAX),
            (n, false) => i32::try_from(n).unwrap_or(i32::MAX),
        };
        Self { status, outputs }
    }

    pub fn is_success(&self) -> bool {
        self.status != INVOKE_FAILED
    }
}

#[derive(Debug, Default)]
struct ActionState {
    argument_count: Option<usize>,
    inputs: Option<Vec<InputArgument>>,
}

/// A named action of a [`Service`]
///
/// Argument counts and the input schema are read from the service description
/// on first use and cached; a failed lookup is not cached.
#[derive(Debug)]
pub struct Action {
    name: String,
    service: Weak<Service>,
    state: Mutex<ActionState>,
}

impl Action {
    pub(crate) fn new(name: String, service: Weak<Service>) -> Self {
        Self {
            name,
            service,
            state: Mutex::new(ActionState::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Owning service, `None` once the service tree has been dropped
    pub fn parent_service(&self) -> Option<Arc<Service>> {
        self.service.upgrade()
    }

    fn service(&self) -> Result<Arc<Service>> {
        self.service
            .upgrade()
            .ok_or_else(|| CpError::State(format!("service of action '{}' was dropped", self.name)))
    }

    /// Total number of declared arguments, input and output
    pub fn argument_count(&self) -> Result<usize> {
        let mut state = self.state.lock();
        if let Some(count) = state.argument_count {
            return Ok(count);
        }
        let count = self.service()?.access_data().argument_count(&self.name)?;
        state.argument_count = Some(count);
        Ok(count)
    }

    pub fn input_argument_count(&self) -> Result<usize> {
        let mut state = self.state.lock();
        Ok(self.resolve_inputs(&mut state)?.len())
    }

    fn resolve_inputs<'a>(&self, state: &'a mut ActionState) -> Result<&'a mut Vec<InputArgument>> {
        if state.inputs.is_none() {
            let arguments = self.info()?;
            state.argument_count.get_or_insert(arguments.len());
            let inputs = arguments
                .into_iter()
                .filter(ArgumentInfo::is_input)
                .map(|arg| InputArgument {
                    name: arg.name,
                    data_type: arg.variable.data_type,
                    value: String::new(),
                })
                .collect();
            tracing::debug!("Resolved input arguments of {}", self.name);
            state.inputs = Some(inputs);
        }
        state
            .inputs
            .as_mut()
            .ok_or_else(|| CpError::NotFound(format!("input arguments of '{}'", self.name)))
    }

    /// Assign `values` to the input slots in order.
    ///
    /// # Errors
    ///
    /// Fails when fewer values than input slots are supplied. Surplus values are ignored.
    pub fn set_input_arguments<S: AsRef<str>>(&self, values: &[S]) -> Result<()> {
        let mut state = self.state.lock();
        let inputs = self.resolve_inputs(&mut state)?;
        if values.len() < inputs.len() {
            return Err(CpError::NotFound(format!(
                "'{}' takes {} input arguments, {} supplied",
                self.name,
                inputs.len(),
                values.len()
            )));
        }
        for (slot, value) in inputs.iter_mut().zip(values) {
            slot.value = value.as_ref().to_string();
        }
        Ok(())
    }

    pub fn set_input_argument(&self, value: impl Into<String>, index: usize) -> Result<()> {
        let mut state = self.state.lock();
        let inputs = self.resolve_inputs(&mut state)?;
        let slot = inputs
            .get_mut(index)
            .ok_or_else(|| CpError::NotFound(format!("input argument {index} of '{}'", self.name)))?;
        slot.value = value.into();
        Ok(())
    }

    /// Current input slots in declaration order
    pub fn input_arguments(&self) -> Result<Vec<InputArgument>> {
        let mut state = self.state.lock();
        Ok(self.resolve_inputs(&mut state)?.clone())
    }

    pub fn input_argument(&self, index: usize) -> Result<InputArgument> {
        let mut state = self.state.lock();
        let inputs = self.resolve_inputs(&mut state)?;
        inputs
            .get(index)
            .cloned()
            .ok_or_else(|| CpError::NotFound(format!("input argument {index} of '{}'", self.name)))
    }

    /// Every declared argument with the metadata of its related state variable
    pub fn info(&self) -> Result<Vec<ArgumentInfo>> {
        Ok(self.service()?.access_data().action_arguments(&self.name)?)
    }

    /// Invoke the action with the current input values.
    ///
    /// Failures are reported in the returned [`Invocation`], never as an error.
    pub fn invoke(&self) -> Invocation {
        let prepared = self.service().and_then(|service| {
            let inputs = self.input_arguments()?;
            Ok((service, inputs))
        });
        let (service, inputs) = match prepared {
            Ok(prepared) => prepared,
            Err(e) => {
                tracing::warn!("Cannot invoke {}: {}", self.name, e);
                return Invocation::failure(&InvokeFailure::with_description(
                    codes::INVALID_DOCUMENT,
                    e.to_string(),
                ));
            }
        };

        let mut values = Vec::with_capacity(inputs.len());
        for input in &inputs {
            match WireValue::parse(&input.data_type, &input.value) {
                Ok(value) => values.push(value),
                Err(e) => {
                    tracing::debug!("Input {} of {} rejected: {}", input.name, self.name, e);
                    return Invocation::failure(&InvokeFailure::with_description(
                        codes::INVALID_ARGUMENTS,
                        e.to_string(),
                    ));
                }
            }
        }

        tracing::debug!("Invoking {} on {}", self.name, service.id());
        match service.handle().invoke_action(&self.name, &values) {
            Ok(output) => Invocation::success(output),
            Err(failure) => {
                tracing::debug!("{} failed with 0x{:x}", self.name, failure.code);
                Invocation::failure(&failure)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_failure_shape() {
        let invocation = Invocation::failure(&InvokeFailure::new(codes::INVALID_ACTION));
        assert_eq!(invocation.status, INVOKE_FAILED);
        assert_eq!(
            invocation.outputs,
            vec![
                ("string".to_string(), "ERROR: 0x80040207".to_string()),
                ("string".to_string(), "Invalid Action".to_string()),
            ]
        );
        assert!(!invocation.is_success());

        let described =
            Invocation::failure(&InvokeFailure::with_description(codes::ACTION_SPECIFIC_BASE, "Busy"));
        assert_eq!(described.outputs.len(), 3);
        assert_eq!(described.outputs[2].1, "Busy");
    }

    #[test]
    fn test_success_shapes() {
        let outputs = Invocation::success(InvokeOutput {
            outputs: vec![WireValue::Ui2(12), WireValue::Bool(true)],
            return_value: WireValue::Empty,
        });
        assert_eq!(outputs.status, 2);
        assert_eq!(outputs.outputs[0], ("ui2".to_string(), "12".to_string()));
        assert_eq!(outputs.outputs[1], ("boolean".to_string(), "1".to_string()));

        let return_only = Invocation::success(InvokeOutput {
            outputs: Vec::new(),
            return_value: WireValue::I4(-3),
        });
        assert_eq!(return_only.status, RETURN_VALUE_ONLY);
        assert_eq!(return_only.outputs, vec![("i4".to_string(), "Return value: -3".to_string())]);

        let both = Invocation::success(InvokeOutput {
            outputs: vec![WireValue::Ui2(27)],
            return_value: WireValue::Bool(true),
        });
        assert_eq!(both.status, 2);
        assert_eq!(both.outputs[1], ("boolean".to_string(), "Return value: 1".to_string()));

        let nothing = Invocation::success(InvokeOutput::default());
        assert_eq!(nothing.status, 0);
        assert!(nothing.is_success());
    }

    proptest! {
        #[test]
        fn prop_status_counts_outputs_and_return_value(values in prop::collection::vec(any::<u32>(), 1..8)) {
            let invocation = Invocation::success(InvokeOutput {
                outputs: values.iter().copied().map(WireValue::Ui4).collect(),
                return_value: WireValue::Bool(false),
            });
            prop_assert_eq!(invocation.status as usize, values.len() + 1);
            prop_assert_eq!(invocation.status as usize, invocation.outputs.len());
            prop_assert_eq!(invocation.outputs.len(), values.len() + 1);
            prop_assert!(invocation.outputs[..values.len()].iter().all(|(tag, _)| tag == "ui4"));
            let last = invocation.outputs.last().map(|(_, v)| v.as_str());
            prop_assert_eq!(last, Some("Return value: 0"));
        }
    }

    #[test]
    fn test_orphaned_action() {
        let action = Action::new("Play".to_string(), Weak::new());
        assert!(action.parent_service().is_none());
        assert!(matches!(action.argument_count(), Err(CpError::State(_))));

        let invocation = action.invoke();
        assert_eq!(invocation.status, INVOKE_FAILED);
        assert_eq!(invocation.outputs[1].1, "Invalid Document");
    }
}
