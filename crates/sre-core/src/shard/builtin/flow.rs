//! Value sources and control flow: `Const`, `Input`, `Pass`, `Stop`,
//! `Restart`, `Return`, `Fail`, `Pause`, `Log`.

use std::time::Duration;

use crate::compose::InstanceData;
use crate::error::{CompositionError, SreError, SreResult};
use crate::shard::{check_param, Flow, ParameterInfo, Shard, Wake};
use crate::value::{DeepClone, TypeDescriptor, Value};
use crate::wire::Context;

fn any() -> Vec<TypeDescriptor> {
    vec![TypeDescriptor::Any]
}

/// Outputs its `Value` parameter
#[derive(Debug, Default)]
pub struct Const {
    value: Value,
}

impl Const {
    pub fn new(value: Value) -> Self {
        Const { value }
    }
}

impl Shard for Const {
    fn name(&self) -> &'static str {
        "Const"
    }

    fn help(&self) -> &'static str {
        "Outputs a constant value, ignoring its input."
    }

    fn input_types(&self) -> Vec<TypeDescriptor> {
        any()
    }

    fn output_types(&self) -> Vec<TypeDescriptor> {
        any()
    }

    fn parameters(&self) -> Vec<ParameterInfo> {
        vec![ParameterInfo::new("Value", "The value to output.", any())]
    }

    fn set_param(&mut self, index: usize, value: &Value) -> SreResult<()> {
        check_param(self, index, value)?;
        value.clone_into(&mut self.value);
        Ok(())
    }

    fn get_param(&self, index: usize) -> SreResult<Value> {
        match index {
            0 => Ok(self.value.deep_clone()),
            _ => Err(SreError::ParamOutOfRange {
                shard: self.name(),
                index,
            }),
        }
    }

    fn compose(&mut self, _data: &mut InstanceData<'_>) -> Result<TypeDescriptor, CompositionError> {
        Ok(TypeDescriptor::of(&self.value))
    }

    fn activate(&mut self, _ctx: &mut Context<'_>, _input: &Value) -> SreResult<Flow> {
        Ok(Flow::Continue(self.value.deep_clone()))
    }
}

/// Outputs the value the wire was started with
#[derive(Debug, Default)]
pub struct Input;

impl Shard for Input {
    fn name(&self) -> &'static str {
        "Input"
    }

    fn help(&self) -> &'static str {
        "Outputs the wire's input."
    }

    fn input_types(&self) -> Vec<TypeDescriptor> {
        any()
    }

    fn output_types(&self) -> Vec<TypeDescriptor> {
        any()
    }

    fn compose(&mut self, data: &mut InstanceData<'_>) -> Result<TypeDescriptor, CompositionError> {
        Ok(data.wire_input_type.clone())
    }

    fn activate(&mut self, ctx: &mut Context<'_>, _input: &Value) -> SreResult<Flow> {
        Ok(Flow::Continue(ctx.wire_input().deep_clone()))
    }
}

#[derive(Debug, Default)]
pub struct Pass;

impl Shard for Pass {
    fn name(&self) -> &'static str {
        "Pass"
    }

    fn input_types(&self) -> Vec<TypeDescriptor> {
        any()
    }

    fn output_types(&self) -> Vec<TypeDescriptor> {
        any()
    }

    fn activate(&mut self, _ctx: &mut Context<'_>, input: &Value) -> SreResult<Flow> {
        Ok(Flow::Continue(input.deep_clone()))
    }
}

/// Ends the wire; its input becomes the finished output
#[derive(Debug, Default)]
pub struct Stop;

impl Shard for Stop {
    fn name(&self) -> &'static str {
        "Stop"
    }

    fn help(&self) -> &'static str {
        "Stops the wire, keeping the input as its output."
    }

    fn input_types(&self) -> Vec<TypeDescriptor> {
        any()
    }

    fn output_types(&self) -> Vec<TypeDescriptor> {
        any()
    }

    fn is_flow_stopper(&self) -> bool {
        true
    }

    fn activate(&mut self, _ctx: &mut Context<'_>, _input: &Value) -> SreResult<Flow> {
        Ok(Flow::Stop)
    }
}

#[derive(Debug, Default)]
pub struct Restart;

impl Shard for Restart {
    fn name(&self) -> &'static str {
        "Restart"
    }

    fn help(&self) -> &'static str {
        "Starts a fresh iteration of the wire."
    }

    fn input_types(&self) -> Vec<TypeDescriptor> {
        any()
    }

    fn output_types(&self) -> Vec<TypeDescriptor> {
        vec![TypeDescriptor::None]
    }

    fn is_flow_stopper(&self) -> bool {
        true
    }

    fn activate(&mut self, _ctx: &mut Context<'_>, _input: &Value) -> SreResult<Flow> {
        Ok(Flow::Restart)
    }
}

#[derive(Debug, Default)]
pub struct Return;

impl Shard for Return {
    fn name(&self) -> &'static str {
        "Return"
    }

    fn help(&self) -> &'static str {
        "Ends the current sequence early with its input as the result."
    }

    fn input_types(&self) -> Vec<TypeDescriptor> {
        any()
    }

    fn output_types(&self) -> Vec<TypeDescriptor> {
        any()
    }

    fn is_flow_stopper(&self) -> bool {
        true
    }

    fn activate(&mut self, _ctx: &mut Context<'_>, _input: &Value) -> SreResult<Flow> {
        Ok(Flow::Return)
    }
}

/// Raises an activation error with its `Message`
#[derive(Debug)]
pub struct Fail {
    message: String,
}

impl Default for Fail {
    fn default() -> Self {
        Fail {
            message: "failed".to_string(),
        }
    }
}

impl Fail {
    pub fn new(message: impl Into<String>) -> Self {
        Fail {
            message: message.into(),
        }
    }
}

impl Shard for Fail {
    fn name(&self) -> &'static str {
        "Fail"
    }

    fn help(&self) -> &'static str {
        "Fails the wire with the given message."
    }

    fn input_types(&self) -> Vec<TypeDescriptor> {
        any()
    }

    fn output_types(&self) -> Vec<TypeDescriptor> {
        vec![TypeDescriptor::None]
    }

    fn parameters(&self) -> Vec<ParameterInfo> {
        vec![ParameterInfo::new(
            "Message",
            "Error message.",
            vec![TypeDescriptor::String],
        )]
    }

    fn set_param(&mut self, index: usize, value: &Value) -> SreResult<()> {
        check_param(self, index, value)?;
        if let Some(text) = value.as_str() {
            self.message = text.to_string();
        }
        Ok(())
    }

    fn get_param(&self, index: usize) -> SreResult<Value> {
        match index {
            0 => Ok(Value::from(self.message.as_str())),
            _ => Err(SreError::ParamOutOfRange {
                shard: self.name(),
                index,
            }),
        }
    }

    fn is_flow_stopper(&self) -> bool {
        true
    }

    fn activate(&mut self, _ctx: &mut Context<'_>, _input: &Value) -> SreResult<Flow> {
        Err(SreError::activation(self.message.clone()))
    }
}

/// Suspends the wire for `Time` seconds, then passes its input through
#[derive(Debug, Default)]
pub struct Pause {
    seconds: f64,
    waiting: bool,
}

impl Pause {
    pub fn new(seconds: f64) -> Self {
        Pause {
            seconds,
            waiting: false,
        }
    }
}

impl Shard for Pause {
    fn name(&self) -> &'static str {
        "Pause"
    }

    fn help(&self) -> &'static str {
        "Suspends the wire for the given number of seconds; 0 yields until the next tick."
    }

    fn input_types(&self) -> Vec<TypeDescriptor> {
        any()
    }

    fn output_types(&self) -> Vec<TypeDescriptor> {
        any()
    }

    fn parameters(&self) -> Vec<ParameterInfo> {
        vec![ParameterInfo::new(
            "Time",
            "Seconds to wait.",
            vec![TypeDescriptor::Float, TypeDescriptor::Int],
        )]
    }

    fn set_param(&mut self, index: usize, value: &Value) -> SreResult<()> {
        check_param(self, index, value)?;
        match value.as_float() {
            Some(seconds) if Duration::try_from_secs_f64(seconds).is_ok() => {
                self.seconds = seconds;
                Ok(())
            }
            _ => Err(SreError::InvalidParam {
                shard: self.name(),
                param: "Time",
                reason: format!("{value} is not a duration"),
            }),
        }
    }

    fn get_param(&self, index: usize) -> SreResult<Value> {
        match index {
            0 => Ok(Value::Float(self.seconds)),
            _ => Err(SreError::ParamOutOfRange {
                shard: self.name(),
                index,
            }),
        }
    }

    fn activate(&mut self, ctx: &mut Context<'_>, input: &Value) -> SreResult<Flow> {
        if self.waiting {
            self.waiting = false;
            return Ok(Flow::Continue(input.deep_clone()));
        }
        let wake = if self.seconds > 0.0 {
            let at = Duration::try_from_secs_f64(self.seconds)
                .ok()
                .and_then(|wait| ctx.now().checked_add(wait))
                .ok_or_else(|| {
                    SreError::activation(format!("cannot pause for {} seconds", self.seconds))
                })?;
            Wake::At(at)
        } else {
            Wake::Now
        };
        self.waiting = true;
        Ok(Flow::Suspend(wake))
    }

    fn clean_up(&mut self, _ctx: &mut Context<'_>) {
        self.waiting = false;
    }
}

/// Logs its input through `tracing`
#[derive(Debug, Default)]
pub struct Log {
    label: String,
}

impl Shard for Log {
    fn name(&self) -> &'static str {
        "Log"
    }

    fn help(&self) -> &'static str {
        "Logs the input at info level and passes it through."
    }

    fn input_types(&self) -> Vec<TypeDescriptor> {
        any()
    }

    fn output_types(&self) -> Vec<TypeDescriptor> {
        any()
    }

    fn parameters(&self) -> Vec<ParameterInfo> {
        vec![ParameterInfo::new(
            "Label",
            "Prefix for the log line.",
            vec![TypeDescriptor::String, TypeDescriptor::None],
        )]
    }

    fn set_param(&mut self, index: usize, value: &Value) -> SreResult<()> {
        check_param(self, index, value)?;
        self.label = value.as_str().unwrap_or_default().to_string();
        Ok(())
    }

    fn get_param(&self, index: usize) -> SreResult<Value> {
        match index {
            0 => Ok(Value::from(self.label.as_str())),
            _ => Err(SreError::ParamOutOfRange {
                shard: self.name(),
                index,
            }),
        }
    }

    fn activate(&mut self, ctx: &mut Context<'_>, input: &Value) -> SreResult<Flow> {
        let text = match input {
            Value::Enum(e) => ctx
                .process()
                .enum_label(e)
                .unwrap_or_else(|| input.to_string()),
            other => other.to_string(),
        };
        tracing::info!(wire = ctx.wire_name(), label = %self.label, "{text}");
        Ok(Flow::Continue(input.deep_clone()))
    }
}
