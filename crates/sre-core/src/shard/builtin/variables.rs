//! Variable shards: `Set`, `Update`, `Get`, `Push`, `Count`.

use crate::compose::{ExposedVariable, InstanceData};
use crate::error::{CompositionError, CompositionErrorKind, SreError, SreResult};
use crate::shard::{check_param, Flow, ParameterInfo, Shard};
use crate::value::{DeepClone, SeqArray, TypeDescriptor, Value};
use crate::vars::{VarRef, VarScope};
use crate::wire::Context;

fn name_param() -> ParameterInfo {
    ParameterInfo::new(
        "Name",
        "Name of the variable.",
        vec![TypeDescriptor::String],
    )
}

fn set_name(shard: &dyn Shard, target: &mut String, index: usize, value: &Value) -> SreResult<()> {
    check_param(shard, index, value)?;
    match value.as_str() {
        Some(name) if !name.is_empty() => {
            *target = name.to_string();
            Ok(())
        }
        _ => Err(SreError::InvalidParam {
            shard: shard.name(),
            param: "Name",
            reason: "variable names cannot be empty".to_string(),
        }),
    }
}

fn require_name(name: &str) -> Result<(), CompositionError> {
    if name.is_empty() {
        Err(CompositionError::rejected("the Name parameter is not set"))
    } else {
        Ok(())
    }
}

fn release(ctx: &mut Context<'_>, slot: &mut Option<VarRef>) {
    if let Some(slot) = slot.take() {
        ctx.release_variable(slot);
    }
}

fn warmed<'a>(shard: &'static str, slot: &'a Option<VarRef>) -> SreResult<&'a VarRef> {
    slot.as_ref()
        .ok_or_else(|| SreError::activation(format!("{shard} activated before warm-up")))
}

fn out_of_range(shard: &'static str, index: usize) -> SreError {
    SreError::ParamOutOfRange { shard, index }
}

/// Stores its input into a variable, exposing it
#[derive(Debug, Default)]
pub struct Set {
    name: String,
    global: bool,
    ty: TypeDescriptor,
    slot: Option<VarRef>,
}

impl Set {
    pub fn new(name: impl Into<String>) -> Self {
        Set {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn global(mut self) -> Self {
        self.global = true;
        self
    }
}

impl Shard for Set {
    fn name(&self) -> &'static str {
        "Set"
    }

    fn help(&self) -> &'static str {
        "Stores the input into a variable and passes it through."
    }

    fn input_types(&self) -> Vec<TypeDescriptor> {
        vec![TypeDescriptor::Any]
    }

    fn output_types(&self) -> Vec<TypeDescriptor> {
        vec![TypeDescriptor::Any]
    }

    fn parameters(&self) -> Vec<ParameterInfo> {
        vec![
            name_param(),
            ParameterInfo::new(
                "Global",
                "Store in the process-wide scope.",
                vec![TypeDescriptor::Bool],
            ),
        ]
    }

    fn set_param(&mut self, index: usize, value: &Value) -> SreResult<()> {
        match index {
            0 => {
                let mut name = String::new();
                set_name(self, &mut name, index, value)?;
                self.name = name;
                Ok(())
            }
            1 => {
                check_param(self, index, value)?;
                self.global = value.as_bool().unwrap_or(false);
                Ok(())
            }
            _ => Err(out_of_range(self.name(), index)),
        }
    }

    fn get_param(&self, index: usize) -> SreResult<Value> {
        match index {
            0 => Ok(Value::from(self.name.as_str())),
            1 => Ok(Value::Bool(self.global)),
            _ => Err(out_of_range(self.name(), index)),
        }
    }

    fn compose(&mut self, data: &mut InstanceData<'_>) -> Result<TypeDescriptor, CompositionError> {
        require_name(&self.name)?;
        if data.pure && self.global {
            return Err(CompositionError::rejected(format!(
                "pure wire cannot set global `{}`",
                self.name
            )));
        }
        if let Some(existing) = data.shared.get(&self.name) {
            if !existing.mutable {
                return Err(CompositionError::new(
                    CompositionErrorKind::MutatesImmutable,
                    format!("`{}` is immutable", self.name),
                ));
            }
        }
        self.ty = data.input_type.clone();
        Ok(data.input_type.clone())
    }

    fn exposed_variables(&self) -> Vec<ExposedVariable> {
        let scope = if self.global {
            VarScope::Global
        } else {
            VarScope::Wire
        };
        vec![ExposedVariable::new(self.name.clone(), self.ty.clone())
            .mutable()
            .scoped(scope)]
    }

    fn warm_up(&mut self, ctx: &mut Context<'_>) -> SreResult<()> {
        release(ctx, &mut self.slot);
        self.slot = Some(if self.global {
            ctx.reference_global(&self.name)?
        } else {
            ctx.reference_variable(&self.name)
        });
        Ok(())
    }

    fn activate(&mut self, ctx: &mut Context<'_>, input: &Value) -> SreResult<Flow> {
        let slot = warmed("Set", &self.slot)?;
        ctx.assign_variable(slot, input);
        Ok(Flow::Continue(input.deep_clone()))
    }

    fn clean_up(&mut self, ctx: &mut Context<'_>) {
        release(ctx, &mut self.slot);
    }
}

/// Overwrites an existing mutable variable without changing its type
#[derive(Debug, Default)]
pub struct Update {
    name: String,
    slot: Option<VarRef>,
}

impl Update {
    pub fn new(name: impl Into<String>) -> Self {
        Update {
            name: name.into(),
            slot: None,
        }
    }
}

impl Shard for Update {
    fn name(&self) -> &'static str {
        "Update"
    }

    fn help(&self) -> &'static str {
        "Overwrites an existing variable with the input."
    }

    fn input_types(&self) -> Vec<TypeDescriptor> {
        vec![TypeDescriptor::Any]
    }

    fn output_types(&self) -> Vec<TypeDescriptor> {
        vec![TypeDescriptor::Any]
    }

    fn parameters(&self) -> Vec<ParameterInfo> {
        vec![name_param()]
    }

    fn set_param(&mut self, index: usize, value: &Value) -> SreResult<()> {
        if index != 0 {
            return Err(out_of_range(self.name(), index));
        }
        let mut name = String::new();
        set_name(self, &mut name, index, value)?;
        self.name = name;
        Ok(())
    }

    fn get_param(&self, index: usize) -> SreResult<Value> {
        match index {
            0 => Ok(Value::from(self.name.as_str())),
            _ => Err(out_of_range(self.name(), index)),
        }
    }

    fn compose(&mut self, data: &mut InstanceData<'_>) -> Result<TypeDescriptor, CompositionError> {
        require_name(&self.name)?;
        if let Some(existing) = data.shared.get(&self.name) {
            if !existing.ty.accepts(data.input_type) {
                return Err(CompositionError::new(
                    CompositionErrorKind::RequiredTypeMismatch,
                    format!(
                        "`{}` is {}, cannot update it with {}",
                        self.name, existing.ty, data.input_type
                    ),
                ));
            }
        }
        Ok(data.input_type.clone())
    }

    fn required_variables(&self) -> Vec<ExposedVariable> {
        vec![ExposedVariable::new(self.name.clone(), TypeDescriptor::Any).mutable()]
    }

    fn warm_up(&mut self, ctx: &mut Context<'_>) -> SreResult<()> {
        release(ctx, &mut self.slot);
        self.slot = Some(ctx.reference_variable(&self.name));
        Ok(())
    }

    fn activate(&mut self, ctx: &mut Context<'_>, input: &Value) -> SreResult<Flow> {
        let slot = warmed("Update", &self.slot)?;
        ctx.assign_variable(slot, input);
        Ok(Flow::Continue(input.deep_clone()))
    }

    fn clean_up(&mut self, ctx: &mut Context<'_>) {
        release(ctx, &mut self.slot);
    }
}

/// Outputs a variable, or its `Default` when unset or of another type
#[derive(Debug, Default)]
pub struct Get {
    name: String,
    default: Value,
    slot: Option<VarRef>,
}

impl Get {
    pub fn new(name: impl Into<String>) -> Self {
        Get {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = default;
        self
    }
}

impl Shard for Get {
    fn name(&self) -> &'static str {
        "Get"
    }

    fn help(&self) -> &'static str {
        "Outputs the value of a variable."
    }

    fn input_types(&self) -> Vec<TypeDescriptor> {
        vec![TypeDescriptor::Any]
    }

    fn output_types(&self) -> Vec<TypeDescriptor> {
        vec![TypeDescriptor::Any]
    }

    fn parameters(&self) -> Vec<ParameterInfo> {
        vec![
            name_param(),
            ParameterInfo::new(
                "Default",
                "Output when the variable is unset or of another type.",
                vec![TypeDescriptor::Any],
            ),
        ]
    }

    fn set_param(&mut self, index: usize, value: &Value) -> SreResult<()> {
        match index {
            0 => {
                let mut name = String::new();
                set_name(self, &mut name, index, value)?;
                self.name = name;
                Ok(())
            }
            1 => {
                value.clone_into(&mut self.default);
                Ok(())
            }
            _ => Err(out_of_range(self.name(), index)),
        }
    }

    fn get_param(&self, index: usize) -> SreResult<Value> {
        match index {
            0 => Ok(Value::from(self.name.as_str())),
            1 => Ok(self.default.deep_clone()),
            _ => Err(out_of_range(self.name(), index)),
        }
    }

    fn compose(&mut self, data: &mut InstanceData<'_>) -> Result<TypeDescriptor, CompositionError> {
        require_name(&self.name)?;
        match data.shared.get(&self.name) {
            Some(exposed) => Ok(exposed.ty.clone()),
            None if !self.default.is_none() => Ok(TypeDescriptor::of(&self.default)),
            None => Err(CompositionError::new(
                CompositionErrorKind::MissingRequiredVariable,
                format!("`{}` is not exposed and has no default", self.name),
            )),
        }
    }

    fn required_variables(&self) -> Vec<ExposedVariable> {
        if self.default.is_none() {
            vec![ExposedVariable::new(self.name.clone(), TypeDescriptor::Any)]
        } else {
            Vec::new()
        }
    }

    fn warm_up(&mut self, ctx: &mut Context<'_>) -> SreResult<()> {
        release(ctx, &mut self.slot);
        self.slot = Some(ctx.reference_variable(&self.name));
        Ok(())
    }

    fn activate(&mut self, ctx: &mut Context<'_>, _input: &Value) -> SreResult<Flow> {
        let slot = warmed("Get", &self.slot)?;
        let default = &self.default;
        let output = ctx.read_variable(slot, |value| {
            if !default.is_none() && value.tag() != default.tag() {
                default.deep_clone()
            } else {
                value.deep_clone()
            }
        });
        Ok(Flow::Continue(output))
    }

    fn clean_up(&mut self, ctx: &mut Context<'_>) {
        release(ctx, &mut self.slot);
    }
}

/// Appends its input to a sequence variable, creating it when needed
#[derive(Debug, Default)]
pub struct Push {
    name: String,
    element: TypeDescriptor,
    exposes: bool,
    slot: Option<VarRef>,
}

impl Push {
    pub fn new(name: impl Into<String>) -> Self {
        Push {
            name: name.into(),
            ..Self::default()
        }
    }
}

impl Shard for Push {
    fn name(&self) -> &'static str {
        "Push"
    }

    fn help(&self) -> &'static str {
        "Appends the input to a sequence variable."
    }

    fn input_types(&self) -> Vec<TypeDescriptor> {
        vec![TypeDescriptor::Any]
    }

    fn output_types(&self) -> Vec<TypeDescriptor> {
        vec![TypeDescriptor::Any]
    }

    fn parameters(&self) -> Vec<ParameterInfo> {
        vec![name_param()]
    }

    fn set_param(&mut self, index: usize, value: &Value) -> SreResult<()> {
        if index != 0 {
            return Err(out_of_range(self.name(), index));
        }
        let mut name = String::new();
        set_name(self, &mut name, index, value)?;
        self.name = name;
        Ok(())
    }

    fn get_param(&self, index: usize) -> SreResult<Value> {
        match index {
            0 => Ok(Value::from(self.name.as_str())),
            _ => Err(out_of_range(self.name(), index)),
        }
    }

    fn compose(&mut self, data: &mut InstanceData<'_>) -> Result<TypeDescriptor, CompositionError> {
        require_name(&self.name)?;
        self.element = data.input_type.clone();
        self.exposes = match data.shared.get(&self.name) {
            None => true,
            Some(existing) => {
                let wanted = TypeDescriptor::seq_of(self.element.clone());
                if !existing.mutable {
                    return Err(CompositionError::new(
                        CompositionErrorKind::MutatesImmutable,
                        format!("`{}` is immutable", self.name),
                    ));
                }
                if !existing.ty.accepts(&wanted) {
                    return Err(CompositionError::new(
                        CompositionErrorKind::ExposedTypeConflict,
                        format!("`{}` is {}, cannot push {}", self.name, existing.ty, self.element),
                    ));
                }
                false
            }
        };
        Ok(data.input_type.clone())
    }

    fn exposed_variables(&self) -> Vec<ExposedVariable> {
        if self.exposes {
            vec![ExposedVariable::new(
                self.name.clone(),
                TypeDescriptor::seq_of(self.element.clone()),
            )
            .mutable()]
        } else {
            Vec::new()
        }
    }

    fn warm_up(&mut self, ctx: &mut Context<'_>) -> SreResult<()> {
        release(ctx, &mut self.slot);
        self.slot = Some(ctx.reference_variable(&self.name));
        Ok(())
    }

    fn activate(&mut self, ctx: &mut Context<'_>, input: &Value) -> SreResult<Flow> {
        let slot = warmed("Push", &self.slot)?;
        ctx.with_variable_mut(slot, |value| {
            if !matches!(value, Value::Seq(_)) {
                *value = Value::Seq(SeqArray::new());
            }
            value.cast_seq_mut().push_clone(input);
        });
        Ok(Flow::Continue(input.deep_clone()))
    }

    fn clean_up(&mut self, ctx: &mut Context<'_>) {
        release(ctx, &mut self.slot);
    }
}

/// Outputs the length of a container or string variable
#[derive(Debug, Default)]
pub struct Count {
    name: String,
    slot: Option<VarRef>,
}

impl Count {
    pub fn new(name: impl Into<String>) -> Self {
        Count {
            name: name.into(),
            slot: None,
        }
    }
}

impl Shard for Count {
    fn name(&self) -> &'static str {
        "Count"
    }

    fn help(&self) -> &'static str {
        "Outputs the number of elements of a variable."
    }

    fn input_types(&self) -> Vec<TypeDescriptor> {
        vec![TypeDescriptor::Any]
    }

    fn output_types(&self) -> Vec<TypeDescriptor> {
        vec![TypeDescriptor::Int]
    }

    fn parameters(&self) -> Vec<ParameterInfo> {
        vec![name_param()]
    }

    fn set_param(&mut self, index: usize, value: &Value) -> SreResult<()> {
        if index != 0 {
            return Err(out_of_range(self.name(), index));
        }
        let mut name = String::new();
        set_name(self, &mut name, index, value)?;
        self.name = name;
        Ok(())
    }

    fn get_param(&self, index: usize) -> SreResult<Value> {
        match index {
            0 => Ok(Value::from(self.name.as_str())),
            _ => Err(out_of_range(self.name(), index)),
        }
    }

    fn required_variables(&self) -> Vec<ExposedVariable> {
        vec![ExposedVariable::new(self.name.clone(), TypeDescriptor::Any)]
    }

    fn warm_up(&mut self, ctx: &mut Context<'_>) -> SreResult<()> {
        release(ctx, &mut self.slot);
        self.slot = Some(ctx.reference_variable(&self.name));
        Ok(())
    }

    fn activate(&mut self, ctx: &mut Context<'_>, _input: &Value) -> SreResult<Flow> {
        let slot = warmed("Count", &self.slot)?;
        let count = ctx.read_variable(slot, |value| match value {
            Value::Seq(s) => s.len(),
            Value::Table(t) => t.len(),
            Value::Set(s) => s.len(),
            Value::String(s) => s.chars().count(),
            Value::Bytes(b) => b.len(),
            _ => 0,
        });
        Ok(Flow::Continue(Value::Int(count as i64)))
    }

    fn clean_up(&mut self, ctx: &mut Context<'_>) {
        release(ctx, &mut self.slot);
    }
}
