//! Comparison, boolean and arithmetic shards: `Is`, `IsNot`, `Not`, `Math.Add`.

use crate::compose::{ExposedVariable, InstanceData};
use crate::error::{CompositionError, CompositionErrorKind, SreError, SreResult};
use crate::shard::{check_param, Flow, ParamVar, ParameterInfo, Shard};
use crate::value::{DeepClone, TypeDescriptor, Value};
use crate::wire::Context;

fn operand_param(help: &'static str) -> ParameterInfo {
    ParameterInfo::new(
        "Value",
        help,
        vec![
            TypeDescriptor::Any,
            TypeDescriptor::ContextVar(Vec::new()),
        ],
    )
}

macro_rules! comparison_shard {
    ($ty:ident, $name:literal, $help:literal, $negate:literal) => {
        #[derive(Debug, Default)]
        pub struct $ty {
            operand: ParamVar,
        }

        impl $ty {
            pub fn new(operand: Value) -> Self {
                $ty {
                    operand: ParamVar::new(operand),
                }
            }
        }

        impl Shard for $ty {
            fn name(&self) -> &'static str {
                $name
            }

            fn help(&self) -> &'static str {
                $help
            }

            fn input_types(&self) -> Vec<TypeDescriptor> {
                vec![TypeDescriptor::Any]
            }

            fn output_types(&self) -> Vec<TypeDescriptor> {
                vec![TypeDescriptor::Bool]
            }

            fn parameters(&self) -> Vec<ParameterInfo> {
                vec![operand_param("The value to compare the input with.")]
            }

            fn set_param(&mut self, index: usize, value: &Value) -> SreResult<()> {
                check_param(self, index, value)?;
                self.operand.set(value);
                Ok(())
            }

            fn get_param(&self, index: usize) -> SreResult<Value> {
                match index {
                    0 => Ok(self.operand.value().deep_clone()),
                    _ => Err(SreError::ParamOutOfRange {
                        shard: self.name(),
                        index,
                    }),
                }
            }

            fn required_variables(&self) -> Vec<ExposedVariable> {
                self.operand
                    .required(TypeDescriptor::Any)
                    .into_iter()
                    .collect()
            }

            fn warm_up(&mut self, ctx: &mut Context<'_>) -> SreResult<()> {
                self.operand.warm_up(ctx);
                Ok(())
            }

            fn activate(&mut self, ctx: &mut Context<'_>, input: &Value) -> SreResult<Flow> {
                let equal = self.operand.with(ctx, |operand| operand == input);
                Ok(Flow::Continue(Value::Bool(equal != $negate)))
            }

            fn clean_up(&mut self, ctx: &mut Context<'_>) {
                self.operand.clean_up(ctx);
            }
        }
    };
}

comparison_shard!(Is, "Is", "Outputs whether the input equals the value.", false);
comparison_shard!(IsNot, "IsNot", "Outputs whether the input differs from the value.", true);

#[derive(Debug, Default)]
pub struct Not;

impl Shard for Not {
    fn name(&self) -> &'static str {
        "Not"
    }

    fn help(&self) -> &'static str {
        "Negates a boolean input."
    }

    fn input_types(&self) -> Vec<TypeDescriptor> {
        vec![TypeDescriptor::Bool]
    }

    fn output_types(&self) -> Vec<TypeDescriptor> {
        vec![TypeDescriptor::Bool]
    }

    fn activate(&mut self, _ctx: &mut Context<'_>, input: &Value) -> SreResult<Flow> {
        match input.as_bool() {
            Some(b) => Ok(Flow::Continue(Value::Bool(!b))),
            None => Err(SreError::TypeMismatch {
                expected: "Bool".to_string(),
                actual: input.tag().to_string(),
            }),
        }
    }
}

/// Adds `Operand` to an `Int` or `Float` input
#[derive(Debug, Default)]
pub struct MathAdd {
    operand: ParamVar,
}

impl MathAdd {
    pub fn new(operand: Value) -> Self {
        MathAdd {
            operand: ParamVar::new(operand),
        }
    }
}

impl Shard for MathAdd {
    fn name(&self) -> &'static str {
        "Math.Add"
    }

    fn help(&self) -> &'static str {
        "Adds the operand to the input."
    }

    fn input_types(&self) -> Vec<TypeDescriptor> {
        vec![TypeDescriptor::Int, TypeDescriptor::Float]
    }

    fn output_types(&self) -> Vec<TypeDescriptor> {
        vec![TypeDescriptor::Int, TypeDescriptor::Float]
    }

    fn parameters(&self) -> Vec<ParameterInfo> {
        vec![ParameterInfo::new(
            "Operand",
            "The value to add.",
            vec![
                TypeDescriptor::Int,
                TypeDescriptor::Float,
                TypeDescriptor::ContextVar(Vec::new()),
            ],
        )]
    }

    fn set_param(&mut self, index: usize, value: &Value) -> SreResult<()> {
        check_param(self, index, value)?;
        self.operand.set(value);
        Ok(())
    }

    fn get_param(&self, index: usize) -> SreResult<Value> {
        match index {
            0 => Ok(self.operand.value().deep_clone()),
            _ => Err(SreError::ParamOutOfRange {
                shard: self.name(),
                index,
            }),
        }
    }

    fn compose(&mut self, data: &mut InstanceData<'_>) -> Result<TypeDescriptor, CompositionError> {
        use TypeDescriptor as T;
        let literal = TypeDescriptor::of(self.operand.value());
        let input = data.input_type;
        let addable = self.operand.variable_name().is_some()
            || matches!(
                (input, &literal),
                (T::Any, _) | (T::Int, T::Int) | (T::Float, T::Float) | (T::Float, T::Int)
            );
        if !addable {
            return Err(CompositionError::new(
                CompositionErrorKind::ShardRejected,
                format!("cannot add {literal} to {input}"),
            ));
        }
        Ok(input.clone())
    }

    fn required_variables(&self) -> Vec<ExposedVariable> {
        self.operand
            .required(TypeDescriptor::Any)
            .into_iter()
            .collect()
    }

    fn warm_up(&mut self, ctx: &mut Context<'_>) -> SreResult<()> {
        self.operand.warm_up(ctx);
        Ok(())
    }

    fn activate(&mut self, ctx: &mut Context<'_>, input: &Value) -> SreResult<Flow> {
        let sum = self.operand.with(ctx, |operand| match (input, operand) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_add(*b))),
            (Value::Float(a), Value::Float(b)) => Ok(Value::Float(a + b)),
            (Value::Float(a), Value::Int(b)) => Ok(Value::Float(a + *b as f64)),
            _ => Err(SreError::TypeMismatch {
                expected: input.tag().to_string(),
                actual: operand.tag().to_string(),
            }),
        })?;
        Ok(Flow::Continue(sum))
    }

    fn clean_up(&mut self, ctx: &mut Context<'_>) {
        self.operand.clean_up(ctx);
    }
}
