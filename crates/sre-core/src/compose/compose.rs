//! Composition Pass
//!
//! Threads type and variable visibility through a shard sequence before it
//! runs. Each shard in order gets its input checked against its declared
//! input types and its required variables checked against the running
//! exposed set. Then its `compose` yields the next input type and its exposed
//! variables are merged in.
//!
//! The pass only reads shard declarations and calls `compose`, so running it
//! twice over the same sequence and ambient set gives the same result.

use std::collections::BTreeMap;

use crate::config::SreConfig;
use crate::error::{CompositionError, CompositionErrorKind};
use crate::value::TypeDescriptor;
use crate::vars::VarScope;
use crate::wire::ShardSeq;

/// A variable published into, or expected from, the composition scope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExposedVariable {
    pub name: String,
    pub ty: TypeDescriptor,
    pub mutable: bool,
    pub scope: VarScope,
}

impl ExposedVariable {
    pub fn new(name: impl Into<String>, ty: TypeDescriptor) -> Self {
        ExposedVariable {
            name: name.into(),
            ty,
            mutable: false,
            scope: VarScope::Wire,
        }
    }

    pub fn mutable(mut self) -> Self {
        self.mutable = true;
        self
    }

    pub fn scoped(mut self, scope: VarScope) -> Self {
        self.scope = scope;
        self
    }
}

/// Name-keyed set of exposed variables
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExposedSet {
    vars: BTreeMap<String, ExposedVariable>,
}

impl ExposedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&ExposedVariable> {
        self.vars.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    /// Insert or replace, returning the previous entry
    pub fn insert(&mut self, var: ExposedVariable) -> Option<ExposedVariable> {
        self.vars.insert(var.name.clone(), var)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExposedVariable> {
        self.vars.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.vars.keys().map(String::as_str)
    }
}

impl FromIterator<ExposedVariable> for ExposedSet {
    fn from_iter<I: IntoIterator<Item = ExposedVariable>>(iter: I) -> Self {
        let mut set = ExposedSet::new();
        for var in iter {
            set.insert(var);
        }
        set
    }
}

/// Cached outcome of a composition pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposeResult {
    pub output_type: TypeDescriptor,
    /// Variables exposed by the sequence itself
    pub exposed: ExposedSet,
    /// Variables the sequence takes from the ambient scope
    pub required: ExposedSet,
    /// The sequence ends in an unconditional flow stopper
    pub flow_stopper: bool,
}

/// What a shard's `compose` gets to see
pub struct InstanceData<'a> {
    pub input_type: &'a TypeDescriptor,
    /// Variables visible at this position
    pub shared: &'a ExposedSet,
    pub wire_name: &'a str,
    pub wire_input_type: &'a TypeDescriptor,
    pub config: &'a SreConfig,
    pub pure: bool,
    /// Receives advisory errors
    pub report: &'a mut dyn FnMut(&CompositionError),
}

impl InstanceData<'_> {
    pub fn advise(&mut self, error: CompositionError) {
        tracing::warn!(wire = %self.wire_name, %error, "composition advisory");
        (self.report)(&error);
    }
}

/// Run the composition pass over `seq`, starting from `data.input_type` with
/// `data.shared` as the ambient scope.
pub fn compose_sequence(
    seq: &mut ShardSeq,
    data: &mut InstanceData<'_>,
) -> Result<ComposeResult, CompositionError> {
    let mut running = data.shared.clone();
    let mut current = data.input_type.clone();
    let mut exposed = ExposedSet::new();
    let mut required = ExposedSet::new();
    let mut stopper: Option<&'static str> = None;

    for shard in seq.shards_mut() {
        let name = shard.name();
        if let Some(stopped_by) = stopper {
            data.advise(
                CompositionError::new(
                    CompositionErrorKind::UnreachableShard,
                    format!("shards after {stopped_by} never run"),
                )
                .in_shard(name),
            );
            break;
        }

        let inputs = shard.input_types();
        if !TypeDescriptor::any_accepts(&inputs, &current) {
            return Err(CompositionError::new(
                CompositionErrorKind::InputTypeMismatch,
                format!("got {current}, accepts {}", list(&inputs)),
            )
            .in_shard(name));
        }

        note_required(shard.required_variables(), &running, &exposed, &mut required, name)?;

        let output = {
            let mut nested = InstanceData {
                input_type: &current,
                shared: &running,
                wire_name: data.wire_name,
                wire_input_type: data.wire_input_type,
                config: data.config,
                pure: data.pure,
                report: &mut *data.report,
            };
            shard.compose(&mut nested).map_err(|e| e.in_shard(name))?
        };
        // nested shards only know their requirements once composed
        note_required(shard.required_variables(), &running, &exposed, &mut required, name)?;

        for var in shard.exposed_variables() {
            if let Some(prev) = running.get(&var.name) {
                let compatible = prev.ty.accepts(&var.ty) && var.ty.accepts(&prev.ty);
                if !compatible {
                    return Err(CompositionError::new(
                        CompositionErrorKind::ExposedTypeConflict,
                        format!("`{}` was {}, now {}", var.name, prev.ty, var.ty),
                    )
                    .in_shard(name));
                }
                if data.config.warn_on_variable_shadowing {
                    data.advise(
                        CompositionError::new(
                            CompositionErrorKind::VariableShadowed,
                            format!("`{}` is exposed again", var.name),
                        )
                        .in_shard(name),
                    );
                }
            }
            exposed.insert(var.clone());
            running.insert(var);
        }

        if shard.is_flow_stopper() {
            stopper = Some(name);
        }
        current = output;
    }

    Ok(ComposeResult {
        output_type: current,
        exposed,
        required,
        flow_stopper: stopper.is_some(),
    })
}

/// Check `reqs` against the running scope and record the ones that come from
/// outside the sequence.
fn note_required(
    reqs: Vec<ExposedVariable>,
    running: &ExposedSet,
    exposed: &ExposedSet,
    required: &mut ExposedSet,
    name: &'static str,
) -> Result<(), CompositionError> {
    for req in reqs {
        let Some(found) = running.get(&req.name) else {
            return Err(CompositionError::new(
                CompositionErrorKind::MissingRequiredVariable,
                format!("`{}` is not exposed at this point", req.name),
            )
            .in_shard(name));
        };
        if !req.ty.accepts(&found.ty) {
            return Err(CompositionError::new(
                CompositionErrorKind::RequiredTypeMismatch,
                format!("`{}` is {}, expected {}", req.name, found.ty, req.ty),
            )
            .in_shard(name));
        }
        if req.mutable && !found.mutable {
            return Err(CompositionError::new(
                CompositionErrorKind::MutatesImmutable,
                format!("`{}` is immutable", req.name),
            )
            .in_shard(name));
        }
        if !exposed.contains(&req.name) && !required.contains(&req.name) {
            required.insert(found.clone());
        }
    }
    Ok(())
}

fn list(types: &[TypeDescriptor]) -> String {
    types
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" | ")
}
