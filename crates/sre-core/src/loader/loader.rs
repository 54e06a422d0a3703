//! Wire Description Loader
//!
//! Builds wires from JSON descriptions:
//!
//! ```json
//! { "name": "main", "looped": false,
//!   "shards": [ { "shard": "Const", "params": { "Value": 5 } } ] }
//! ```
//!
//! Parameter JSON maps to values: numbers to `Int`/`Float`, `{"$var": name}`
//! to a variable reference, an array of shard objects to an anonymous nested
//! wire, other arrays to `Seq`, objects to `Table` and `null` to `None`.
//! This layer validates structure and parameter names; types are checked by
//! the shards' own `set_param`.

use std::path::Path;

use serde::Deserialize;
use serde_json::{Map, Number, Value as Json};

use crate::error::{SreError, SreResult};
use crate::process::ProcessContext;
use crate::shard::{param_index, Shard};
use crate::value::{SeqArray, Table, Value};
use crate::wire::{Wire, WireHandle};

/// Key marking a variable reference object
const VAR_KEY: &str = "$var";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WireDescription {
    pub name: String,
    #[serde(default)]
    pub looped: bool,
    #[serde(default)]
    pub pure: bool,
    #[serde(default)]
    pub allow_unsafe_resume: bool,
    #[serde(default)]
    pub shards: Vec<ShardDescription>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShardDescription {
    pub shard: String,
    #[serde(default)]
    pub params: Map<String, Json>,
}

/// Wire loader bound to the registry of one process context
pub struct WireLoader<'a> {
    process: &'a ProcessContext,
    nested: usize,
}

impl<'a> WireLoader<'a> {
    pub fn new(process: &'a ProcessContext) -> Self {
        WireLoader { process, nested: 0 }
    }

    /// Parse and build a wire from JSON text
    pub fn load_str(&mut self, text: &str) -> SreResult<Wire> {
        let description: WireDescription = serde_json::from_str(text)?;
        self.build(&description)
    }

    pub fn load_file(&mut self, path: &Path) -> SreResult<Wire> {
        let text = std::fs::read_to_string(path)?;
        self.load_str(&text)
    }

    pub fn build(&mut self, description: &WireDescription) -> SreResult<Wire> {
        if description.name.is_empty() {
            return Err(SreError::InvalidDescription("wire name is empty".into()));
        }
        let shards = description
            .shards
            .iter()
            .map(|shard| self.build_shard(shard))
            .collect::<SreResult<Vec<_>>>()?;
        tracing::debug!(wire = %description.name, shards = shards.len(), "wire loaded");
        Ok(Wire::new(description.name.clone())
            .looped(description.looped)
            .pure(description.pure)
            .allow_unsafe_resume(description.allow_unsafe_resume)
            .with_shards(shards))
    }

    fn build_shard(&mut self, description: &ShardDescription) -> SreResult<Box<dyn Shard>> {
        let mut shard = self.process.shards().create(&description.shard)?;
        for (name, json) in &description.params {
            let index = param_index(shard.as_ref(), name).ok_or_else(|| {
                SreError::InvalidDescription(format!(
                    "{} has no parameter `{name}`",
                    description.shard
                ))
            })?;
            let value = self.value_from_json(json)?;
            shard.set_param(index, &value)?;
        }
        Ok(shard)
    }

    /// Convert parameter JSON into a value
    pub fn value_from_json(&mut self, json: &Json) -> SreResult<Value> {
        Ok(match json {
            Json::Null => Value::None,
            Json::Bool(b) => Value::Bool(*b),
            Json::Number(n) => number(n)?,
            Json::String(s) => Value::from(s.as_str()),
            Json::Array(items) if is_shard_list(items) => {
                self.nested += 1;
                let description = WireDescription {
                    name: format!("nested-{}", self.nested),
                    looped: false,
                    pure: false,
                    allow_unsafe_resume: false,
                    shards: items
                        .iter()
                        .cloned()
                        .map(serde_json::from_value)
                        .collect::<Result<_, _>>()?,
                };
                Value::Wire(WireHandle::new(self.build(&description)?))
            }
            Json::Array(items) => {
                let mut seq = SeqArray::with_capacity(items.len());
                for item in items {
                    seq.push(self.value_from_json(item)?);
                }
                Value::Seq(seq)
            }
            Json::Object(map) => match variable_reference(map) {
                Some(name) => Value::ContextVar(name.to_string()),
                None => {
                    let mut table = Table::new();
                    for (key, item) in map {
                        table.insert(key, self.value_from_json(item)?);
                    }
                    Value::Table(table)
                }
            },
        })
    }
}

fn number(n: &Number) -> SreResult<Value> {
    if let Some(i) = n.as_i64() {
        Ok(Value::Int(i))
    } else if let Some(f) = n.as_f64() {
        Ok(Value::Float(f))
    } else {
        Err(SreError::InvalidDescription(format!("{n} does not fit a number value")))
    }
}

fn is_shard_list(items: &[Json]) -> bool {
    !items.is_empty()
        && items
            .iter()
            .all(|item| item.as_object().is_some_and(|o| o.contains_key("shard")))
}

fn variable_reference(map: &Map<String, Json>) -> Option<&str> {
    match (map.len(), map.get(VAR_KEY)) {
        (1, Some(Json::String(name))) => Some(name),
        _ => None,
    }
}

/// Render a value as JSON for hosts and reports
pub fn value_to_json(value: &Value) -> Json {
    fn floats<T: Copy + Into<f64>>(items: &[T]) -> Json {
        Json::Array(items.iter().map(|f| float((*f).into())).collect())
    }
    fn ints<T: Copy + Into<i64>>(items: &[T]) -> Json {
        Json::Array(items.iter().map(|i| Json::from((*i).into())).collect())
    }
    fn float(f: f64) -> Json {
        Number::from_f64(f).map_or(Json::Null, Json::Number)
    }

    match value {
        Value::None => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Int(i) => Json::from(*i),
        Value::Int2(v) => ints(v),
        Value::Int3(v) => ints(v),
        Value::Int4(v) => ints(v),
        Value::Int8(v) => ints(v),
        Value::Int16(v) => ints(v),
        Value::Float(f) => float(*f),
        Value::Float2(v) => floats(v),
        Value::Float3(v) => floats(v),
        Value::Float4(v) => floats(v),
        Value::Color(c) => ints(c),
        Value::Enum(e) => serde_json::json!({
            "vendor": e.vendor,
            "type": e.type_id,
            "value": e.value,
        }),
        Value::Object(o) => serde_json::json!({
            "object": { "vendor": o.vendor, "type": o.type_id }
        }),
        Value::String(s) => Json::String(s.clone()),
        Value::Bytes(b) => ints(b),
        Value::Seq(s) => Json::Array(s.iter().map(value_to_json).collect()),
        Value::Table(t) => Json::Object(
            t.iter()
                .map(|(k, v)| (k.to_string(), value_to_json(v)))
                .collect(),
        ),
        Value::Set(s) => Json::Array(s.iter().map(value_to_json).collect()),
        Value::Wire(w) => serde_json::json!({ "wire": w.id() }),
        Value::ContextVar(name) => serde_json::json!({ VAR_KEY: name }),
    }
}
