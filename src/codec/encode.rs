use crate::context::Context;
use crate::error::{Error, Result};
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    /// In-memory dict form: only encoders registered with `on_dict` apply.
    Dict,
    /// JSON output: every encoder applies.
    Json,
}

impl Context {
    /// The dict form of a value: objects become string-keyed dicts in field
    /// order, sequences become lists. Values whose encoder is JSON-only keep
    /// their rich shape.
    pub fn to_dict(&self, value: &Value, remove_nones: bool) -> Result<Value> {
        self.encode(value, Target::Dict, remove_nones)
    }

    /// The JSON tree of a value, with every registered encoder applied.
    pub fn to_json_value(&self, value: &Value, remove_nones: bool) -> Result<serde_json::Value> {
        self.encode(value, Target::Json, remove_nones)?.to_json()
    }

    /// Compact UTF-8 JSON for a value.
    pub fn to_json(&self, value: &Value, remove_nones: bool) -> Result<Vec<u8>> {
        let tree = self.to_json_value(value, remove_nones)?;
        serde_json::to_vec(&tree).map_err(|e| Error::NotJsonSafe { value: value.to_string(), reason: e.to_string() })
    }

    fn encode(&self, value: &Value, target: Target, remove_nones: bool) -> Result<Value> {
        let skip = |v: &Value| remove_nones && v.is_null();
        match value {
            Value::Object(obj) => {
                let mut pairs = Vec::new();
                for (name, field) in obj.fields() {
                    let out = self.encode(field, target, remove_nones)?;
                    if !skip(&out) {
                        pairs.push((Value::from(name), out));
                    }
                }
                Ok(Value::Dict(pairs))
            }
            Value::Dict(entries) => {
                let mut pairs = Vec::with_capacity(entries.len());
                for (k, v) in entries {
                    let out = self.encode(v, target, remove_nones)?;
                    if !skip(&out) {
                        pairs.push((self.encode(k, target, false)?, out));
                    }
                }
                Ok(Value::Dict(pairs))
            }
            Value::List(xs) | Value::Tuple(xs) | Value::Set(xs) => Ok(Value::List(
                xs.iter().map(|x| self.encode(x, target, remove_nones)).collect::<Result<_>>()?,
            )),
            leaf => {
                let hit = self
                    .encoders
                    .resolve_where(&leaf.type_key(), |e| target == Target::Json || e.on_dict);
                match hit {
                    Some(entry) => (entry.handler)(leaf),
                    None => Ok(leaf.clone()),
                }
            }
        }
    }
}
