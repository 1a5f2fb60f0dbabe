use serde_json::{Map, Number, Value as Json};
use tracing::{debug, trace};

use crate::context::Context;
use crate::descriptor::{Descriptor, EnumKind, TypeKey};
use crate::error::{Error, ErrorItem, Failure, ItemKind, Result};
use crate::validate::conforms;
use crate::value::Value;

impl Context {
    /// Parse a JSON document and decode it into an object of `key`.
    ///
    /// Unparseable payloads and non-object documents fail with
    /// `MalformedInput`. Every failure from this entry point goes through the
    /// content signal when one is set; otherwise validation failures still use
    /// the validation signal.
    pub fn from_json(&self, payload: &[u8], key: &TypeKey) -> Result<Value> {
        let config = self.config();
        let reroute = |e: Error| match &config.content_signal {
            Some(signal) => e.signaled(Some(signal)),
            None => self.validation_signaled(e),
        };

        let parsed: Json = match serde_json::from_slice(payload) {
            Ok(v) => v,
            Err(source) => {
                debug!(type_name = key.name(), error = %source, "payload is not JSON");
                let failure = Failure::malformed(key.name(), payload);
                return Err(reroute(Error::MalformedInput { failure, source: Some(source) }));
            }
        };
        let Json::Object(map) = &parsed else {
            let failure = Failure::malformed(key.name(), payload);
            return Err(reroute(Error::MalformedInput { failure, source: None }));
        };
        self.decode_object(map, key).map_err(reroute)
    }

    /// Decode an already-parsed JSON object into an object of `key`.
    pub fn from_dict(&self, map: &Map<String, Json>, key: &TypeKey) -> Result<Value> {
        self.decode_object(map, key).map_err(|e| self.validation_signaled(e))
    }

    /// Decode a raw JSON value against a declared descriptor.
    ///
    /// `null` stays `null` for every descriptor. Values that no decoder can
    /// make sense of pass through unchanged so that validation reports them.
    pub fn decode_value(&self, descriptor: &Descriptor, raw: &Json) -> Result<Value> {
        if raw.is_null() {
            return Ok(Value::Null);
        }
        match (descriptor, raw) {
            (Descriptor::Any, _) => Ok(Value::from_json(raw)),
            (Descriptor::List(elem), Json::Array(xs)) => Ok(Value::List(self.decode_all(elem, xs)?)),
            (Descriptor::Set(elem), Json::Array(xs)) => Ok(Value::set(self.decode_all(elem, xs)?)),
            (Descriptor::Tuple(elems), Json::Array(xs)) => {
                let items = xs
                    .iter()
                    .enumerate()
                    .map(|(i, x)| match elems.get(i) {
                        Some(d) => self.decode_value(d, x),
                        None => Ok(Value::from_json(x)),
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(Value::Tuple(items))
            }
            (Descriptor::Dict(k, v), Json::Object(map)) => {
                let mut pairs = Vec::with_capacity(map.len());
                for (key, val) in map {
                    pairs.push((self.decode_key(k, key)?, self.decode_value(v, val)?));
                }
                Ok(Value::dict(pairs))
            }
            (Descriptor::Object(key), Json::Object(map)) => self.decode_object(map, key),
            (Descriptor::Union(members), _) => self.decode_union(members, raw),
            (Descriptor::Primitive(_) | Descriptor::Enum(_), _) => self.decode_leaf(descriptor, raw),
            // Container shape mismatch: leave it for validation.
            _ => Ok(Value::from_json(raw)),
        }
    }

    fn decode_all(&self, elem: &Descriptor, xs: &[Json]) -> Result<Vec<Value>> {
        xs.iter().map(|x| self.decode_value(elem, x)).collect()
    }

    fn decode_leaf(&self, descriptor: &Descriptor, raw: &Json) -> Result<Value> {
        let Some(key) = descriptor.leaf_key() else {
            return Ok(Value::from_json(raw));
        };
        match self.decoders.resolve(key) {
            Some(entry) => (entry.handler)(descriptor, raw),
            None => {
                trace!(type_name = key.name(), "no decoder, passing through");
                Ok(Value::from_json(raw))
            }
        }
    }

    /// One non-null member: decode with it. Otherwise the first member whose
    /// decoded value also validates wins; if none does, the raw value passes through.
    fn decode_union(&self, members: &[Descriptor], raw: &Json) -> Result<Value> {
        let candidates = members.iter().filter(|m| !m.is_null()).collect::<Vec<_>>();
        if let [only] = candidates.as_slice() {
            return self.decode_value(only, raw);
        }
        for member in candidates {
            if let Ok(v) = self.decode_value(member, raw) {
                if conforms(&v, member) {
                    return Ok(v);
                }
            }
        }
        Ok(Value::from_json(raw))
    }

    /// JSON object keys are always strings; recover numeric, boolean and null
    /// keys when the declared key type asks for them. A union key takes the
    /// first member whose parsed form decodes and conforms.
    fn decode_key(&self, descriptor: &Descriptor, key: &str) -> Result<Value> {
        if let Descriptor::Union(members) = descriptor {
            for member in members {
                let Some(raw) = parse_key(member, key) else { continue };
                if let Ok(v) = self.decode_value(member, &raw) {
                    if conforms(&v, member) {
                        return Ok(v);
                    }
                }
            }
        }
        let raw = parse_key(descriptor, key).unwrap_or_else(|| Json::String(key.to_string()));
        self.decode_value(descriptor, &raw)
    }

    /// Decode each declared field, then construct. Fields absent from the
    /// input take their defaults; an explicit `null` is kept as `null`.
    pub(crate) fn decode_object(&self, map: &Map<String, Json>, key: &TypeKey) -> Result<Value> {
        let ty = self.object_type(key)?;
        let mut values = indexmap::IndexMap::with_capacity(ty.fields.len());
        let mut missing = Vec::new();

        for field in &ty.fields {
            let Some(raw) = map.get(&field.name) else {
                if !field.has_default() {
                    missing.push(ErrorItem {
                        kind: ItemKind::MissingField,
                        field: field.name.clone(),
                        descriptor: field.descriptor.to_string(),
                        value: "Empty".to_string(),
                        index: None,
                    });
                }
                continue;
            };
            let plain = Value::from_json(raw);
            let value = if raw.is_null() || field.default.as_ref() == Some(&plain) {
                plain
            } else {
                self.decode_value(&field.descriptor, raw)?
            };
            values.insert(field.name.clone(), value);
        }

        if !missing.is_empty() {
            debug!(type_name = ty.name(), missing = missing.len(), "missing fields in input");
            return Err(Error::MissingFields(Failure::missing(ty.name(), missing)));
        }
        self.build(&ty, values)
    }
}

/// The JSON scalar a stringified key stood for, if `descriptor` is a scalar
/// key type other than `str`.
fn parse_key(descriptor: &Descriptor, key: &str) -> Option<Json> {
    match descriptor {
        Descriptor::Primitive(k) if *k == TypeKey::int() => key.parse::<i64>().ok().map(Json::from),
        Descriptor::Primitive(k) if *k == TypeKey::float() => {
            key.parse::<f64>().ok().and_then(Number::from_f64).map(Json::Number)
        }
        Descriptor::Primitive(k) if *k == TypeKey::bool() => key.parse::<bool>().ok().map(Json::Bool),
        Descriptor::Primitive(k) if *k == TypeKey::null() => (key == "null").then_some(Json::Null),
        Descriptor::Enum(ty) if ty.kind() == EnumKind::Integer => key.parse::<i64>().ok().map(Json::from),
        _ => None,
    }
}
