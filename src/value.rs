//! Runtime values.
//!
//! `Value` is the in-memory shape objects are built from and validated against.
//! It is richer than JSON: tuples, sets, non-string dict keys, temporal values,
//! enum members, declared objects and opaque custom values all keep their
//! identity until an encoder turns them into something JSON-safe.
use std::collections::{HashMap, HashSet};
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use indexmap::{IndexMap, IndexSet};
use ordered_float::OrderedFloat;
use serde_json::{Map, Number};

use crate::descriptor::{EnumMember, EnumType, TypeKey};
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(OrderedFloat<f64>),
    Str(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Time(NaiveTime),
    List(Vec<Value>),
    Tuple(Vec<Value>),
    Set(Vec<Value>),              // unique elements
    Dict(Vec<(Value, Value)>),    // unique keys, insertion order
    Enum(EnumValue),
    Object(Object),
    Custom(Custom),
}

/// A member of a declared enum.
#[derive(Debug, Clone)]
pub struct EnumValue {
    pub key: TypeKey,
    pub name: String,
    pub value: Box<Value>,
}

/// An instance of a declared object type. Only `Context::construct` (and the
/// decode path through it) builds these, so every instance has passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct Object {
    key: TypeKey,
    fields: IndexMap<String, Value>,
}

/// An opaque value of a user type that has no field map, e.g. a UUID or a
/// money amount. The payload is whatever representation the caller chose.
#[derive(Debug, Clone, PartialEq)]
pub struct Custom {
    pub key: TypeKey,
    pub payload: Box<Value>,
}

impl Object {
    pub(crate) fn new(key: TypeKey, fields: IndexMap<String, Value>) -> Self {
        Self { key, fields }
    }

    pub fn key(&self) -> &TypeKey { &self.key }

    pub fn type_name(&self) -> &str { self.key.name() }

    pub fn get(&self, field: &str) -> Option<&Value> { self.fields.get(field) }

    /// Fields in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl PartialEq for EnumValue {
    fn eq(&self, other: &Self) -> bool { self.key == other.key && self.name == other.name }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        use Value::*;
        match (self, other) {
            (Null, Null) => true,
            (Bool(a), Bool(b)) => a == b,
            (Int(a), Int(b)) => a == b,
            (Float(a), Float(b)) => a == b,
            (Str(a), Str(b)) => a == b,
            (Date(a), Date(b)) => a == b,
            (DateTime(a), DateTime(b)) => a == b,
            (Time(a), Time(b)) => a == b,
            (List(a), List(b)) | (Tuple(a), Tuple(b)) => a == b,
            (Set(a), Set(b)) => {
                a.len() == b.len() && {
                    let b = b.iter().collect::<HashSet<_>>();
                    a.iter().all(|x| b.contains(x))
                }
            }
            (Dict(a), Dict(b)) => {
                a.len() == b.len() && {
                    let b = b.iter().map(|(k, v)| (k, v)).collect::<HashMap<_, _>>();
                    a.iter().all(|(k, v)| b.get(k) == Some(&v))
                }
            }
            (Enum(a), Enum(b)) => a == b,
            (Object(a), Object(b)) => a == b,
            (Custom(a), Custom(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

/// Sets, dicts and object fields compare without order, so their elements are
/// folded into the hash with a commutative sum.
fn unordered<T: Hash>(items: impl Iterator<Item = T>, state: &mut impl Hasher) {
    let mut len = 0usize;
    let mut sum = 0u64;
    for item in items {
        let mut h = DefaultHasher::new();
        item.hash(&mut h);
        sum = sum.wrapping_add(h.finish());
        len += 1;
    }
    len.hash(state);
    sum.hash(state);
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Bool(b) => b.hash(state),
            Value::Int(i) => i.hash(state),
            Value::Float(f) => f.hash(state),
            Value::Str(s) => s.hash(state),
            Value::Date(d) => d.hash(state),
            Value::DateTime(d) => d.hash(state),
            Value::Time(t) => t.hash(state),
            Value::List(xs) | Value::Tuple(xs) => xs.hash(state),
            Value::Set(xs) => unordered(xs.iter(), state),
            Value::Dict(pairs) => unordered(pairs.iter(), state),
            Value::Enum(e) => {
                e.key.hash(state);
                e.name.hash(state);
            }
            Value::Object(o) => {
                o.key.hash(state);
                unordered(o.fields.iter(), state);
            }
            Value::Custom(c) => {
                c.key.hash(state);
                c.payload.hash(state);
            }
        }
    }
}

// ----------------------------- Constructors ------------------------------ //

impl Value {
    pub fn float(f: f64) -> Self { Value::Float(OrderedFloat(f)) }

    pub fn list(xs: impl IntoIterator<Item = Value>) -> Self { Value::List(xs.into_iter().collect()) }

    pub fn tuple(xs: impl IntoIterator<Item = Value>) -> Self { Value::Tuple(xs.into_iter().collect()) }

    /// Set from any elements; duplicates are dropped, first occurrence wins.
    pub fn set(xs: impl IntoIterator<Item = Value>) -> Self {
        Value::Set(xs.into_iter().collect::<IndexSet<_>>().into_iter().collect())
    }

    /// Dict from pairs; a repeated key overwrites the earlier value in place.
    pub fn dict<K: Into<Value>>(pairs: impl IntoIterator<Item = (K, Value)>) -> Self {
        let mut out = IndexMap::new();
        for (k, v) in pairs {
            out.insert(k.into(), v);
        }
        Value::Dict(out.into_iter().collect())
    }

    pub fn custom(key: &TypeKey, payload: Value) -> Self {
        Value::Custom(Custom { key: key.clone(), payload: Box::new(payload) })
    }

    pub(crate) fn enum_member(ty: &EnumType, member: &EnumMember) -> Self {
        Value::Enum(EnumValue {
            key: ty.key.clone(),
            name: member.name.clone(),
            value: Box::new(member.value.clone()),
        })
    }

    pub fn is_null(&self) -> bool { matches!(self, Value::Null) }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Look up a string key of a dict value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Dict(pairs) => pairs.iter().find(|(k, _)| matches!(k, Value::Str(s) if s == key)).map(|(_, v)| v),
            Value::Object(o) => o.get(key),
            _ => None,
        }
    }

    /// Runtime type of this value.
    pub fn type_key(&self) -> TypeKey {
        match self {
            Value::Null => TypeKey::null(),
            Value::Bool(_) => TypeKey::bool(),
            Value::Int(_) => TypeKey::int(),
            Value::Float(_) => TypeKey::float(),
            Value::Str(_) => TypeKey::str(),
            Value::Date(_) => TypeKey::date(),
            Value::DateTime(_) => TypeKey::datetime(),
            Value::Time(_) => TypeKey::time(),
            Value::List(_) => TypeKey::list(),
            Value::Tuple(_) => TypeKey::tuple(),
            Value::Set(_) => TypeKey::set(),
            Value::Dict(_) => TypeKey::dict(),
            Value::Enum(e) => e.key.clone(),
            Value::Object(o) => o.key.clone(),
            Value::Custom(c) => c.key.clone(),
        }
    }

    /// True for values with no richer in-memory shape than JSON itself.
    pub fn is_plain(&self) -> bool {
        match self {
            Value::Null | Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::Str(_) => true,
            Value::List(xs) => xs.iter().all(Value::is_plain),
            Value::Dict(pairs) => pairs.iter().all(|(k, v)| matches!(k, Value::Str(_)) && v.is_plain()),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self { Value::Bool(b) }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self { Value::Int(i) }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self { Value::Int(i64::from(i)) }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self { Value::float(f) }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self { Value::Str(s.to_string()) }
}

impl From<String> for Value {
    fn from(s: String) -> Self { Value::Str(s) }
}

impl From<Vec<Value>> for Value {
    fn from(xs: Vec<Value>) -> Self { Value::List(xs) }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self { Value::Date(d) }
}

impl From<NaiveDateTime> for Value {
    fn from(d: NaiveDateTime) -> Self { Value::DateTime(d) }
}

impl From<NaiveTime> for Value {
    fn from(t: NaiveTime) -> Self { Value::Time(t) }
}

// --------------------------- JSON conversions ---------------------------- //

impl Value {
    /// Generic conversion from a decoded JSON tree: arrays become lists and
    /// objects become string-keyed dicts. No descriptor is consulted.
    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::Str(s.clone()),
            serde_json::Value::Array(xs) => Value::List(xs.iter().map(Value::from_json).collect()),
            serde_json::Value::Object(m) => Value::Dict(
                m.iter().map(|(k, v)| (Value::Str(k.clone()), Value::from_json(v))).collect(),
            ),
        }
    }

    /// Convert into a JSON tree. Rich values (temporal, custom) must already
    /// have been replaced by an encoder; leftovers are `NotJsonSafe`.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => match Number::from_f64(f.0) {
                Some(n) => serde_json::Value::Number(n),
                None => return Err(not_json_safe(self, "non-finite float")),
            },
            Value::Str(s) => serde_json::Value::String(s.clone()),
            Value::List(xs) | Value::Tuple(xs) | Value::Set(xs) => {
                serde_json::Value::Array(xs.iter().map(Value::to_json).collect::<Result<_>>()?)
            }
            Value::Dict(pairs) => {
                let mut map = Map::new();
                for (k, v) in pairs {
                    map.insert(json_key(k)?, v.to_json()?);
                }
                serde_json::Value::Object(map)
            }
            Value::Enum(e) => e.value.to_json()?,
            Value::Object(o) => {
                let mut map = Map::new();
                for (k, v) in &o.fields {
                    map.insert(k.clone(), v.to_json()?);
                }
                serde_json::Value::Object(map)
            }
            Value::Date(_) | Value::DateTime(_) | Value::Time(_) | Value::Custom(_) => {
                return Err(not_json_safe(self, "no JSON encoder registered for its type"));
            }
        })
    }
}

fn json_key(k: &Value) -> Result<String> {
    match k {
        Value::Str(s) => Ok(s.clone()),
        Value::Int(i) => Ok(i.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Float(f) if f.0.is_finite() => Ok(format_float(f.0)),
        Value::Null => Ok("null".to_string()),
        Value::Enum(e) => json_key(&e.value),
        other => Err(not_json_safe(other, "not usable as an object key")),
    }
}

fn not_json_safe(v: &Value, reason: &str) -> Error {
    Error::NotJsonSafe { value: v.to_string(), reason: reason.to_string() }
}

fn format_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e16 {
        format!("{f:.1}")
    } else {
        f.to_string()
    }
}

// -------------------------------- Repr ----------------------------------- //

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn seq(f: &mut fmt::Formatter<'_>, xs: &[Value]) -> fmt::Result {
            for (i, x) in xs.iter().enumerate() {
                if i > 0 { f.write_str(", ")?; }
                write!(f, "{x}")?;
            }
            Ok(())
        }
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => f.write_str(&format_float(x.0)),
            Value::Str(s) => write!(f, "'{s}'"),
            Value::Date(d) => write!(f, "{d}"),
            Value::DateTime(d) => write!(f, "{d}"),
            Value::Time(t) => write!(f, "{t}"),
            Value::List(xs) => {
                f.write_str("[")?;
                seq(f, xs)?;
                f.write_str("]")
            }
            Value::Tuple(xs) => {
                f.write_str("(")?;
                seq(f, xs)?;
                if xs.len() == 1 { f.write_str(",")?; }
                f.write_str(")")
            }
            Value::Set(xs) if xs.is_empty() => f.write_str("set()"),
            Value::Set(xs) => {
                f.write_str("{")?;
                seq(f, xs)?;
                f.write_str("}")
            }
            Value::Dict(pairs) => {
                f.write_str("{")?;
                for (i, (k, v)) in pairs.iter().enumerate() {
                    if i > 0 { f.write_str(", ")?; }
                    write!(f, "{k}: {v}")?;
                }
                f.write_str("}")
            }
            Value::Enum(e) => write!(f, "<{}.{}: {}>", e.key, e.name, e.value),
            Value::Object(o) => {
                write!(f, "<{} (", o.key)?;
                for (i, (k, v)) in o.fields.iter().enumerate() {
                    if i > 0 { f.write_str(", ")?; }
                    write!(f, "{k}={v}")?;
                }
                f.write_str(")>")
            }
            Value::Custom(c) => write!(f, "<{} {}>", c.key, c.payload),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sets_and_dicts_compare_without_order() {
        let a = Value::set([Value::Int(1), Value::Int(2), Value::Int(1)]);
        let b = Value::set([Value::Int(2), Value::Int(1)]);
        assert_eq!(a, b);
        let d1 = Value::dict([("a", Value::Int(1)), ("b", Value::Int(2))]);
        let d2 = Value::dict([("b", Value::Int(2)), ("a", Value::Int(1))]);
        assert_eq!(d1, d2);
        assert_ne!(Value::list([Value::Int(1), Value::Int(2)]), Value::list([Value::Int(2), Value::Int(1)]));
    }

    #[test]
    fn repeated_dict_keys_overwrite_in_place() {
        let d = Value::dict([("a", Value::Int(1)), ("b", Value::Int(2)), ("a", Value::Int(3))]);
        let Value::Dict(pairs) = &d else { panic!("expected a dict") };
        assert_eq!(pairs, &[(Value::from("a"), Value::Int(3)), (Value::from("b"), Value::Int(2))]);
        assert_ne!(d, Value::dict([("a", Value::Int(1)), ("b", Value::Int(2))]));
    }

    #[test]
    fn equal_values_hash_alike() {
        fn digest(v: &Value) -> u64 {
            let mut h = DefaultHasher::new();
            v.hash(&mut h);
            h.finish()
        }
        let a = Value::set([Value::Int(1), Value::from("x"), Value::float(2.5)]);
        let b = Value::set([Value::float(2.5), Value::Int(1), Value::from("x")]);
        assert_eq!(digest(&a), digest(&b));
        let d1 = Value::dict([("a", Value::list([Value::Int(1)])), ("b", Value::Null)]);
        let d2 = Value::dict([("b", Value::Null), ("a", Value::list([Value::Int(1)]))]);
        assert_eq!(digest(&d1), digest(&d2));
    }

    #[test]
    fn large_dicts_and_sets_build_quickly() {
        let n = 50_000i64;
        let d = Value::dict((0..n).map(|i| (Value::Int(i), Value::Int(i))));
        let s = Value::set((0..n).chain(0..n).map(Value::Int));
        let Value::Set(xs) = &s else { panic!("expected a set") };
        assert_eq!(xs.len(), n as usize);
        assert_eq!(d, Value::dict((0..n).rev().map(|i| (Value::Int(i), Value::Int(i)))));
        assert_eq!(s, Value::set((0..n).rev().map(Value::Int)));
    }

    #[test]
    fn list_and_tuple_are_distinct() {
        assert_ne!(Value::list([Value::Int(1)]), Value::tuple([Value::Int(1)]));
    }

    #[test]
    fn from_json_keeps_ints_and_floats_apart() {
        let v = Value::from_json(&json!({"a": 1, "b": 1.5, "c": [true, null]}));
        assert_eq!(v.get("a"), Some(&Value::Int(1)));
        assert_eq!(v.get("b"), Some(&Value::float(1.5)));
        assert_eq!(v.get("c"), Some(&Value::list([Value::Bool(true), Value::Null])));
    }

    #[test]
    fn to_json_stringifies_scalar_keys() {
        let v = Value::dict([(Value::Int(1), Value::from("a")), (Value::Bool(true), Value::Null)]);
        assert_eq!(v.to_json().unwrap(), json!({"1": "a", "true": null}));
    }

    #[test]
    fn to_json_rejects_rich_leftovers() {
        let d = NaiveDate::from_ymd_opt(2023, 2, 1).unwrap();
        assert!(matches!(Value::Date(d).to_json(), Err(Error::NotJsonSafe { .. })));
        assert!(Value::float(f64::NAN).to_json().is_err());
    }

    #[test]
    fn repr_reads_like_a_literal() {
        assert_eq!(Value::tuple([Value::Bool(true)]).to_string(), "(true,)");
        assert_eq!(Value::list([Value::from("x"), Value::float(2.0)]).to_string(), "['x', 2.0]");
        assert_eq!(Value::set([]).to_string(), "set()");
    }
}
