//! Type descriptor model.
//!
//! A closed set of shapes shared by validation, decoding, encoding and schema
//! derivation. Leaves are primitives (named by a `TypeKey`), enums, and nested
//! object types; everything else composes on top of those.
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::value::Value;

// ------------------------------- TypeKey --------------------------------- //

/// Named type identity with an optional parent for "is-a" matching.
///
/// Equality and hashing only look at the name; the parent chain is what
/// resolver lookups walk when no exact entry exists.
#[derive(Clone)]
pub struct TypeKey(Arc<KeyInner>);

struct KeyInner {
    name: String,
    parent: Option<TypeKey>,
}

impl TypeKey {
    pub fn new(name: impl Into<String>) -> Self {
        Self(Arc::new(KeyInner { name: name.into(), parent: None }))
    }

    pub fn with_parent(name: impl Into<String>, parent: &TypeKey) -> Self {
        Self(Arc::new(KeyInner { name: name.into(), parent: Some(parent.clone()) }))
    }

    /// Key for a declared object type (child of the `object` root).
    pub fn object_type(name: impl Into<String>) -> Self {
        Self::with_parent(name, &builtin::OBJECT)
    }

    /// Key for an enum type (child of the `enum` root).
    pub fn enum_type(name: impl Into<String>) -> Self {
        Self::with_parent(name, &builtin::ENUM)
    }

    pub fn name(&self) -> &str { &self.0.name }

    pub fn parent(&self) -> Option<&TypeKey> { self.0.parent.as_ref() }

    /// True when `other` is this key or one of its ancestors.
    pub fn is_a(&self, other: &TypeKey) -> bool {
        let mut cursor = Some(self);
        while let Some(key) = cursor {
            if key == other {
                return true;
            }
            cursor = key.parent();
        }
        false
    }

    pub fn null() -> Self { builtin::NULL.clone() }
    pub fn bool() -> Self { builtin::BOOL.clone() }
    pub fn int() -> Self { builtin::INT.clone() }
    pub fn float() -> Self { builtin::FLOAT.clone() }
    pub fn str() -> Self { builtin::STR.clone() }
    pub fn date() -> Self { builtin::DATE.clone() }
    pub fn datetime() -> Self { builtin::DATETIME.clone() }
    pub fn time() -> Self { builtin::TIME.clone() }
    pub fn uuid() -> Self { builtin::UUID.clone() }
    pub fn decimal() -> Self { builtin::DECIMAL.clone() }
    pub fn list() -> Self { builtin::LIST.clone() }
    pub fn tuple() -> Self { builtin::TUPLE.clone() }
    pub fn dict() -> Self { builtin::DICT.clone() }
    pub fn set() -> Self { builtin::SET.clone() }
    pub fn object() -> Self { builtin::OBJECT.clone() }
    pub fn enumeration() -> Self { builtin::ENUM.clone() }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0.name == other.0.name
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) { self.0.name.hash(state) }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeKey({})", self.0.name)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0.name) }
}

mod builtin {
    use super::*;

    pub static NULL: Lazy<TypeKey> = Lazy::new(|| TypeKey::new("null"));
    pub static BOOL: Lazy<TypeKey> = Lazy::new(|| TypeKey::new("bool"));
    pub static INT: Lazy<TypeKey> = Lazy::new(|| TypeKey::new("int"));
    pub static FLOAT: Lazy<TypeKey> = Lazy::new(|| TypeKey::new("float"));
    pub static STR: Lazy<TypeKey> = Lazy::new(|| TypeKey::new("str"));
    pub static DATE: Lazy<TypeKey> = Lazy::new(|| TypeKey::new("date"));
    pub static DATETIME: Lazy<TypeKey> = Lazy::new(|| TypeKey::with_parent("datetime", &DATE));
    pub static TIME: Lazy<TypeKey> = Lazy::new(|| TypeKey::new("time"));
    pub static UUID: Lazy<TypeKey> = Lazy::new(|| TypeKey::new("uuid"));
    pub static DECIMAL: Lazy<TypeKey> = Lazy::new(|| TypeKey::new("decimal"));
    pub static LIST: Lazy<TypeKey> = Lazy::new(|| TypeKey::new("list"));
    pub static TUPLE: Lazy<TypeKey> = Lazy::new(|| TypeKey::new("tuple"));
    pub static DICT: Lazy<TypeKey> = Lazy::new(|| TypeKey::new("dict"));
    pub static SET: Lazy<TypeKey> = Lazy::new(|| TypeKey::new("set"));
    pub static OBJECT: Lazy<TypeKey> = Lazy::new(|| TypeKey::new("object"));
    pub static ENUM: Lazy<TypeKey> = Lazy::new(|| TypeKey::new("enum"));
}

// ------------------------------- Enums ----------------------------------- //

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumKind { Integer, String, Mixed }

#[derive(Debug, Clone, PartialEq)]
pub struct EnumMember {
    pub name: String,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumType {
    pub key: TypeKey,
    pub members: Vec<EnumMember>,
}

impl EnumType {
    pub fn new<I, S>(name: impl Into<String>, members: I) -> Self
    where
        I: IntoIterator<Item = (S, Value)>,
        S: Into<String>,
    {
        Self {
            key: TypeKey::enum_type(name),
            members: members
                .into_iter()
                .map(|(name, value)| EnumMember { name: name.into(), value })
                .collect(),
        }
    }

    pub fn kind(&self) -> EnumKind {
        if self.members.iter().all(|m| matches!(m.value, Value::Int(_))) {
            EnumKind::Integer
        } else if self.members.iter().all(|m| matches!(m.value, Value::Str(_))) {
            EnumKind::String
        } else {
            EnumKind::Mixed
        }
    }

    pub fn member_by_name(&self, name: &str) -> Option<&EnumMember> {
        self.members.iter().find(|m| m.name == name)
    }

    pub fn member_by_value(&self, raw: &Value) -> Option<&EnumMember> {
        self.members.iter().find(|m| &m.value == raw)
    }

    /// Build the enum value for a raw member value, if one matches.
    pub fn instance(&self, raw: &Value) -> Option<Value> {
        self.member_by_value(raw).map(|m| Value::enum_member(self, m))
    }
}

// ----------------------------- Descriptor -------------------------------- //

/// Declared shape of a field.
#[derive(Debug, Clone, PartialEq)]
pub enum Descriptor {
    Any,
    Primitive(TypeKey),
    List(Box<Descriptor>),
    Tuple(Vec<Descriptor>),            // fixed arity
    Dict(Box<Descriptor>, Box<Descriptor>),
    Set(Box<Descriptor>),
    Union(Vec<Descriptor>),            // unique members, declaration order
    Enum(Arc<EnumType>),
    Object(TypeKey),
}

impl Descriptor {
    pub fn null() -> Self { Self::Primitive(TypeKey::null()) }
    pub fn bool() -> Self { Self::Primitive(TypeKey::bool()) }
    pub fn int() -> Self { Self::Primitive(TypeKey::int()) }
    pub fn float() -> Self { Self::Primitive(TypeKey::float()) }
    pub fn str() -> Self { Self::Primitive(TypeKey::str()) }

    pub fn list(elem: Descriptor) -> Self { Self::List(Box::new(elem)) }
    pub fn set(elem: Descriptor) -> Self { Self::Set(Box::new(elem)) }
    pub fn tuple(elems: impl IntoIterator<Item = Descriptor>) -> Self {
        Self::Tuple(elems.into_iter().collect())
    }
    pub fn dict(key: Descriptor, value: Descriptor) -> Self {
        Self::Dict(Box::new(key), Box::new(value))
    }
    pub fn object(key: &TypeKey) -> Self { Self::Object(key.clone()) }
    pub fn enumeration(ty: EnumType) -> Self { Self::Enum(Arc::new(ty)) }

    /// Union with nested unions flattened and duplicates dropped.
    /// A single surviving member is returned as-is.
    pub fn union(members: impl IntoIterator<Item = Descriptor>) -> Self {
        let mut out: Vec<Descriptor> = Vec::new();
        for member in members {
            let flat = match member {
                Descriptor::Union(inner) => inner,
                other => vec![other],
            };
            for m in flat {
                if !out.contains(&m) {
                    out.push(m);
                }
            }
        }
        if out.len() == 1 { out.remove(0) } else { Descriptor::Union(out) }
    }

    pub fn optional(inner: Descriptor) -> Self {
        Self::union([inner, Self::null()])
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Descriptor::Primitive(k) if *k == TypeKey::null())
    }

    /// True when `null` satisfies this descriptor.
    pub fn accepts_null(&self) -> bool {
        match self {
            Descriptor::Any => true,
            Descriptor::Union(members) => members.iter().any(Descriptor::accepts_null),
            other => other.is_null(),
        }
    }

    /// Key the resolver registries are consulted with, for leaf shapes.
    pub fn leaf_key(&self) -> Option<&TypeKey> {
        match self {
            Descriptor::Primitive(k) | Descriptor::Object(k) => Some(k),
            Descriptor::Enum(e) => Some(&e.key),
            _ => None,
        }
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join(f: &mut fmt::Formatter<'_>, xs: &[Descriptor], sep: &str) -> fmt::Result {
            for (i, x) in xs.iter().enumerate() {
                if i > 0 { f.write_str(sep)?; }
                write!(f, "{x}")?;
            }
            Ok(())
        }
        match self {
            Descriptor::Any => f.write_str("any"),
            Descriptor::Primitive(k) | Descriptor::Object(k) => write!(f, "{k}"),
            Descriptor::Enum(e) => write!(f, "{}", e.key),
            Descriptor::List(d) => write!(f, "list[{d}]"),
            Descriptor::Set(d) => write!(f, "set[{d}]"),
            Descriptor::Dict(k, v) => write!(f, "dict[{k}, {v}]"),
            Descriptor::Tuple(xs) => {
                f.write_str("tuple[")?;
                join(f, xs, ", ")?;
                f.write_str("]")
            }
            Descriptor::Union(xs) => join(f, xs, " | "),
        }
    }
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn datetime_is_a_date_but_not_the_reverse() {
        assert!(TypeKey::datetime().is_a(&TypeKey::date()));
        assert!(!TypeKey::date().is_a(&TypeKey::datetime()));
    }

    #[test]
    fn bool_is_not_an_int() {
        assert!(!TypeKey::bool().is_a(&TypeKey::int()));
        assert!(!TypeKey::int().is_a(&TypeKey::float()));
    }

    #[test]
    fn object_and_enum_keys_hang_off_their_roots() {
        let user = TypeKey::object_type("User");
        assert!(user.is_a(&TypeKey::object()));
        assert!(TypeKey::enum_type("Color").is_a(&TypeKey::enumeration()));
        assert!(!user.is_a(&TypeKey::enumeration()));
    }

    #[test]
    fn union_flattens_and_dedups() {
        let u = Descriptor::union([
            Descriptor::int(),
            Descriptor::union([Descriptor::str(), Descriptor::int()]),
            Descriptor::null(),
        ]);
        assert_eq!(u, Descriptor::Union(vec![Descriptor::int(), Descriptor::str(), Descriptor::null()]));
        assert!(u.accepts_null());
        assert_eq!(Descriptor::union([Descriptor::int()]), Descriptor::int());
    }

    #[test]
    fn display_uses_type_expression_form() {
        let d = Descriptor::dict(Descriptor::str(), Descriptor::optional(Descriptor::int()));
        assert_eq!(d.to_string(), "dict[str, int | null]");
        let t = Descriptor::tuple([Descriptor::bool(), Descriptor::list(Descriptor::float())]);
        assert_eq!(t.to_string(), "tuple[bool, list[float]]");
    }

    #[test]
    fn enum_kind_follows_member_values() {
        let ints = EnumType::new("Level", [("LOW", Value::Int(0)), ("HIGH", Value::Int(1))]);
        assert_eq!(ints.kind(), EnumKind::Integer);
        let mixed = EnumType::new("Odd", [("A", Value::Int(0)), ("B", Value::from("b"))]);
        assert_eq!(mixed.kind(), EnumKind::Mixed);
    }
}
