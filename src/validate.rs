//! Validation engine.
//!
//! Walks a declared descriptor against a concrete value. Rules apply in a fixed
//! order: a value equal to the field's default passes outright, `Any` passes,
//! then the shape decides. Collection failures are reported per offending index;
//! a union failure is reported once for the whole union; a tuple of the wrong
//! arity is one length failure regardless of its elements.
//!
//! Eager mode collects every failing element of every field. Lazy mode stops at
//! the first failing element and at the first failing field.
use indexmap::IndexMap;

use crate::descriptor::Descriptor;
use crate::error::{ErrorItem, ItemKind};
use crate::fields::{FieldMeta, ObjectType};
use crate::value::Value;

/// A failure found under one field, before the field name is attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    pub kind: ItemKind,
    pub value: String,
    pub index: Option<usize>,
}

impl Issue {
    fn of(kind: ItemKind, value: &Value) -> Self {
        Self { kind, value: value.to_string(), index: None }
    }

    fn at(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }

    fn into_item(self, field: &str, descriptor: &Descriptor) -> ErrorItem {
        ErrorItem {
            kind: self.kind,
            field: field.to_string(),
            descriptor: descriptor.to_string(),
            value: self.value,
            index: self.index,
        }
    }
}

/// Does `value` satisfy `descriptor`? Stops at the first problem.
pub fn conforms(value: &Value, descriptor: &Descriptor) -> bool {
    check(value, descriptor, true).is_empty()
}

/// Check one value against a descriptor; no default exemption applies.
pub fn check(value: &Value, descriptor: &Descriptor, lazy: bool) -> Vec<Issue> {
    match descriptor {
        Descriptor::Any => Vec::new(),

        Descriptor::Primitive(key) => {
            if value.type_key().is_a(key) {
                Vec::new()
            } else {
                vec![Issue::of(ItemKind::TypeMismatch, value)]
            }
        }

        Descriptor::Union(members) => {
            if members.iter().any(|m| conforms(value, m)) {
                Vec::new()
            } else {
                vec![Issue::of(ItemKind::UnionMismatch, value)]
            }
        }

        Descriptor::List(elem) => match value {
            Value::List(xs) => elements(xs.iter().map(|x| (x, elem.as_ref())), lazy),
            _ => vec![Issue::of(ItemKind::TypeMismatch, value)],
        },

        Descriptor::Set(elem) => match value {
            Value::Set(xs) => elements(xs.iter().map(|x| (x, elem.as_ref())), lazy),
            _ => vec![Issue::of(ItemKind::TypeMismatch, value)],
        },

        Descriptor::Tuple(elems) => match value {
            Value::Tuple(xs) if xs.len() != elems.len() => {
                vec![Issue::of(ItemKind::LengthMismatch, value)]
            }
            Value::Tuple(xs) => elements(xs.iter().zip(elems.iter()), lazy),
            _ => vec![Issue::of(ItemKind::TypeMismatch, value)],
        },

        Descriptor::Dict(key_d, val_d) => match value {
            Value::Dict(pairs) => {
                let mut out = Vec::new();
                for (i, (k, v)) in pairs.iter().enumerate() {
                    let offending = if !conforms(k, key_d) {
                        Some(k)
                    } else if !conforms(v, val_d) {
                        Some(v)
                    } else {
                        None
                    };
                    if let Some(bad) = offending {
                        out.push(Issue::of(ItemKind::TypeMismatch, bad).at(i));
                        if lazy { break; }
                    }
                }
                out
            }
            _ => vec![Issue::of(ItemKind::TypeMismatch, value)],
        },

        Descriptor::Enum(ty) => {
            let is_member = match value {
                Value::Enum(e) => e.key == ty.key,
                raw => ty.member_by_value(raw).is_some(),
            };
            if is_member { Vec::new() } else { vec![Issue::of(ItemKind::TypeMismatch, value)] }
        }

        // Nested objects were validated when they were constructed.
        Descriptor::Object(key) => match value {
            Value::Object(o) if o.key().is_a(key) => Vec::new(),
            _ => vec![Issue::of(ItemKind::TypeMismatch, value)],
        },
    }
}

fn elements<'a, I>(xs: I, lazy: bool) -> Vec<Issue>
where
    I: Iterator<Item = (&'a Value, &'a Descriptor)>,
{
    let mut out = Vec::new();
    for (i, (x, d)) in xs.enumerate() {
        if !conforms(x, d) {
            out.push(Issue::of(ItemKind::TypeMismatch, x).at(i));
            if lazy { break; }
        }
    }
    out
}

/// Validate `value` as the content of a field named `field_name`.
pub fn validate(value: &Value, descriptor: &Descriptor, field_name: &str, lazy: bool) -> Vec<ErrorItem> {
    check(value, descriptor, lazy)
        .into_iter()
        .map(|issue| issue.into_item(field_name, descriptor))
        .collect()
}

/// Validate a field, honoring its declared default.
pub fn validate_field(field: &FieldMeta, value: &Value, lazy: bool) -> Vec<ErrorItem> {
    if field.default.as_ref() == Some(value) {
        return Vec::new();
    }
    validate(value, &field.descriptor, &field.name, lazy)
}

/// Validate every field of an object in declaration order.
pub fn validate_object(ty: &ObjectType, values: &IndexMap<String, Value>, lazy: bool) -> Vec<ErrorItem> {
    let mut items = Vec::new();
    for field in &ty.fields {
        let Some(value) = values.get(&field.name) else { continue };
        items.extend(validate_field(field, value, lazy));
        if lazy && !items.is_empty() {
            break;
        }
    }
    items
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{EnumType, TypeKey};

    fn fields(pairs: &[(&str, Value)]) -> IndexMap<String, Value> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    fn stub() -> ObjectType {
        ObjectType::builder("Stub")
            .field("a", Descriptor::int())
            .field("b", Descriptor::list(Descriptor::int()))
            .build()
            .unwrap()
    }

    #[test]
    fn exact_primitives_pass_and_disjoint_ones_fail_once() {
        let cases = [
            (Descriptor::int(), Value::Int(1), Value::from("1")),
            (Descriptor::bool(), Value::Bool(true), Value::Int(2)),
            (Descriptor::str(), Value::from("a"), Value::float(1.0)),
            (Descriptor::float(), Value::float(1.0), Value::Bool(true)),
        ];
        for (d, good, bad) in cases {
            assert!(validate(&good, &d, "f", false).is_empty(), "{d} should accept {good}");
            let errs = validate(&bad, &d, "f", false);
            assert_eq!(errs.len(), 1, "{d} should reject {bad}");
            assert_eq!(errs[0].kind, ItemKind::TypeMismatch);
        }
    }

    #[test]
    fn bool_never_satisfies_int_or_float() {
        assert!(!conforms(&Value::Bool(true), &Descriptor::int()));
        assert!(!conforms(&Value::Bool(false), &Descriptor::float()));
        assert!(!conforms(&Value::Int(1), &Descriptor::float()));
    }

    #[test]
    fn eager_list_reports_every_bad_index() {
        let values = fields(&[
            ("a", Value::Int(1)),
            ("b", Value::list([Value::Int(1), Value::from("x"), Value::Int(2), Value::from("y")])),
        ]);
        let items = validate_object(&stub(), &values, false);
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|i| i.field == "b" && i.kind == ItemKind::TypeMismatch));
        assert_eq!(items.iter().map(|i| i.index).collect::<Vec<_>>(), [Some(1), Some(3)]);
        assert_eq!(items[0].value, "'x'");
        assert_eq!(items[0].descriptor, "list[int]");
    }

    #[test]
    fn lazy_list_reports_lowest_bad_index_only() {
        let values = fields(&[
            ("a", Value::Int(1)),
            ("b", Value::list([Value::Int(1), Value::from("x"), Value::Int(2), Value::from("y")])),
        ]);
        let items = validate_object(&stub(), &values, true);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].index, Some(1));
    }

    #[test]
    fn lazy_mode_stops_at_first_failing_field() {
        let values = fields(&[("a", Value::from("no")), ("b", Value::from("no"))]);
        let eager = validate_object(&stub(), &values, false);
        assert_eq!(eager.iter().map(|i| i.field.as_str()).collect::<Vec<_>>(), ["a", "b"]);
        let lazy = validate_object(&stub(), &values, true);
        assert_eq!(lazy.len(), 1);
        assert_eq!(lazy[0].field, "a");
    }

    #[test]
    fn tuple_arity_mismatch_is_a_single_length_error() {
        let d = Descriptor::tuple([Descriptor::bool()]);
        let errs = validate(&Value::tuple([Value::Bool(true), Value::Bool(false)]), &d, "t", false);
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].kind, ItemKind::LengthMismatch);
        assert_eq!(errs[0].index, None);
        // wrong arity wins even when elements are also wrong
        let errs = validate(&Value::tuple([Value::Int(1), Value::Int(2)]), &d, "t", false);
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].kind, ItemKind::LengthMismatch);
    }

    #[test]
    fn tuple_positions_check_their_own_descriptor() {
        let d = Descriptor::tuple([Descriptor::int(), Descriptor::str()]);
        assert!(conforms(&Value::tuple([Value::Int(1), Value::from("a")]), &d));
        let errs = validate(&Value::tuple([Value::from("a"), Value::Int(1)]), &d, "t", false);
        assert_eq!(errs.iter().map(|e| e.index).collect::<Vec<_>>(), [Some(0), Some(1)]);
        assert!(!conforms(&Value::list([Value::Int(1), Value::from("a")]), &d));
    }

    #[test]
    fn union_failure_is_reported_once_for_the_whole_union() {
        let d = Descriptor::union([Descriptor::int(), Descriptor::str(), Descriptor::null()]);
        assert!(conforms(&Value::Null, &d));
        assert!(conforms(&Value::from("s"), &d));
        let errs = validate(&Value::float(1.5), &d, "u", false);
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].kind, ItemKind::UnionMismatch);
        assert_eq!(errs[0].descriptor, "int | str | null");
    }

    #[test]
    fn dict_checks_keys_and_values_per_entry() {
        let d = Descriptor::dict(Descriptor::str(), Descriptor::optional(Descriptor::int()));
        let v = Value::dict([
            (Value::from("str"), Value::Bool(true)),
            (Value::Int(1), Value::from("str")),
            (Value::from("ok"), Value::Null),
            (Value::Int(2), Value::Int(3)),
        ]);
        let errs = validate(&v, &d, "m", false);
        assert_eq!(errs.iter().map(|e| e.index).collect::<Vec<_>>(), [Some(0), Some(1), Some(3)]);
        assert_eq!(errs[1].value, "1");
        assert!(!conforms(&Value::list([]), &d));
    }

    #[test]
    fn set_requires_a_set() {
        let d = Descriptor::set(Descriptor::int());
        assert!(conforms(&Value::set([Value::Int(1), Value::Int(2)]), &d));
        assert!(!conforms(&Value::list([Value::Int(1)]), &d));
    }

    #[test]
    fn enum_accepts_members_and_raw_member_values() {
        let ty = EnumType::new("Color", [("RED", Value::from("red")), ("BLUE", Value::from("blue"))]);
        let member = ty.instance(&Value::from("red")).unwrap();
        let d = Descriptor::enumeration(ty);
        assert!(conforms(&member, &d));
        assert!(conforms(&Value::from("blue"), &d));
        assert!(!conforms(&Value::from("green"), &d));
    }

    #[test]
    fn default_values_bypass_type_checks() {
        let ty = ObjectType::builder("P")
            .field_with_default("age", Descriptor::int(), Value::Null)
            .build()
            .unwrap();
        let field = &ty.fields[0];
        assert!(validate_field(field, &Value::Null, false).is_empty());
        assert_eq!(validate_field(field, &Value::from("x"), false).len(), 1);
    }

    #[test]
    fn any_accepts_everything() {
        for v in [Value::Null, Value::Int(1), Value::list([]), Value::custom(&TypeKey::uuid(), Value::from("u"))] {
            assert!(conforms(&v, &Descriptor::Any));
        }
    }

    #[test]
    fn custom_values_match_by_ancestry() {
        let money = TypeKey::with_parent("money", &TypeKey::decimal());
        let v = Value::custom(&money, Value::from("1.50"));
        assert!(conforms(&v, &Descriptor::Primitive(TypeKey::decimal())));
        assert!(!conforms(&Value::custom(&TypeKey::decimal(), Value::from("1")), &Descriptor::Primitive(money)));
    }
}
