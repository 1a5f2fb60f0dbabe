//! Built-in resolvers every context starts with.
//!
//! Scalars decode as-is (floats also accept integers), enums decode from their
//! raw member value, temporal types parse ISO-8601 text. Temporal and opaque
//! built-ins stay rich in dict form and become strings only for JSON output.
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::json;

use super::{DecodeFn, DecoderRegistry, EncodeFn, EncoderRegistry, SchemaFn, SchemaRegistry};
use crate::descriptor::{Descriptor, TypeKey};
use crate::value::Value;

static UUID_RX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
        .expect("static regex")
});

pub const DECIMAL_PATTERN: &str = r"^-?\d+(\.\d+)?$";

static DECIMAL_RX: Lazy<Regex> = Lazy::new(|| Regex::new(DECIMAL_PATTERN).expect("static regex"));

pub(crate) fn install(decoders: &DecoderRegistry, encoders: &EncoderRegistry, schemas: &SchemaRegistry) {
    install_decoders(decoders);
    install_encoders(encoders);
    install_schemas(schemas);
}

fn decoder(f: impl Fn(&Descriptor, &serde_json::Value) -> Value + Send + Sync + 'static) -> Arc<DecodeFn> {
    Arc::new(move |d, raw| Ok(f(d, raw)))
}

fn encoder(f: impl Fn(&Value) -> Value + Send + Sync + 'static) -> Arc<EncodeFn> {
    Arc::new(move |v| Ok(f(v)))
}

fn schema(fragment: serde_json::Value) -> Arc<SchemaFn> {
    Arc::new(move |_| fragment.clone())
}

fn install_decoders(reg: &DecoderRegistry) {
    for key in [TypeKey::bool(), TypeKey::int(), TypeKey::str()] {
        reg.register(key, decoder(|_, raw| Value::from_json(raw)), true);
    }
    reg.register(
        TypeKey::float(),
        decoder(|_, raw| match raw.as_i64() {
            Some(i) => Value::float(i as f64),
            None => Value::from_json(raw),
        }),
        true,
    );
    reg.register(
        TypeKey::enumeration(),
        decoder(|d, raw| {
            let plain = Value::from_json(raw);
            match d {
                Descriptor::Enum(ty) => ty.instance(&plain).unwrap_or(plain),
                _ => plain,
            }
        }),
        true,
    );
    reg.register(
        TypeKey::date(),
        decoder(|_, raw| {
            parse_str(raw, |s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok().map(Value::Date))
        }),
        true,
    );
    reg.register(TypeKey::datetime(), decoder(|_, raw| parse_str(raw, parse_datetime)), true);
    reg.register(
        TypeKey::time(),
        decoder(|_, raw| parse_str(raw, |s| s.parse::<NaiveTime>().ok().map(Value::Time))),
        true,
    );
    reg.register(
        TypeKey::uuid(),
        decoder(|_, raw| {
            parse_str(raw, |s| {
                UUID_RX.is_match(s).then(|| Value::custom(&TypeKey::uuid(), Value::Str(s.to_lowercase())))
            })
        }),
        true,
    );
    reg.register(
        TypeKey::decimal(),
        decoder(|_, raw| {
            let text = match raw {
                serde_json::Value::Number(n) => n.to_string(),
                serde_json::Value::String(s) => s.clone(),
                other => return Value::from_json(other),
            };
            if DECIMAL_RX.is_match(&text) {
                Value::custom(&TypeKey::decimal(), Value::Str(text))
            } else {
                Value::from_json(raw)
            }
        }),
        true,
    );
}

/// Parse a JSON string with `f`; anything unparseable passes through so the
/// validation step can report it against the declared type.
fn parse_str(raw: &serde_json::Value, f: impl Fn(&str) -> Option<Value>) -> Value {
    raw.as_str().and_then(|s| f(s)).unwrap_or_else(|| Value::from_json(raw))
}

fn parse_datetime(s: &str) -> Option<Value> {
    s.parse::<NaiveDateTime>()
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(Value::DateTime)
}

fn install_encoders(reg: &EncoderRegistry) {
    reg.register(
        TypeKey::enumeration(),
        encoder(|v| match v {
            Value::Enum(e) => (*e.value).clone(),
            other => other.clone(),
        }),
        false,
    );
    reg.register(
        TypeKey::date(),
        encoder(|v| match v {
            Value::Date(d) => Value::Str(d.format("%Y-%m-%d").to_string()),
            other => other.clone(),
        }),
        false,
    );
    reg.register(
        TypeKey::datetime(),
        encoder(|v| match v {
            Value::DateTime(d) => Value::Str(d.format("%Y-%m-%dT%H:%M:%S%.f").to_string()),
            other => other.clone(),
        }),
        false,
    );
    reg.register(
        TypeKey::time(),
        encoder(|v| match v {
            Value::Time(t) => Value::Str(t.format("%H:%M:%S%.f").to_string()),
            other => other.clone(),
        }),
        false,
    );
    for key in [TypeKey::uuid(), TypeKey::decimal()] {
        reg.register(
            key,
            encoder(|v| match v {
                Value::Custom(c) => (*c.payload).clone(),
                other => other.clone(),
            }),
            false,
        );
    }
}

fn install_schemas(reg: &SchemaRegistry) {
    reg.register(TypeKey::datetime(), schema(json!({"type": "string", "format": "date-time"})), true);
    reg.register(TypeKey::date(), schema(json!({"type": "string", "format": "date"})), true);
    reg.register(TypeKey::time(), schema(json!({"type": "string", "format": "time"})), true);
    reg.register(TypeKey::uuid(), schema(json!({"type": "string", "format": "uuid"})), true);
    reg.register(TypeKey::decimal(), schema(json!({"type": "string", "pattern": DECIMAL_PATTERN})), true);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::EnumType;
    use crate::registry::Registry;

    fn registries() -> (DecoderRegistry, EncoderRegistry, SchemaRegistry) {
        let d = Registry::new("decoder");
        let e = Registry::new("encoder");
        let s = Registry::new("schema");
        install(&d, &e, &s);
        (d, e, s)
    }

    fn decode(reg: &DecoderRegistry, desc: &Descriptor, raw: serde_json::Value) -> Value {
        let key = desc.leaf_key().unwrap();
        (reg.resolve(key).unwrap().handler)(desc, &raw).unwrap()
    }

    #[test]
    fn float_decoder_widens_integers() {
        let (d, _, _) = registries();
        assert_eq!(decode(&d, &Descriptor::float(), json!(3)), Value::float(3.0));
        assert_eq!(decode(&d, &Descriptor::float(), json!(1.5)), Value::float(1.5));
        assert_eq!(decode(&d, &Descriptor::int(), json!(3)), Value::Int(3));
    }

    #[test]
    fn enum_decoder_maps_raw_values_to_members() {
        let (d, _, _) = registries();
        let ty = EnumType::new("Level", [("LOW", Value::Int(0)), ("HIGH", Value::Int(1))]);
        let desc = Descriptor::enumeration(ty.clone());
        assert_eq!(decode(&d, &desc, json!(1)), ty.instance(&Value::Int(1)).unwrap());
        assert_eq!(decode(&d, &desc, json!(7)), Value::Int(7));
    }

    #[test]
    fn datetime_decoder_accepts_both_separators() {
        let (d, _, _) = registries();
        let desc = Descriptor::Primitive(TypeKey::datetime());
        let a = decode(&d, &desc, json!("2023-02-01T17:38:45.389426"));
        let b = decode(&d, &desc, json!("2023-02-01 17:38:45.389426"));
        assert!(matches!(a, Value::DateTime(_)));
        assert_eq!(a, b);
        assert_eq!(decode(&d, &desc, json!("yesterday")), Value::from("yesterday"));
    }

    #[test]
    fn temporal_encoders_only_apply_for_json() {
        let (_, e, _) = registries();
        assert!(e.resolve_where(&TypeKey::date(), |x| x.on_dict).is_none());
        let dt = NaiveDateTime::parse_from_str("2023-02-01 17:38:45.389426", "%Y-%m-%d %H:%M:%S%.f").unwrap();
        let hit = e.resolve(&TypeKey::datetime()).unwrap();
        assert_eq!((hit.handler)(&Value::DateTime(dt)).unwrap(), Value::from("2023-02-01T17:38:45.389426"));
    }

    #[test]
    fn uuid_round_trips_through_custom_value() {
        let (d, e, _) = registries();
        let desc = Descriptor::Primitive(TypeKey::uuid());
        let v = decode(&d, &desc, json!("1D9CF695-C917-49CE-854B-4063F0CDA2E7"));
        assert_eq!(v.type_key(), TypeKey::uuid());
        let out = (e.resolve(&TypeKey::uuid()).unwrap().handler)(&v).unwrap();
        assert_eq!(out, Value::from("1d9cf695-c917-49ce-854b-4063f0cda2e7"));
    }

    #[test]
    fn schema_defaults_cover_temporal_types() {
        let (_, _, s) = registries();
        let frag = (s.resolve(&TypeKey::datetime()).unwrap().handler)(&TypeKey::datetime());
        assert_eq!(frag, json!({"type": "string", "format": "date-time"}));
        let frag = (s.resolve(&TypeKey::date()).unwrap().handler)(&TypeKey::date());
        assert_eq!(frag["format"], "date");
    }
}
