//! JSON Schema (Draft 7) generation for declared object types.
//!
//! Registered schema resolvers win over the built-in table, exact type first
//! and then by ancestry, so callers can override any fragment. Nested declared
//! types are emitted once under `$defs` and referenced from every use; a type
//! that refers back to the root type gets `{"$ref": "#"}`.
pub mod docstring;

use std::collections::HashSet;

use serde_json::{Map, Value as Json, json};
use tracing::debug;

use crate::context::Context;
use crate::descriptor::{Descriptor, EnumKind, TypeKey};
use crate::error::{Error, Result};
use crate::fields::ObjectType;

pub const DRAFT_07: &str = "http://json-schema.org/draft-07/schema#";

impl Context {
    /// The full schema document for a declared type.
    pub fn json_schema(&self, key: &TypeKey) -> Result<Json> {
        let ty = self.object_type(key)?;
        let mut walk = Walk::new(self, &ty.key);
        let (properties, required) = walk.body(&ty)?;

        let mut doc = Map::new();
        doc.insert("$schema".into(), json!(DRAFT_07));
        doc.insert("type".into(), json!("object"));
        doc.insert("properties".into(), Json::Object(properties));
        doc.insert("additionalProperties".into(), json!(false));
        if let Some(title) = &ty.doc.title {
            doc.insert("title".into(), json!(title));
        }
        if let Some(description) = &ty.doc.description {
            if ty.doc.title.as_ref() != Some(description) {
                doc.insert("description".into(), json!(description));
            }
        }
        if !required.is_empty() {
            doc.insert("required".into(), json!(required));
        }
        if !ty.doc.examples.is_empty() {
            doc.insert("examples".into(), json!(ty.doc.examples));
        }
        if !walk.defs.is_empty() {
            doc.insert("$defs".into(), Json::Object(walk.defs));
        }
        debug!(type_name = ty.name(), "generated json schema");
        Ok(Json::Object(doc))
    }

    /// The schema fragment for a single descriptor, with no surrounding document.
    /// Declared object types referenced from it are inlined.
    pub fn schema_fragment(&self, descriptor: &Descriptor) -> Result<Json> {
        let root = TypeKey::new("");
        let mut walk = Walk::new(self, &root);
        walk.inline = true;
        walk.fragment(descriptor)
    }
}

struct Walk<'a> {
    ctx: &'a Context,
    root: TypeKey,
    defs: Map<String, Json>,
    seen: HashSet<String>,
    inline: bool,
}

impl<'a> Walk<'a> {
    fn new(ctx: &'a Context, root: &TypeKey) -> Self {
        Self { ctx, root: root.clone(), defs: Map::new(), seen: HashSet::new(), inline: false }
    }

    /// `properties` and `required` for an object type.
    fn body(&mut self, ty: &ObjectType) -> Result<(Map<String, Json>, Vec<String>)> {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for field in &ty.fields {
            let mut prop = self.fragment(&field.descriptor)?;
            if let Json::Object(map) = &mut prop {
                if let Some(text) = ty.doc.field_descriptions.get(&field.name) {
                    map.insert("description".into(), json!(text));
                }
                if let Some(default) = field.default.as_ref().filter(|d| d.is_plain()) {
                    map.insert("default".into(), default.to_json()?);
                }
            }
            if field.is_required() {
                required.push(field.name.clone());
            }
            properties.insert(field.name.clone(), prop);
        }
        Ok((properties, required))
    }

    fn resolved(&self, key: &TypeKey) -> Option<Json> {
        self.ctx.schemas.resolve(key).map(|entry| (entry.handler)(key))
    }

    fn fragment(&mut self, descriptor: &Descriptor) -> Result<Json> {
        Ok(match descriptor {
            Descriptor::Any => json!({}),
            Descriptor::Primitive(key) => match self.resolved(key) {
                Some(frag) => frag,
                None => primitive(key),
            },
            Descriptor::Enum(ty) => match self.resolved(&ty.key) {
                Some(frag) => frag,
                None => {
                    let values = ty.members.iter().map(|m| m.value.to_json()).collect::<Result<Vec<_>>>()?;
                    match ty.kind() {
                        EnumKind::Integer => json!({"type": "integer", "enum": values}),
                        EnumKind::String => json!({"type": "string", "enum": values}),
                        EnumKind::Mixed => json!({"enum": values}),
                    }
                }
            },
            Descriptor::Object(key) => match self.resolved(key) {
                Some(frag) => frag,
                None => self.reference(key)?,
            },
            Descriptor::List(elem) => json!({"type": "array", "items": self.fragment(elem)?}),
            Descriptor::Set(elem) => {
                json!({"type": "array", "items": self.fragment(elem)?, "uniqueItems": true})
            }
            Descriptor::Tuple(elems) => {
                let prefix = elems.iter().map(|e| self.fragment(e)).collect::<Result<Vec<_>>>()?;
                json!({
                    "type": "array",
                    "prefixItems": prefix,
                    "minItems": elems.len(),
                    "maxItems": elems.len(),
                })
            }
            Descriptor::Dict(_, value) => {
                json!({"type": "object", "additionalProperties": self.fragment(value)?})
            }
            Descriptor::Union(members) => {
                let non_null = members.iter().filter(|m| !m.is_null()).collect::<Vec<_>>();
                // Optional[T]: T first, then null.
                let any_of = match non_null.as_slice() {
                    [only] if non_null.len() < members.len() => {
                        vec![self.fragment(only)?, self.fragment(&Descriptor::null())?]
                    }
                    _ => members.iter().map(|m| self.fragment(m)).collect::<Result<Vec<_>>>()?,
                };
                json!({"anyOf": any_of})
            }
        })
    }

    /// `$ref` to a declared type, emitting its definition on first sight.
    fn reference(&mut self, key: &TypeKey) -> Result<Json> {
        if !self.inline && *key == self.root {
            return Ok(json!({"$ref": "#"}));
        }
        let ty = self.ctx.catalog().lookup(key).ok_or_else(|| Error::UnresolvedReference {
            from: self.root.name().to_string(),
            target: key.name().to_string(),
        })?;
        if self.inline {
            if !self.seen.insert(key.name().to_string()) {
                return Ok(json!({"type": "object"}));
            }
            let def = self.definition(&ty);
            self.seen.remove(key.name());
            return def;
        }
        if self.seen.insert(key.name().to_string()) {
            let def = self.definition(&ty)?;
            self.defs.insert(key.name().to_string(), def);
        }
        Ok(json!({"$ref": format!("#/$defs/{}", key.name())}))
    }

    fn definition(&mut self, ty: &ObjectType) -> Result<Json> {
        let (properties, required) = self.body(ty)?;
        let mut def = Map::new();
        def.insert("type".into(), json!("object"));
        def.insert("properties".into(), Json::Object(properties));
        def.insert("additionalProperties".into(), json!(false));
        if !required.is_empty() {
            def.insert("required".into(), json!(required));
        }
        Ok(Json::Object(def))
    }
}

/// Built-in table for types without a registered resolver.
fn primitive(key: &TypeKey) -> Json {
    match key.name() {
        "null" => json!({"type": "null"}),
        "bool" => json!({"type": "boolean"}),
        "int" => json!({"type": "integer"}),
        "float" => json!({"type": "number"}),
        "str" => json!({"type": "string"}),
        "list" | "tuple" => json!({"type": "array"}),
        "set" => json!({"type": "array", "uniqueItems": true}),
        "dict" | "object" => json!({"type": "object"}),
        _ => json!({}),
    }
}
