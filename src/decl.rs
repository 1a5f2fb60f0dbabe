//! Declaration files: object and enum types described in JSON.
//!
//! ```json
//! {
//!   "enums": [{"name": "Color", "members": {"RED": "red", "GREEN": "green"}}],
//!   "types": [{
//!     "name": "User",
//!     "doc": "A user.\n:param name: display name",
//!     "fields": [
//!       {"name": "name", "type": "str"},
//!       {"name": "color", "type": "Color | null", "default": null}
//!     ]
//!   }]
//! }
//! ```
//!
//! Loading resolves every type expression and decodes every default up
//! front, so a `Declarations` value is a complete, self-contained
//! `TypeProvider`.
pub mod parse;

use std::path::Path;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use tracing::debug;

use crate::context::Context;
use crate::descriptor::{Descriptor, EnumType, TypeKey};
use crate::error::{Error, Result};
use crate::fields::{ObjectType, TypeProvider};
use crate::value::Value;

// ---- Wire format ----

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DeclFile {
    #[serde(default)]
    enums: Vec<EnumDecl>,
    #[serde(default)]
    types: Vec<TypeDecl>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct EnumDecl {
    name: String,
    members: IndexMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TypeDecl {
    name: String,
    #[serde(default)]
    doc: Option<String>,
    fields: Vec<FieldDecl>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FieldDecl {
    name: String,
    #[serde(rename = "type")]
    ty: String,
    /// `Some(Null)` for an explicit `"default": null`, `None` when absent.
    #[serde(default, deserialize_with = "present")]
    default: Option<serde_json::Value>,
}

fn present<'de, D: Deserializer<'de>>(de: D) -> std::result::Result<Option<serde_json::Value>, D::Error> {
    serde_json::Value::deserialize(de).map(Some)
}

/// Deserialize with the JSON path of the failure in the error.
fn from_slice_with_path<T: DeserializeOwned>(bytes: &[u8], origin: &str) -> Result<T> {
    let de = &mut serde_json::Deserializer::from_slice(bytes);
    serde_path_to_error::deserialize::<_, T>(de).map_err(|err| Error::Declaration {
        path: format!("{origin}: {}", err.path()),
        message: err.into_inner().to_string(),
    })
}

// ---- Resolved declarations ----

#[derive(Debug, Clone, Default)]
pub struct Declarations {
    enums: IndexMap<String, Arc<EnumType>>,
    types: IndexMap<String, ObjectType>,
}

impl Declarations {
    pub fn load(path: impl AsRef<Path>, ctx: &Context) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        Self::from_slice(&bytes, &path.display().to_string(), ctx)
    }

    /// Parse and resolve a declaration document. `origin` names the source in
    /// error messages. Defaults are decoded with `ctx`'s decoders.
    pub fn from_slice(bytes: &[u8], origin: &str, ctx: &Context) -> Result<Self> {
        let file: DeclFile = from_slice_with_path(bytes, origin)?;
        let err = |path: String, message: String| Error::Declaration { path: format!("{origin}: {path}"), message };

        let mut out = Declarations::default();
        for (i, e) in file.enums.iter().enumerate() {
            if out.enums.contains_key(&e.name) {
                return Err(err(format!("enums[{i}].name"), format!("enum '{}' declared twice", e.name)));
            }
            let members = e.members.iter().map(|(name, raw)| (name.clone(), Value::from_json(raw)));
            out.enums.insert(e.name.clone(), Arc::new(EnumType::new(e.name.clone(), members)));
        }

        let object_names = file.types.iter().map(|t| t.name.as_str()).collect::<Vec<_>>();
        let lookup = |name: &str| -> Option<Descriptor> {
            if let Some(e) = out.enums.get(name) {
                return Some(Descriptor::Enum(e.clone()));
            }
            object_names.contains(&name).then(|| Descriptor::object(&TypeKey::object_type(name)))
        };

        let mut types = IndexMap::new();
        for (i, t) in file.types.iter().enumerate() {
            if types.contains_key(&t.name) || out.enums.contains_key(&t.name) {
                return Err(err(format!("types[{i}].name"), format!("type '{}' declared twice", t.name)));
            }
            let mut builder = ObjectType::builder(t.name.clone());
            if let Some(doc) = &t.doc {
                builder = builder.docstring(doc);
            }
            for (j, f) in t.fields.iter().enumerate() {
                let descriptor = parse::parse_type(&f.ty, &lookup)
                    .map_err(|m| err(format!("types[{i}].fields[{j}].type"), m))?;
                builder = match &f.default {
                    None => builder.field(f.name.clone(), descriptor),
                    Some(raw) => {
                        let default = ctx
                            .decode_value(&descriptor, raw)
                            .map_err(|e| err(format!("types[{i}].fields[{j}].default"), e.to_string()))?;
                        builder.field_with_default(f.name.clone(), descriptor, default)
                    }
                };
            }
            let ty = builder.build().map_err(|e| err(format!("types[{i}].fields"), e.to_string()))?;
            types.insert(t.name.clone(), ty);
        }
        out.types = types;
        debug!(origin, enums = out.enums.len(), types = out.types.len(), "loaded declarations");
        Ok(out)
    }

    pub fn type_names(&self) -> impl Iterator<Item = &str> { self.types.keys().map(String::as_str) }

    pub fn enum_type(&self, name: &str) -> Option<&Arc<EnumType>> { self.enums.get(name) }

    pub fn object_type(&self, name: &str) -> Option<&ObjectType> { self.types.get(name) }

    /// Put every declared type into `ctx`'s catalog; returns their keys.
    pub fn declare_into(&self, ctx: &Context) -> Vec<TypeKey> {
        self.types.values().map(|ty| ctx.declare(ty.clone()).key.clone()).collect()
    }
}

impl TypeProvider for Declarations {
    fn describe(&self, key: &TypeKey) -> Option<ObjectType> { self.types.get(key.name()).cloned() }
}
