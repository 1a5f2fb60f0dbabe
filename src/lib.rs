//! Declared object types for JSON: field validation with aggregated errors,
//! a resolver-driven JSON codec, and Draft 7 JSON Schema generation.
//!
//! ```no_run
//! use json_kobj::{Context, Descriptor, ObjectType, Value};
//!
//! let ctx = Context::new();
//! let user = ctx.declare(
//!     ObjectType::builder("User")
//!         .field("name", Descriptor::str())
//!         .field_with_default("age", Descriptor::optional(Descriptor::int()), Value::Null)
//!         .build()?,
//! );
//! let v = ctx.from_json(br#"{"name": "Alice"}"#, &user.key)?;
//! assert_eq!(ctx.to_json(&v, true)?, br#"{"name":"Alice"}"#);
//! # Ok::<(), json_kobj::Error>(())
//! ```
pub mod codec;
pub mod context;
pub mod decl;
pub mod descriptor;
pub mod error;
pub mod fields;
pub mod registry;
pub mod schema;
pub mod validate;
pub mod value;

pub use context::{Config, Context, Signal, global};
pub use decl::Declarations;
pub use descriptor::{Descriptor, EnumKind, EnumType, TypeKey};
pub use error::{BoxError, Error, ErrorItem, Failure, ItemKind, Result};
pub use fields::{Catalog, FieldMeta, ObjectType, TypeProvider};
pub use schema::docstring::DocMeta;
pub use value::{Custom, EnumValue, Object, Value};
