//! The configuration and registry context.
//!
//! A `Context` owns the field-map catalog, the three resolver registries and
//! the engine-wide flags. `global()` is the process-wide instance; independent
//! contexts can be built for isolation (tests, multi-tenant hosts). Both start
//! out with the built-in resolvers installed.
use std::fmt;
use std::sync::{Arc, RwLock};

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use tracing::debug;

use crate::descriptor::{Descriptor, TypeKey};
use crate::error::{BoxError, Error, ErrorItem, Failure, ItemKind, Result};
use crate::fields::{Catalog, ObjectType, TypeProvider};
use crate::registry::{self, DecoderRegistry, EncoderRegistry, Registry, SchemaRegistry};
use crate::validate::validate_object;
use crate::value::{Object, Value};

/// Replaces the default error of an aggregated failure with the caller's own.
pub type Signal = Arc<dyn Fn(&Failure) -> BoxError + Send + Sync>;

#[derive(Clone, Default)]
pub struct Config {
    /// Stop validation at the first failing field (and element).
    pub lazy_type_check: bool,
    /// Signal for validation failures raised by construction.
    pub validation_signal: Option<Signal>,
    /// Signal for failures raised while decoding JSON content.
    pub content_signal: Option<Signal>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("lazy_type_check", &self.lazy_type_check)
            .field("validation_signal", &self.validation_signal.is_some())
            .field("content_signal", &self.content_signal.is_some())
            .finish()
    }
}

pub struct Context {
    config: RwLock<Config>,
    catalog: Catalog,
    pub(crate) decoders: DecoderRegistry,
    pub(crate) encoders: EncoderRegistry,
    pub(crate) schemas: SchemaRegistry,
}

static GLOBAL: Lazy<Context> = Lazy::new(Context::new);

/// The process-wide context.
pub fn global() -> &'static Context { &GLOBAL }

impl Default for Context {
    fn default() -> Self { Self::new() }
}

impl Context {
    pub fn new() -> Self { Self::with_config(Config::default()) }

    pub fn with_config(config: Config) -> Self {
        let ctx = Self {
            config: RwLock::new(config),
            catalog: Catalog::new(),
            decoders: Registry::new("decoder"),
            encoders: Registry::new("encoder"),
            schemas: Registry::new("schema"),
        };
        registry::defaults::install(&ctx.decoders, &ctx.encoders, &ctx.schemas);
        ctx
    }

    // ---- configuration ----

    pub fn config(&self) -> Config {
        self.config.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn update_config(&self, f: impl FnOnce(&mut Config)) {
        let mut guard = self.config.write().unwrap_or_else(|e| e.into_inner());
        f(&mut guard);
    }

    pub fn set_lazy_type_check(&self, lazy: bool) {
        self.update_config(|c| c.lazy_type_check = lazy);
    }

    pub fn set_validation_signal(&self, signal: Option<Signal>) {
        self.update_config(|c| c.validation_signal = signal);
    }

    pub fn set_content_signal(&self, signal: Option<Signal>) {
        self.update_config(|c| c.content_signal = signal);
    }

    // ---- field maps ----

    pub fn catalog(&self) -> &Catalog { &self.catalog }

    pub fn declare(&self, ty: ObjectType) -> Arc<ObjectType> { self.catalog.declare(ty) }

    pub fn add_provider(&self, provider: Arc<dyn TypeProvider>) { self.catalog.add_provider(provider) }

    pub fn object_type(&self, key: &TypeKey) -> Result<Arc<ObjectType>> { self.catalog.get(key) }

    /// The catalog's key for a declared type name.
    pub fn key(&self, name: &str) -> Result<TypeKey> {
        Ok(self.catalog.get(&TypeKey::object_type(name))?.key.clone())
    }

    // ---- resolvers ----

    pub fn decoders(&self) -> &DecoderRegistry { &self.decoders }
    pub fn encoders(&self) -> &EncoderRegistry { &self.encoders }
    pub fn schemas(&self) -> &SchemaRegistry { &self.schemas }

    /// Register a decoder; it receives the declared descriptor and the raw JSON value.
    pub fn register_decoder<F>(&self, key: TypeKey, f: F)
    where
        F: Fn(&Descriptor, &serde_json::Value) -> Result<Value> + Send + Sync + 'static,
    {
        self.decoders.register(key, Arc::new(f), true);
    }

    /// Register an encoder. With `on_dict` false it only applies to JSON output
    /// and `to_dict` keeps the value as it is.
    pub fn register_encoder<F>(&self, key: TypeKey, f: F, on_dict: bool)
    where
        F: Fn(&Value) -> Result<Value> + Send + Sync + 'static,
    {
        self.encoders.register(key, Arc::new(f), on_dict);
    }

    pub fn register_schema<F>(&self, key: TypeKey, f: F)
    where
        F: Fn(&TypeKey) -> serde_json::Value + Send + Sync + 'static,
    {
        self.schemas.register(key, Arc::new(f), true);
    }

    // ---- construction ----

    /// Build an object of a declared type: absent fields take their defaults,
    /// then every field is validated. Validation failures go through the
    /// validation signal when one is set.
    pub fn construct<I, S>(&self, key: &TypeKey, fields: I) -> Result<Value>
    where
        I: IntoIterator<Item = (S, Value)>,
        S: Into<String>,
    {
        let ty = self.object_type(key)?;
        let given = fields.into_iter().map(|(k, v)| (k.into(), v)).collect::<IndexMap<_, _>>();
        self.build(&ty, given).map_err(|e| self.validation_signaled(e))
    }

    pub(crate) fn build(&self, ty: &ObjectType, mut given: IndexMap<String, Value>) -> Result<Value> {
        if let Some(unknown) = given.keys().find(|k| ty.field(k).is_none()) {
            return Err(Error::UnknownField {
                type_name: ty.name().to_string(),
                field: unknown.clone(),
            });
        }

        let mut values = IndexMap::with_capacity(ty.fields.len());
        let mut missing = Vec::new();
        for field in &ty.fields {
            match given.shift_remove(&field.name).or_else(|| field.default.clone()) {
                Some(v) => {
                    values.insert(field.name.clone(), v);
                }
                None => missing.push(ErrorItem {
                    kind: ItemKind::MissingField,
                    field: field.name.clone(),
                    descriptor: field.descriptor.to_string(),
                    value: "Empty".to_string(),
                    index: None,
                }),
            }
        }
        if !missing.is_empty() {
            return Err(Error::MissingFields(Failure::missing(ty.name(), missing)));
        }

        let items = validate_object(ty, &values, self.config().lazy_type_check);
        if !items.is_empty() {
            debug!(type_name = ty.name(), errors = items.len(), "validation failed");
            return Err(Error::Validation(Failure::validation(ty.name(), items)));
        }
        Ok(Value::Object(Object::new(ty.key.clone(), values)))
    }

    pub(crate) fn validation_signaled(&self, e: Error) -> Error {
        match e {
            Error::Validation(_) => e.signaled(self.config().validation_signal.as_ref()),
            other => other,
        }
    }
}
