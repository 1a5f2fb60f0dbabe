//! Field metadata and the per-type field-map cache.
//!
//! An `ObjectType` is the ordered field map of one declared type. Where the
//! field maps come from is up to a `TypeProvider`; the `Catalog` asks a provider
//! at most once per type and keeps the answer for the life of the context.
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use once_cell::sync::OnceCell;
use tracing::debug;

use crate::descriptor::{Descriptor, TypeKey};
use crate::error::{Error, Result};
use crate::schema::docstring::DocMeta;
use crate::value::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct FieldMeta {
    pub name: String,
    pub descriptor: Descriptor,
    pub default: Option<Value>,
}

impl FieldMeta {
    pub fn has_default(&self) -> bool { self.default.is_some() }

    pub fn is_required(&self) -> bool { self.default.is_none() }
}

/// Ordered field map of a declared object type.
#[derive(Debug, Clone)]
pub struct ObjectType {
    pub key: TypeKey,
    pub fields: Vec<FieldMeta>,
    pub doc: DocMeta,
}

impl ObjectType {
    pub fn builder(name: impl Into<String>) -> ObjectTypeBuilder {
        ObjectTypeBuilder {
            key: TypeKey::object_type(name),
            fields: Vec::new(),
            doc: DocMeta::default(),
        }
    }

    pub fn name(&self) -> &str { self.key.name() }

    pub fn field(&self, name: &str) -> Option<&FieldMeta> {
        self.fields.iter().find(|f| f.name == name)
    }
}

pub struct ObjectTypeBuilder {
    key: TypeKey,
    fields: Vec<FieldMeta>,
    doc: DocMeta,
}

impl ObjectTypeBuilder {
    /// Use an existing key, e.g. one with a custom parent chain.
    pub fn key(mut self, key: TypeKey) -> Self {
        self.key = key;
        self
    }

    pub fn field(mut self, name: impl Into<String>, descriptor: Descriptor) -> Self {
        self.fields.push(FieldMeta { name: name.into(), descriptor, default: None });
        self
    }

    pub fn field_with_default(
        mut self,
        name: impl Into<String>,
        descriptor: Descriptor,
        default: Value,
    ) -> Self {
        self.fields.push(FieldMeta { name: name.into(), descriptor, default: Some(default) });
        self
    }

    pub fn doc(mut self, doc: DocMeta) -> Self {
        self.doc = doc;
        self
    }

    /// Parse a reST-style docstring into the type's metadata.
    pub fn docstring(self, text: &str) -> Self {
        let doc = DocMeta::parse(text);
        self.doc(doc)
    }

    pub fn build(self) -> Result<ObjectType> {
        for (i, f) in self.fields.iter().enumerate() {
            if self.fields[..i].iter().any(|g| g.name == f.name) {
                return Err(Error::DuplicateField {
                    type_name: self.key.name().to_string(),
                    field: f.name.clone(),
                });
            }
        }
        Ok(ObjectType { key: self.key, fields: self.fields, doc: self.doc })
    }
}

// ------------------------------ Provider --------------------------------- //

/// External source of field maps.
pub trait TypeProvider: Send + Sync {
    fn describe(&self, key: &TypeKey) -> Option<ObjectType>;
}

// ------------------------------- Catalog --------------------------------- //

type Pending = Arc<OnceCell<Option<Arc<ObjectType>>>>;

/// Cache of field maps keyed by type name.
#[derive(Default)]
pub struct Catalog {
    types: RwLock<HashMap<String, Arc<ObjectType>>>,
    providers: RwLock<Vec<Arc<dyn TypeProvider>>>,
    /// Provider lookups in flight, one cell per type name.
    pending: Mutex<HashMap<String, Pending>>,
}

impl Catalog {
    pub fn new() -> Self { Self::default() }

    /// Insert (or replace) a field map directly.
    pub fn declare(&self, ty: ObjectType) -> Arc<ObjectType> {
        let ty = Arc::new(ty);
        debug!(type_name = ty.name(), fields = ty.fields.len(), "declared object type");
        let mut types = self.types.write().unwrap_or_else(|e| e.into_inner());
        types.insert(ty.name().to_string(), ty.clone());
        ty
    }

    /// Add a provider consulted for types not declared directly.
    pub fn add_provider(&self, provider: Arc<dyn TypeProvider>) {
        let mut providers = self.providers.write().unwrap_or_else(|e| e.into_inner());
        providers.push(provider);
    }

    pub fn contains(&self, key: &TypeKey) -> bool { self.lookup(key).is_some() }

    fn cached(&self, key: &TypeKey) -> Option<Arc<ObjectType>> {
        let types = self.types.read().unwrap_or_else(|e| e.into_inner());
        types.get(key.name()).cloned()
    }

    /// Field map for `key`, asking providers on first use. Concurrent first
    /// lookups of one type share a single provider call.
    pub fn lookup(&self, key: &TypeKey) -> Option<Arc<ObjectType>> {
        if let Some(ty) = self.cached(key) {
            return Some(ty);
        }
        let cell = {
            let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
            // Re-checked under the pending lock: a finished lookup caches its
            // type before it drops its cell.
            if let Some(ty) = self.cached(key) {
                return Some(ty);
            }
            pending.entry(key.name().to_string()).or_default().clone()
        };
        let described = cell
            .get_or_init(|| {
                let providers = self.providers.read().unwrap_or_else(|e| e.into_inner()).clone();
                let described = providers.iter().find_map(|p| p.describe(key))?;
                let mut types = self.types.write().unwrap_or_else(|e| e.into_inner());
                let ty = types
                    .entry(key.name().to_string())
                    .or_insert_with(|| Arc::new(described))
                    .clone();
                debug!(type_name = key.name(), "cached object type from provider");
                Some(ty)
            })
            .clone();
        // Unknown types are asked again next time, in case a provider was added.
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        if pending.get(key.name()).is_some_and(|c| Arc::ptr_eq(c, &cell)) {
            pending.remove(key.name());
        }
        described
    }

    pub fn get(&self, key: &TypeKey) -> Result<Arc<ObjectType>> {
        self.lookup(key).ok_or_else(|| Error::UnknownType(key.name().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting(AtomicUsize);

    impl TypeProvider for Counting {
        fn describe(&self, key: &TypeKey) -> Option<ObjectType> {
            if key.name() != "Point" {
                return None;
            }
            self.0.fetch_add(1, Ordering::SeqCst);
            ObjectType::builder("Point")
                .field("x", Descriptor::int())
                .field("y", Descriptor::int())
                .build()
                .ok()
        }
    }

    #[test]
    fn duplicate_field_names_are_rejected() {
        let err = ObjectType::builder("P")
            .field("x", Descriptor::int())
            .field("x", Descriptor::str())
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateField { ref field, .. } if field == "x"));
    }

    #[test]
    fn defaults_mark_fields_optional() {
        let ty = ObjectType::builder("P")
            .field("a", Descriptor::int())
            .field_with_default("b", Descriptor::optional(Descriptor::int()), Value::Null)
            .build()
            .unwrap();
        assert!(ty.field("a").unwrap().is_required());
        assert!(ty.field("b").unwrap().has_default());
        assert_eq!(ty.fields.iter().map(|f| f.name.as_str()).collect::<Vec<_>>(), ["a", "b"]);
    }

    #[test]
    fn provider_is_asked_once_per_type() {
        let provider = Arc::new(Counting(AtomicUsize::new(0)));
        let catalog = Catalog::new();
        catalog.add_provider(provider.clone());
        let key = TypeKey::object_type("Point");
        assert!(catalog.lookup(&key).is_some());
        assert!(catalog.lookup(&key).is_some());
        assert_eq!(provider.0.load(Ordering::SeqCst), 1);
        assert!(matches!(catalog.get(&TypeKey::object_type("Nope")), Err(Error::UnknownType(_))));
    }

    struct Slow(AtomicUsize);

    impl TypeProvider for Slow {
        fn describe(&self, key: &TypeKey) -> Option<ObjectType> {
            self.0.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(50));
            ObjectType::builder(key.name()).field("x", Descriptor::int()).build().ok()
        }
    }

    #[test]
    fn concurrent_first_lookups_describe_once() {
        let provider = Arc::new(Slow(AtomicUsize::new(0)));
        let catalog = Catalog::new();
        catalog.add_provider(provider.clone());
        let barrier = std::sync::Barrier::new(8);
        let key = TypeKey::object_type("P");
        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    barrier.wait();
                    assert!(catalog.lookup(&key).is_some());
                });
            }
        });
        assert_eq!(provider.0.load(Ordering::SeqCst), 1);
        assert!(catalog.lookup(&key).is_some());
        assert_eq!(provider.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unknown_types_are_asked_again_after_a_provider_is_added() {
        let catalog = Catalog::new();
        let key = TypeKey::object_type("Point");
        assert!(catalog.lookup(&key).is_none());
        catalog.add_provider(Arc::new(Counting(AtomicUsize::new(0))));
        assert!(catalog.lookup(&key).is_some());
    }
}
