//! Resolver registries.
//!
//! One ordered table per direction (decode, encode, schema). New entries go to
//! the front, so a later registration beats an earlier one for the same type,
//! built-in defaults included. Lookup makes an exact-key pass, then an "is-a"
//! pass, both front to back.
//!
//! Each table is a copy-on-write snapshot: writers clone the list under the
//! write lock and swap in the new one, readers clone the `Arc`. A reader sees
//! either the old list or the new one, never a half-written one.
pub mod defaults;

use std::fmt;
use std::sync::{Arc, RwLock};

use tracing::{debug, trace};

use crate::descriptor::{Descriptor, TypeKey};
use crate::error::Result;
use crate::value::Value;

/// Decode a raw JSON value for a declared descriptor.
pub type DecodeFn = dyn Fn(&Descriptor, &serde_json::Value) -> Result<Value> + Send + Sync;

/// Encode a runtime value into something closer to JSON.
pub type EncodeFn = dyn Fn(&Value) -> Result<Value> + Send + Sync;

/// Produce the schema fragment for a type.
pub type SchemaFn = dyn Fn(&TypeKey) -> serde_json::Value + Send + Sync;

pub struct Entry<H: ?Sized> {
    pub key: TypeKey,
    pub handler: Arc<H>,
    /// Encoder-only: also apply when building the dict representation.
    pub on_dict: bool,
}

impl<H: ?Sized> Clone for Entry<H> {
    fn clone(&self) -> Self {
        Self { key: self.key.clone(), handler: self.handler.clone(), on_dict: self.on_dict }
    }
}

impl<H: ?Sized> fmt::Debug for Entry<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry").field("key", &self.key).field("on_dict", &self.on_dict).finish()
    }
}

pub struct Registry<H: ?Sized> {
    name: &'static str,
    entries: RwLock<Arc<Vec<Entry<H>>>>,
}

pub type DecoderRegistry = Registry<DecodeFn>;
pub type EncoderRegistry = Registry<EncodeFn>;
pub type SchemaRegistry = Registry<SchemaFn>;

impl<H: ?Sized> Registry<H> {
    pub fn new(name: &'static str) -> Self {
        Self { name, entries: RwLock::new(Arc::new(Vec::new())) }
    }

    pub fn register(&self, key: TypeKey, handler: Arc<H>, on_dict: bool) {
        let mut guard = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let mut next = Vec::with_capacity(guard.len() + 1);
        next.push(Entry { key: key.clone(), handler, on_dict });
        next.extend(guard.iter().cloned());
        *guard = Arc::new(next);
        debug!(registry = self.name, type_name = key.name(), on_dict, "registered resolver");
    }

    /// Current entries, front (highest priority) first.
    pub fn snapshot(&self) -> Arc<Vec<Entry<H>>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn len(&self) -> usize { self.snapshot().len() }

    pub fn is_empty(&self) -> bool { self.snapshot().is_empty() }

    pub fn resolve(&self, key: &TypeKey) -> Option<Entry<H>> {
        self.resolve_where(key, |_| true)
    }

    /// Exact match first, then the first entry `key` is a descendant of; only
    /// entries accepted by `filter` take part.
    pub fn resolve_where(&self, key: &TypeKey, filter: impl Fn(&Entry<H>) -> bool) -> Option<Entry<H>> {
        let entries = self.snapshot();
        let found = entries
            .iter()
            .filter(|e| filter(e))
            .find(|e| e.key == *key)
            .or_else(|| entries.iter().filter(|e| filter(e)).find(|e| key.is_a(&e.key)))
            .cloned();
        if let Some(entry) = &found {
            trace!(registry = self.name, probe = key.name(), matched = entry.key.name(), "resolver hit");
        }
        found
    }
}
