//! Error types.
//!
//! Aggregated failures (validation, missing fields, malformed input) keep their
//! structured item list so callers can build their own reporting; `items()`
//! exposes it uniformly, including through a caller-installed signal.
use std::fmt;

use serde::Serialize;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Boxed error produced by a user-installed signal.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    TypeMismatch,
    UnionMismatch,
    LengthMismatch,
    MissingField,
    MalformedInput,
}

/// One offending field (or collection element) of an aggregated failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorItem {
    pub kind: ItemKind,
    pub field: String,
    /// Declared descriptor of the field, in type-expression form.
    pub descriptor: String,
    /// Repr of the offending value.
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
}

impl fmt::Display for ErrorItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ItemKind::MissingField => write!(f, "{}: {} != `{}`", self.field, self.descriptor, self.value),
            ItemKind::MalformedInput => write!(f, "{}: {}", self.field, self.value),
            ItemKind::LengthMismatch => write!(
                f, "wrong length for {}: {} != `{}`", self.field, self.descriptor, self.value
            ),
            _ => {
                write!(f, "wrong type for {}: {} != `{}`", self.field, self.descriptor, self.value)?;
                if let Some(i) = self.index {
                    write!(f, " at index {i}")?;
                }
                Ok(())
            }
        }
    }
}

/// The structured payload of an aggregated failure. Signals receive this.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub type_name: String,
    pub message: String,
    pub items: Vec<ErrorItem>,
}

impl Failure {
    pub fn validation(type_name: &str, items: Vec<ErrorItem>) -> Self {
        let lines = items.iter().map(|i| i.to_string()).collect::<Vec<_>>();
        Self {
            message: format!("type error in '{type_name}':\n {}", lines.join("\n ")),
            type_name: type_name.to_string(),
            items,
        }
    }

    pub fn missing(type_name: &str, items: Vec<ErrorItem>) -> Self {
        let lines = items.iter().map(|i| i.to_string()).collect::<Vec<_>>();
        Self {
            message: format!(
                "missing content for '{type_name}', the following fields are not present:\n{}",
                lines.join("\n")
            ),
            type_name: type_name.to_string(),
            items,
        }
    }

    pub fn malformed(type_name: &str, payload: &[u8]) -> Self {
        let shown = String::from_utf8_lossy(payload).into_owned();
        Self {
            message: format!("invalid content -> {shown}"),
            type_name: type_name.to_string(),
            items: vec![ErrorItem {
                kind: ItemKind::MalformedInput,
                field: type_name.to_string(),
                descriptor: type_name.to_string(),
                value: shown,
                index: None,
            }],
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.message) }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Validation(Failure),

    #[error("{0}")]
    MissingFields(Failure),

    #[error("{failure}")]
    MalformedInput {
        failure: Failure,
        #[source]
        source: Option<serde_json::Error>,
    },

    /// A caller-installed signal replaced the default error.
    #[error("{source}")]
    Signaled {
        #[source]
        source: BoxError,
        items: Vec<ErrorItem>,
    },

    #[error("unknown type '{0}'")]
    UnknownType(String),

    #[error("'{type_name}' has no field named '{field}'")]
    UnknownField { type_name: String, field: String },

    #[error("'{type_name}' declares field '{field}' more than once")]
    DuplicateField { type_name: String, field: String },

    #[error("'{from}' references '{target}', which has no resolver and no declaration")]
    UnresolvedReference { from: String, target: String },

    #[error("value `{value}` is not JSON-safe: {reason}")]
    NotJsonSafe { value: String, reason: String },

    #[error("cannot decode `{value}` as {descriptor}: {reason}")]
    Decode { descriptor: String, value: String, reason: String },

    #[error("declaration error at {path}: {message}")]
    Declaration { path: String, message: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Structured items of an aggregated failure; empty for other kinds.
    pub fn items(&self) -> &[ErrorItem] {
        match self {
            Error::Validation(f) | Error::MissingFields(f) => &f.items,
            Error::MalformedInput { failure, .. } => &failure.items,
            Error::Signaled { items, .. } => items,
            _ => &[],
        }
    }

    pub fn failure(&self) -> Option<&Failure> {
        match self {
            Error::Validation(f) | Error::MissingFields(f) => Some(f),
            Error::MalformedInput { failure, .. } => Some(failure),
            _ => None,
        }
    }

    /// Route an aggregated failure through a signal, keeping its items.
    pub(crate) fn signaled(self, signal: Option<&crate::context::Signal>) -> Self {
        let Some(signal) = signal else { return self };
        match self.failure() {
            Some(failure) => Error::Signaled { source: signal(failure), items: failure.items.clone() },
            None => self,
        }
    }
}
