use thiserror::Error;

use crate::term::Subject;

/// Boxed error produced by a graph store.
///
/// Every store has its own associated error type; the core erases it at the
/// boundary so a single error enum can describe failures from any store.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error type for resource operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid identifier {identifier:?}: not absolute and no base URI configured")]
    InvalidIdentifier { identifier: String },

    #[error("unknown type {tag:?} requested by {class}")]
    UnknownType { tag: String, class: String },

    #[error("type mismatch for {tag:?}: {message}")]
    TypeMismatch { tag: String, message: String },

    #[error("{class} has no property {property:?}")]
    UnknownProperty { class: String, property: String },

    #[error("unknown class {0:?}")]
    UnknownClass(String),

    #[error("schema error: {0}")]
    Schema(String),

    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error(transparent)]
    Store(#[from] StoreFailure),

    #[error(transparent)]
    Persist(#[from] PersistError),

    #[error(transparent)]
    Destroy(#[from] DestroyError),

    #[error("record {subject} not saved: {source}")]
    RecordNotSaved {
        subject: Subject,
        #[source]
        source: Box<PersistError>,
    },
}

/// A graph store rejected a read.
#[derive(Debug, Error)]
#[error("store {operation} failed: {source}")]
pub struct StoreFailure {
    pub operation: &'static str,
    #[source]
    pub source: BoxError,
}

impl StoreFailure {
    pub fn new(operation: &'static str, source: impl Into<BoxError>) -> Self {
        StoreFailure {
            operation,
            source: source.into(),
        }
    }
}

/// Failure while writing an instance back to the store.
///
/// Saves are applied property by property; when one of these is returned,
/// properties earlier in declaration order may already be committed.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("store failure writing {subject}{}: {source}", property_suffix(.property))]
    StoreFailure {
        subject: Subject,
        property: Option<String>,
        #[source]
        source: BoxError,
    },

    #[error("cannot serialize {property:?} of {subject}: {source}")]
    Serialize {
        subject: Subject,
        property: String,
        #[source]
        source: Box<Error>,
    },
}

impl PersistError {
    pub fn subject(&self) -> &Subject {
        match self {
            PersistError::StoreFailure { subject, .. } | PersistError::Serialize { subject, .. } => {
                subject
            }
        }
    }

    /// Name of the property being written when the failure happened, if any.
    pub fn property(&self) -> Option<&str> {
        match self {
            PersistError::StoreFailure { property, .. } => property.as_deref(),
            PersistError::Serialize { property, .. } => Some(property),
        }
    }
}

/// Failure while deleting an instance's triples.
#[derive(Debug, Error)]
pub enum DestroyError {
    #[error("store failure destroying {subject}: {source}")]
    StoreFailure {
        subject: Subject,
        #[source]
        source: BoxError,
    },
}

fn property_suffix(property: &Option<String>) -> String {
    match property {
        Some(name) => format!(" ({name})"),
        None => String::new(),
    }
}
