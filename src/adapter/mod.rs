//! Adapters - the backend-agnostic persistence contract.
//!
//! An [`Adapter`] stores and retrieves encoded model records. Every
//! successful `find`, `load`, `save` and `remove` returns a fresh [`Cas`]
//! token inside a [`Metadata`] envelope; a model is loaded exactly when its
//! envelope carries one.
//!
//! ## Concurrency
//!
//! The core never compares CAS tokens. An adapter that wants optimistic
//! concurrency rejection must check the token itself: the model handed to
//! `save` and `remove` still carries the envelope from its last backend
//! interaction (`model.metadata().cas`), and a stale token can be refused
//! with an error. [`InMemoryAdapter`] does not check and is last-writer-wins.

mod config;
mod in_memory;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::model::Model;
use crate::Record;

pub use config::AdapterConfig;
pub use in_memory::InMemoryAdapter;

/// Exact-match query: field name to expected value.
pub type Query = Record;

/// Backend-specific options passed through to `find` and `count` untouched.
pub type Hints = Record;

/// Opaque compare-and-swap token.
///
/// Unique per backend interaction; carries no ordering information.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cas(String);

impl Cas {
    pub fn generate() -> Self {
        Cas(Uuid::new_v4().to_string())
    }

    pub fn new(token: impl Into<String>) -> Self {
        Cas(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cas {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Backend bookkeeping attached to a model (`$`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cas: Option<Cas>,
    /// Anything else the backend reports alongside the token.
    #[serde(flatten)]
    pub extra: Record,
}

impl Metadata {
    pub fn with_cas(cas: Cas) -> Self {
        Self {
            cas: Some(cas),
            extra: Record::new(),
        }
    }

    /// An envelope carrying a newly generated token.
    pub fn fresh() -> Self {
        Self::with_cas(Cas::generate())
    }
}

/// A record returned by [`Adapter::load`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loaded {
    pub value: Record,
    #[serde(flatten)]
    pub meta: Metadata,
}

/// One entry of an [`Adapter::find`] result, keyed by its backend key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Found {
    pub key: String,
    pub value: Record,
    #[serde(flatten)]
    pub meta: Metadata,
}

/// Persistence primitive every backend implements.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Build the adapter from backend configuration.
    fn connect(config: &AdapterConfig) -> Result<Self>
    where
        Self: Sized;

    /// Records of `model_name` matching `query`, in backend order.
    async fn find(&self, model_name: &str, query: &Query, hints: &Hints) -> Result<Vec<Found>>;

    /// Number of records `find` would return.
    async fn count(&self, model_name: &str, query: &Query, hints: &Hints) -> Result<usize> {
        Ok(self.find(model_name, query, hints).await?.len())
    }

    /// The stored record for `model`. A missing record is an error, never an
    /// empty value.
    async fn load(&self, model: &Model) -> Result<Loaded>;

    /// Store `model.to_json()`, replacing any previous record.
    async fn save(&self, model: &Model) -> Result<Metadata>;

    /// Delete the record for `model`. Deleting a missing record succeeds.
    async fn remove(&self, model: &Model) -> Result<Metadata>;

    /// Drop every record.
    async fn flush(&self) -> Result<()>;
}
