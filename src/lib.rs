//! Schema-bound models persisted through swappable storage adapters.
//!
//! Application code declares typed [`Model`]s via [`ModelDefinition`], a
//! [`Datastore`] binds one [`Adapter`], and every backend interaction tags the
//! model with an opaque [`Cas`] token that marks it as loaded.
//!
//! [`InMemoryAdapter`] is the reference backend: its behavior is what every
//! adapter must replicate.

mod adapter;
mod datastore;
mod error;
mod model;

pub use adapter::{Adapter, AdapterConfig, Cas, Found, Hints, InMemoryAdapter, Loaded, Metadata, Query};
pub use datastore::{Datastore, DatastoreBuilder};
pub use error::{Error, Result};
pub use model::{
    DefaultFn, Field, FieldDefinition, FieldType, Model, ModelDefinition, Options, Schema,
    SchemaDefinition, SchemaRef, Value, ID_FIELD, META_KEY, TYPE_KEY,
};

// Re-exported for adapter implementations outside this crate.
pub use async_trait::async_trait;

/// A model encoded for storage: a plain JSON object.
pub type Record = serde_json::Map<String, serde_json::Value>;
