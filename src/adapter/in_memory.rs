//! InMemoryAdapter - HashMap-backed reference adapter for testing and development.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde_json::{Number, Value as Json};
use tracing::debug;

use super::{Adapter, AdapterConfig, Found, Hints, Loaded, Metadata, Query};
use crate::error::{Error, Result};
use crate::model::{Model, META_KEY, TYPE_KEY};
use crate::Record;

const DEFAULT_KEY_SEPARATOR: &str = "|";

/// In-memory adapter backed by a HashMap of encoded records.
///
/// Storage key is `"Model|id"`. Clone-friendly via Arc: clones share one table.
/// Writes are last-writer-wins; CAS tokens are issued but never checked.
#[derive(Clone)]
pub struct InMemoryAdapter {
    db: Arc<RwLock<HashMap<String, Record>>>,
    key_separator: String,
}

impl Default for InMemoryAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryAdapter {
    /// Create a new empty adapter.
    pub fn new() -> Self {
        Self {
            db: Arc::new(RwLock::new(HashMap::new())),
            key_separator: DEFAULT_KEY_SEPARATOR.to_string(),
        }
    }

    pub fn with_key_separator(mut self, separator: impl Into<String>) -> Self {
        self.key_separator = separator.into();
        self
    }

    pub fn key(&self, model_name: &str, id: &str) -> String {
        format!("{}{}{}", model_name, self.key_separator, id)
    }

    fn model_key(&self, model: &Model) -> Result<String> {
        let id = model.id().ok_or_else(|| {
            Error::Usage(format!(
                "model '{}' has no id to key its record",
                model.model_name()
            ))
        })?;
        Ok(self.key(model.model_name(), id))
    }

    /// Number of stored records across all model types.
    pub fn len(&self) -> Result<usize> {
        let db = self
            .db
            .read()
            .map_err(|_| Error::LockPoisoned("len"))?;
        Ok(db.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// The raw stored record under `key`, if any.
    pub fn record(&self, key: &str) -> Result<Option<Record>> {
        let db = self
            .db
            .read()
            .map_err(|_| Error::LockPoisoned("record"))?;
        Ok(db.get(key).cloned())
    }
}

fn stored_type(record: &Record) -> Option<&str> {
    record
        .get(META_KEY)
        .and_then(|meta| meta.get(TYPE_KEY))
        .and_then(Json::as_str)
}

/// Strict scalar equality. Numbers compare by value; arrays and objects
/// never match.
fn scalar_eq(stored: Option<&Json>, expected: &Json) -> bool {
    match (stored, expected) {
        (_, Json::Array(_) | Json::Object(_)) => false,
        (Some(Json::Number(a)), Json::Number(b)) => number_eq(a, b),
        (Some(stored), expected) => stored == expected,
        (None, _) => false,
    }
}

/// Integers compare exactly; `f64` only when either side is a float.
fn number_eq(a: &Number, b: &Number) -> bool {
    if let (Some(a), Some(b)) = (a.as_i64(), b.as_i64()) {
        return a == b;
    }
    if let (Some(a), Some(b)) = (a.as_u64(), b.as_u64()) {
        return a == b;
    }
    if !a.is_f64() && !b.is_f64() {
        // one side negative, the other above i64::MAX
        return false;
    }
    match (a.as_f64(), b.as_f64()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

fn matches(record: &Record, query: &Query) -> bool {
    query
        .iter()
        .all(|(key, expected)| scalar_eq(record.get(key), expected))
}

#[async_trait]
impl Adapter for InMemoryAdapter {
    fn connect(config: &AdapterConfig) -> Result<Self> {
        let adapter = Self::new();
        Ok(match &config.key_separator {
            Some(separator) => adapter.with_key_separator(separator.clone()),
            None => adapter,
        })
    }

    async fn find(&self, model_name: &str, query: &Query, _hints: &Hints) -> Result<Vec<Found>> {
        let db = self
            .db
            .read()
            .map_err(|_| Error::LockPoisoned("find"))?;

        let found: Vec<Found> = db
            .iter()
            .filter(|(_, record)| stored_type(record) == Some(model_name))
            .filter(|(_, record)| matches(record, query))
            .map(|(key, record)| Found {
                key: key.clone(),
                value: record.clone(),
                meta: Metadata::fresh(),
            })
            .collect();

        debug!(model = model_name, count = found.len(), "found records");
        Ok(found)
    }

    async fn load(&self, model: &Model) -> Result<Loaded> {
        let key = self.model_key(model)?;
        let db = self
            .db
            .read()
            .map_err(|_| Error::LockPoisoned("load"))?;

        let value = db.get(&key).cloned().ok_or(Error::NotFound { key })?;
        Ok(Loaded {
            value,
            meta: Metadata::fresh(),
        })
    }

    async fn save(&self, model: &Model) -> Result<Metadata> {
        let key = self.model_key(model)?;
        let record = model.to_json();

        let mut db = self
            .db
            .write()
            .map_err(|_| Error::LockPoisoned("save"))?;
        db.insert(key, record);

        Ok(Metadata::fresh())
    }

    async fn remove(&self, model: &Model) -> Result<Metadata> {
        let key = self.model_key(model)?;
        let mut db = self
            .db
            .write()
            .map_err(|_| Error::LockPoisoned("remove"))?;
        db.remove(&key);

        Ok(Metadata::fresh())
    }

    async fn flush(&self) -> Result<()> {
        let mut db = self
            .db
            .write()
            .map_err(|_| Error::LockPoisoned("flush"))?;
        db.clear();
        Ok(())
    }
}
