//! Storage-neutral encoding of models.
//!
//! A model encodes to a plain JSON object:
//!
//! ```text
//! { "meta": { ...schema meta, "type": <model name> }, <field>: <encoded value>, ... }
//! ```
//!
//! Decoding is driven by the schema's declared field types, so a record
//! written by `to_json` reads back into an equivalent model.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};
use serde_json::Value as Json;
use tracing::trace;

use super::schema::{FieldType, Schema, META_KEY};
use super::{Model, Value};
use crate::adapter::Metadata;
use crate::error::{Error, Result};
use crate::Record;

/// Key inside `meta` naming the model type.
pub const TYPE_KEY: &str = "type";

pub(crate) fn encode(value: &Value) -> Json {
    match value {
        Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Number(n) => Json::Number(n.clone()),
        Value::String(s) => Json::String(s.clone()),
        Value::Date(d) => Json::String(d.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
        Value::Bytes(b) => Json::String(STANDARD.encode(b)),
        Value::Array(items) => Json::Array(items.iter().map(encode).collect()),
        Value::Mixed(v) => v.clone(),
        Value::Model(m) => Json::Object(m.to_json()),
    }
}

pub(crate) fn decode(model: &str, field: &str, kind: &FieldType, raw: &Json) -> Result<Value> {
    let mismatch = || {
        Error::decode(
            model,
            field,
            format!("expected {}, found {}", kind.name(), json_kind(raw)),
        )
    };

    if raw.is_null() {
        return Ok(Value::Null);
    }

    match kind {
        FieldType::Mixed => Ok(Value::Mixed(raw.clone())),
        FieldType::String => raw
            .as_str()
            .map(|s| Value::String(s.to_string()))
            .ok_or_else(mismatch),
        FieldType::Number => match raw {
            Json::Number(n) => Ok(Value::Number(n.clone())),
            _ => Err(mismatch()),
        },
        FieldType::Boolean => raw.as_bool().map(Value::Bool).ok_or_else(mismatch),
        FieldType::Date => {
            let text = raw.as_str().ok_or_else(mismatch)?;
            DateTime::parse_from_rfc3339(text)
                .map(|d| Value::Date(d.with_timezone(&Utc)))
                .map_err(|e| Error::decode(model, field, e.to_string()))
        }
        FieldType::Bytes => {
            let text = raw.as_str().ok_or_else(mismatch)?;
            STANDARD
                .decode(text)
                .map(Value::Bytes)
                .map_err(|e| Error::decode(model, field, e.to_string()))
        }
        FieldType::Array(inner) => match raw {
            Json::Array(items) => items
                .iter()
                .map(|item| decode(model, field, inner, item))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            _ => Err(mismatch()),
        },
        FieldType::ModelRef(target) => {
            let schema = target()?;
            match raw {
                Json::Object(record) => Ok(Value::from(Model::from_record(schema, record)?)),
                // A bare id is a reference to a record stored elsewhere.
                Json::String(id) => Ok(Value::from(Model::new(
                    schema,
                    [(super::schema::ID_FIELD, Value::from(id.as_str()))],
                    None,
                )?)),
                _ => Err(mismatch()),
            }
        }
    }
}

fn json_kind(raw: &Json) -> &'static str {
    match raw {
        Json::Null => "null",
        Json::Bool(_) => "boolean",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}

fn decode_fields(schema: &Schema, record: &Record) -> Result<Vec<(String, Value)>> {
    let mut decoded = Vec::with_capacity(record.len());
    for (key, raw) in record {
        if key == META_KEY {
            continue;
        }
        match schema.field(key) {
            Some(definition) => {
                decoded.push((key.clone(), decode(schema.name(), key, definition.kind(), raw)?))
            }
            None => trace!(model = schema.name(), key = %key, "ignoring undeclared record key"),
        }
    }
    Ok(decoded)
}

impl Model {
    /// Encode into the record shape adapters store.
    ///
    /// Unset fields are omitted. Nested models are embedded by value.
    pub fn to_json(&self) -> Record {
        let mut meta = self.schema().meta().clone();
        meta.insert(
            TYPE_KEY.to_string(),
            Json::String(self.model_name().to_string()),
        );

        let mut record = Record::new();
        record.insert(META_KEY.to_string(), Json::Object(meta));
        for field in self.fields() {
            if let Some(value) = field.value() {
                record.insert(field.name().to_string(), encode(value));
            }
        }
        record
    }

    /// Rebuild an unloaded model from a stored record. Fields absent from the
    /// record take their defaults.
    pub fn from_record(schema: Arc<Schema>, record: &Record) -> Result<Model> {
        let decoded = decode_fields(&schema, record)?;
        Model::new(schema, decoded, None)
    }

    /// Overlay the fields present in `record` and replace the metadata
    /// envelope. Nothing changes when any field fails to decode.
    pub(crate) fn merge(&mut self, record: &Record, meta: Metadata) -> Result<()> {
        let decoded = decode_fields(self.schema(), record)?;
        for (name, value) in decoded {
            if let Some(field) = self.field_mut(&name) {
                field.set(value);
            }
        }
        self.set_metadata(meta);
        Ok(())
    }
}

impl Serialize for Model {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}
