//! Schema - per-type field declarations and their normalized form.
//!
//! A model type declares a [`SchemaDefinition`]. Before any instance is built
//! the definition is normalized exactly once into an immutable [`Schema`]
//! shared by every instance of that type: the `id` field is guaranteed to
//! exist and to carry a default producer.

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use uuid::Uuid;

use super::{ModelDefinition, Value};
use crate::error::{Error, Result};
use crate::Record;

/// Name of the identity field every schema carries.
pub const ID_FIELD: &str = "id";

/// Key of the envelope object in an encoded record.
pub const META_KEY: &str = "meta";

/// Produces a field's value when none was supplied.
pub type DefaultFn = Arc<dyn Fn() -> Value + Send + Sync>;

/// Resolves the normalized schema of a referenced model type.
///
/// Resolution is lazy so that schemas may reference themselves or each other.
pub type SchemaRef = fn() -> Result<Arc<Schema>>;

/// Declared type of a field.
#[derive(Clone)]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Date,
    Bytes,
    /// Opaque value, serialized by delegation and never traversed.
    Mixed,
    /// Embedded or referenced sub-model, serialized recursively.
    ModelRef(SchemaRef),
    Array(Box<FieldType>),
}

impl FieldType {
    /// A reference to model type `D`.
    pub fn model_ref<D: ModelDefinition>() -> Self {
        FieldType::ModelRef(D::schema)
    }

    pub fn array_of(inner: FieldType) -> Self {
        FieldType::Array(Box::new(inner))
    }

    /// Whether `value` may be stored in a field of this type. `Null` always fits.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (FieldType::Mixed, _) => true,
            (FieldType::String, Value::String(_)) => true,
            (FieldType::Number, Value::Number(_)) => true,
            (FieldType::Boolean, Value::Bool(_)) => true,
            (FieldType::Date, Value::Date(_)) => true,
            (FieldType::Bytes, Value::Bytes(_)) => true,
            (FieldType::ModelRef(target), Value::Model(model)) => target()
                .map(|schema| schema.name() == model.model_name())
                .unwrap_or(false),
            (FieldType::Array(inner), Value::Array(items)) => {
                items.iter().all(|item| inner.accepts(item))
            }
            _ => false,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Date => "date",
            FieldType::Bytes => "bytes",
            FieldType::Mixed => "mixed",
            FieldType::ModelRef(_) => "model",
            FieldType::Array(_) => "array",
        }
    }
}

impl fmt::Debug for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::ModelRef(target) => match target() {
                Ok(schema) => write!(f, "ModelRef({})", schema.name()),
                Err(_) => f.write_str("ModelRef(<invalid>)"),
            },
            FieldType::Array(inner) => write!(f, "Array({:?})", inner),
            other => f.write_str(other.name()),
        }
    }
}

/// Declaration of one field: type, default producer, required flag.
#[derive(Clone)]
pub struct FieldDefinition {
    kind: FieldType,
    default: Option<DefaultFn>,
    required: bool,
}

impl FieldDefinition {
    pub fn new(kind: FieldType) -> Self {
        Self {
            kind,
            default: None,
            required: false,
        }
    }

    /// Produce the default by calling `producer` each time a value is missing.
    pub fn default_with<F>(mut self, producer: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.default = Some(Arc::new(producer));
        self
    }

    /// Use a clone of `value` as the default.
    pub fn default_value(self, value: impl Into<Value>) -> Self {
        let value = value.into();
        self.default_with(move || value.clone())
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn kind(&self) -> &FieldType {
        &self.kind
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    pub(crate) fn produce_default(&self) -> Option<Value> {
        self.default.as_ref().map(|producer| producer())
    }
}

impl fmt::Debug for FieldDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDefinition")
            .field("kind", &self.kind)
            .field("default", &self.default.as_ref().map(|_| "<fn>"))
            .field("required", &self.required)
            .finish()
    }
}

/// A model type's schema as declared, before normalization.
#[derive(Debug, Clone, Default)]
pub struct SchemaDefinition {
    meta: Record,
    fields: Vec<(String, FieldDefinition)>,
}

impl SchemaDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, definition: FieldDefinition) -> Self {
        self.fields.push((name.into(), definition));
        self
    }

    /// Schema-level metadata, copied into the `meta` object of every encoded record.
    pub fn meta(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }
}

/// A normalized, immutable schema shared by all instances of one model type.
#[derive(Debug)]
pub struct Schema {
    name: String,
    meta: Record,
    fields: Vec<(String, FieldDefinition)>,
}

impl Schema {
    /// Normalize `definition` for the model type called `name`.
    pub fn normalize(name: impl Into<String>, definition: SchemaDefinition) -> Result<Self> {
        let name = name.into();
        let SchemaDefinition { meta, mut fields } = definition;

        for (i, (field, _)) in fields.iter().enumerate() {
            if field == META_KEY {
                return Err(Error::definition(
                    &name,
                    format!("field name '{}' is reserved", META_KEY),
                ));
            }
            if fields[..i].iter().any(|(other, _)| other == field) {
                return Err(Error::definition(
                    &name,
                    format!("field '{}' is declared twice", field),
                ));
            }
        }

        match fields.iter().find(|(field, _)| field == ID_FIELD) {
            Some((_, id)) => {
                if !matches!(id.kind(), FieldType::String) {
                    return Err(Error::definition(
                        &name,
                        format!("field '{}' must be a string, not {}", ID_FIELD, id.kind().name()),
                    ));
                }
                if !id.has_default() {
                    return Err(Error::definition(
                        &name,
                        format!("missing a default function for Field '{}'", ID_FIELD),
                    ));
                }
            }
            None => fields.insert(
                0,
                (
                    ID_FIELD.to_string(),
                    FieldDefinition::new(FieldType::String)
                        .default_with(|| Value::String(Uuid::new_v4().to_string()))
                        .required(),
                ),
            ),
        }

        Ok(Self { name, meta, fields })
    }

    /// The model name records of this type are stored under.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn meta(&self) -> &Record {
        &self.meta
    }

    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, definition)| definition)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// Fields in declaration order, `id` first when it was injected.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldDefinition)> {
        self.fields
            .iter()
            .map(|(name, definition)| (name.as_str(), definition))
    }
}

type Registry = RwLock<HashMap<TypeId, Arc<Schema>>>;

fn registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(|| RwLock::new(HashMap::new()))
}

/// The normalized schema of model type `D`, normalized on first use.
///
/// Failed normalizations are not cached; every call reports the error again.
pub(crate) fn normalized<D: ModelDefinition>() -> Result<Arc<Schema>> {
    let type_id = TypeId::of::<D>();
    if let Some(schema) = registry()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&type_id)
    {
        return Ok(Arc::clone(schema));
    }

    // Normalize outside the lock; a racing thread may do the same work and
    // the first insert wins.
    let schema = Arc::new(Schema::normalize(D::NAME, D::define())?);
    let mut schemas = registry().write().unwrap_or_else(PoisonError::into_inner);
    Ok(Arc::clone(schemas.entry(type_id).or_insert(schema)))
}
