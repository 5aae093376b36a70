//! Models - schema-bound records persisted through a [`Datastore`].
//!
//! A [`Model`] is the type-erased record: a normalized schema, one [`Field`]
//! per declared name, and the metadata envelope the backend attaches. Typed
//! wrappers implement [`ModelDefinition`] to declare their schema once and
//! get the static surface (`get_by_id`, `find`, `reference`, ...).
//!
//! ## Example
//!
//! ```ignore
//! use datamapper::{
//!     impl_model, Error, FieldDefinition, FieldType, Model, ModelDefinition, Options,
//!     SchemaDefinition,
//! };
//!
//! pub struct User {
//!     model: Model,
//! }
//!
//! impl User {
//!     fn definition() -> SchemaDefinition {
//!         SchemaDefinition::new().field(
//!             "name",
//!             FieldDefinition::new(FieldType::String).default_value("anon"),
//!         )
//!     }
//! }
//!
//! impl_model!(User, model, "User", definition);
//!
//! let mut user = User::with_data([("name", "ada")], Options::new().repository(store.clone()))?;
//! user.save(Options::default()).await?;
//! let id = user.id().ok_or_else(|| Error::Usage("user has no id".into()))?;
//! let loaded = User::get_by_id(id, Options::new().repository(store)).await?;
//! ```

mod codec;
mod field;
mod schema;
mod value;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::trace;

use crate::adapter::{Hints, Metadata, Query};
use crate::datastore::Datastore;
use crate::error::{Error, Result};

pub use codec::TYPE_KEY;
pub use field::Field;
pub use schema::{
    DefaultFn, FieldDefinition, FieldType, Schema, SchemaDefinition, SchemaRef, ID_FIELD, META_KEY,
};
pub use value::Value;

/// Per-call options for model operations.
#[derive(Debug, Clone, Default)]
pub struct Options {
    repository: Option<Datastore>,
    hints: Hints,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `repository` for this call; it wins over the one bound to the model.
    pub fn repository(mut self, repository: Datastore) -> Self {
        self.repository = Some(repository);
        self
    }

    /// Backend-specific hint, passed through to the adapter's `find`/`count`.
    pub fn hint(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.hints.insert(key.into(), value.into());
        self
    }

    pub fn hints(&self) -> &Hints {
        &self.hints
    }
}

/// A schema-bound record and its backend bookkeeping.
#[derive(Clone)]
pub struct Model {
    schema: Arc<Schema>,
    fields: Vec<Field>,
    meta: Metadata,
    repository: Option<Datastore>,
}

impl Model {
    /// Build an unloaded model of `schema` from `data`.
    ///
    /// Declared fields missing from `data` take their defaults; undeclared
    /// keys are ignored. A value that does not fit its field's type is a usage
    /// error.
    pub fn new<I, K, V>(schema: Arc<Schema>, data: I, repository: Option<Datastore>) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let mut supplied: Vec<(String, Value)> = Vec::new();
        for (key, value) in data {
            let key = key.into();
            let value = value.into();
            match schema.field(&key) {
                Some(definition) => {
                    check_type(&schema, &key, definition.kind(), &value)?;
                    supplied.retain(|(seen, _)| seen != &key);
                    supplied.push((key, value));
                }
                None => trace!(model = schema.name(), key = %key, "ignoring undeclared key"),
            }
        }

        let fields = schema
            .fields()
            .map(|(name, definition)| {
                let value = supplied
                    .iter()
                    .position(|(key, _)| key == name)
                    .map(|i| supplied.swap_remove(i).1);
                Field::new(name, definition, value)
            })
            .collect();

        Ok(Self {
            schema,
            fields,
            meta: Metadata::default(),
            repository,
        })
    }

    pub fn model_name(&self) -> &str {
        self.schema.name()
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn id(&self) -> Option<&str> {
        self.get(ID_FIELD).and_then(Value::as_str)
    }

    /// The value of a declared field, or `None` when unset or undeclared.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.field(name).and_then(Field::value)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.field_mut(name).and_then(Field::value_mut)
    }

    /// Assign a declared field. Undeclared names and ill-typed values are
    /// usage errors and leave the model unchanged.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        let definition = self.schema.field(name).ok_or_else(|| {
            Error::Usage(format!(
                "'{}' is not a field of model '{}'",
                name,
                self.schema.name()
            ))
        })?;
        check_type(&self.schema, name, definition.kind(), &value)?;
        if let Some(field) = self.field_mut(name) {
            field.set(value);
        }
        Ok(())
    }

    /// Clear a field's value, returning the old one.
    pub fn unset(&mut self, name: &str) -> Option<Value> {
        self.field_mut(name).and_then(Field::take)
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name() == name)
    }

    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter()
    }

    pub(crate) fn field_mut(&mut self, name: &str) -> Option<&mut Field> {
        self.fields.iter_mut().find(|field| field.name() == name)
    }

    pub(crate) fn fields_mut(&mut self) -> impl Iterator<Item = &mut Field> {
        self.fields.iter_mut()
    }

    /// Names of required fields that hold no value.
    pub fn missing_required(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|field| field.is_empty())
            .filter(|field| {
                self.schema
                    .field(field.name())
                    .is_some_and(FieldDefinition::is_required)
            })
            .map(Field::name)
            .collect()
    }

    /// The metadata envelope from the last backend interaction.
    pub fn metadata(&self) -> &Metadata {
        &self.meta
    }

    pub(crate) fn set_metadata(&mut self, meta: Metadata) {
        self.meta = meta;
    }

    /// Whether this instance has been synchronized with the backend.
    pub fn loaded(&self) -> bool {
        self.meta.cas.is_some()
    }

    pub fn repository(&self) -> Option<&Datastore> {
        self.repository.as_ref()
    }

    pub fn bind(&mut self, repository: Datastore) {
        self.repository = Some(repository);
    }

    fn resolve(&self, options: &Options, operation: &'static str) -> Result<Datastore> {
        options
            .repository
            .as_ref()
            .or(self.repository.as_ref())
            .cloned()
            .ok_or_else(|| Error::MissingRepository {
                model: self.model_name().to_string(),
                operation,
            })
    }

    /// Persist the current field values and refresh the envelope.
    pub async fn save(&mut self, options: Options) -> Result<()> {
        let repository = self.resolve(&options, "save")?;
        repository.save(self).await
    }

    /// Fetch this model's record unless it is already loaded.
    pub async fn load(&mut self, options: Options) -> Result<()> {
        self.load_paths(&[], options).await
    }

    /// Like [`Model::load`], then load every sub-model named in `paths`.
    pub async fn load_paths(&mut self, paths: &[&str], options: Options) -> Result<()> {
        let repository = self.resolve(&options, "load")?;
        repository.load(self, paths).await
    }

    /// Delete the backing record. The instance is unloaded afterwards.
    pub async fn remove(&mut self, options: Options) -> Result<()> {
        let repository = self.resolve(&options, "remove")?;
        repository.remove(self).await?;
        self.meta.cas = None;
        Ok(())
    }
}

fn check_type(schema: &Schema, name: &str, kind: &FieldType, value: &Value) -> Result<()> {
    if kind.accepts(value) {
        return Ok(());
    }
    Err(Error::Usage(format!(
        "field '{}' of model '{}' expects {}, got {}",
        name,
        schema.name(),
        kind.name(),
        value.kind()
    )))
}

/// Equal when both are the same model type with equal field values.
/// Metadata and repository bindings are not compared.
impl PartialEq for Model {
    fn eq(&self, other: &Self) -> bool {
        self.model_name() == other.model_name()
            && self.fields.len() == other.fields.len()
            && self
                .fields
                .iter()
                .all(|field| other.get(field.name()) == field.value())
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct(self.model_name());
        for field in &self.fields {
            out.field(field.name(), &field.value());
        }
        out.field("$", &self.meta).finish()
    }
}

/// A typed model: declares its schema and wraps a [`Model`].
///
/// Implement the four required methods by hand or with [`impl_model!`].
#[async_trait]
pub trait ModelDefinition: Sized + Send + Sync + 'static {
    /// Model name records of this type are stored under.
    const NAME: &'static str;

    /// The declared schema. Called once; the normalized result is cached.
    fn define() -> SchemaDefinition;

    fn from_model(model: Model) -> Self;
    fn model(&self) -> &Model;
    fn model_mut(&mut self) -> &mut Model;
    fn into_model(self) -> Model;

    /// Repository used when neither the call options nor the instance carry one.
    fn default_repository() -> Option<Datastore> {
        None
    }

    /// The normalized schema shared by every instance of this type.
    fn schema() -> Result<Arc<Schema>> {
        schema::normalized::<Self>()
    }

    /// Schema self-check: build a zero-argument instance.
    fn validate() -> Result<bool> {
        Self::with_data(Vec::<(String, Value)>::new(), Options::default()).map(|_| true)
    }

    /// Build an unloaded instance from `data`.
    fn with_data<I, K, V>(data: I, options: Options) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let repository = options.repository.or_else(Self::default_repository);
        Model::new(Self::schema()?, data, repository).map(Self::from_model)
    }

    /// An unloaded instance holding only `id`.
    fn reference(id: &str, options: Options) -> Result<Self> {
        Self::with_data([(ID_FIELD, id)], options)
    }

    /// Load the record with `id`.
    async fn get_by_id(id: &str, options: Options) -> Result<Self> {
        let repository = resolve_static::<Self>(&options, "getById")?;
        let mut instance = Self::reference(id, options)?;
        repository.load(instance.model_mut(), &[]).await?;
        Ok(instance)
    }

    async fn find(query: Query, options: Options) -> Result<Vec<Self>> {
        let repository = resolve_static::<Self>(&options, "find")?;
        repository.find::<Self>(&query, options.hints()).await
    }

    async fn find_one(query: Query, options: Options) -> Result<Option<Self>> {
        let repository = resolve_static::<Self>(&options, "findOne")?;
        repository.find_one::<Self>(&query, options.hints()).await
    }

    async fn count(query: Query, options: Options) -> Result<usize> {
        let repository = resolve_static::<Self>(&options, "count")?;
        repository.count::<Self>(&query, options.hints()).await
    }

    fn id(&self) -> Option<&str> {
        self.model().id()
    }

    fn loaded(&self) -> bool {
        self.model().loaded()
    }

    fn to_json(&self) -> crate::Record {
        self.model().to_json()
    }

    async fn save(&mut self, options: Options) -> Result<()> {
        self.model_mut().save(options).await
    }

    async fn load(&mut self, options: Options) -> Result<()> {
        self.model_mut().load(options).await
    }

    async fn remove(&mut self, options: Options) -> Result<()> {
        self.model_mut().remove(options).await
    }
}

fn resolve_static<D: ModelDefinition>(
    options: &Options,
    operation: &'static str,
) -> Result<Datastore> {
    options
        .repository
        .clone()
        .or_else(D::default_repository)
        .ok_or_else(|| Error::MissingRepository {
            model: D::NAME.to_string(),
            operation,
        })
}

/// Implement [`ModelDefinition`] for a struct wrapping a single [`Model`].
///
/// ```ignore
/// impl_model!(User, model, "User", definition);
/// ```
#[macro_export]
macro_rules! impl_model {
    ($ty:ident, $field:ident, $name:expr, $define:ident) => {
        impl $crate::ModelDefinition for $ty {
            const NAME: &'static str = $name;

            fn define() -> $crate::SchemaDefinition {
                Self::$define()
            }

            fn from_model(model: $crate::Model) -> Self {
                $ty { $field: model }
            }

            fn model(&self) -> &$crate::Model {
                &self.$field
            }

            fn model_mut(&mut self) -> &mut $crate::Model {
                &mut self.$field
            }

            fn into_model(self) -> $crate::Model {
                self.$field
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::Cas;

    struct Account {
        model: Model,
    }

    impl Account {
        fn definition() -> SchemaDefinition {
            SchemaDefinition::new()
                .field(
                    "owner",
                    FieldDefinition::new(FieldType::String).default_value("anon"),
                )
                .field("balance", FieldDefinition::new(FieldType::Number).required())
        }
    }

    impl_model!(Account, model, "Account", definition);

    struct Broken {
        model: Model,
    }

    impl Broken {
        fn definition() -> SchemaDefinition {
            SchemaDefinition::new().field(ID_FIELD, FieldDefinition::new(FieldType::String))
        }
    }

    impl_model!(Broken, model, "Broken", definition);

    #[test]
    fn construction_fills_defaults_and_id() {
        let account = Account::with_data(Vec::<(&str, Value)>::new(), Options::default()).unwrap();
        let model = account.model();
        assert_eq!(model.get("owner").and_then(Value::as_str), Some("anon"));
        assert!(model.id().is_some_and(|id| !id.is_empty()));
        assert!(!model.loaded());
    }

    #[test]
    fn validate_reports_definition_errors() {
        assert!(Account::validate().unwrap());
        assert!(matches!(Broken::validate(), Err(Error::Definition { .. })));
    }

    #[test]
    fn schema_is_normalized_once() {
        let a = Account::schema().unwrap();
        let b = Account::schema().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn set_routes_to_field_value() {
        let mut account = Account::reference("acc-1", Options::default()).unwrap();
        account.model_mut().set("balance", 10).unwrap();
        assert_eq!(account.model().get("balance").and_then(Value::as_i64), Some(10));
        assert_eq!(account.id(), Some("acc-1"));
    }

    #[test]
    fn set_rejects_unknown_and_ill_typed() {
        let mut account = Account::reference("acc-2", Options::default()).unwrap();
        assert!(matches!(account.model_mut().set("nope", 1), Err(Error::Usage(_))));
        assert!(matches!(account.model_mut().set("balance", "ten"), Err(Error::Usage(_))));
        assert!(account.model().get("balance").is_none());
    }

    #[test]
    fn missing_required_lists_empty_fields() {
        let mut account = Account::reference("acc-3", Options::default()).unwrap();
        assert_eq!(account.model().missing_required(), vec!["balance"]);
        account.model_mut().set("balance", Value::Null).unwrap();
        assert_eq!(account.model().missing_required(), vec!["balance"]);
        account.model_mut().set("balance", 1).unwrap();
        assert!(account.model().missing_required().is_empty());
    }

    #[test]
    fn loaded_follows_cas() {
        let mut account = Account::reference("acc-4", Options::default()).unwrap();
        account.model_mut().set_metadata(Metadata::with_cas(Cas::generate()));
        assert!(account.loaded());
    }

    #[tokio::test]
    async fn operations_without_repository_fail() {
        let mut account = Account::reference("acc-5", Options::default()).unwrap();

        let err = account.save(Options::default()).await.unwrap_err();
        assert_eq!(
            err,
            Error::MissingRepository {
                model: "Account".into(),
                operation: "save"
            }
        );
        assert!(matches!(
            account.load(Options::default()).await,
            Err(Error::MissingRepository { .. })
        ));
        assert!(matches!(
            Account::get_by_id("acc-5", Options::default()).await,
            Err(Error::MissingRepository { operation: "getById", .. })
        ));
        assert!(matches!(
            Account::find(Query::new(), Options::default()).await,
            Err(Error::MissingRepository { operation: "find", .. })
        ));
    }
}
