//! Datastore - binds one adapter to model-level operations.

use std::fmt;
use std::sync::Arc;

use futures::future::try_join_all;
use tracing::debug;

use crate::adapter::{Adapter, AdapterConfig, Found, Hints, Loaded, Query};
use crate::error::{Error, Result};
use crate::model::{Model, ModelDefinition, Value};

type Connect = fn(&AdapterConfig) -> Result<Arc<dyn Adapter>>;

fn connect<A: Adapter + 'static>(config: &AdapterConfig) -> Result<Arc<dyn Adapter>> {
    Ok(Arc::new(A::connect(config)?))
}

/// Assembles a [`Datastore`] from an adapter type and its configuration.
#[derive(Default)]
pub struct DatastoreBuilder {
    connect: Option<Connect>,
    config: AdapterConfig,
}

impl DatastoreBuilder {
    /// The adapter type to instantiate.
    pub fn adapter<A: Adapter + 'static>(mut self) -> Self {
        self.connect = Some(connect::<A>);
        self
    }

    pub fn config(mut self, config: AdapterConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<Datastore> {
        let connect = self
            .connect
            .ok_or_else(|| Error::Setup("missing Adapter reference for Datastore".into()))?;
        Ok(Datastore {
            adapter: connect(&self.config)?,
        })
    }
}

/// Translates model operations into adapter calls and rebuilds models from
/// what the adapter returns.
///
/// Clones share the same adapter instance.
#[derive(Clone)]
pub struct Datastore {
    adapter: Arc<dyn Adapter>,
}

impl fmt::Debug for Datastore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Datastore").finish_non_exhaustive()
    }
}

impl Datastore {
    pub fn builder() -> DatastoreBuilder {
        DatastoreBuilder::default()
    }

    /// Instantiate adapter `A` from `config`.
    pub fn new<A: Adapter + 'static>(config: AdapterConfig) -> Result<Self> {
        Self::builder().adapter::<A>().config(config).build()
    }

    /// Use an already constructed adapter.
    pub fn from_adapter<A: Adapter + 'static>(adapter: A) -> Self {
        Self {
            adapter: Arc::new(adapter),
        }
    }

    pub fn adapter(&self) -> &dyn Adapter {
        self.adapter.as_ref()
    }

    /// Models of type `D` matching `query`, in the order the adapter returns them.
    pub async fn find<D: ModelDefinition>(&self, query: &Query, hints: &Hints) -> Result<Vec<D>> {
        let schema = D::schema()?;
        let found = self.adapter.find(D::NAME, query, hints).await?;
        debug!(model = D::NAME, count = found.len(), "find");

        found
            .into_iter()
            .map(|Found { value, meta, .. }| {
                let mut model = Model::from_record(Arc::clone(&schema), &value)?;
                model.set_metadata(meta);
                model.bind(self.clone());
                Ok(D::from_model(model))
            })
            .collect()
    }

    /// The first model `find` would return.
    pub async fn find_one<D: ModelDefinition>(
        &self,
        query: &Query,
        hints: &Hints,
    ) -> Result<Option<D>> {
        Ok(self.find::<D>(query, hints).await?.into_iter().next())
    }

    pub async fn count<D: ModelDefinition>(&self, query: &Query, hints: &Hints) -> Result<usize> {
        let count = self.adapter.count(D::NAME, query, hints).await?;
        debug!(model = D::NAME, count, "count");
        Ok(count)
    }

    /// Load `model` unless it is already loaded, then load every sub-model
    /// named in `paths`.
    ///
    /// Path loads are not gated on the parent's state and run concurrently;
    /// the first failure fails the whole call.
    pub async fn load(&self, model: &mut Model, paths: &[&str]) -> Result<()> {
        if !model.loaded() {
            let Loaded { value, meta } = self.adapter.load(model).await?;
            model.merge(&value, meta)?;
            debug!(model = model.model_name(), id = ?model.id(), "loaded");
        }

        if paths.is_empty() {
            return Ok(());
        }

        for path in paths {
            if !matches!(model.get(path), Some(Value::Model(_))) {
                return Err(Error::Usage(format!(
                    "path '{}' of model '{}' does not hold a model",
                    path,
                    model.model_name()
                )));
            }
        }

        let adapter = &self.adapter;
        let loads = model
            .fields_mut()
            .filter(|field| paths.contains(&field.name()))
            .filter_map(|field| field.value_mut().and_then(Value::as_model_mut))
            .map(|sub| async move {
                let Loaded { value, meta } = adapter.load(sub).await?;
                sub.merge(&value, meta)
            });
        try_join_all(loads).await?;

        debug!(model = model.model_name(), paths = ?paths, "loaded paths");
        Ok(())
    }

    /// Persist `model` and replace its envelope with the adapter's.
    pub async fn save(&self, model: &mut Model) -> Result<()> {
        let meta = self.adapter.save(model).await?;
        model.set_metadata(meta);
        debug!(model = model.model_name(), id = ?model.id(), "saved");
        Ok(())
    }

    /// Delete `model`'s record and replace its envelope with the adapter's.
    pub async fn remove(&self, model: &mut Model) -> Result<()> {
        let meta = self.adapter.remove(model).await?;
        model.set_metadata(meta);
        debug!(model = model.model_name(), id = ?model.id(), "removed");
        Ok(())
    }

    /// Drop every record in the backend. Meant for tests and resets.
    pub async fn flush(&self) -> Result<()> {
        self.adapter.flush().await?;
        debug!("flushed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::InMemoryAdapter;

    #[test]
    fn builder_without_adapter_fails() {
        let err = Datastore::builder().build().unwrap_err();
        assert!(matches!(err, Error::Setup(_)));
    }

    #[test]
    fn builder_connects_adapter() {
        let store = Datastore::new::<InMemoryAdapter>(AdapterConfig::default());
        assert!(store.is_ok());
    }
}
