//! An adapter that counts backend calls and can be told to fail.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use datamapper::{
    async_trait, Adapter, AdapterConfig, Error, Found, Hints, InMemoryAdapter, Loaded, Metadata,
    Model, Query, Result,
};

#[derive(Clone, Default)]
pub struct CountingAdapter {
    inner: InMemoryAdapter,
    loads: Arc<AtomicUsize>,
    saves: Arc<AtomicUsize>,
    fail_saves: Arc<AtomicBool>,
    fail_loads_of: Arc<Mutex<Option<String>>>,
}

impl CountingAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inner(&self) -> &InMemoryAdapter {
        &self.inner
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Make every load of `model_name` records fail.
    pub fn fail_loads_of(&self, model_name: &str) {
        *self.fail_loads_of.lock().unwrap() = Some(model_name.to_string());
    }
}

#[async_trait]
impl Adapter for CountingAdapter {
    fn connect(config: &AdapterConfig) -> Result<Self> {
        Ok(Self {
            inner: InMemoryAdapter::connect(config)?,
            ..Self::default()
        })
    }

    async fn find(&self, model_name: &str, query: &Query, hints: &Hints) -> Result<Vec<Found>> {
        self.inner.find(model_name, query, hints).await
    }

    async fn load(&self, model: &Model) -> Result<Loaded> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let failing = self.fail_loads_of.lock().unwrap().clone();
        if failing.as_deref() == Some(model.model_name()) {
            return Err(Error::Backend(format!("{} unavailable", model.model_name())));
        }
        self.inner.load(model).await
    }

    async fn save(&self, model: &Model) -> Result<Metadata> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(Error::Backend("disk full".into()));
        }
        self.inner.save(model).await
    }

    async fn remove(&self, model: &Model) -> Result<Metadata> {
        self.inner.remove(model).await
    }

    async fn flush(&self) -> Result<()> {
        self.inner.flush().await
    }
}
