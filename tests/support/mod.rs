#![allow(dead_code)]

pub mod counting;
pub mod models;

use datamapper::{Datastore, Query};
use tracing_subscriber::EnvFilter;

pub use counting::CountingAdapter;

/// Route library logs to the test writer; `RUST_LOG=datamapper=debug` shows them.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn query(value: serde_json::Value) -> Query {
    value.as_object().cloned().unwrap_or_default()
}

/// A datastore over a fresh counting adapter, plus a handle to its counters.
pub fn counting_store() -> (Datastore, CountingAdapter) {
    init_tracing();
    let adapter = CountingAdapter::new();
    (Datastore::from_adapter(adapter.clone()), adapter)
}
