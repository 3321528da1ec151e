//! Testing utilities for xdiff workspace
//!
//! Scripted stores, a connector over them, and fixtures.

#![allow(missing_docs)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use xdiff_core::{
    ClusterEndpoint, DifferConfig, DifferError, Document, DocumentStore, FetchError, MemoryStore,
    Side, StoreConnector,
};

/// Connector handing out fixed stores, optionally refusing one side
pub struct MemoryConnector {
    source: Arc<dyn DocumentStore>,
    target: Arc<dyn DocumentStore>,
    failing_side: Option<Side>,
}

impl MemoryConnector {
    pub fn new(source: Arc<dyn DocumentStore>, target: Arc<dyn DocumentStore>) -> Self {
        Self {
            source,
            target,
            failing_side: None,
        }
    }

    /// Make `connect` fail for `side`
    #[must_use]
    pub fn failing(mut self, side: Side) -> Self {
        self.failing_side = Some(side);
        self
    }
}

#[async_trait]
impl StoreConnector for MemoryConnector {
    async fn connect(
        &self,
        side: Side,
        endpoint: &ClusterEndpoint,
    ) -> Result<Arc<dyn DocumentStore>, DifferError> {
        if self.failing_side == Some(side) {
            return Err(DifferError::connect(side, &endpoint.url, "authentication failed"));
        }
        Ok(match side {
            Side::Source => Arc::clone(&self.source),
            Side::Target => Arc::clone(&self.target),
        })
    }
}

/// Never answers for the listed keys; delegates everything else
pub struct StallingStore {
    inner: Arc<dyn DocumentStore>,
    stalled: HashSet<String>,
}

impl StallingStore {
    pub fn new(inner: Arc<dyn DocumentStore>, stalled: &[&str]) -> Self {
        Self {
            inner,
            stalled: stalled.iter().map(|k| (*k).to_string()).collect(),
        }
    }
}

#[async_trait]
impl DocumentStore for StallingStore {
    async fn get(&self, key: &str) -> Result<Document, FetchError> {
        if self.stalled.contains(key) {
            std::future::pending::<()>().await;
        }
        self.inner.get(key).await
    }
}

/// Answers the listed keys only after `delay`; delegates everything else
pub struct SlowStore {
    inner: Arc<dyn DocumentStore>,
    slow: HashSet<String>,
    delay: Duration,
}

impl SlowStore {
    pub fn new(inner: Arc<dyn DocumentStore>, slow: &[&str], delay: Duration) -> Self {
        Self {
            inner,
            slow: slow.iter().map(|k| (*k).to_string()).collect(),
            delay,
        }
    }
}

#[async_trait]
impl DocumentStore for SlowStore {
    async fn get(&self, key: &str) -> Result<Document, FetchError> {
        if self.slow.contains(key) {
            tokio::time::sleep(self.delay).await;
        }
        self.inner.get(key).await
    }
}

/// Stalls the first `stalled_calls` fetches, then delegates
pub struct FlakyStore {
    inner: Arc<dyn DocumentStore>,
    stalled_calls: usize,
    calls: AtomicUsize,
}

impl FlakyStore {
    pub fn new(inner: Arc<dyn DocumentStore>, stalled_calls: usize) -> Self {
        Self {
            inner,
            stalled_calls,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl DocumentStore for FlakyStore {
    async fn get(&self, key: &str) -> Result<Document, FetchError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) < self.stalled_calls {
            std::future::pending::<()>().await;
        }
        self.inner.get(key).await
    }
}

/// Counts fetches per key
pub struct CountingStore {
    inner: Arc<dyn DocumentStore>,
    calls: Mutex<HashMap<String, usize>>,
}

impl CountingStore {
    pub fn new(inner: Arc<dyn DocumentStore>) -> Self {
        Self {
            inner,
            calls: Mutex::new(HashMap::new()),
        }
    }

    pub fn calls(&self, key: &str) -> usize {
        self.calls.lock().get(key).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().values().sum()
    }
}

#[async_trait]
impl DocumentStore for CountingStore {
    async fn get(&self, key: &str) -> Result<Document, FetchError> {
        *self.calls.lock().entry(key.to_string()).or_insert(0) += 1;
        self.inner.get(key).await
    }
}

/// Always fails with a non-not-found error
pub struct FailingStore {
    message: String,
}

impl FailingStore {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl DocumentStore for FailingStore {
    async fn get(&self, _key: &str) -> Result<Document, FetchError> {
        Err(FetchError::other(self.message.clone()))
    }
}

pub fn doc(value: &str) -> Document {
    Document::new(value).with_flags(0x0200_0000).with_datatype(1).with_cas(1)
}

pub fn store_with(entries: &[(&str, Document)]) -> Arc<MemoryStore> {
    let store = MemoryStore::new();
    for (key, document) in entries {
        store.insert(*key, document.clone());
    }
    Arc::new(store)
}

pub fn write_key_list(dir: &Path, name: &str, keys: &[&str]) -> PathBuf {
    let path = dir.join(name);
    let body = serde_json::to_vec(keys).unwrap();
    std::fs::write(&path, body).unwrap();
    path
}

/// Config pointing at `dir` with short timeouts and retry delays
pub fn test_config(dir: &Path) -> DifferConfig {
    DifferConfig::new()
        .with_clusters(
            ClusterEndpoint::new("mem://source", "bucket"),
            ClusterEndpoint::new("mem://target", "bucket"),
        )
        .with_diff_file_dir(dir)
        .with_workers(2)
        .with_batch_size(2)
        .with_timeout_secs(1)
        .with_retries(3, Duration::from_millis(10), Duration::from_millis(40))
        .with_report_interval(Duration::from_millis(100))
}

pub fn read_json(path: &Path) -> serde_json::Value {
    serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap()
}
