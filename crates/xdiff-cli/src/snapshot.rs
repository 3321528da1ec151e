//! Bucket snapshots on disk
//!
//! `file://<dir>` endpoints are served from `<dir>/<bucket>.json`, a JSON
//! object mapping each key to its document. The whole snapshot is loaded
//! at connect time into a [`MemoryStore`].

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use xdiff_core::{ClusterEndpoint, DifferError, Document, DocumentStore, MemoryStore, Side, StoreConnector};

const FILE_SCHEME: &str = "file://";

#[derive(Debug, Default)]
pub(crate) struct SnapshotConnector;

impl SnapshotConnector {
    fn snapshot_path(side: Side, endpoint: &ClusterEndpoint) -> Result<PathBuf, DifferError> {
        let dir = endpoint.url.strip_prefix(FILE_SCHEME).ok_or_else(|| {
            DifferError::connect(side, &endpoint.url, "unsupported scheme, expected file://")
        })?;
        Ok(PathBuf::from(dir).join(format!("{}.json", endpoint.bucket)))
    }
}

#[async_trait]
impl StoreConnector for SnapshotConnector {
    async fn connect(
        &self,
        side: Side,
        endpoint: &ClusterEndpoint,
    ) -> Result<Arc<dyn DocumentStore>, DifferError> {
        let path = Self::snapshot_path(side, endpoint)?;
        let bytes = tokio::fs::read(&path).await.map_err(|e| {
            DifferError::connect(side, &endpoint.url, format!("cannot open {}: {e}", path.display()))
        })?;
        let documents: HashMap<String, Document> = serde_json::from_slice(&bytes).map_err(|e| {
            DifferError::connect(side, &endpoint.url, format!("bad snapshot {}: {e}", path.display()))
        })?;

        tracing::info!(
            side = %side,
            bucket = %endpoint.bucket,
            documents = documents.len(),
            "loaded bucket snapshot"
        );
        Ok(Arc::new(MemoryStore::from_documents(documents)))
    }
}
