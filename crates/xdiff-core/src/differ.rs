//! Mutation differ orchestrator
//!
//! Drives one verification run end to end:
//! - Loads the candidate key list
//! - Connects to both clusters
//! - Partitions the keys across workers and runs them in parallel
//! - Merges each worker's diff into the aggregate state
//! - Reports progress while the run is in flight
//! - Writes the three result files

use crate::config::DifferConfig;
use crate::error::DifferError;
use crate::keys;
use crate::output::{self, OutputReport};
use crate::partition::balance_load;
use crate::progress::ProgressReporter;
use crate::state::{AggregateSnapshot, AggregateState};
use crate::store::{DocumentStore, StoreConnector};
use crate::types::{CandidateKey, Side};
use crate::worker::DifferWorker;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Outcome of a completed run
#[derive(Debug)]
pub struct RunSummary {
    /// Keys in the candidate list
    pub total_keys: usize,
    /// Keys whose batch finished, successfully or not
    pub keys_processed: u64,
    /// Keys whose batch exhausted its retries
    pub keys_with_errors: u64,
    /// Final diff maps and error keys
    pub results: AggregateSnapshot,
    /// Result file outcomes
    pub output: OutputReport,
}

impl RunSummary {
    /// Keys present only on the target
    #[inline]
    #[must_use]
    pub fn missing_from_source(&self) -> usize {
        self.results.diffs.missing_from_source.len()
    }

    /// Keys present only on the source
    #[inline]
    #[must_use]
    pub fn missing_from_target(&self) -> usize {
        self.results.diffs.missing_from_target.len()
    }

    /// Keys whose documents differ
    #[inline]
    #[must_use]
    pub fn mismatched(&self) -> usize {
        self.results.diffs.mismatch.len()
    }

    /// All keys classified as a diff
    #[inline]
    #[must_use]
    pub fn diff_count(&self) -> usize {
        self.results.diffs.len()
    }
}

/// The mutation differ
pub struct MutationDiffer {
    config: DifferConfig,
    connector: Arc<dyn StoreConnector>,
}

impl std::fmt::Debug for MutationDiffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutationDiffer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl MutationDiffer {
    /// Create differ
    ///
    /// # Errors
    /// Returns `DifferError::InvalidConfig` if the configuration is rejected.
    pub fn new(config: DifferConfig, connector: Arc<dyn StoreConnector>) -> Result<Self, DifferError> {
        config.validate()?;
        Ok(Self { config, connector })
    }

    /// Configuration in use
    #[inline]
    #[must_use]
    pub fn config(&self) -> &DifferConfig {
        &self.config
    }

    /// Run the differ over the configured key list
    ///
    /// # Workflow
    /// 1. Load the key list and connect to both clusters (fatal on failure)
    /// 2. Run one worker per non-empty partition
    /// 3. Merge worker diffs as each worker finishes
    /// 4. Write the result files
    ///
    /// # Errors
    /// Only startup failures are returned. Batch failures degrade coverage
    /// and output write failures are reported in [`RunSummary::output`].
    pub async fn run(&self) -> Result<RunSummary, DifferError> {
        let keys = keys::load_candidate_keys(self.config.input_keys_path()).await?;
        let (source, target) = self.initialize().await?;
        let total_keys = keys.len();
        tracing::info!(
            keys = total_keys,
            workers = self.config.num_workers,
            batch_size = self.config.batch_size,
            "mutation differ starting"
        );

        let state = Arc::new(AggregateState::new());
        let (finished_tx, finished_rx) = watch::channel(false);
        let reporter = ProgressReporter::new(Arc::clone(&state), total_keys, self.config.report_interval)
            .spawn(finished_rx);

        self.run_workers(Arc::new(keys), source, target, &state).await;

        // Reporter may already have stopped on its own
        let _ = finished_tx.send(true);
        if let Err(e) = reporter.await {
            tracing::warn!(error = %e, "progress reporter failed");
        }

        let results = state.snapshot();
        tracing::info!(
            processed = state.keys_processed(),
            diffs = results.diffs.len(),
            errors = results.keys_with_error.len(),
            "mutation differ finished"
        );

        let output = output::write_results(&self.config.output_layout(), &results).await;

        Ok(RunSummary {
            total_keys,
            keys_processed: state.keys_processed(),
            keys_with_errors: state.keys_with_errors(),
            results,
            output,
        })
    }

    async fn initialize(&self) -> Result<(Arc<dyn DocumentStore>, Arc<dyn DocumentStore>), DifferError> {
        let source = self.connect(Side::Source).await?;
        let target = self.connect(Side::Target).await?;
        Ok((source, target))
    }

    async fn connect(&self, side: Side) -> Result<Arc<dyn DocumentStore>, DifferError> {
        let endpoint = match side {
            Side::Source => &self.config.source,
            Side::Target => &self.config.target,
        };
        let store = self.connector.connect(side, endpoint).await.map_err(|e| {
            tracing::error!(side = %side, url = %endpoint.url, error = %e, "connection failed");
            e
        })?;
        tracing::debug!(side = %side, bucket = %endpoint.bucket, "connected");
        Ok(store)
    }

    async fn run_workers(
        &self,
        keys: Arc<Vec<CandidateKey>>,
        source: Arc<dyn DocumentStore>,
        target: Arc<dyn DocumentStore>,
        state: &Arc<AggregateState>,
    ) {
        let settings = self.config.worker_settings();
        let handles: Vec<(usize, JoinHandle<()>)> = balance_load(self.config.num_workers, keys.len())
            .into_iter()
            .enumerate()
            .filter(|(_, range)| !range.is_empty())
            .map(|(index, range)| {
                let worker = DifferWorker::new(
                    index,
                    Arc::clone(&keys),
                    range,
                    Arc::clone(&source),
                    Arc::clone(&target),
                    settings,
                    Arc::clone(state),
                );
                let id = worker.id();
                let state = Arc::clone(state);
                let handle = tokio::spawn(async move {
                    let diff = worker.run().await;
                    state.merge_diff(diff);
                });
                (id, handle)
            })
            .collect();

        tracing::debug!(workers = handles.len(), "workers launched");
        for (id, handle) in handles {
            if let Err(e) = handle.await {
                tracing::error!(worker = id, error = %e, "worker task failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClusterEndpoint;
    use crate::store::MemoryStore;
    use crate::types::Document;
    use async_trait::async_trait;
    use std::time::Duration;

    struct FixedConnector {
        source: Arc<MemoryStore>,
        target: Arc<MemoryStore>,
    }

    #[async_trait]
    impl StoreConnector for FixedConnector {
        async fn connect(
            &self,
            side: Side,
            _endpoint: &ClusterEndpoint,
        ) -> Result<Arc<dyn DocumentStore>, DifferError> {
            let store: Arc<dyn DocumentStore> = match side {
                Side::Source => self.source.clone(),
                Side::Target => self.target.clone(),
            };
            Ok(store)
        }
    }

    fn config(dir: &std::path::Path) -> DifferConfig {
        DifferConfig::new()
            .with_clusters(
                ClusterEndpoint::new("mem://source", "b"),
                ClusterEndpoint::new("mem://target", "b"),
            )
            .with_diff_file_dir(dir)
            .with_workers(3)
            .with_batch_size(2)
            .with_retries(2, Duration::from_millis(1), Duration::from_millis(2))
    }

    #[test]
    fn new_rejects_invalid_config() {
        let connector = Arc::new(FixedConnector {
            source: Arc::new(MemoryStore::new()),
            target: Arc::new(MemoryStore::new()),
        });
        let result = MutationDiffer::new(DifferConfig::default(), connector);
        assert!(matches!(result, Err(DifferError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn run_classifies_and_writes() {
        let dir = tempfile::tempdir().unwrap();
        let keys: Vec<String> = (0..7).map(|i| format!("k{i}")).collect();
        std::fs::write(dir.path().join("diffKeys"), serde_json::to_vec(&keys).unwrap()).unwrap();

        let source = Arc::new(MemoryStore::new());
        let target = Arc::new(MemoryStore::new());
        for key in &keys {
            source.insert(key.as_str(), Document::new("v"));
            target.insert(key.as_str(), Document::new("v"));
        }
        target.insert("k5", Document::new("changed"));
        source.remove("k6");

        let differ = MutationDiffer::new(config(dir.path()), Arc::new(FixedConnector { source, target })).unwrap();
        let summary = differ.run().await.unwrap();

        assert_eq!(summary.total_keys, 7);
        assert_eq!(summary.keys_processed, 7);
        assert_eq!(summary.keys_with_errors, 0);
        assert_eq!(summary.mismatched(), 1);
        assert_eq!(summary.missing_from_source(), 1);
        assert_eq!(summary.missing_from_target(), 0);
        assert!(summary.output.is_complete());
        assert!(dir.path().join("mutationDiffKeys").is_file());
    }

    #[tokio::test]
    async fn empty_key_list_completes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("diffKeys"), "[]").unwrap();
        let connector = Arc::new(FixedConnector {
            source: Arc::new(MemoryStore::new()),
            target: Arc::new(MemoryStore::new()),
        });

        let summary = MutationDiffer::new(config(dir.path()), connector)
            .unwrap()
            .run()
            .await
            .unwrap();
        assert_eq!(summary.total_keys, 0);
        assert_eq!(summary.diff_count(), 0);
        assert!(summary.output.is_complete());
    }
}
