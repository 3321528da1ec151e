//! Differ worker
//!
//! A worker owns one contiguous partition of the candidate keys and:
//! - Drives the partition through batches, one at a time, with retry
//! - Keeps the results of successful batches in worker-local maps
//! - Reports keys of exhausted batches as errored
//! - Classifies every fetched key once all batches are done
//!
//! The local maps are only written by the worker's own sequential batch
//! loop, so they need no locking.

use crate::batch::{Batch, BatchResults};
use crate::comparator;
use crate::retry::{self, RetryPolicy};
use crate::state::AggregateState;
use crate::store::DocumentStore;
use crate::types::{CandidateKey, DiffSet, SideResult, WorkerLocalDiff};
use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;

/// Batch shape and retry budget for a worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerSettings {
    /// Keys per batch
    pub batch_size: usize,
    /// Deadline for a single batch attempt
    pub batch_timeout: Duration,
    /// Retry budget per batch
    pub retry: RetryPolicy,
}

/// Worker over one partition of the key list
pub struct DifferWorker {
    id: usize,
    keys: Arc<Vec<CandidateKey>>,
    range: Range<usize>,
    source: Arc<dyn DocumentStore>,
    target: Arc<dyn DocumentStore>,
    settings: WorkerSettings,
    state: Arc<AggregateState>,
    source_results: HashMap<CandidateKey, SideResult>,
    target_results: HashMap<CandidateKey, SideResult>,
}

impl std::fmt::Debug for DifferWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DifferWorker")
            .field("id", &self.id)
            .field("range", &self.range)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl DifferWorker {
    /// Create worker over `keys[range]`
    #[must_use]
    pub fn new(
        id: usize,
        keys: Arc<Vec<CandidateKey>>,
        range: Range<usize>,
        source: Arc<dyn DocumentStore>,
        target: Arc<dyn DocumentStore>,
        settings: WorkerSettings,
        state: Arc<AggregateState>,
    ) -> Self {
        Self {
            id,
            keys,
            range,
            source,
            target,
            settings,
            state,
            source_results: HashMap::new(),
            target_results: HashMap::new(),
        }
    }

    /// Worker ID
    #[inline]
    #[must_use]
    pub fn id(&self) -> usize {
        self.id
    }

    /// Batch sub-ranges of the partition, in order
    #[must_use]
    pub fn batch_ranges(&self) -> Vec<Range<usize>> {
        let batch_size = self.settings.batch_size.max(1);
        (self.range.start..self.range.end)
            .step_by(batch_size)
            .map(|start| start..(start + batch_size).min(self.range.end))
            .collect()
    }

    /// Fetch the whole partition, then classify it
    ///
    /// # Returns
    /// The worker's local diff, for the caller to merge
    pub async fn run(mut self) -> WorkerLocalDiff {
        tracing::debug!(
            worker = self.id,
            start = self.range.start,
            end = self.range.end,
            "worker started"
        );

        self.fetch_results().await;
        let diff = self.diff();

        tracing::debug!(worker = self.id, diffs = diff.len(), "worker finished");
        diff
    }

    async fn fetch_results(&mut self) {
        for range in self.batch_ranges() {
            self.send_batch_with_retry(range).await;
        }
    }

    async fn send_batch_with_retry(&mut self, range: Range<usize>) {
        let keys = Arc::clone(&self.keys);
        let batch_keys = &keys[range];
        let source = Arc::clone(&self.source);
        let target = Arc::clone(&self.target);
        let timeout = self.settings.batch_timeout;
        let worker = self.id;

        let outcome = retry::execute("send_batch", &self.settings.retry, |attempt| {
            tracing::trace!(worker, attempt, keys = batch_keys.len(), "sending batch");
            Batch::new(batch_keys, Arc::clone(&source), Arc::clone(&target), timeout).send()
        })
        .await;

        match outcome {
            Ok(results) => self.merge_results(batch_keys, results),
            Err(err) => {
                tracing::warn!(
                    worker,
                    keys = batch_keys.len(),
                    error = %err,
                    "skipped check on batch keys"
                );
                self.state.add_keys_with_error(batch_keys);
            }
        }
        // Errored keys count as processed too
        self.state.record_processed(batch_keys.len());
    }

    fn merge_results(&mut self, keys: &[CandidateKey], results: BatchResults) {
        for (key, result) in keys.iter().zip(results.source) {
            self.source_results.insert(key.clone(), result);
        }
        for (key, result) in keys.iter().zip(results.target) {
            self.target_results.insert(key.clone(), result);
        }
    }

    fn diff(&self) -> WorkerLocalDiff {
        let mut diff = DiffSet::default();
        for (key, source) in &self.source_results {
            let Some(target) = self.target_results.get(key) else {
                continue;
            };
            if let Some(classification) = comparator::compare(source, target) {
                diff.record(key.clone(), classification);
            }
        }
        diff
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::retry::SEND_BATCH_BACKOFF_FACTOR;
    use crate::store::{MemoryStore, MockDocumentStore};
    use crate::types::Document;

    fn settings(batch_size: usize) -> WorkerSettings {
        WorkerSettings {
            batch_size,
            batch_timeout: Duration::from_secs(1),
            retry: RetryPolicy::new(
                3,
                Duration::from_millis(10),
                SEND_BATCH_BACKOFF_FACTOR,
                Duration::from_millis(40),
            ),
        }
    }

    fn key_list(count: usize) -> Arc<Vec<CandidateKey>> {
        Arc::new((0..count).map(|i| format!("k{i}")).collect())
    }

    fn worker(
        keys: Arc<Vec<CandidateKey>>,
        range: Range<usize>,
        source: Arc<dyn DocumentStore>,
        target: Arc<dyn DocumentStore>,
        batch_size: usize,
        state: &Arc<AggregateState>,
    ) -> DifferWorker {
        DifferWorker::new(0, keys, range, source, target, settings(batch_size), Arc::clone(state))
    }

    #[test]
    fn batch_ranges_cover_partition() {
        let state = Arc::new(AggregateState::new());
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let w = worker(key_list(20), 3..13, Arc::clone(&store), store, 4, &state);

        assert_eq!(w.batch_ranges(), vec![3..7, 7..11, 11..13]);
    }

    #[test]
    fn empty_partition_has_no_batches() {
        let state = Arc::new(AggregateState::new());
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let w = worker(key_list(5), 5..5, Arc::clone(&store), store, 4, &state);

        assert!(w.batch_ranges().is_empty());
    }

    #[tokio::test]
    async fn worker_classifies_partition() {
        let keys = key_list(6);
        let source = MemoryStore::new();
        let target = MemoryStore::new();
        // k0 same, k1 missing on source, k2 missing on target, k3 mismatch
        source.insert("k0", Document::new("same"));
        target.insert("k0", Document::new("same"));
        target.insert("k1", Document::new("t1"));
        source.insert("k2", Document::new("s2"));
        source.insert("k3", Document::new("old"));
        target.insert("k3", Document::new("new"));

        let state = Arc::new(AggregateState::new());
        let diff = worker(keys, 0..4, Arc::new(source), Arc::new(target), 3, &state)
            .run()
            .await;

        assert_eq!(diff.len(), 3);
        assert_eq!(diff.missing_from_source["k1"], Document::new("t1"));
        assert_eq!(diff.missing_from_target["k2"], Document::new("s2"));
        assert_eq!(
            diff.mismatch["k3"],
            [Document::new("old"), Document::new("new")]
        );
        assert_eq!(state.keys_processed(), 4);
        assert_eq!(state.keys_with_errors(), 0);
    }

    #[tokio::test]
    async fn fetch_errors_other_than_not_found_are_skipped() {
        let mut source = MockDocumentStore::new();
        source
            .expect_get()
            .returning(|_| Err(FetchError::other("connection reset")));
        let target = MemoryStore::new();
        target.insert("k0", Document::new("v"));

        let state = Arc::new(AggregateState::new());
        let diff = worker(key_list(1), 0..1, Arc::new(source), Arc::new(target), 10, &state)
            .run()
            .await;

        assert!(diff.is_empty());
        assert_eq!(state.keys_processed(), 1);
        assert_eq!(state.keys_with_errors(), 0);
        assert!(state.snapshot().keys_with_error.is_empty());
    }
}
