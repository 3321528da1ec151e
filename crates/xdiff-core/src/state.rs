//! Run-wide aggregate state
//!
//! Workers touch this only at batch and worker boundaries: counters are
//! bumped once per batch outcome, error keys are appended once per
//! exhausted batch, and each worker's diff is merged once.

use crate::types::{CandidateKey, DiffSet};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
struct Aggregate {
    diffs: DiffSet,
    keys_with_error: Vec<CandidateKey>,
}

/// Shared result state for one run
#[derive(Debug, Default)]
pub struct AggregateState {
    inner: RwLock<Aggregate>,
    keys_processed: AtomicU64,
    keys_with_errors: AtomicU64,
}

impl AggregateState {
    /// Create empty state
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one worker's diff
    pub fn merge_diff(&self, diff: DiffSet) {
        if diff.is_empty() {
            return;
        }
        self.inner.write().diffs.extend(diff);
    }

    /// Record keys whose batch could not be checked
    pub fn add_keys_with_error(&self, keys: &[CandidateKey]) {
        self.inner.write().keys_with_error.extend_from_slice(keys);
        self.keys_with_errors
            .fetch_add(keys.len() as u64, Ordering::Relaxed);
    }

    /// Count a finished batch, successful or not
    pub fn record_processed(&self, count: usize) {
        self.keys_processed.fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Keys processed so far
    #[inline]
    #[must_use]
    pub fn keys_processed(&self) -> u64 {
        self.keys_processed.load(Ordering::Relaxed)
    }

    /// Keys that could not be checked so far
    #[inline]
    #[must_use]
    pub fn keys_with_errors(&self) -> u64 {
        self.keys_with_errors.load(Ordering::Relaxed)
    }

    /// Copy of the current results
    #[must_use]
    pub fn snapshot(&self) -> AggregateSnapshot {
        let guard = self.inner.read();
        AggregateSnapshot {
            diffs: guard.diffs.clone(),
            keys_with_error: guard.keys_with_error.clone(),
        }
    }
}

/// Point-in-time copy of the aggregate results
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregateSnapshot {
    /// Keys confirmed different, by classification
    pub diffs: DiffSet,
    /// Keys whose batch exhausted its retries
    pub keys_with_error: Vec<CandidateKey>,
}

impl AggregateSnapshot {
    /// Every key classified as a diff
    #[must_use]
    pub fn diff_keys(&self) -> Vec<CandidateKey> {
        self.diffs.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DiffClassification, Document};
    use std::sync::Arc;

    fn diff_with(key: &str) -> DiffSet {
        let mut diff = DiffSet::default();
        diff.record(
            key.to_string(),
            DiffClassification::MissingFromTarget(Document::new("v")),
        );
        diff
    }

    #[test]
    fn counters_start_at_zero() {
        let state = AggregateState::new();
        assert_eq!(state.keys_processed(), 0);
        assert_eq!(state.keys_with_errors(), 0);
        assert_eq!(state.snapshot(), AggregateSnapshot::default());
    }

    #[test]
    fn error_keys_are_counted() {
        let state = AggregateState::new();
        state.add_keys_with_error(&["a".to_string(), "b".to_string()]);
        state.record_processed(2);

        assert_eq!(state.keys_with_errors(), 2);
        assert_eq!(state.keys_processed(), 2);
        assert_eq!(state.snapshot().keys_with_error, vec!["a", "b"]);
    }

    #[test]
    fn concurrent_merges_lose_nothing() {
        let state = Arc::new(AggregateState::new());
        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let state = Arc::clone(&state);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        state.merge_diff(diff_with(&format!("w{worker}-k{i}")));
                        state.record_processed(1);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(state.keys_processed(), 400);
        assert_eq!(state.snapshot().diffs.len(), 400);
        assert_eq!(state.snapshot().diff_keys().len(), 400);
    }
}
