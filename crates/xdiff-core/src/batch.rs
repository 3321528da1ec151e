//! One round of dual-sided fetches for a fixed list of keys
//!
//! A batch issues one fetch per key per side, all concurrently. Each fetch
//! task reports `(side, slot, outcome)` over a channel; the batch is the
//! only consumer and fills a positional slot per key and side. The batch
//! succeeds only when both sides have every slot filled before the
//! deadline.
//!
//! On timeout the in-flight fetches are not cancelled. Their results land
//! on a closed channel and are dropped, so a later attempt always starts
//! from fresh slots.

use crate::error::{BatchError, FetchError};
use crate::store::DocumentStore;
use crate::types::{CandidateKey, Document, Side, SideResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Outcome of one fetch task
#[derive(Debug)]
struct Completion {
    side: Side,
    slot: usize,
    outcome: Result<Document, FetchError>,
}

/// Per-key results of a successful batch, positionally aligned with its keys
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchResults {
    /// Source results, one per key
    pub source: Vec<SideResult>,
    /// Target results, one per key
    pub target: Vec<SideResult>,
}

impl BatchResults {
    /// Number of keys in the batch
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.source.len()
    }

    /// Whether the batch had no keys
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }
}

/// Slots for both sides plus the per-side countdowns
#[derive(Debug)]
struct CompletionGate {
    source: Vec<SideResult>,
    target: Vec<SideResult>,
    pending_source: usize,
    pending_target: usize,
}

impl CompletionGate {
    fn new(keys: &[CandidateKey]) -> Self {
        Self {
            source: keys.iter().map(SideResult::pending).collect(),
            target: keys.iter().map(SideResult::pending).collect(),
            pending_source: keys.len(),
            pending_target: keys.len(),
        }
    }

    fn is_open(&self) -> bool {
        self.pending_source == 0 && self.pending_target == 0
    }

    fn record(&mut self, completion: Completion) {
        let (slots, pending) = match completion.side {
            Side::Source => (&mut self.source, &mut self.pending_source),
            Side::Target => (&mut self.target, &mut self.pending_target),
        };
        let Some(slot) = slots.get_mut(completion.slot) else {
            return;
        };
        if !slot.is_complete() {
            *pending -= 1;
        }
        slot.outcome = Some(completion.outcome);
    }

    async fn wait(&mut self, rx: &mut mpsc::Receiver<Completion>) -> Result<(), BatchError> {
        while !self.is_open() {
            match rx.recv().await {
                Some(completion) => self.record(completion),
                None => {
                    return Err(BatchError::ChannelClosed {
                        pending: self.pending_source + self.pending_target,
                    })
                }
            }
        }
        Ok(())
    }
}

/// A fixed set of keys fetched from both clusters under one deadline
pub struct Batch {
    keys: Vec<CandidateKey>,
    source: Arc<dyn DocumentStore>,
    target: Arc<dyn DocumentStore>,
    timeout: Duration,
}

impl std::fmt::Debug for Batch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Batch")
            .field("keys", &self.keys.len())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl Batch {
    /// Create batch over `keys`
    #[must_use]
    pub fn new(
        keys: &[CandidateKey],
        source: Arc<dyn DocumentStore>,
        target: Arc<dyn DocumentStore>,
        timeout: Duration,
    ) -> Self {
        Self {
            keys: keys.to_vec(),
            source,
            target,
            timeout,
        }
    }

    /// Fetch every key from both sides and wait for all of them.
    ///
    /// # Errors
    /// - `BatchError::Timeout` if any fetch is still outstanding at the deadline
    /// - `BatchError::ChannelClosed` if fetch tasks vanished without reporting
    pub async fn send(self) -> Result<BatchResults, BatchError> {
        let mut gate = CompletionGate::new(&self.keys);
        if gate.is_open() {
            return Ok(BatchResults {
                source: gate.source,
                target: gate.target,
            });
        }

        // Sized so that no fetch task ever waits on the channel
        let (tx, mut rx) = mpsc::channel(2 * self.keys.len());
        for (slot, key) in self.keys.iter().enumerate() {
            spawn_fetch(Side::Source, slot, key.clone(), Arc::clone(&self.source), tx.clone());
            spawn_fetch(Side::Target, slot, key.clone(), Arc::clone(&self.target), tx.clone());
        }
        drop(tx);

        let waited = tokio::time::timeout(self.timeout, gate.wait(&mut rx)).await;
        match waited {
            Ok(Ok(())) => Ok(BatchResults {
                source: gate.source,
                target: gate.target,
            }),
            Ok(Err(err)) => Err(err),
            Err(_elapsed) => Err(BatchError::Timeout {
                batch_size: self.keys.len(),
                timeout_secs: self.timeout.as_secs(),
                pending_source: gate.pending_source,
                pending_target: gate.pending_target,
            }),
        }
    }
}

fn spawn_fetch(
    side: Side,
    slot: usize,
    key: CandidateKey,
    store: Arc<dyn DocumentStore>,
    tx: mpsc::Sender<Completion>,
) {
    tokio::spawn(async move {
        let outcome = store.get(&key).await;
        // Receiver is gone once the batch timed out
        let _ = tx.send(Completion { side, slot, outcome }).await;
    });
}
