//! Periodic progress reporting
//!
//! Samples the run counters on a fixed interval and logs processed count,
//! error count and throughput. Stops once every key is processed or when
//! the run signals it has finished.

use crate::state::AggregateState;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// One sample of the run counters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSample {
    /// Keys processed so far
    pub processed: u64,
    /// Keys skipped because of errors so far
    pub errors: u64,
    /// Keys per second since the previous sample, if there was one
    pub rate: Option<f64>,
}

impl ProgressSample {
    /// Build a sample from counter readings
    #[must_use]
    pub fn new(processed: u64, errors: u64, previous: Option<u64>, interval: Duration) -> Self {
        let rate = previous.map(|prev| {
            let delta = processed.saturating_sub(prev) as f64;
            delta / interval.as_secs_f64()
        });
        Self {
            processed,
            errors,
            rate,
        }
    }
}

/// Progress reporter task
#[derive(Debug)]
pub struct ProgressReporter {
    state: Arc<AggregateState>,
    total_keys: u64,
    interval: Duration,
}

impl ProgressReporter {
    /// Create reporter
    #[inline]
    #[must_use]
    pub fn new(state: Arc<AggregateState>, total_keys: usize, interval: Duration) -> Self {
        Self {
            state,
            total_keys: total_keys as u64,
            interval,
        }
    }

    /// Spawn the reporter; it exits when `finished` flips to true or its
    /// sender is dropped.
    pub fn spawn(self, finished: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(finished))
    }

    async fn run(self, mut finished: watch::Receiver<bool>) {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut previous = None;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let sample = ProgressSample::new(
                        self.state.keys_processed(),
                        self.state.keys_with_errors(),
                        previous,
                        self.interval,
                    );
                    self.report(&sample);
                    if sample.processed >= self.total_keys {
                        return;
                    }
                    previous = Some(sample.processed);
                }
                changed = finished.changed() => {
                    if changed.is_err() || *finished.borrow() {
                        return;
                    }
                }
            }
        }
    }

    fn report(&self, sample: &ProgressSample) {
        match sample.rate {
            Some(rate) => tracing::info!(
                processed = sample.processed,
                total = self.total_keys,
                "mutation differ processed {} keys out of {} keys, processing rate={:.0} key/sec",
                sample.processed,
                self.total_keys,
                rate
            ),
            None => tracing::info!(
                processed = sample.processed,
                total = self.total_keys,
                "mutation differ processed {} keys out of {} keys",
                sample.processed,
                self.total_keys
            ),
        }
        if sample.errors > 0 {
            tracing::warn!(
                errors = sample.errors,
                "skipped {} keys because of errors",
                sample.errors
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sample_has_no_rate() {
        let sample = ProgressSample::new(50, 0, None, Duration::from_secs(5));
        assert_eq!(sample.rate, None);
    }

    #[test]
    fn rate_is_delta_over_interval() {
        let sample = ProgressSample::new(150, 2, Some(50), Duration::from_secs(5));
        assert_eq!(sample.rate, Some(20.0));
        assert_eq!(sample.errors, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stops_when_all_keys_processed() {
        let state = Arc::new(AggregateState::new());
        state.record_processed(10);
        let (_tx, rx) = watch::channel(false);

        let handle = ProgressReporter::new(state, 10, Duration::from_secs(5)).spawn(rx);
        tokio::time::timeout(Duration::from_secs(6), handle)
            .await
            .expect("reporter should stop after one tick")
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn stops_on_finish_signal() {
        let state = Arc::new(AggregateState::new());
        let (tx, rx) = watch::channel(false);

        let handle = ProgressReporter::new(state, 10, Duration::from_secs(5)).spawn(rx);
        tokio::time::sleep(Duration::from_secs(12)).await;
        assert!(!handle.is_finished());

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("reporter should stop on finish")
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn stops_when_sender_dropped() {
        let state = Arc::new(AggregateState::new());
        let (tx, rx) = watch::channel(false);

        let handle = ProgressReporter::new(state, 10, Duration::from_secs(5)).spawn(rx);
        drop(tx);
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("reporter should stop when the run goes away")
            .unwrap();
    }
}
