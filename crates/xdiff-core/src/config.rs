//! Differ configuration
//!
//! Every knob of a run lives in [`DifferConfig`]. It deserializes from TOML
//! (durations as milliseconds) and every field has a default, so a config
//! file only has to name what it changes.

use crate::error::DifferError;
use crate::output::OutputLayout;
use crate::retry::{RetryPolicy, SEND_BATCH_BACKOFF_FACTOR};
use crate::worker::WorkerSettings;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Interval between progress reports
pub const STATS_REPORT_INTERVAL: Duration = Duration::from_secs(5);

/// Default input file name, as written by the upstream scan
pub const DEFAULT_INPUT_DIFF_KEYS_FILE: &str = "diffKeys";

/// Default output file name for keys confirmed different
pub const DEFAULT_OUTPUT_DIFF_KEYS_FILE: &str = "mutationDiffKeys";

/// Connection parameters for one cluster
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterEndpoint {
    /// Cluster URL
    pub url: String,
    /// Bucket name
    pub bucket: String,
    /// User name
    pub username: String,
    /// Password
    pub password: String,
}

impl ClusterEndpoint {
    /// Create endpoint without credentials
    #[inline]
    #[must_use]
    pub fn new(url: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            bucket: bucket.into(),
            ..Self::default()
        }
    }

    /// With credentials
    #[inline]
    #[must_use]
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }
}

impl std::fmt::Debug for ClusterEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterEndpoint")
            .field("url", &self.url)
            .field("bucket", &self.bucket)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Mutation differ configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DifferConfig {
    /// Source cluster
    pub source: ClusterEndpoint,
    /// Target cluster
    pub target: ClusterEndpoint,
    /// Directory holding the key list and receiving the result files
    pub diff_file_dir: PathBuf,
    /// Key list file name inside `diff_file_dir`
    pub input_diff_keys_file: String,
    /// Diff-keys output file name inside `diff_file_dir`
    pub output_diff_keys_file: String,
    /// Number of concurrent workers
    pub num_workers: usize,
    /// Keys per batch
    pub batch_size: usize,
    /// Per-batch timeout in seconds
    pub timeout_secs: u64,
    /// Retries per batch after its first send
    pub max_send_batch_retries: u32,
    /// Delay before the first retry
    #[serde(rename = "send_batch_retry_interval_ms", with = "duration_ms")]
    pub send_batch_retry_interval: Duration,
    /// Upper bound for the retry delay
    #[serde(rename = "send_batch_max_backoff_ms", with = "duration_ms")]
    pub send_batch_max_backoff: Duration,
    /// Interval between progress reports
    #[serde(rename = "report_interval_ms", with = "duration_ms")]
    pub report_interval: Duration,
}

impl DifferConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With both clusters
    #[inline]
    #[must_use]
    pub fn with_clusters(mut self, source: ClusterEndpoint, target: ClusterEndpoint) -> Self {
        self.source = source;
        self.target = target;
        self
    }

    /// With input/output directory
    #[inline]
    #[must_use]
    pub fn with_diff_file_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.diff_file_dir = dir.into();
        self
    }

    /// With worker count
    #[inline]
    #[must_use]
    pub fn with_workers(mut self, num_workers: usize) -> Self {
        self.num_workers = num_workers;
        self
    }

    /// With batch size
    #[inline]
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// With batch timeout
    #[inline]
    #[must_use]
    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// With batch retry parameters
    #[inline]
    #[must_use]
    pub fn with_retries(mut self, max_retries: u32, interval: Duration, max_backoff: Duration) -> Self {
        self.max_send_batch_retries = max_retries;
        self.send_batch_retry_interval = interval;
        self.send_batch_max_backoff = max_backoff;
        self
    }

    /// With progress report interval
    #[inline]
    #[must_use]
    pub fn with_report_interval(mut self, interval: Duration) -> Self {
        self.report_interval = interval;
        self
    }

    /// Check the configuration before a run
    ///
    /// # Errors
    /// Returns `DifferError::InvalidConfig` naming the first bad field.
    pub fn validate(&self) -> Result<(), DifferError> {
        for (side, endpoint) in [("source", &self.source), ("target", &self.target)] {
            if endpoint.url.trim().is_empty() {
                return Err(DifferError::invalid_config(format!("{side} url is empty")));
            }
            if endpoint.bucket.trim().is_empty() {
                return Err(DifferError::invalid_config(format!("{side} bucket is empty")));
            }
        }
        if self.input_diff_keys_file.is_empty() || self.output_diff_keys_file.is_empty() {
            return Err(DifferError::invalid_config("key file names must not be empty"));
        }
        if self.num_workers == 0 {
            return Err(DifferError::invalid_config("num_workers must be at least 1"));
        }
        if self.batch_size == 0 {
            return Err(DifferError::invalid_config("batch_size must be at least 1"));
        }
        if self.timeout_secs == 0 {
            return Err(DifferError::invalid_config("timeout_secs must be at least 1"));
        }
        if self.send_batch_max_backoff < self.send_batch_retry_interval {
            return Err(DifferError::invalid_config(
                "send_batch_max_backoff must not be below send_batch_retry_interval",
            ));
        }
        if self.report_interval.is_zero() {
            return Err(DifferError::invalid_config("report interval must be non-zero"));
        }
        Ok(())
    }

    /// Full path of the key list
    #[must_use]
    pub fn input_keys_path(&self) -> PathBuf {
        self.diff_file_dir.join(&self.input_diff_keys_file)
    }

    /// Where result files go
    #[must_use]
    pub fn output_layout(&self) -> OutputLayout {
        OutputLayout::new(&self.diff_file_dir, &self.output_diff_keys_file)
    }

    /// Batch retry policy
    #[must_use]
    pub fn send_batch_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_send_batch_retries,
            self.send_batch_retry_interval,
            SEND_BATCH_BACKOFF_FACTOR,
            self.send_batch_max_backoff,
        )
    }

    /// Per-worker settings
    #[must_use]
    pub fn worker_settings(&self) -> WorkerSettings {
        WorkerSettings {
            batch_size: self.batch_size,
            batch_timeout: Duration::from_secs(self.timeout_secs),
            retry: self.send_batch_policy(),
        }
    }
}

impl Default for DifferConfig {
    fn default() -> Self {
        Self {
            source: ClusterEndpoint::default(),
            target: ClusterEndpoint::default(),
            diff_file_dir: PathBuf::from("."),
            input_diff_keys_file: DEFAULT_INPUT_DIFF_KEYS_FILE.to_string(),
            output_diff_keys_file: DEFAULT_OUTPUT_DIFF_KEYS_FILE.to_string(),
            num_workers: 10,
            batch_size: 100,
            timeout_secs: 10,
            max_send_batch_retries: 5,
            send_batch_retry_interval: Duration::from_millis(500),
            send_batch_max_backoff: Duration::from_secs(5),
            report_interval: STATS_REPORT_INTERVAL,
        }
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub(super) fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
