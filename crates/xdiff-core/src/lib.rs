//! xdiff core - replica mutation differ
//!
//! Re-verifies a list of candidate keys against two replicas of a
//! key-value store:
//! - Fetches every key from the source and the target cluster in batches
//! - Retries failed batches with exponential backoff
//! - Classifies each key as missing from source, missing from target,
//!   mismatched or matching
//! - Aggregates the diffs and the keys that could not be checked
//!
//! # Example
//!
//! ```rust,ignore
//! use xdiff_core::{ClusterEndpoint, DifferConfig, MutationDiffer};
//!
//! # async fn example(connector: std::sync::Arc<dyn xdiff_core::StoreConnector>) -> Result<(), Box<dyn std::error::Error>> {
//! let config = DifferConfig::new()
//!     .with_clusters(
//!         ClusterEndpoint::new("file:///data/source", "default"),
//!         ClusterEndpoint::new("file:///data/target", "default"),
//!     )
//!     .with_diff_file_dir("/data/diff");
//!
//! let summary = MutationDiffer::new(config, connector)?.run().await?;
//! println!("{} diffs, {} keys with errors", summary.diff_count(), summary.keys_with_errors);
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod batch;
pub mod comparator;
pub mod config;
pub mod differ;
pub mod error;
pub mod keys;
pub mod output;
pub mod partition;
pub mod progress;
pub mod retry;
pub mod state;
pub mod store;
pub mod types;
pub mod worker;

// Re-exports for convenience
pub use batch::{Batch, BatchResults};
pub use comparator::{compare, documents_equal};
pub use config::{
    ClusterEndpoint, DifferConfig, DEFAULT_INPUT_DIFF_KEYS_FILE, DEFAULT_OUTPUT_DIFF_KEYS_FILE,
    STATS_REPORT_INTERVAL,
};
pub use differ::{MutationDiffer, RunSummary};
pub use error::{BatchError, DifferError, FetchError, OutputError, KEY_NOT_FOUND_MSG};
pub use keys::load_candidate_keys;
pub use output::{
    write_results, OutputArtifact, OutputLayout, OutputReport, DIFF_ERROR_KEYS_FILE_NAME,
    MUTATION_DIFF_FILE_NAME,
};
pub use partition::balance_load;
pub use progress::{ProgressReporter, ProgressSample};
pub use retry::{RetryExhausted, RetryPolicy, SEND_BATCH_BACKOFF_FACTOR};
pub use state::{AggregateSnapshot, AggregateState};
pub use store::{DocumentStore, MemoryStore, StoreConnector};
pub use types::{CandidateKey, DiffClassification, DiffSet, Document, Side, SideResult, WorkerLocalDiff};
pub use worker::{DifferWorker, WorkerSettings};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for running the differ
    pub use crate::{
        ClusterEndpoint, DiffSet, DifferConfig, DifferError, Document, DocumentStore, FetchError,
        MutationDiffer, RunSummary, Side, StoreConnector,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
