//! Result files
//!
//! Three JSON files are written at the end of a run: the diff keys, the
//! error keys and the per-key diff details. Each write is attempted on its
//! own; a failure is logged and reported but never stops the others.

use crate::error::OutputError;
use crate::state::AggregateSnapshot;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// File name of the error-keys output
pub const DIFF_ERROR_KEYS_FILE_NAME: &str = "diffKeysWithError";

/// File name of the diff-details output
pub const MUTATION_DIFF_FILE_NAME: &str = "mutationDiffDetails";

/// The three output files
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputArtifact {
    /// Keys classified as different
    DiffKeys,
    /// Keys that could not be checked
    ErrorKeys,
    /// Side-by-side documents of every diff
    DiffDetails,
}

impl std::fmt::Display for OutputArtifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::DiffKeys => "diff keys",
            Self::ErrorKeys => "error keys",
            Self::DiffDetails => "diff details",
        })
    }
}

/// Output paths
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    dir: PathBuf,
    diff_keys_file: String,
}

impl OutputLayout {
    /// Create layout under `dir`
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, diff_keys_file: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            diff_keys_file: diff_keys_file.into(),
        }
    }

    /// Path of one artifact
    #[must_use]
    pub fn path(&self, artifact: OutputArtifact) -> PathBuf {
        match artifact {
            OutputArtifact::DiffKeys => self.dir.join(&self.diff_keys_file),
            OutputArtifact::ErrorKeys => self.dir.join(DIFF_ERROR_KEYS_FILE_NAME),
            OutputArtifact::DiffDetails => self.dir.join(MUTATION_DIFF_FILE_NAME),
        }
    }
}

/// What happened to each output file
#[derive(Debug, Default)]
pub struct OutputReport {
    /// Files written successfully
    pub written: Vec<PathBuf>,
    /// Files that failed, with the reason
    pub failures: Vec<(OutputArtifact, OutputError)>,
}

impl OutputReport {
    /// Whether every file was written
    #[inline]
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    fn record(&mut self, artifact: OutputArtifact, path: PathBuf, result: Result<(), OutputError>) {
        match result {
            Ok(()) => self.written.push(path),
            Err(err) => {
                tracing::error!(artifact = %artifact, error = %err, "error writing {artifact}");
                self.failures.push((artifact, err));
            }
        }
    }
}

/// Write all three result files.
pub async fn write_results(layout: &OutputLayout, results: &AggregateSnapshot) -> OutputReport {
    let mut report = OutputReport::default();

    let path = layout.path(OutputArtifact::DiffKeys);
    let written = write_json(&path, &results.diff_keys()).await;
    report.record(OutputArtifact::DiffKeys, path, written);

    let path = layout.path(OutputArtifact::ErrorKeys);
    let written = write_json(&path, &results.keys_with_error).await;
    report.record(OutputArtifact::ErrorKeys, path, written);

    let path = layout.path(OutputArtifact::DiffDetails);
    let written = write_json(&path, &results.diffs).await;
    report.record(OutputArtifact::DiffDetails, path, written);

    report
}

async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), OutputError> {
    let bytes = serde_json::to_vec(value)?;
    tokio::fs::write(path, bytes)
        .await
        .map_err(|source| OutputError::io_error(path, source))
}
