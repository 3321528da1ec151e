//! Core types for the mutation differ
//!
//! Defines the data model shared by every stage:
//! - Candidate keys and cluster sides
//! - Fetched documents and per-side fetch results
//! - Diff classifications and diff sets

use crate::error::FetchError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Key flagged as possibly divergent by the upstream scan
pub type CandidateKey = String;

/// One of the two compared clusters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// Replication source
    Source,
    /// Replication target
    Target,
}

impl Side {
    /// Lowercase name used in logs
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Side::Source => "source",
            Side::Target => "target",
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Document snapshot returned by a store
///
/// Serializes with the field names the result files have always used,
/// with the value encoded as base64.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Document {
    /// Raw document body
    #[serde(with = "base64_bytes")]
    pub value: Vec<u8>,
    /// User flags
    pub flags: u32,
    /// Data-type tag (JSON, snappy, xattr bits)
    pub datatype: u8,
    /// Version token
    pub cas: u64,
}

impl Document {
    /// Create document with zeroed metadata
    #[inline]
    #[must_use]
    pub fn new(value: impl Into<Vec<u8>>) -> Self {
        Self {
            value: value.into(),
            flags: 0,
            datatype: 0,
            cas: 0,
        }
    }

    /// With flags
    #[inline]
    #[must_use]
    pub fn with_flags(mut self, flags: u32) -> Self {
        self.flags = flags;
        self
    }

    /// With data-type tag
    #[inline]
    #[must_use]
    pub fn with_datatype(mut self, datatype: u8) -> Self {
        self.datatype = datatype;
        self
    }

    /// With version token
    #[inline]
    #[must_use]
    pub fn with_cas(mut self, cas: u64) -> Self {
        self.cas = cas;
        self
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

/// Result of fetching one key from one side
///
/// Starts out pending and is completed exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SideResult {
    /// Key this result belongs to
    pub key: CandidateKey,
    /// `None` until the fetch has completed
    pub outcome: Option<Result<Document, FetchError>>,
}

impl SideResult {
    /// Placeholder for a fetch that has not completed
    #[inline]
    #[must_use]
    pub fn pending(key: impl Into<CandidateKey>) -> Self {
        Self {
            key: key.into(),
            outcome: None,
        }
    }

    /// Completed fetch
    #[inline]
    #[must_use]
    pub fn completed(key: impl Into<CandidateKey>, outcome: Result<Document, FetchError>) -> Self {
        Self {
            key: key.into(),
            outcome: Some(outcome),
        }
    }

    /// Whether the fetch has completed
    #[inline]
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.outcome.is_some()
    }

    /// Fetched document, if the fetch succeeded
    #[inline]
    #[must_use]
    pub fn document(&self) -> Option<&Document> {
        self.outcome.as_ref().and_then(|outcome| outcome.as_ref().ok())
    }

    /// Fetch error, if the fetch failed
    #[inline]
    #[must_use]
    pub fn error(&self) -> Option<&FetchError> {
        self.outcome.as_ref().and_then(|outcome| outcome.as_ref().err())
    }
}

/// Outcome of comparing both sides of one key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffClassification {
    /// Absent on the source, present on the target (carries the target document)
    MissingFromSource(Document),
    /// Present on the source, absent on the target (carries the source document)
    MissingFromTarget(Document),
    /// Present on both sides with differing content
    Mismatch {
        /// Source document
        source: Document,
        /// Target document
        target: Document,
    },
    /// Identical on both sides
    Match,
}

/// The three reported diff mappings
///
/// Built per worker and merged into the run-wide aggregate. Serializes to
/// the diff-details file layout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSet {
    /// key → `[source document, target document]`
    #[serde(rename = "Mismatch")]
    pub mismatch: HashMap<CandidateKey, [Document; 2]>,
    /// key → target document
    #[serde(rename = "MissingFromSource")]
    pub missing_from_source: HashMap<CandidateKey, Document>,
    /// key → source document
    #[serde(rename = "MissingFromTarget")]
    pub missing_from_target: HashMap<CandidateKey, Document>,
}

/// Diff produced by a single worker over its partition
pub type WorkerLocalDiff = DiffSet;

impl DiffSet {
    /// Record a classification; matches are dropped
    pub fn record(&mut self, key: CandidateKey, classification: DiffClassification) {
        match classification {
            DiffClassification::MissingFromSource(target) => {
                self.missing_from_source.insert(key, target);
            }
            DiffClassification::MissingFromTarget(source) => {
                self.missing_from_target.insert(key, source);
            }
            DiffClassification::Mismatch { source, target } => {
                self.mismatch.insert(key, [source, target]);
            }
            DiffClassification::Match => {}
        }
    }

    /// Merge another set into this one; later entries win per key
    pub fn extend(&mut self, other: DiffSet) {
        self.mismatch.extend(other.mismatch);
        self.missing_from_source.extend(other.missing_from_source);
        self.missing_from_target.extend(other.missing_from_target);
    }

    /// Total number of reported keys
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.mismatch.len() + self.missing_from_source.len() + self.missing_from_target.len()
    }

    /// Whether no key was reported
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the key appears in any of the three mappings
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.mismatch.contains_key(key)
            || self.missing_from_source.contains_key(key)
            || self.missing_from_target.contains_key(key)
    }

    /// Every reported key, in no particular order
    #[must_use]
    pub fn keys(&self) -> Vec<CandidateKey> {
        self.missing_from_source
            .keys()
            .chain(self.missing_from_target.keys())
            .chain(self.mismatch.keys())
            .cloned()
            .collect()
    }
}
