//! Candidate key list input

use crate::error::DifferError;
use crate::types::CandidateKey;
use std::collections::HashSet;
use std::path::Path;

/// Read the candidate key list: a JSON array of strings.
///
/// Repeated keys are dropped after their first occurrence, so each key is
/// fetched, classified and counted once.
///
/// # Errors
/// - `DifferError::KeyListRead` if the file cannot be read
/// - `DifferError::KeyListParse` if it is not a JSON array of strings
pub async fn load_candidate_keys(path: impl AsRef<Path>) -> Result<Vec<CandidateKey>, DifferError> {
    let path = path.as_ref();
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| DifferError::KeyListRead {
            path: path.to_path_buf(),
            source,
        })?;

    let listed: Vec<CandidateKey> =
        serde_json::from_slice(&bytes).map_err(|source| DifferError::KeyListParse {
            path: path.to_path_buf(),
            source,
        })?;

    let listed_count = listed.len();
    let keys = dedup_keys(listed);
    if keys.len() < listed_count {
        tracing::warn!(
            path = %path.display(),
            duplicates = listed_count - keys.len(),
            "dropped repeated keys from key list"
        );
    }
    Ok(keys)
}

fn dedup_keys(listed: Vec<CandidateKey>) -> Vec<CandidateKey> {
    let mut seen = HashSet::with_capacity(listed.len());
    listed.into_iter().filter(|key| seen.insert(key.clone())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn loads_json_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("diffKeys");
        std::fs::write(&path, r#"["k1","k2","k3"]"#).unwrap();

        let keys = load_candidate_keys(&path).await.unwrap();
        assert_eq!(keys, vec!["k1", "k2", "k3"]);
    }

    #[tokio::test]
    async fn repeated_keys_keep_first_occurrence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("diffKeys");
        std::fs::write(&path, r#"["k2","k1","k2","k3","k1"]"#).unwrap();

        let keys = load_candidate_keys(&path).await.unwrap();
        assert_eq!(keys, vec!["k2", "k1", "k3"]);
    }

    #[tokio::test]
    async fn empty_array_is_valid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("diffKeys");
        std::fs::write(&path, "[]").unwrap();

        assert!(load_candidate_keys(&path).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_candidate_keys(dir.path().join("absent")).await.unwrap_err();
        assert!(matches!(err, DifferError::KeyListRead { .. }));
    }

    #[tokio::test]
    async fn malformed_content_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        for bad in [r#"{"k1": 1}"#, "[1, 2]", "[\"k1\"", ""] {
            let path = dir.path().join("diffKeys");
            std::fs::write(&path, bad).unwrap();

            let err = load_candidate_keys(&path).await.unwrap_err();
            assert!(matches!(err, DifferError::KeyListParse { .. }), "input {bad:?}");
        }
    }
}
