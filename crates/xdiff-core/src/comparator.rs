//! Same-or-different decision for one key

use crate::types::{DiffClassification, Document, SideResult};

/// Classify a key from its source and target results.
///
/// Returns `None` when the key cannot be decided this round: either side
/// has not completed, or either side failed with an error other than
/// not-found.
#[must_use]
pub fn compare(source: &SideResult, target: &SideResult) -> Option<DiffClassification> {
    let source = source.outcome.as_ref()?;
    let target = target.outcome.as_ref()?;

    match (source, target) {
        (Ok(source_doc), Ok(target_doc)) => Some(if documents_equal(source_doc, target_doc) {
            DiffClassification::Match
        } else {
            DiffClassification::Mismatch {
                source: source_doc.clone(),
                target: target_doc.clone(),
            }
        }),
        (Err(source_err), Ok(target_doc)) if source_err.is_not_found() => {
            Some(DiffClassification::MissingFromSource(target_doc.clone()))
        }
        (Ok(source_doc), Err(target_err)) if target_err.is_not_found() => {
            Some(DiffClassification::MissingFromTarget(source_doc.clone()))
        }
        (Err(source_err), Err(target_err))
            if source_err.is_not_found() && target_err.is_not_found() =>
        {
            Some(DiffClassification::Match)
        }
        _ => None,
    }
}

/// Value, flags, data-type tag and version token must all be equal.
///
/// The version token is part of equality: keys reaching this stage were
/// already flagged by a coarse scan, and an unchanged token on both sides
/// is taken as proof the documents are the same.
#[inline]
#[must_use]
pub fn documents_equal(source: &Document, target: &Document) -> bool {
    source.value == target.value
        && source.flags == target.flags
        && source.datatype == target.datatype
        && source.cas == target.cas
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;

    fn found(doc: Document) -> SideResult {
        SideResult::completed("k", Ok(doc))
    }

    fn not_found() -> SideResult {
        SideResult::completed("k", Err(FetchError::NotFound))
    }

    fn failed() -> SideResult {
        SideResult::completed("k", Err(FetchError::other("temporary failure")))
    }

    fn doc() -> Document {
        Document::new("{\"a\":1}").with_flags(1).with_datatype(1).with_cas(99)
    }

    #[test]
    fn identical_documents_match() {
        assert_eq!(compare(&found(doc()), &found(doc())), Some(DiffClassification::Match));
    }

    #[test]
    fn missing_from_source_carries_target_document() {
        let target = doc().with_cas(5);
        assert_eq!(
            compare(&not_found(), &found(target.clone())),
            Some(DiffClassification::MissingFromSource(target))
        );
    }

    #[test]
    fn missing_from_target_carries_source_document() {
        assert_eq!(
            compare(&found(doc()), &not_found()),
            Some(DiffClassification::MissingFromTarget(doc()))
        );
    }

    #[test]
    fn each_field_participates_in_equality() {
        let variants = [
            Document { value: b"other".to_vec(), ..doc() },
            doc().with_flags(2),
            doc().with_datatype(0),
            doc().with_cas(100),
        ];
        for variant in variants {
            assert_eq!(
                compare(&found(doc()), &found(variant.clone())),
                Some(DiffClassification::Mismatch {
                    source: doc(),
                    target: variant,
                })
            );
        }
    }

    #[test]
    fn pending_side_is_skipped() {
        let pending = SideResult::pending("k");
        assert_eq!(compare(&pending, &found(doc())), None);
        assert_eq!(compare(&found(doc()), &pending), None);
        assert_eq!(compare(&pending, &SideResult::pending("k")), None);
    }

    #[test]
    fn other_errors_are_skipped() {
        assert_eq!(compare(&failed(), &found(doc())), None);
        assert_eq!(compare(&found(doc()), &failed()), None);
        assert_eq!(compare(&not_found(), &failed()), None);
        assert_eq!(compare(&failed(), &not_found()), None);
        assert_eq!(compare(&failed(), &failed()), None);
    }

    #[test]
    fn absent_on_both_sides_matches() {
        assert_eq!(compare(&not_found(), &not_found()), Some(DiffClassification::Match));
    }

    #[test]
    fn not_found_message_counts_as_sentinel() {
        let source = SideResult::completed("k", Err(FetchError::other("key not found")));
        assert!(matches!(
            compare(&source, &found(doc())),
            Some(DiffClassification::MissingFromSource(_))
        ));
    }
}
