use crate::models::{content_hash, MetadataRecord};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataCheck {
    pub computed_hash: Option<String>,
    pub valid: bool,
}

#[derive(Debug, Default, Clone)]
pub struct MetadataVerifier;

impl MetadataVerifier {
    /// Rehashes the stored canonical string and compares it with the stored
    /// hash. Without a canonical string nothing is computed and the record is
    /// reported invalid.
    pub fn verify(&self, record: &MetadataRecord) -> MetadataCheck {
        let Some(canonical) = record.metadata_canonical.as_deref() else {
            return MetadataCheck {
                computed_hash: None,
                valid: false,
            };
        };
        let computed = content_hash(canonical);
        let valid = record.metadata_hash.as_deref() == Some(computed.as_str());
        MetadataCheck {
            computed_hash: Some(computed),
            valid,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(canonical: Option<&str>, hash: Option<String>) -> MetadataRecord {
        MetadataRecord {
            metadata: json!({"a": 1, "b": 2}),
            metadata_hash: hash,
            metadata_canonical: canonical.map(str::to_string),
            created_at: None,
        }
    }

    #[test]
    fn matching_hash_is_valid() {
        let canonical = r#"{"a":1,"b":2}"#;
        let check = MetadataVerifier.verify(&record(Some(canonical), Some(content_hash(canonical))));
        assert!(check.valid);
        assert_eq!(check.computed_hash, Some(content_hash(canonical)));
    }

    #[test]
    fn one_changed_character_invalidates() {
        let hash = content_hash(r#"{"a":1,"b":2}"#);
        let check = MetadataVerifier.verify(&record(Some(r#"{"a":1,"b":3}"#), Some(hash)));
        assert!(!check.valid);
        assert!(check.computed_hash.is_some());
    }

    #[test]
    fn missing_canonical_skips_hashing() {
        let check = MetadataVerifier.verify(&record(None, Some(content_hash("{}"))));
        assert_eq!(
            check,
            MetadataCheck {
                computed_hash: None,
                valid: false
            }
        );
    }

    #[test]
    fn missing_stored_hash_is_invalid() {
        let check = MetadataVerifier.verify(&record(Some("{}"), None));
        assert!(!check.valid);
        assert_eq!(check.computed_hash, Some(content_hash("{}")));
    }
}
