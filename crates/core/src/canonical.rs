//! Entity canonicalization
//!
//! Validates an entity description and produces the exact bytes its id is
//! computed over. Anyone verifying an id must reproduce these bytes, so the
//! encoding is fixed:
//!
//! - compact JSON, no insignificant whitespace
//! - top-level fields in `version, type, pointers, timestamp, content, metadata` order
//! - absent `content` / `metadata` omitted entirely
//! - object keys inside `metadata` in insertion order, as written by the author

use std::collections::HashSet;

use crate::entity::{
    EntityContentItemReference, EntityDocument, EntityMetadata, EntityType, EntityVersion,
    Pointer, Timestamp,
};
use crate::error::BuildError;

/// Validate the inputs and serialize the resulting document
///
/// Fails with [`BuildError::InvalidPointerSet`] on an empty pointer list and
/// with [`BuildError::DuplicateFileName`] when two content entries share a
/// name ignoring case.
pub fn canonicalize(
    entity_type: EntityType,
    pointers: Vec<Pointer>,
    timestamp: Timestamp,
    content: Option<Vec<EntityContentItemReference>>,
    metadata: Option<EntityMetadata>,
) -> Result<(EntityDocument, Vec<u8>), BuildError> {
    if pointers.is_empty() {
        return Err(BuildError::InvalidPointerSet);
    }

    if let Some(content) = &content {
        check_file_names(content)?;
    }

    let document = EntityDocument {
        version: EntityVersion::CURRENT,
        entity_type,
        pointers,
        timestamp,
        content,
        metadata,
    };

    let bytes = to_canonical_bytes(&document)?;
    Ok((document, bytes))
}

/// Serialize an already-built document
pub fn to_canonical_bytes(document: &EntityDocument) -> Result<Vec<u8>, BuildError> {
    Ok(serde_json::to_vec(document)?)
}

/// Reject the first file whose lower-cased name was already seen
fn check_file_names(content: &[EntityContentItemReference]) -> Result<(), BuildError> {
    let mut used = HashSet::with_capacity(content.len());
    for item in content {
        if !used.insert(item.file.to_lowercase()) {
            return Err(BuildError::DuplicateFileName(item.file.clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::ContentFileHash;

    fn item(file: &str) -> EntityContentItemReference {
        EntityContentItemReference {
            file: file.to_string(),
            hash: ContentFileHash::new(format!("hash-of-{file}")),
        }
    }

    #[test]
    fn test_field_order_and_compact_output() {
        let (_, bytes) = canonicalize(
            EntityType::Scene,
            vec!["0,0".to_string(), "0,1".to_string()],
            1000,
            Some(vec![item("scene.json")]),
            Some(serde_json::json!({"z": 1, "a": {"y": true, "b": null}})),
        )
        .unwrap();

        assert_eq!(
            std::str::from_utf8(&bytes).unwrap(),
            concat!(
                r#"{"version":"v3","type":"scene","pointers":["0,0","0,1"],"timestamp":1000,"#,
                r#""content":[{"file":"scene.json","hash":"hash-of-scene.json"}],"#,
                r#""metadata":{"z":1,"a":{"y":true,"b":null}}}"#
            )
        );
    }

    #[test]
    fn test_metadata_key_order_survives_parsing() {
        let metadata: EntityMetadata =
            serde_json::from_str(r#"{"name":"Plaza","description":"A square","id":7}"#).unwrap();
        let (_, bytes) =
            canonicalize(EntityType::Scene, vec!["0,0".to_string()], 1, None, Some(metadata))
                .unwrap();

        assert!(
            std::str::from_utf8(&bytes)
                .unwrap()
                .ends_with(r#""metadata":{"name":"Plaza","description":"A square","id":7}}"#)
        );
    }

    #[test]
    fn test_optional_fields_omitted() {
        let (document, bytes) =
            canonicalize(EntityType::Profile, vec!["0xabc".to_string()], 5, None, None).unwrap();

        assert_eq!(document.version, EntityVersion::V3);
        assert_eq!(
            bytes,
            br#"{"version":"v3","type":"profile","pointers":["0xabc"],"timestamp":5}"#
        );
    }

    #[test]
    fn test_empty_content_is_kept() {
        let (_, bytes) =
            canonicalize(EntityType::Profile, vec!["0xabc".to_string()], 5, Some(vec![]), None)
                .unwrap();
        assert!(std::str::from_utf8(&bytes).unwrap().ends_with(r#""content":[]}"#));
    }

    #[test]
    fn test_duplicate_reported_in_either_order() {
        for (first, second) in [("Scene.json", "scene.json"), ("scene.json", "Scene.json")] {
            let err = canonicalize(
                EntityType::Scene,
                vec!["0,0".to_string()],
                1,
                Some(vec![item(first), item("other.png"), item(second)]),
                None,
            )
            .unwrap_err();

            match err {
                BuildError::DuplicateFileName(name) => assert_eq!(name, second),
                other => panic!("Expected DuplicateFileName, got: {other}"),
            }
        }
    }

    #[test]
    fn test_empty_pointers_checked_before_names() {
        let err = canonicalize(
            EntityType::Scene,
            vec![],
            1,
            Some(vec![item("a"), item("A")]),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, BuildError::InvalidPointerSet));
    }
}
