//! Incoming JSON:API documents for preprint writes.

use serde::Deserialize;
use thiserror::Error;

pub const PREPRINT_RESOURCE_TYPE: &str = "preprints";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DocumentError {
    #[error("This field is required.")]
    MissingType,
    #[error(
        "This resource has a type of \"preprints\", but you set the json body's type field to \"{found}\". You probably need to change the type field to match the resource's type."
    )]
    TypeMismatch { found: String },
    #[error(
        "The id you used in the URL, \"{expected}\", does not match the id you used in the json body's id field, \"{found}\". The object \"{expected}\" exists, otherwise you'd get a 404, so most likely you need to change the id field to match."
    )]
    IdMismatch { expected: String, found: String },
}

#[derive(Debug, Deserialize)]
pub struct PreprintDocument {
    pub data: PreprintResourceInput,
}

#[derive(Debug, Deserialize)]
pub struct PreprintResourceInput {
    #[serde(rename = "type")]
    pub resource_type: Option<String>,
    pub id: Option<String>,
    #[serde(default)]
    pub attributes: PreprintAttributesInput,
    #[serde(default)]
    pub relationships: PreprintRelationshipsInput,
}

/// Writable attributes; read-only and unknown members are ignored.
#[derive(Debug, Default, Deserialize)]
pub struct PreprintAttributesInput {
    pub title: Option<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub tags: Option<Vec<String>>,
    pub provider: Option<String>,
    pub subjects: Option<Vec<String>>,
    pub doi: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PreprintRelationshipsInput {
    pub primary_file: Option<RelationshipInput>,
}

#[derive(Debug, Deserialize)]
pub struct RelationshipInput {
    pub data: Option<RelationshipData>,
}

#[derive(Debug, Deserialize)]
pub struct RelationshipData {
    #[serde(rename = "type")]
    pub resource_type: Option<String>,
    pub id: String,
}

/// Validated field changes extracted from a document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreprintChanges {
    pub node_id: Option<String>,
    pub primary_file: Option<String>,
    pub subjects: Option<Vec<String>>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub provider: Option<String>,
    pub doi: Option<String>,
}

impl PreprintDocument {
    /// Check the resource type (and, for updates, the id) and extract the changes.
    pub fn into_changes(self, url_id: Option<&str>) -> Result<PreprintChanges, DocumentError> {
        let PreprintResourceInput {
            resource_type,
            id,
            attributes,
            relationships,
        } = self.data;

        match resource_type.as_deref() {
            None => return Err(DocumentError::MissingType),
            Some(PREPRINT_RESOURCE_TYPE) => {}
            Some(other) => {
                return Err(DocumentError::TypeMismatch {
                    found: other.to_string(),
                });
            }
        }

        if let (Some(expected), Some(found)) = (url_id, id.as_deref())
            && expected != found
        {
            return Err(DocumentError::IdMismatch {
                expected: expected.to_string(),
                found: found.to_string(),
            });
        }

        let primary_file = relationships
            .primary_file
            .and_then(|relationship| relationship.data)
            .map(|data| data.id)
            .filter(|id| !id.trim().is_empty());

        Ok(PreprintChanges {
            node_id: id.or_else(|| url_id.map(str::to_string)),
            primary_file,
            subjects: attributes.subjects,
            title: attributes.title,
            description: attributes.abstract_text,
            tags: attributes.tags,
            provider: attributes.provider,
            doi: attributes.doi,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> PreprintDocument {
        serde_json::from_value(value).expect("document parses")
    }

    #[test]
    fn extracts_attributes_and_primary_file() {
        let changes = parse(json!({
            "data": {
                "type": "preprints",
                "id": "abc12",
                "attributes": {
                    "title": "New",
                    "abstract": "Summary",
                    "subjects": ["s1"],
                    "tags": ["a", "b"],
                    "date_created": "ignored"
                },
                "relationships": {
                    "primary_file": {"data": {"type": "primary", "id": "file1"}}
                }
            }
        }))
        .into_changes(None)
        .expect("valid");

        assert_eq!(changes.node_id.as_deref(), Some("abc12"));
        assert_eq!(changes.primary_file.as_deref(), Some("file1"));
        assert_eq!(changes.subjects, Some(vec!["s1".to_string()]));
        assert_eq!(changes.description.as_deref(), Some("Summary"));
        assert_eq!(changes.tags, Some(vec!["a".to_string(), "b".to_string()]));
        assert_eq!(changes.doi, None);
    }

    #[test]
    fn type_must_match_preprints() {
        let err = parse(json!({"data": {"type": "nodes", "id": "abc12"}}))
            .into_changes(None)
            .expect_err("wrong type");
        assert_eq!(
            err,
            DocumentError::TypeMismatch {
                found: "nodes".to_string()
            }
        );

        let err = parse(json!({"data": {"id": "abc12"}}))
            .into_changes(None)
            .expect_err("missing type");
        assert_eq!(err, DocumentError::MissingType);
    }

    #[test]
    fn update_id_must_match_url() {
        let err = parse(json!({"data": {"type": "preprints", "id": "other"}}))
            .into_changes(Some("abc12"))
            .expect_err("id mismatch");
        assert!(matches!(err, DocumentError::IdMismatch { .. }));

        let changes = parse(json!({"data": {"type": "preprints"}}))
            .into_changes(Some("abc12"))
            .expect("url id fills in");
        assert_eq!(changes.node_id.as_deref(), Some("abc12"));
    }

    #[test]
    fn null_relationship_data_means_no_primary_file() {
        let changes = parse(json!({
            "data": {
                "type": "preprints",
                "relationships": {"primary_file": {"data": null}}
            }
        }))
        .into_changes(None)
        .expect("valid");
        assert_eq!(changes.primary_file, None);
    }
}
