//! MVSJ document parser
//!
//! Parses JSON text into a [`Document`], checking structural shape first so
//! that a missing `root` or `snapshots` is reported as such rather than as a
//! generic deserialization failure.

use super::{Document, MultiSnapshot, Snapshot};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

/// `kind` tag of a multi-state document
pub const MULTIPLE_KIND: &str = "multiple";

/// Errors that can occur while reading a document
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("Failed to read document '{path}'")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Document must be a JSON object, found {found}")]
    NotAnObject { found: &'static str },

    #[error("Document is missing its 'root' node")]
    MissingRoot,

    #[error("Multi-state document is missing its 'snapshots' array")]
    MissingSnapshots,

    #[error("Snapshot {index} is missing its 'root' node")]
    SnapshotMissingRoot { index: usize },

    #[error("Malformed {location}: {source}")]
    Malformed {
        location: String,
        #[source]
        source: serde_json::Error,
    },
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Parser for MVSJ documents
#[derive(Debug, Default, Clone)]
pub struct DocumentParser;

impl DocumentParser {
    pub fn new() -> Self {
        Self
    }

    pub fn parse_str(&self, json: &str) -> Result<Document, DocumentError> {
        let value: Value = serde_json::from_str(json)?;
        self.parse_value(value)
    }

    pub fn parse_path(&self, path: &Path) -> Result<Document, DocumentError> {
        let text = std::fs::read_to_string(path).map_err(|source| DocumentError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Parsing document {} ({} bytes)", path.display(), text.len());
        self.parse_str(&text)
    }

    pub fn parse_value(&self, value: Value) -> Result<Document, DocumentError> {
        let object = match &value {
            Value::Object(object) => object,
            other => {
                return Err(DocumentError::NotAnObject {
                    found: json_type_name(other),
                });
            }
        };

        let is_multiple = object.get("kind").and_then(Value::as_str) == Some(MULTIPLE_KIND);
        if !is_multiple {
            if !object.contains_key("root") {
                return Err(DocumentError::MissingRoot);
            }
            let snapshot: Snapshot =
                serde_json::from_value(value).map_err(|source| DocumentError::Malformed {
                    location: "document".to_string(),
                    source,
                })?;
            return Ok(Document::Single(snapshot));
        }

        let snapshots = match object.get("snapshots") {
            Some(Value::Array(snapshots)) => snapshots,
            _ => return Err(DocumentError::MissingSnapshots),
        };
        for (index, snapshot) in snapshots.iter().enumerate() {
            let has_root = snapshot
                .as_object()
                .is_some_and(|s| s.contains_key("root"));
            if !has_root {
                return Err(DocumentError::SnapshotMissingRoot { index });
            }
        }

        let multi: MultiSnapshot =
            serde_json::from_value(value).map_err(|source| DocumentError::Malformed {
                location: "multi-state document".to_string(),
                source,
            })?;
        Ok(Document::Multiple(multi))
    }
}

impl Document {
    pub fn from_json_str(json: &str) -> Result<Self, DocumentError> {
        DocumentParser::new().parse_str(json)
    }

    pub fn from_value(value: Value) -> Result<Self, DocumentError> {
        DocumentParser::new().parse_value(value)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, DocumentError> {
        DocumentParser::new().parse_path(path.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_single_state() {
        let json = r#"{
            "root": {
                "kind": "root",
                "children": [{"kind": "download", "params": {"url": "local.cif"}}]
            },
            "metadata": {"version": "1", "title": "Example"}
        }"#;

        let doc = Document::from_json_str(json).expect("Failed to parse document");
        let Document::Single(snapshot) = &doc else {
            panic!("Expected single-state document");
        };
        assert_eq!(snapshot.root.kind, "root");
        assert_eq!(snapshot.metadata.as_ref().unwrap()["title"], json!("Example"));
    }

    #[test]
    fn test_parse_multiple_state() {
        let value = json!({
            "kind": "multiple",
            "snapshots": [
                {"root": {"kind": "root"}, "metadata": {"key": "a"}},
                {"root": {"kind": "root"}, "metadata": {"key": "b"}}
            ],
            "metadata": {"version": "1"}
        });

        let doc = Document::from_value(value).unwrap();
        assert!(doc.is_multiple());
        assert_eq!(doc.roots().len(), 2);
    }

    #[test]
    fn test_missing_root() {
        let err = Document::from_value(json!({"metadata": {}})).unwrap_err();
        assert!(matches!(err, DocumentError::MissingRoot));
    }

    #[test]
    fn test_missing_snapshots() {
        let err = Document::from_value(json!({"kind": "multiple", "metadata": {}})).unwrap_err();
        assert!(matches!(err, DocumentError::MissingSnapshots));

        let err = Document::from_value(json!({"kind": "multiple", "snapshots": {}})).unwrap_err();
        assert!(matches!(err, DocumentError::MissingSnapshots));
    }

    #[test]
    fn test_snapshot_missing_root() {
        let value = json!({
            "kind": "multiple",
            "snapshots": [{"root": {"kind": "root"}}, {"metadata": {}}]
        });
        let err = Document::from_value(value).unwrap_err();
        assert!(matches!(err, DocumentError::SnapshotMissingRoot { index: 1 }));
    }

    #[test]
    fn test_malformed_children() {
        let value = json!({"root": {"kind": "root", "children": "nope"}});
        let err = Document::from_value(value).unwrap_err();
        assert!(matches!(err, DocumentError::Malformed { .. }));
    }

    #[test]
    fn test_not_an_object() {
        let err = Document::from_json_str("[1, 2]").unwrap_err();
        assert!(matches!(err, DocumentError::NotAnObject { found: "array" }));
    }

    #[test]
    fn test_canonical_json_is_compact_and_stable() {
        let json = r#"{ "root": { "kind": "root", "params": {"b": 1, "a": 2} },
                        "metadata": { "title": "t" } }"#;
        let doc = Document::from_json_str(json).unwrap();
        let first = doc.to_canonical_json().unwrap();
        assert_eq!(
            first,
            r#"{"root":{"kind":"root","params":{"b":1,"a":2}},"metadata":{"title":"t"}}"#
        );

        let reparsed = Document::from_json_str(&first).unwrap();
        assert_eq!(reparsed.to_canonical_json().unwrap(), first);
    }

    #[test]
    fn test_canonical_json_omits_null_optional_fields() {
        let json = r#"{"root":{"kind":"root","params":null,"children":null},"metadata":null}"#;
        let doc = Document::from_json_str(json).unwrap();
        assert_eq!(doc.to_canonical_json().unwrap(), r#"{"root":{"kind":"root"}}"#);
    }
}
