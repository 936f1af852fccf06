//! Visualization-state document tree
//!
//! A document is either a single state (`root` + `metadata`) or a
//! multi-state document holding several snapshots. Nodes are opaque to this
//! crate apart from their shape: a `kind` tag, optional `params` and optional
//! `children`. Any other node or snapshot fields are carried through as-is.

pub mod parser;

pub use parser::{DocumentParser, MULTIPLE_KIND};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A tagged tree element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<Node>>,
    /// Node fields this crate does not interpret (`ref`, `custom`, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Node {
    pub fn new<S: Into<String>>(kind: S) -> Self {
        Self {
            kind: kind.into(),
            params: None,
            children: None,
            extra: Map::new(),
        }
    }

    /// Set a parameter, creating the params map if needed
    pub fn param<K: Into<String>, V: Into<Value>>(mut self, key: K, value: V) -> Self {
        self.params
            .get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        self
    }

    /// Append a child node
    pub fn child(mut self, child: Node) -> Self {
        self.children.get_or_insert_with(Vec::new).push(child);
        self
    }

    /// Visit this node and all descendants depth-first, pre-order
    pub fn walk<'a, F>(&'a self, visit: &mut F)
    where
        F: FnMut(&'a Node),
    {
        visit(self);
        if let Some(children) = &self.children {
            for child in children {
                child.walk(visit);
            }
        }
    }

    /// Mutable counterpart of [`Node::walk`]
    pub fn walk_mut<F>(&mut self, visit: &mut F)
    where
        F: FnMut(&mut Node),
    {
        visit(self);
        if let Some(children) = &mut self.children {
            for child in children {
                child.walk_mut(visit);
            }
        }
    }

    /// Number of nodes in this sub-tree, including self
    pub fn node_count(&self) -> usize {
        let mut count = 0;
        self.walk(&mut |_| count += 1);
        count
    }

    pub fn is_leaf(&self) -> bool {
        self.children.as_ref().is_none_or(|c| c.is_empty())
    }
}

/// One independent state: a root node plus caller-defined metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub root: Node,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Snapshot {
    pub fn new(root: Node) -> Self {
        Self {
            root,
            metadata: None,
            extra: Map::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// A multi-state document (`kind: "multiple"`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiSnapshot {
    pub kind: String,
    pub snapshots: Vec<Snapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MultiSnapshot {
    pub fn new(snapshots: Vec<Snapshot>) -> Self {
        Self {
            kind: MULTIPLE_KIND.to_string(),
            snapshots,
            metadata: None,
            extra: Map::new(),
        }
    }
}

/// An MVSJ document in either of its two shapes
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Document {
    Single(Snapshot),
    Multiple(MultiSnapshot),
}

impl Document {
    pub fn is_multiple(&self) -> bool {
        matches!(self, Document::Multiple(_))
    }

    /// Root node of every snapshot, in document order
    pub fn roots(&self) -> Vec<&Node> {
        match self {
            Document::Single(snapshot) => vec![&snapshot.root],
            Document::Multiple(multi) => multi.snapshots.iter().map(|s| &s.root).collect(),
        }
    }

    pub fn roots_mut(&mut self) -> Vec<&mut Node> {
        match self {
            Document::Single(snapshot) => vec![&mut snapshot.root],
            Document::Multiple(multi) => multi.snapshots.iter_mut().map(|s| &mut s.root).collect(),
        }
    }

    /// Compact JSON with keys in insertion order
    ///
    /// An explicit `null` for `params`, `children` or `metadata` reads the same
    /// as an absent field and is omitted here.
    pub fn to_canonical_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl From<Snapshot> for Document {
    fn from(snapshot: Snapshot) -> Self {
        Document::Single(snapshot)
    }
}

impl From<MultiSnapshot> for Document {
    fn from(multi: MultiSnapshot) -> Self {
        Document::Multiple(multi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_tree() -> Node {
        Node::new("root")
            .child(
                Node::new("download")
                    .param("url", "a.cif")
                    .child(Node::new("parse").param("format", "mmcif")),
            )
            .child(Node::new("download").param("url", "b.cif"))
    }

    #[test]
    fn test_walk_is_preorder() {
        let tree = sample_tree();
        let mut kinds = Vec::new();
        tree.walk(&mut |node| kinds.push(node.kind.clone()));
        assert_eq!(kinds, vec!["root", "download", "parse", "download"]);
        assert_eq!(tree.node_count(), 4);
    }

    #[test]
    fn test_walk_mut_touches_every_node() {
        let mut tree = sample_tree();
        tree.walk_mut(&mut |node| node.kind.make_ascii_uppercase());
        let mut kinds = Vec::new();
        tree.walk(&mut |node| kinds.push(node.kind.clone()));
        assert!(kinds.iter().all(|k| k.chars().all(|c| c.is_ascii_uppercase())));
    }

    #[test]
    fn test_unknown_node_fields_round_trip() {
        let value = json!({
            "kind": "root",
            "children": [{"kind": "camera", "ref": "cam", "params": {"target": [0, 0, 0]}}]
        });
        let node: Node = serde_json::from_value(value).unwrap();
        let child = &node.children.as_ref().unwrap()[0];
        assert_eq!(child.extra.get("ref"), Some(&json!("cam")));

        let out = serde_json::to_value(&node).unwrap();
        assert_eq!(out["children"][0]["ref"], json!("cam"));
        assert!(out.get("params").is_none());
    }

    #[test]
    fn test_params_preserve_key_order() {
        let text = r#"{"kind":"x","params":{"zeta":1,"alpha":2,"mid":3}}"#;
        let node: Node = serde_json::from_str(text).unwrap();
        assert_eq!(serde_json::to_string(&node).unwrap(), text);
    }

    #[test]
    fn test_roots_of_multiple_document() {
        let doc = Document::from(MultiSnapshot::new(vec![
            Snapshot::new(Node::new("root")),
            Snapshot::new(sample_tree()),
        ]));
        assert!(doc.is_multiple());
        assert_eq!(doc.roots().len(), 2);
        assert_eq!(doc.roots()[1].node_count(), 4);
    }
}
