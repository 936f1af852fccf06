//! Reference scanning
//!
//! Only `params.uri` and `params.url` holding a string count as references.
//! Scanning works on the typed tree, so it sees exactly the nodes the
//! rewriter later visits; malformed trees are rejected at parse time.

use crate::converter::core::REFERENCE_KEYS;
use crate::document::{Document, Node};
use serde_json::Value;
use std::collections::BTreeSet;

/// Reference values held directly by `node` (not its children)
pub fn node_references(node: &Node) -> impl Iterator<Item = &str> {
    let params = node.params.as_ref();
    REFERENCE_KEYS.into_iter().filter_map(move |key| match params?.get(key) {
        Some(Value::String(reference)) => Some(reference.as_str()),
        _ => None,
    })
}

/// Distinct references anywhere in the tree under `root`
pub fn scan_references(root: &Node) -> BTreeSet<String> {
    let mut references = BTreeSet::new();
    root.walk(&mut |node| {
        references.extend(node_references(node).map(str::to_string));
    });
    references
}

/// Union of the references of every snapshot
pub fn scan_document(document: &Document) -> BTreeSet<String> {
    document
        .roots()
        .into_iter()
        .flat_map(scan_references)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{MultiSnapshot, Snapshot};
    use serde_json::json;

    fn tree() -> Node {
        Node::new("root")
            .child(Node::new("download").param("url", "a.cif"))
            .child(
                Node::new("download")
                    .param("uri", "https://example.org/b.cif")
                    .child(Node::new("component").param("url", "a.cif")),
            )
            .child(Node::new("canvas").param("path", "not-a-reference.cif"))
            .child(Node::new("download").param("url", 42))
    }

    #[test]
    fn test_scan_collects_uri_and_url_once() {
        let refs = scan_references(&tree());
        let expected: BTreeSet<String> = ["a.cif", "https://example.org/b.cif"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(refs, expected);
    }

    #[test]
    fn test_scan_is_idempotent_and_order_independent() {
        let original = tree();
        let mut shuffled = original.clone();
        if let Some(children) = shuffled.children.as_mut() {
            children.reverse();
        }
        assert_eq!(scan_references(&original), scan_references(&original));
        assert_eq!(scan_references(&original), scan_references(&shuffled));
    }

    #[test]
    fn test_node_with_both_keys() {
        let node = Node::new("x").param("uri", "u.cif").param("url", "v.cif");
        let refs: Vec<_> = node_references(&node).collect();
        assert_eq!(refs, vec!["u.cif", "v.cif"]);
    }

    #[test]
    fn test_nested_structures_are_not_references() {
        let node = Node::new("x").param("url", json!({"nested": "y.cif"}));
        assert!(scan_references(&node).is_empty());
    }

    #[test]
    fn test_scan_document_unions_snapshots() {
        let doc = Document::from(MultiSnapshot::new(vec![
            Snapshot::new(Node::new("root").child(Node::new("download").param("url", "a.cif"))),
            Snapshot::new(Node::new("root").child(Node::new("download").param("url", "b.cif"))),
            Snapshot::new(Node::new("root").child(Node::new("download").param("url", "a.cif"))),
        ]));
        let refs: Vec<_> = scan_document(&doc).into_iter().collect();
        assert_eq!(refs, vec!["a.cif", "b.cif"]);
    }
}
