//! Reference rewriting

use crate::converter::core::{ReferenceMapping, REFERENCE_KEYS};
use crate::document::{Document, Node};
use serde_json::Value;

/// Replace mapped `uri`/`url` values under `root`; returns how many changed
///
/// Values with no mapping entry are left untouched.
pub fn rewrite_references(root: &mut Node, mapping: &ReferenceMapping) -> usize {
    let mut rewritten = 0;
    root.walk_mut(&mut |node| {
        let Some(params) = node.params.as_mut() else {
            return;
        };
        for key in REFERENCE_KEYS {
            if let Some(Value::String(reference)) = params.get_mut(key) {
                if let Some(name) = mapping.get(reference.as_str()) {
                    if name != reference.as_str() {
                        *reference = name.to_string();
                        rewritten += 1;
                    }
                }
            }
        }
    });
    rewritten
}

/// Copy of `document` with every snapshot rewritten through `mapping`
pub fn rewrite_document(document: &Document, mapping: &ReferenceMapping) -> Document {
    let mut rewritten = document.clone();
    for root in rewritten.roots_mut() {
        rewrite_references(root, mapping);
    }
    rewritten
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::scan::scan_references;
    use crate::document::Snapshot;

    fn mapping() -> ReferenceMapping {
        let mut mapping = ReferenceMapping::new();
        mapping.insert("https://example.org/x.cif", "x.cif");
        mapping.insert("https://mirror.org/x.cif", "x_1.cif");
        mapping.insert("local.cif", "local.cif");
        mapping
    }

    #[test]
    fn test_rewrite_replaces_mapped_references() {
        let mut root = Node::new("root")
            .child(Node::new("download").param("url", "https://example.org/x.cif"))
            .child(
                Node::new("download")
                    .param("uri", "https://mirror.org/x.cif")
                    .child(Node::new("download").param("url", "https://other.org/y.cif")),
            )
            .child(Node::new("download").param("url", "local.cif"));

        assert_eq!(rewrite_references(&mut root, &mapping()), 2);

        let refs: Vec<_> = scan_references(&root).into_iter().collect();
        assert_eq!(refs, vec!["https://other.org/y.cif", "local.cif", "x.cif", "x_1.cif"]);
    }

    #[test]
    fn test_other_keys_are_untouched() {
        let mut root = Node::new("x").param("label", "https://example.org/x.cif");
        assert_eq!(rewrite_references(&mut root, &mapping()), 0);
        assert_eq!(
            root.params.unwrap()["label"],
            serde_json::json!("https://example.org/x.cif")
        );
    }

    #[test]
    fn test_rewrite_document_leaves_original_alone() {
        let original = Document::from(Snapshot::new(
            Node::new("root").child(Node::new("download").param("url", "https://example.org/x.cif")),
        ));
        let rewritten = rewrite_document(&original, &mapping());

        assert!(scan_references(original.roots()[0]).contains("https://example.org/x.cif"));
        assert!(scan_references(rewritten.roots()[0]).contains("x.cif"));
    }
}
