//! Core types used throughout the converter
//!
//! This module contains the fundamental types that all other converter
//! modules depend on: errors, progress events, file helpers and the
//! reference mapping that ties resolution to rewriting and packaging.

pub mod error;
pub mod files;
pub mod progress;

pub use error::{
    ConvertError, DownloadFailures, ErrorKind, FetchError, FetchFailure, FileOperation, Result,
};
pub use progress::{
    ConvertEvent, IntoProgressCallback, NullProgressReporter, ProgressCallback, ProgressReporter,
    TracingProgressReporter,
};

use std::collections::BTreeMap;
use std::path::PathBuf;

/// Name of the document entry inside an MVSX archive
pub const INDEX_ENTRY: &str = "index.mvsj";

/// Parameter keys whose string values are resource references
pub const REFERENCE_KEYS: [&str; 2] = ["uri", "url"];

/// Schemes that classify a reference as external
pub const EXTERNAL_SCHEMES: [&str; 3] = ["http", "https", "ftp"];

/// How a reference is resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceKind {
    /// Fetched over the network; carries the lowercased scheme
    External { scheme: String },
    /// Read relative to the source document's directory
    Local,
}

impl ReferenceKind {
    /// Classify by scheme alone: a reference is external only when it starts
    /// with `http:`, `https:` or `ftp:` (case-insensitive)
    pub fn classify(reference: &str) -> Self {
        match scheme_of(reference) {
            Some(scheme) if EXTERNAL_SCHEMES.contains(&scheme.as_str()) => {
                ReferenceKind::External { scheme }
            }
            _ => ReferenceKind::Local,
        }
    }

    pub fn is_external(&self) -> bool {
        matches!(self, ReferenceKind::External { .. })
    }
}

/// RFC 3986 scheme prefix, lowercased
pub(crate) fn scheme_of(reference: &str) -> Option<String> {
    let (scheme, _) = reference.split_once(':')?;
    let mut chars = scheme.chars();
    let first = chars.next()?;
    if !first.is_ascii_alphabetic() {
        return None;
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')) {
        return None;
    }
    Some(scheme.to_ascii_lowercase())
}

/// Original reference -> archive entry name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceMapping {
    entries: BTreeMap<String, String>,
}

impl ReferenceMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<R: Into<String>, N: Into<String>>(&mut self, reference: R, name: N) {
        self.entries.insert(reference.into(), name.into());
    }

    pub fn get(&self, reference: &str) -> Option<&str> {
        self.entries.get(reference).map(String::as_str)
    }

    pub fn contains(&self, reference: &str) -> bool {
        self.entries.contains_key(reference)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in lexicographic reference order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(r, n)| (r.as_str(), n.as_str()))
    }
}

impl FromIterator<(String, String)> for ReferenceMapping {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Output of resource resolution
#[derive(Debug, Default)]
pub struct ResolvedResources {
    /// How each resolved reference is rewritten
    pub mapping: ReferenceMapping,
    /// Archive entry name -> file holding its bytes
    pub sources: BTreeMap<String, PathBuf>,
    /// External references left as-is because fetching was disabled
    pub unresolved: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_external_schemes() {
        assert!(ReferenceKind::classify("https://example.org/x.cif").is_external());
        assert!(ReferenceKind::classify("HTTP://example.org/x.cif").is_external());
        assert!(ReferenceKind::classify("ftp://ftp.example.org/x.cif").is_external());
        assert!(ReferenceKind::classify("http:x.cif").is_external());
    }

    #[test]
    fn test_classify_local() {
        assert_eq!(ReferenceKind::classify("local.cif"), ReferenceKind::Local);
        assert_eq!(ReferenceKind::classify("data/x.bcif"), ReferenceKind::Local);
        assert_eq!(ReferenceKind::classify("file:///tmp/x.cif"), ReferenceKind::Local);
        assert_eq!(ReferenceKind::classify("s3://bucket/x.cif"), ReferenceKind::Local);
        assert_eq!(ReferenceKind::classify("C:\\data\\x.cif"), ReferenceKind::Local);
        assert_eq!(ReferenceKind::classify("1:2"), ReferenceKind::Local);
    }

    #[test]
    fn test_mapping_iterates_in_reference_order() {
        let mut mapping = ReferenceMapping::new();
        mapping.insert("b", "b.cif");
        mapping.insert("a", "a.cif");
        let refs: Vec<_> = mapping.iter().map(|(r, _)| r).collect();
        assert_eq!(refs, vec!["a", "b"]);
        assert_eq!(mapping.get("a"), Some("a.cif"));
        assert!(!mapping.contains("c"));
    }
}
