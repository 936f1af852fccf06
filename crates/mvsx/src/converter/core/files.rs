//! File naming and file operation utilities

use crate::converter::core::error::{FetchError, FileOperation};
use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Replace anything outside `[A-Za-z0-9._-]` with `_`
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Split `name` into stem and extension (with the dot)
///
/// Only the last extension counts and a leading dot is part of the stem, so
/// `a.tar.gz` -> (`a.tar`, `.gz`) and `.hidden` -> (`.hidden`, ``).
pub fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(index) if index > 0 => name.split_at(index),
        _ => (name, ""),
    }
}

/// Return `candidate`, or the first free `stem_N.ext`, and mark it used
pub fn claim_unique_name(candidate: &str, used: &mut BTreeSet<String>) -> String {
    if used.insert(candidate.to_string()) {
        return candidate.to_string();
    }

    let (stem, extension) = split_extension(candidate);
    let mut counter = 1usize;
    loop {
        let name = format!("{}_{}{}", stem, counter, extension);
        if used.insert(name.clone()) {
            return name;
        }
        counter += 1;
    }
}

/// Lexically normalized form of a relative path, `/`-joined
///
/// `.` components are dropped and `a/..` pairs folded, which is the path an
/// archive entry of that name extracts to. `None` for absolute paths, paths
/// climbing above their base and paths that normalize to nothing.
pub fn normalize_relative(reference: &str) -> Option<String> {
    let mut parts: Vec<&str> = Vec::new();
    for component in Path::new(reference).components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str()?),
            Component::CurDir => {}
            Component::ParentDir => {
                parts.pop()?;
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    (!parts.is_empty()).then(|| parts.join("/"))
}

/// Path with `.part` appended, used while a fetch is in flight
pub fn create_temp_path(dest_path: &Path) -> PathBuf {
    let mut name = dest_path.as_os_str().to_os_string();
    name.push(".part");
    PathBuf::from(name)
}

/// Atomically rename a temporary file to its final destination
pub async fn atomic_rename(temp_path: &Path, dest_path: &Path) -> Result<(), FetchError> {
    fs::rename(temp_path, dest_path)
        .await
        .map_err(|source| FetchError::FileSystem {
            path: dest_path.to_path_buf(),
            operation: FileOperation::Write,
            source,
        })?;
    debug!("Atomically renamed {} to {}", temp_path.display(), dest_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("1cbs.cif"), "1cbs.cif");
        assert_eq!(sanitize_filename("a b%20c?.bcif"), "a_b_20c_.bcif");
    }

    #[test]
    fn test_split_extension() {
        assert_eq!(split_extension("x.cif"), ("x", ".cif"));
        assert_eq!(split_extension("a.tar.gz"), ("a.tar", ".gz"));
        assert_eq!(split_extension("noext"), ("noext", ""));
        assert_eq!(split_extension(".hidden"), (".hidden", ""));
    }

    #[test]
    fn test_claim_unique_name_suffixes_before_extension() {
        let mut used = BTreeSet::new();
        assert_eq!(claim_unique_name("x.cif", &mut used), "x.cif");
        assert_eq!(claim_unique_name("x.cif", &mut used), "x_1.cif");
        assert_eq!(claim_unique_name("x.cif", &mut used), "x_2.cif");
        assert_eq!(claim_unique_name("data", &mut used), "data");
        assert_eq!(claim_unique_name("data", &mut used), "data_1");
    }

    #[test]
    fn test_claim_unique_name_skips_taken_suffix() {
        let mut used = BTreeSet::from(["x.cif".to_string(), "x_1.cif".to_string()]);
        assert_eq!(claim_unique_name("x.cif", &mut used), "x_2.cif");
    }

    #[test]
    fn test_normalize_relative() {
        assert_eq!(normalize_relative("./x.cif").as_deref(), Some("x.cif"));
        assert_eq!(normalize_relative("data/./x.cif").as_deref(), Some("data/x.cif"));
        assert_eq!(normalize_relative("data/../x.cif").as_deref(), Some("x.cif"));
        assert_eq!(normalize_relative("data//x.cif").as_deref(), Some("data/x.cif"));
        assert_eq!(normalize_relative("../x.cif"), None);
        assert_eq!(normalize_relative("data/.."), None);
        assert_eq!(normalize_relative("/x.cif"), None);
        assert_eq!(normalize_relative(""), None);
        assert_eq!(normalize_relative("."), None);
    }

    #[test]
    fn test_create_temp_path() {
        assert_eq!(create_temp_path(Path::new("/s/x.cif")), PathBuf::from("/s/x.cif.part"));
    }
}
