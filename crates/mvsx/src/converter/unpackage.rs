//! MVSX archive extraction

use crate::converter::core::{
    progress::emit, ConvertError, ConvertEvent, FileOperation, ProgressCallback, Result,
    INDEX_ENTRY,
};
use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use tracing::debug;
use zip::ZipArchive;

/// Extract `archive_path` into `output_dir` and return the absolute path of
/// the extracted `index.mvsj`
///
/// The document entry is looked up before anything is written, so an archive
/// without one leaves `output_dir` untouched. Entries whose names would land
/// outside `output_dir` are rejected.
pub fn extract_archive(
    archive_path: &Path,
    output_dir: &Path,
    progress_callback: &Option<ProgressCallback>,
) -> Result<PathBuf> {
    let file = File::open(archive_path).map_err(|source| ConvertError::ExtractionIo {
        path: archive_path.to_path_buf(),
        operation: FileOperation::Read,
        source,
    })?;
    let read_error = |source| ConvertError::ArchiveRead {
        archive: archive_path.to_path_buf(),
        source,
    };
    let mut archive = ZipArchive::new(BufReader::new(file)).map_err(read_error)?;

    if !archive.file_names().any(|name| name == INDEX_ENTRY) {
        return Err(ConvertError::MissingIndex {
            archive: archive_path.to_path_buf(),
            entry: INDEX_ENTRY.to_string(),
        });
    }

    let io_error = |path: &Path, operation: FileOperation| {
        let path = path.to_path_buf();
        move |source: io::Error| ConvertError::ExtractionIo { path, operation, source }
    };
    fs::create_dir_all(output_dir).map_err(io_error(output_dir, FileOperation::CreateDir))?;

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).map_err(read_error)?;
        let Some(relative) = entry.enclosed_name().map(|p| p.to_path_buf()) else {
            return Err(ConvertError::UnsafeEntry {
                archive: archive_path.to_path_buf(),
                entry: entry.name().to_string(),
            });
        };
        let target = output_dir.join(&relative);

        if entry.is_dir() {
            fs::create_dir_all(&target).map_err(io_error(&target, FileOperation::CreateDir))?;
            continue;
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(io_error(parent, FileOperation::CreateDir))?;
        }
        let mut out = File::create(&target).map_err(io_error(&target, FileOperation::Create))?;
        let size = io::copy(&mut entry, &mut out).map_err(io_error(&target, FileOperation::Write))?;
        debug!("Extracted {} ({} bytes)", entry.name(), size);
        emit(
            progress_callback,
            ConvertEvent::EntryExtracted {
                name: entry.name().to_string(),
                size,
            },
        );
    }

    let index_path = output_dir.join(INDEX_ENTRY);
    std::path::absolute(&index_path).map_err(io_error(&index_path, FileOperation::Read))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::core::ErrorKind;
    use std::io::Write;
    use tempfile::tempdir;
    use zip::write::{SimpleFileOptions, ZipWriter};

    fn write_zip(path: &Path, entries: &[(&str, &str)]) {
        let mut zip = ZipWriter::new(File::create(path).unwrap());
        for (name, data) in entries {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(data.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn test_extract_returns_absolute_index_path() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("a.mvsx");
        write_zip(
            &archive,
            &[(INDEX_ENTRY, r#"{"root":{"kind":"root"}}"#), ("data/x.cif", "xyz")],
        );
        let out = dir.path().join("out");

        let index = extract_archive(&archive, &out, &None).unwrap();
        assert!(index.is_absolute());
        assert!(index.ends_with(INDEX_ENTRY));
        assert_eq!(fs::read(out.join("data/x.cif")).unwrap(), b"xyz");
    }

    #[test]
    fn test_missing_index_is_validation_error() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("a.mvsx");
        write_zip(&archive, &[("x.cif", "xyz")]);
        let out = dir.path().join("out");

        let err = extract_archive(&archive, &out, &None).unwrap_err();
        assert!(matches!(err, ConvertError::MissingIndex { .. }));
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(!out.exists());
    }

    #[test]
    fn test_not_a_zip_is_extraction_error() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("a.mvsx");
        fs::write(&archive, b"definitely not a zip").unwrap();

        let err = extract_archive(&archive, dir.path(), &None).unwrap_err();
        assert!(matches!(err, ConvertError::ArchiveRead { .. }));
        assert_eq!(err.kind(), ErrorKind::Extraction);
    }

    #[test]
    fn test_missing_archive_is_extraction_error() {
        let dir = tempdir().unwrap();
        let err = extract_archive(&dir.path().join("nope.mvsx"), dir.path(), &None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Extraction);
    }

    #[test]
    fn test_entry_escaping_output_dir_is_rejected() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("a.mvsx");
        write_zip(&archive, &[(INDEX_ENTRY, "{}"), ("../evil.txt", "x")]);
        let out = dir.path().join("out");

        let err = extract_archive(&archive, &out, &None).unwrap_err();
        assert!(matches!(err, ConvertError::UnsafeEntry { .. }));
        assert!(!dir.path().join("evil.txt").exists());
    }
}
