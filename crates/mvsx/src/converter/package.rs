//! MVSX archive writing
//!
//! The archive is assembled in a temporary file next to the destination and
//! renamed over it only after the zip central directory has been written, so
//! a failed run never leaves a truncated archive behind.

use crate::converter::core::{
    progress::emit, ConvertError, ConvertEvent, FileOperation, ProgressCallback, Result,
    INDEX_ENTRY,
};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::debug;
use zip::write::{SimpleFileOptions, ZipWriter};
use zip::CompressionMethod;

/// Writes one MVSX archive
pub struct ArchivePackager {
    options: SimpleFileOptions,
    progress_callback: Option<ProgressCallback>,
}

impl ArchivePackager {
    /// Deflate at `compression_level`, or at the format default when `None`
    pub fn new(compression_level: Option<i64>) -> Self {
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(compression_level)
            .last_modified_time(zip::DateTime::default());
        Self {
            options,
            progress_callback: None,
        }
    }

    pub fn with_progress(mut self, progress_callback: Option<ProgressCallback>) -> Self {
        self.progress_callback = progress_callback;
        self
    }

    /// Write `document_json` as `index.mvsj` plus every entry of `sources`
    ///
    /// Returns the number of entries written.
    pub fn write(
        &self,
        document_json: &str,
        sources: &BTreeMap<String, PathBuf>,
        dest_path: &Path,
    ) -> Result<usize> {
        let parent = dest_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        std::fs::create_dir_all(parent).map_err(|source| ConvertError::PackagingIo {
            path: parent.to_path_buf(),
            operation: FileOperation::CreateDir,
            source,
        })?;

        let mut temp = tempfile::Builder::new()
            .prefix(".mvsx-")
            .suffix(".tmp")
            .tempfile_in(parent)
            .map_err(|source| ConvertError::PackagingIo {
                path: parent.to_path_buf(),
                operation: FileOperation::Create,
                source,
            })?;
        let temp_path = temp.path().to_path_buf();
        let io_error = |operation: FileOperation| {
            let path = temp_path.clone();
            move |source: io::Error| ConvertError::PackagingIo { path, operation, source }
        };

        let mut zip = ZipWriter::new(temp.as_file_mut());

        zip.start_file(INDEX_ENTRY, self.options)
            .map_err(|source| ConvertError::ArchiveWrite {
                entry: INDEX_ENTRY.to_string(),
                source,
            })?;
        zip.write_all(document_json.as_bytes())
            .map_err(io_error(FileOperation::Write))?;
        emit(
            &self.progress_callback,
            ConvertEvent::EntryWritten {
                name: INDEX_ENTRY.to_string(),
                size: document_json.len() as u64,
            },
        );

        for (entry, source_path) in sources {
            let mut file = File::open(source_path).map_err(|source| {
                if source.kind() == io::ErrorKind::NotFound {
                    ConvertError::StagedResourceMissing {
                        entry: entry.clone(),
                        path: source_path.clone(),
                    }
                } else {
                    ConvertError::PackagingIo {
                        path: source_path.clone(),
                        operation: FileOperation::Read,
                        source,
                    }
                }
            })?;

            zip.start_file(entry.as_str(), self.options)
                .map_err(|source| ConvertError::ArchiveWrite {
                    entry: entry.clone(),
                    source,
                })?;
            let size = io::copy(&mut file, &mut zip).map_err(io_error(FileOperation::Write))?;
            debug!("Archived {} ({} bytes)", entry, size);
            emit(
                &self.progress_callback,
                ConvertEvent::EntryWritten {
                    name: entry.clone(),
                    size,
                },
            );
        }

        zip.finish().map_err(|source| ConvertError::ArchiveWrite {
            entry: "central directory".to_string(),
            source,
        })?;
        temp.as_file()
            .sync_all()
            .map_err(io_error(FileOperation::Write))?;

        temp.persist(dest_path)
            .map_err(|e| ConvertError::PackagingIo {
                path: dest_path.to_path_buf(),
                operation: FileOperation::Persist,
                source: e.error,
            })?;

        let entries = sources.len() + 1;
        emit(
            &self.progress_callback,
            ConvertEvent::ArchiveWritten {
                path: dest_path.to_path_buf(),
                entries,
            },
        );
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::tempdir;

    fn read_entry(archive: &Path, name: &str) -> Vec<u8> {
        let mut zip = zip::ZipArchive::new(File::open(archive).unwrap()).unwrap();
        let mut entry = zip.by_name(name).unwrap();
        let mut bytes = Vec::new();
        entry.read_to_end(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_write_index_first_then_sorted_resources() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("b.cif"), b"bbb").unwrap();
        std::fs::write(dir.path().join("a.cif"), b"aaa").unwrap();
        let sources = BTreeMap::from([
            ("b.cif".to_string(), dir.path().join("b.cif")),
            ("a.cif".to_string(), dir.path().join("a.cif")),
        ]);
        let dest = dir.path().join("out.mvsx");

        let entries = ArchivePackager::new(Some(9))
            .write(r#"{"root":{"kind":"root"}}"#, &sources, &dest)
            .unwrap();
        assert_eq!(entries, 3);

        let mut zip = zip::ZipArchive::new(File::open(&dest).unwrap()).unwrap();
        assert_eq!(zip.len(), 3);
        assert_eq!(zip.by_index(0).unwrap().name(), INDEX_ENTRY);
        assert_eq!(zip.by_index(1).unwrap().name(), "a.cif");
        assert_eq!(zip.by_index(2).unwrap().name(), "b.cif");
        assert_eq!(read_entry(&dest, "b.cif"), b"bbb");
    }

    #[test]
    fn test_missing_source_is_fatal_and_leaves_nothing() {
        let dir = tempdir().unwrap();
        let sources = BTreeMap::from([("gone.cif".to_string(), dir.path().join("gone.cif"))]);
        let dest = dir.path().join("out.mvsx");

        let err = ArchivePackager::new(None)
            .write("{}", &sources, &dest)
            .unwrap_err();
        assert!(matches!(err, ConvertError::StagedResourceMissing { .. }));
        assert_eq!(err.kind(), crate::converter::core::ErrorKind::Packaging);
        assert!(!dest.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_failed_write_keeps_previous_archive() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("out.mvsx");
        std::fs::write(&dest, b"previous").unwrap();
        let sources = BTreeMap::from([("gone.cif".to_string(), dir.path().join("gone.cif"))]);

        assert!(ArchivePackager::new(None).write("{}", &sources, &dest).is_err());
        assert_eq!(std::fs::read(&dest).unwrap(), b"previous");
    }

    #[test]
    fn test_identical_input_gives_identical_archives() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.cif"), b"data").unwrap();
        let sources = BTreeMap::from([("a.cif".to_string(), dir.path().join("a.cif"))]);
        let first = dir.path().join("first.mvsx");
        let second = dir.path().join("second.mvsx");

        let packager = ArchivePackager::new(None);
        packager.write(r#"{"root":{"kind":"root"}}"#, &sources, &first).unwrap();
        packager.write(r#"{"root":{"kind":"root"}}"#, &sources, &second).unwrap();
        assert_eq!(std::fs::read(first).unwrap(), std::fs::read(second).unwrap());
    }
}
