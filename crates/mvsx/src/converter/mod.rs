//! Conversion between MVSJ documents and MVSX archives
//!
//! Packaging flows through these stages:
//!
//! MvsxConverter::package_document
//! ↓
//! scan (every snapshot, pooled into one reference set)
//! ↓
//! ResourceResolver (local checks, name reservation, concurrent fetches)
//! ↓
//! rewrite (private copy of the document, each snapshot)
//! ↓
//! ArchivePackager (blocking thread, temp file + rename)
//!
//! Unpackaging is a single blocking step in [`unpackage::extract_archive`].

pub mod backends;
pub mod config;
pub mod core;
pub mod package;
pub mod registry;
pub mod resolve;
pub mod rewrite;
pub mod scan;
pub mod unpackage;

pub use backends::HttpFetcher;
pub use config::ConvertConfig;
pub use core::{
    ConvertError, ConvertEvent, DownloadFailures, ErrorKind, FetchError, FetchFailure,
    FileOperation, IntoProgressCallback, NullProgressReporter, ProgressCallback, ProgressReporter,
    ReferenceKind, ReferenceMapping, ResolvedResources, Result, TracingProgressReporter,
    INDEX_ENTRY,
};
pub use registry::{FetcherRegistry, ResourceFetcher};
pub use resolve::ResourceResolver;

use crate::document::{parser::DocumentError, Document};
use package::ArchivePackager;
use std::path::{Path, PathBuf};
use tracing::{debug, info, info_span, Instrument};

/// Outcome of a successful packaging run
#[derive(Debug, Clone)]
pub struct PackageSummary {
    pub archive: PathBuf,
    /// Entries written, including `index.mvsj`
    pub entries: usize,
    pub mapping: ReferenceMapping,
    /// External references kept verbatim because fetching was disabled
    pub unresolved: Vec<String>,
}

/// Packs documents into MVSX archives and unpacks them again
///
/// Each call works on its own staging directory and a private copy of the
/// document, so one converter can serve concurrent conversions.
pub struct MvsxConverter {
    registry: FetcherRegistry,
    config: ConvertConfig,
}

impl MvsxConverter {
    /// Create a converter with the default HTTP fetcher
    pub fn new(config: ConvertConfig) -> Result<Self> {
        config.validate()?;
        let registry = FetcherRegistry::new().with_http_fetcher(&config)?;
        Ok(Self { registry, config })
    }

    /// Create a converter with a custom fetcher registry
    pub fn with_registry(registry: FetcherRegistry, config: ConvertConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { registry, config })
    }

    pub fn config(&self) -> &ConvertConfig {
        &self.config
    }

    /// Package the MVSJ file at `source_path` into `dest_path`
    ///
    /// Local references are resolved against the directory of `source_path`.
    pub async fn package_file(
        &self,
        source_path: &Path,
        dest_path: &Path,
        progress_callback: Option<ProgressCallback>,
    ) -> Result<PackageSummary> {
        let document = Document::from_path(source_path)?;
        let source_dir = source_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        self.package_document(&document, source_dir, dest_path, progress_callback)
            .await
    }

    /// Package an in-memory document whose local references live in `source_dir`
    ///
    /// `document` itself is never modified.
    pub async fn package_document(
        &self,
        document: &Document,
        source_dir: &Path,
        dest_path: &Path,
        progress_callback: Option<ProgressCallback>,
    ) -> Result<PackageSummary> {
        self.package_inner(document, source_dir, dest_path, progress_callback)
            .instrument(info_span!("package", dest = %dest_path.display()))
            .await
    }

    async fn package_inner(
        &self,
        document: &Document,
        source_dir: &Path,
        dest_path: &Path,
        progress_callback: Option<ProgressCallback>,
    ) -> Result<PackageSummary> {
        let references = scan::scan_document(document);
        debug!("Scanned {} distinct reference(s)", references.len());

        // Dropped on every exit path, taking fetched files with it
        let staging = tempfile::Builder::new()
            .prefix("mvsx-staging-")
            .tempdir()
            .map_err(|source| ConvertError::PackagingIo {
                path: std::env::temp_dir(),
                operation: FileOperation::CreateDir,
                source,
            })?;

        let resolved = ResourceResolver::new(&self.registry, &self.config)
            .resolve(&references, source_dir, staging.path(), progress_callback.clone())
            .await?;

        let rewritten = rewrite::rewrite_document(document, &resolved.mapping);
        let document_json = rewritten
            .to_canonical_json()
            .map_err(DocumentError::from)?;

        let packager =
            ArchivePackager::new(self.config.compression_level).with_progress(progress_callback);
        let sources = resolved.sources;
        let dest = dest_path.to_path_buf();
        let entries = tokio::task::spawn_blocking(move || {
            packager.write(&document_json, &sources, &dest)
        })
        .await
        .map_err(|e| ConvertError::TaskFailed {
            kind: ErrorKind::Packaging,
            reason: e.to_string(),
        })??;
        drop(staging);

        info!("Packaged {} entries into {}", entries, dest_path.display());
        Ok(PackageSummary {
            archive: dest_path.to_path_buf(),
            entries,
            mapping: resolved.mapping,
            unresolved: resolved.unresolved,
        })
    }

    /// Extract `archive_path`; see [`extract_mvsx`]
    pub async fn unpackage(
        &self,
        archive_path: &Path,
        output_dir: Option<&Path>,
        progress_callback: Option<ProgressCallback>,
    ) -> Result<PathBuf> {
        unpackage_with_progress(archive_path, output_dir, progress_callback).await
    }

    /// Extract `archive_path` and parse its document
    pub async fn unpackage_document(
        &self,
        archive_path: &Path,
        output_dir: Option<&Path>,
        progress_callback: Option<ProgressCallback>,
    ) -> Result<(PathBuf, Document)> {
        let index_path = self
            .unpackage(archive_path, output_dir, progress_callback)
            .await?;
        let document = Document::from_path(&index_path)?;
        Ok((index_path, document))
    }
}

/// One-shot packaging with the given configuration
pub async fn mvsj_to_mvsx(
    source_path: &Path,
    dest_path: &Path,
    config: ConvertConfig,
) -> Result<PackageSummary> {
    MvsxConverter::new(config)?
        .package_file(source_path, dest_path, None)
        .await
}

/// Extract an MVSX archive and return the absolute path of its `index.mvsj`
///
/// Without `output_dir` a fresh temporary directory is created; it is kept
/// only when extraction succeeds.
pub async fn extract_mvsx(archive_path: &Path, output_dir: Option<&Path>) -> Result<PathBuf> {
    unpackage_with_progress(archive_path, output_dir, None).await
}

async fn unpackage_with_progress(
    archive_path: &Path,
    output_dir: Option<&Path>,
    progress_callback: Option<ProgressCallback>,
) -> Result<PathBuf> {
    unpackage_into(
        archive_path,
        output_dir,
        &std::env::temp_dir(),
        progress_callback,
    )
    .await
}

/// Extract into `output_dir`, or into a new `mvsx-*` directory under `temp_root`
async fn unpackage_into(
    archive_path: &Path,
    output_dir: Option<&Path>,
    temp_root: &Path,
    progress_callback: Option<ProgressCallback>,
) -> Result<PathBuf> {
    let (output_dir, temp_dir) = match output_dir {
        Some(dir) => (dir.to_path_buf(), None),
        None => {
            let temp_dir = tempfile::Builder::new()
                .prefix("mvsx-")
                .tempdir_in(temp_root)
                .map_err(|source| ConvertError::ExtractionIo {
                    path: temp_root.to_path_buf(),
                    operation: FileOperation::CreateDir,
                    source,
                })?;
            (temp_dir.path().to_path_buf(), Some(temp_dir))
        }
    };
    debug!("Extracting {} into {}", archive_path.display(), output_dir.display());

    let archive = archive_path.to_path_buf();
    tokio::task::spawn_blocking(move || -> Result<PathBuf> {
        let index_path = unpackage::extract_archive(&archive, &output_dir, &progress_callback)?;
        // A failed extraction drops the temp dir and removes it
        if let Some(temp_dir) = temp_dir {
            let _ = temp_dir.keep();
        }
        Ok(index_path)
    })
    .await
    .map_err(|e| ConvertError::TaskFailed {
        kind: ErrorKind::Extraction,
        reason: e.to_string(),
    })?
}
