//! MVSX Library
//!
//! This library converts MolViewSpec state documents (MVSJ) into
//! self-contained MVSX archives and back. Packaging gathers every resource a
//! document references, fetching remote ones over HTTP, and rewrites the
//! references to point at the archived copies.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use mvsx::{ConvertConfig, ConvertEvent, MvsxConverter, ProgressCallback};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! # async fn example() -> mvsx::Result<()> {
//! // Fetch remote structures with at most two requests in flight
//! let config = ConvertConfig::default()
//!     .with_max_concurrent_fetches(2)
//!     .with_compression_level(9);
//!
//! let converter = MvsxConverter::new(config)?;
//!
//! // Set up progress callback (optional)
//! let progress_callback: ProgressCallback = Arc::new(|event: ConvertEvent| match event {
//!     ConvertEvent::FetchCompleted { url, filename, size } => {
//!         println!("{} -> {} ({} bytes)", url, filename, size);
//!     }
//!     ConvertEvent::ArchiveWritten { path, entries } => {
//!         println!("Wrote {} ({} entries)", path.display(), entries);
//!     }
//!     _ => {}
//! });
//!
//! let summary = converter
//!     .package_file(
//!         Path::new("state.mvsj"),
//!         Path::new("state.mvsx"),
//!         Some(progress_callback),
//!     )
//!     .await?;
//! println!("Archived {} entries", summary.entries);
//!
//! // Unpack again; the returned path points at the extracted index.mvsj
//! let index = mvsx::extract_mvsx(&summary.archive, None).await?;
//! println!("Extracted to {}", index.display());
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - **Reference scanning**: `params.uri` / `params.url` across every snapshot
//! - **Concurrent fetching**: bounded parallel downloads with retry and backoff
//! - **Batched failures**: every failed fetch is reported in one error
//! - **Atomic output**: archives are written to a temp file and renamed into place
//! - **Safe extraction**: entries escaping the output directory are rejected

pub mod converter;
pub mod document;

// Re-export commonly used types for convenience
pub use converter::{
    extract_mvsx, mvsj_to_mvsx, ConvertConfig, ConvertError, ConvertEvent, ErrorKind,
    FetchError, IntoProgressCallback, MvsxConverter, PackageSummary, ProgressCallback,
    ProgressReporter, ReferenceMapping, Result, TracingProgressReporter, INDEX_ENTRY,
};
pub use document::{Document, MultiSnapshot, Node, Snapshot};
