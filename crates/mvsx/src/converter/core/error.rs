//! Error types for archive conversion with context and recovery information

use crate::document::parser::DocumentError;
use std::error::Error;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Top-level conversion errors
///
/// Every variant belongs to one [`ErrorKind`], so callers can branch on the
/// kind without matching individual variants.
#[derive(Error, Debug)]
pub enum ConvertError {
    /// The source document is unreadable or structurally malformed
    #[error("Invalid document{}", display_path(.path))]
    InvalidDocument {
        path: Option<PathBuf>,
        #[source]
        source: DocumentError,
    },

    /// A local reference points at a file that does not exist
    #[error("Local resource '{reference}' not found at '{path}'")]
    LocalResourceMissing { reference: String, path: PathBuf },

    /// A local reference is absolute or climbs out of the document directory
    #[error("Local resource '{reference}' must be a relative path inside the document directory")]
    LocalResourceOutsideRoot { reference: String },

    /// A local reference would overwrite the document entry
    #[error("Local resource '{reference}' collides with the reserved '{entry}' entry")]
    ReservedEntryName { reference: String, entry: String },

    /// Archive parsed as a container but has no document entry
    #[error("Archive '{archive}' does not contain an '{entry}' entry")]
    MissingIndex { archive: PathBuf, entry: String },

    /// One or more external fetches failed
    #[error("{0}")]
    Download(DownloadFailures),

    /// The archive container itself could not be read
    #[error("Failed to read archive '{archive}'")]
    ArchiveRead {
        archive: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    /// An archive entry name would escape the output directory
    #[error("Archive '{archive}' contains unsafe entry '{entry}'")]
    UnsafeEntry { archive: PathBuf, entry: String },

    /// File-system failure while extracting
    #[error("Extraction failed {operation} '{path}'")]
    ExtractionIo {
        path: PathBuf,
        operation: FileOperation,
        #[source]
        source: std::io::Error,
    },

    /// File-system failure while writing the archive
    #[error("Packaging failed {operation} '{path}'")]
    PackagingIo {
        path: PathBuf,
        operation: FileOperation,
        #[source]
        source: std::io::Error,
    },

    /// The zip writer rejected an entry
    #[error("Failed to write archive entry '{entry}'")]
    ArchiveWrite {
        entry: String,
        #[source]
        source: zip::result::ZipError,
    },

    /// A resolved resource disappeared before it could be archived
    #[error("Resource for entry '{entry}' is missing at '{path}'")]
    StagedResourceMissing { entry: String, path: PathBuf },

    /// A blocking archive task panicked or was cancelled
    #[error("Archive task failed: {reason}")]
    TaskFailed { kind: ErrorKind, reason: String },

    /// Invalid configuration
    #[error("Invalid configuration: {message}")]
    Configuration {
        message: String,
        field: Option<String>,
    },
}

fn display_path(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| format!(" '{}'", p.display()))
        .unwrap_or_default()
}

/// Error kinds surfaced to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    Download,
    Extraction,
    Packaging,
    Configuration,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Validation => write!(f, "validation"),
            ErrorKind::Download => write!(f, "download"),
            ErrorKind::Extraction => write!(f, "extraction"),
            ErrorKind::Packaging => write!(f, "packaging"),
            ErrorKind::Configuration => write!(f, "configuration"),
        }
    }
}

/// Types of file operations for error context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOperation {
    Read,
    Write,
    Create,
    CreateDir,
    Persist,
}

impl fmt::Display for FileOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileOperation::Read => write!(f, "reading"),
            FileOperation::Write => write!(f, "writing"),
            FileOperation::Create => write!(f, "creating"),
            FileOperation::CreateDir => write!(f, "creating directory"),
            FileOperation::Persist => write!(f, "moving into place"),
        }
    }
}

pub type Result<T> = std::result::Result<T, ConvertError>;

impl ConvertError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConvertError::InvalidDocument { .. }
            | ConvertError::LocalResourceMissing { .. }
            | ConvertError::LocalResourceOutsideRoot { .. }
            | ConvertError::ReservedEntryName { .. }
            | ConvertError::MissingIndex { .. } => ErrorKind::Validation,
            ConvertError::Download(_) => ErrorKind::Download,
            ConvertError::ArchiveRead { .. }
            | ConvertError::UnsafeEntry { .. }
            | ConvertError::ExtractionIo { .. } => ErrorKind::Extraction,
            ConvertError::PackagingIo { .. }
            | ConvertError::ArchiveWrite { .. }
            | ConvertError::StagedResourceMissing { .. } => ErrorKind::Packaging,
            ConvertError::TaskFailed { kind, .. } => *kind,
            ConvertError::Configuration { .. } => ErrorKind::Configuration,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            ConvertError::InvalidDocument { .. } => "invalid_document",
            ConvertError::LocalResourceMissing { .. } => "local_resource_missing",
            ConvertError::LocalResourceOutsideRoot { .. } => "local_resource_outside_root",
            ConvertError::ReservedEntryName { .. } => "reserved_entry_name",
            ConvertError::MissingIndex { .. } => "missing_index",
            ConvertError::Download(_) => "download",
            ConvertError::ArchiveRead { .. } => "archive_read",
            ConvertError::UnsafeEntry { .. } => "unsafe_entry",
            ConvertError::ExtractionIo { .. } => "extraction_io",
            ConvertError::PackagingIo { .. } => "packaging_io",
            ConvertError::ArchiveWrite { .. } => "archive_write",
            ConvertError::StagedResourceMissing { .. } => "staged_resource_missing",
            ConvertError::TaskFailed { .. } => "task_failed",
            ConvertError::Configuration { .. } => "configuration",
        }
    }

    pub fn is_validation(&self) -> bool {
        self.kind() == ErrorKind::Validation
    }

    /// Failed fetches, if this is a download error
    pub fn download_failures(&self) -> Option<&[FetchFailure]> {
        match self {
            ConvertError::Download(failures) => Some(&failures.failures),
            _ => None,
        }
    }

    /// Create a detailed error report for debugging
    pub fn detailed_report(&self) -> String {
        let mut report = format!("Error: {}\n", self);
        report.push_str(&format!("Kind: {}\n", self.kind()));
        report.push_str(&format!("Category: {}\n", self.category()));

        if let Some(source) = self.source() {
            report.push_str(&format!("Root cause: {}\n", source));
        }

        report
    }
}

impl From<DocumentError> for ConvertError {
    fn from(error: DocumentError) -> Self {
        let path = match &error {
            DocumentError::Read { path, .. } => Some(path.clone()),
            _ => None,
        };
        ConvertError::InvalidDocument {
            path,
            source: error,
        }
    }
}

/// Per-resource fetch errors
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP request to '{url}' failed")]
    HttpRequest {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Server returned {status} for '{url}'")]
    HttpStatus { url: String, status: u16 },

    #[error("Request to '{url}' timed out after {duration_secs}s")]
    Timeout { url: String, duration_secs: u64 },

    #[error("No fetcher registered for scheme '{scheme}' in '{url}'")]
    UnsupportedScheme { url: String, scheme: String },

    #[error("Invalid URL '{url}'")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("File operation failed {operation} '{path}'")]
    FileSystem {
        path: PathBuf,
        operation: FileOperation,
        #[source]
        source: std::io::Error,
    },

    #[error("Maximum retry attempts ({max_retries}) exceeded for '{url}': {last_error}")]
    MaxRetriesExceeded {
        url: String,
        max_retries: usize,
        last_error: String,
    },
}

impl FetchError {
    /// Check if error is recoverable (should retry)
    pub fn is_recoverable(&self) -> bool {
        match self {
            FetchError::HttpRequest { source, .. } => {
                source.is_connect() || source.is_request() || source.is_body()
            }
            FetchError::HttpStatus { status, .. } => *status >= 500 || *status == 429,
            FetchError::Timeout { .. } => true,
            FetchError::FileSystem { source, .. } => matches!(
                source.kind(),
                std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::WouldBlock
            ),
            FetchError::UnsupportedScheme { .. }
            | FetchError::InvalidUrl { .. }
            | FetchError::MaxRetriesExceeded { .. } => false,
        }
    }

    pub(crate) fn from_reqwest(url: &str, error: reqwest::Error, timeout_secs: u64) -> Self {
        if error.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
                duration_secs: timeout_secs,
            }
        } else if let Some(status) = error.status() {
            FetchError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            }
        } else {
            FetchError::HttpRequest {
                url: url.to_string(),
                source: error,
            }
        }
    }

    /// Full cause chain on one line
    pub fn chain(&self) -> String {
        let mut message = self.to_string();
        let mut source = self.source();
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        message
    }
}

/// One reference that could not be fetched
#[derive(Debug)]
pub struct FetchFailure {
    /// Reference as written in the document
    pub reference: String,
    /// Absolute URL that was requested, when one could be built
    pub url: Option<String>,
    pub error: FetchError,
}

/// Every failed fetch of one conversion, sorted by reference
#[derive(Debug)]
pub struct DownloadFailures {
    pub failures: Vec<FetchFailure>,
}

impl DownloadFailures {
    pub fn new(mut failures: Vec<FetchFailure>) -> Self {
        failures.sort_by(|a, b| a.reference.cmp(&b.reference));
        Self { failures }
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn references(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.reference.as_str()).collect()
    }
}

impl fmt::Display for DownloadFailures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Failed to download {} external resource(s):", self.failures.len())?;
        for failure in &self.failures {
            write!(f, "\n  - {}: {}", failure.reference, failure.error.chain())?;
        }
        Ok(())
    }
}
