//! Progress reporting for conversion operations

use std::path::PathBuf;
use std::sync::Arc;

/// Progress callback for conversion operations
pub type ProgressCallback = Arc<dyn Fn(ConvertEvent) + Send + Sync>;

/// Events emitted while packaging or unpackaging
#[derive(Debug, Clone)]
pub enum ConvertEvent {
    ReferencesScanned {
        total: usize,
        external: usize,
        local: usize,
    },
    FetchStarted {
        url: String,
    },
    FetchCompleted {
        url: String,
        filename: String,
        size: u64,
    },
    FetchFailed {
        url: String,
        error: String,
    },
    RetryAttempt {
        url: String,
        attempt: usize,
        max_attempts: usize,
    },
    EntryWritten {
        name: String,
        size: u64,
    },
    ArchiveWritten {
        path: PathBuf,
        entries: usize,
    },
    EntryExtracted {
        name: String,
        size: u64,
    },
}

/// Trait for progress reporting with per-event hooks
pub trait ProgressReporter: Send + Sync {
    fn on_references_scanned(&self, _total: usize, _external: usize, _local: usize) {}
    fn on_fetch_started(&self, _url: &str) {}
    fn on_fetch_completed(&self, _url: &str, _filename: &str, _size: u64) {}
    fn on_fetch_failed(&self, _url: &str, _error: &str) {}
    fn on_retry_attempt(&self, _url: &str, _attempt: usize, _max_attempts: usize) {}
    fn on_entry_written(&self, _name: &str, _size: u64) {}
    fn on_archive_written(&self, _path: &std::path::Path, _entries: usize) {}
    fn on_entry_extracted(&self, _name: &str, _size: u64) {}
}

/// Extension trait to convert a ProgressReporter into a ProgressCallback
pub trait IntoProgressCallback {
    fn into_callback(self) -> ProgressCallback;
}

impl<T: ProgressReporter + 'static> IntoProgressCallback for T {
    fn into_callback(self) -> ProgressCallback {
        Arc::new(move |event| match event {
            ConvertEvent::ReferencesScanned { total, external, local } => {
                self.on_references_scanned(total, external, local);
            }
            ConvertEvent::FetchStarted { url } => self.on_fetch_started(&url),
            ConvertEvent::FetchCompleted { url, filename, size } => {
                self.on_fetch_completed(&url, &filename, size);
            }
            ConvertEvent::FetchFailed { url, error } => self.on_fetch_failed(&url, &error),
            ConvertEvent::RetryAttempt { url, attempt, max_attempts } => {
                self.on_retry_attempt(&url, attempt, max_attempts);
            }
            ConvertEvent::EntryWritten { name, size } => self.on_entry_written(&name, size),
            ConvertEvent::ArchiveWritten { path, entries } => {
                self.on_archive_written(&path, entries);
            }
            ConvertEvent::EntryExtracted { name, size } => self.on_entry_extracted(&name, size),
        })
    }
}

/// Reporter that logs every event through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgressReporter;

impl ProgressReporter for TracingProgressReporter {
    fn on_references_scanned(&self, total: usize, external: usize, local: usize) {
        tracing::info!("Found {} reference(s): {} external, {} local", total, external, local);
    }

    fn on_fetch_started(&self, url: &str) {
        tracing::info!("Fetching {}", url);
    }

    fn on_fetch_completed(&self, url: &str, filename: &str, size: u64) {
        tracing::info!("Fetched {} as {} ({} bytes)", url, filename, size);
    }

    fn on_fetch_failed(&self, url: &str, error: &str) {
        tracing::warn!("Fetch of {} failed: {}", url, error);
    }

    fn on_retry_attempt(&self, url: &str, attempt: usize, max_attempts: usize) {
        tracing::info!("Retrying {} ({}/{})", url, attempt, max_attempts);
    }

    fn on_entry_written(&self, name: &str, size: u64) {
        tracing::debug!("Archived {} ({} bytes)", name, size);
    }

    fn on_archive_written(&self, path: &std::path::Path, entries: usize) {
        tracing::info!("Wrote {} with {} entries", path.display(), entries);
    }

    fn on_entry_extracted(&self, name: &str, size: u64) {
        tracing::debug!("Extracted {} ({} bytes)", name, size);
    }
}

/// Reporter that ignores all events
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgressReporter;

impl ProgressReporter for NullProgressReporter {}

pub(crate) fn emit(callback: &Option<ProgressCallback>, event: ConvertEvent) {
    if let Some(callback) = callback {
        callback(event);
    }
}
