//! Resource resolution
//!
//! Turns the scanned reference set into a [`ReferenceMapping`] plus the file
//! that backs each archive entry:
//!
//! 1. Local references are checked first. A missing local file fails the
//!    whole conversion immediately, before any network traffic.
//! 2. Archive names for external references are reserved serially, in
//!    lexicographic reference order, so collision suffixes are reproducible.
//!    Local references reserve the normalized path they extract to, plus
//!    every parent directory of it.
//! 3. External fetches run concurrently (bounded by
//!    `max_concurrent_fetches`), each into its own subdirectory of the
//!    staging directory. Every fetch is attempted; failures are reported
//!    together once all have finished.

use crate::converter::{
    config::ConvertConfig,
    core::{
        files::{claim_unique_name, normalize_relative, sanitize_filename},
        progress::emit,
        ConvertError, ConvertEvent, DownloadFailures, FetchError, FetchFailure, FileOperation,
        ProgressCallback, ReferenceKind, ResolvedResources, Result, INDEX_ENTRY,
    },
    registry::FetcherRegistry,
};
use futures::stream::{self, StreamExt};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};
use url::Url;

/// A reserved archive name for one external reference
#[derive(Debug, Clone)]
struct FetchPlan {
    reference: String,
    url: Url,
    filename: String,
    /// Private to this fetch, so in-flight temp files never meet
    dest_path: PathBuf,
}

/// Resolves references against the file system and the network
pub struct ResourceResolver<'a> {
    registry: &'a FetcherRegistry,
    config: &'a ConvertConfig,
}

impl<'a> ResourceResolver<'a> {
    pub fn new(registry: &'a FetcherRegistry, config: &'a ConvertConfig) -> Self {
        Self { registry, config }
    }

    /// Resolve `references` for a document living in `source_dir`
    ///
    /// Fetched resources are written into `staging_dir`, which the caller
    /// owns and discards.
    pub async fn resolve(
        &self,
        references: &BTreeSet<String>,
        source_dir: &Path,
        staging_dir: &Path,
        progress_callback: Option<ProgressCallback>,
    ) -> Result<ResolvedResources> {
        let (external, local): (Vec<&String>, Vec<&String>) = references
            .iter()
            .partition(|r| ReferenceKind::classify(r).is_external());

        emit(
            &progress_callback,
            ConvertEvent::ReferencesScanned {
                total: references.len(),
                external: external.len(),
                local: local.len(),
            },
        );
        debug!(
            "Resolving {} reference(s): {} external, {} local",
            references.len(),
            external.len(),
            local.len()
        );

        let mut resolved = ResolvedResources::default();
        let mut used_names = BTreeSet::from([INDEX_ENTRY.to_string()]);

        for reference in local {
            let (path, extracted_name) = self.check_local(reference, source_dir).await?;
            reserve_with_parents(&extracted_name, &mut used_names);
            resolved.mapping.insert(reference.clone(), reference.clone());
            resolved.sources.insert(extracted_name, path);
        }

        if !self.config.fetch_external {
            if !external.is_empty() {
                info!(
                    "External fetching disabled, leaving {} reference(s) unchanged",
                    external.len()
                );
            }
            resolved.unresolved = external.into_iter().cloned().collect();
            return Ok(resolved);
        }

        let base_url = self.config.parsed_base_url()?;
        let mut failures = Vec::new();
        let mut plans = Vec::new();
        for (index, reference) in external.into_iter().enumerate() {
            match external_url(reference, base_url.as_ref()) {
                Ok(url) => {
                    let candidate = derive_filename(&url, index);
                    let filename = claim_unique_name(&candidate, &mut used_names);
                    debug!("Reserved '{}' for {}", filename, reference);
                    let dest_path = staging_dir
                        .join(format!("fetch-{}", plans.len()))
                        .join(&filename);
                    plans.push(FetchPlan {
                        reference: reference.clone(),
                        url,
                        filename,
                        dest_path,
                    });
                }
                Err(error) => failures.push(FetchFailure {
                    reference: reference.clone(),
                    url: None,
                    error,
                }),
            }
        }

        let outcomes: Vec<(FetchPlan, std::result::Result<u64, FetchError>)> = stream::iter(plans)
            .map(|plan| {
                let progress_cb = progress_callback.clone();
                async move {
                    let outcome = self.fetch_with_retry(&plan, progress_cb).await;
                    (plan, outcome)
                }
            })
            .buffer_unordered(self.config.max_concurrent_fetches)
            .collect()
            .await;

        for (plan, outcome) in outcomes {
            match outcome {
                Ok(size) => {
                    emit(
                        &progress_callback,
                        ConvertEvent::FetchCompleted {
                            url: plan.url.to_string(),
                            filename: plan.filename.clone(),
                            size,
                        },
                    );
                    resolved.sources.insert(plan.filename.clone(), plan.dest_path);
                    resolved.mapping.insert(plan.reference, plan.filename);
                }
                Err(error) => {
                    warn!("Failed to fetch {}: {}", plan.url, error.chain());
                    emit(
                        &progress_callback,
                        ConvertEvent::FetchFailed {
                            url: plan.url.to_string(),
                            error: error.chain(),
                        },
                    );
                    failures.push(FetchFailure {
                        reference: plan.reference,
                        url: Some(plan.url.to_string()),
                        error,
                    });
                }
            }
        }

        if !failures.is_empty() {
            return Err(ConvertError::Download(DownloadFailures::new(failures)));
        }

        info!("Resolved {} reference(s)", resolved.mapping.len());
        Ok(resolved)
    }

    /// Source file of a local reference and the normalized path its entry
    /// extracts to
    async fn check_local(&self, reference: &str, source_dir: &Path) -> Result<(PathBuf, String)> {
        let Some(extracted_name) = normalize_relative(reference) else {
            return Err(ConvertError::LocalResourceOutsideRoot {
                reference: reference.to_string(),
            });
        };
        if extracted_name == INDEX_ENTRY {
            return Err(ConvertError::ReservedEntryName {
                reference: reference.to_string(),
                entry: INDEX_ENTRY.to_string(),
            });
        }

        let path = source_dir.join(reference);
        match fs::metadata(&path).await {
            Ok(metadata) if metadata.is_file() => {
                debug!("Local resource {} -> {}", reference, path.display());
                Ok((path, extracted_name))
            }
            _ => Err(ConvertError::LocalResourceMissing {
                reference: reference.to_string(),
                path,
            }),
        }
    }

    /// Fetch one resource, retrying recoverable failures with backoff
    async fn fetch_with_retry(
        &self,
        plan: &FetchPlan,
        progress_callback: Option<ProgressCallback>,
    ) -> std::result::Result<u64, FetchError> {
        let max_retries = self.config.max_retries;
        let url = plan.url.to_string();
        emit(&progress_callback, ConvertEvent::FetchStarted { url: url.clone() });

        if let Some(fetch_dir) = plan.dest_path.parent() {
            fs::create_dir_all(fetch_dir)
                .await
                .map_err(|source| FetchError::FileSystem {
                    path: fetch_dir.to_path_buf(),
                    operation: FileOperation::CreateDir,
                    source,
                })?;
        }

        let mut attempt = 0;
        loop {
            match self
                .registry
                .attempt_fetch(&plan.url, &plan.dest_path, progress_callback.clone())
                .await
            {
                Ok(size) => return Ok(size),
                Err(error) if error.is_recoverable() && attempt < max_retries => {
                    attempt += 1;
                    warn!("Fetch of {} failed ({}), retrying", url, error);
                    emit(
                        &progress_callback,
                        ConvertEvent::RetryAttempt {
                            url: url.clone(),
                            attempt,
                            max_attempts: max_retries,
                        },
                    );
                    tokio::time::sleep(self.config.retry_delay_for(attempt)).await;
                }
                Err(error) if error.is_recoverable() && attempt > 0 => {
                    return Err(FetchError::MaxRetriesExceeded {
                        url,
                        max_retries,
                        last_error: error.chain(),
                    });
                }
                Err(error) => return Err(error),
            }
        }
    }
}

/// Reserve `name` and each directory above it
///
/// An external entry named like a local entry's parent directory could not
/// be extracted next to it.
fn reserve_with_parents(name: &str, used: &mut BTreeSet<String>) {
    used.insert(name.to_string());
    let mut prefix = name;
    while let Some((parent, _)) = prefix.rsplit_once('/') {
        used.insert(parent.to_string());
        prefix = parent;
    }
}

/// Absolute URL for an external reference
///
/// A reference whose scheme is not followed by `//` has no authority; when
/// a base URL with the same scheme is configured the remainder is joined
/// against it. Everything else is parsed as written.
pub fn external_url(reference: &str, base_url: Option<&Url>) -> std::result::Result<Url, FetchError> {
    let invalid = |source| FetchError::InvalidUrl {
        url: reference.to_string(),
        source,
    };

    if let Some((scheme, rest)) = reference.split_once(':') {
        if !rest.starts_with("//") {
            if let Some(base) = base_url.filter(|b| b.scheme().eq_ignore_ascii_case(scheme)) {
                return base.join(rest).map_err(invalid);
            }
        }
    }
    Url::parse(reference).map_err(invalid)
}

/// Archive filename for a fetched URL, before collision handling
///
/// Uses the last path segment; falls back to `resource_<index>`.
pub fn derive_filename(url: &Url, index: usize) -> String {
    let segment = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .map(sanitize_filename)
        .unwrap_or_default();

    match segment.as_str() {
        "" | "." | ".." => format!("resource_{}", index),
        _ => segment,
    }
}
