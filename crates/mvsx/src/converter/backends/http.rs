//! HTTP-based resource fetcher

use crate::converter::{
    config::ConvertConfig,
    core::{
        files::{atomic_rename, create_temp_path},
        ConvertError, FetchError, FileOperation, ProgressCallback, Result,
    },
    registry::ResourceFetcher,
};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info_span, Instrument};
use url::Url;

/// HTTP/HTTPS fetcher streaming the body to disk
pub struct HttpFetcher {
    client: Client,
    timeout_secs: u64,
}

impl HttpFetcher {
    pub fn new(config: &ConvertConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| ConvertError::Configuration {
                message: format!("failed to create HTTP client: {}", e),
                field: None,
            })?;

        Ok(Self {
            client,
            timeout_secs: config.timeout.as_secs(),
        })
    }

    async fn download_file(&self, url: &Url, dest_path: &Path) -> std::result::Result<u64, FetchError> {
        let url_str = url.as_str();
        let reqwest_error = |e: reqwest::Error| FetchError::from_reqwest(url_str, e, self.timeout_secs);
        let fs_error = |path: &Path, operation: FileOperation| {
            let path = path.to_path_buf();
            move |source: std::io::Error| FetchError::FileSystem { path, operation, source }
        };

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(reqwest_error)?
            .error_for_status()
            .map_err(reqwest_error)?;
        debug!("Content length: {:?}", response.content_length());

        let temp_path = create_temp_path(dest_path);
        let mut file = fs::File::create(&temp_path)
            .await
            .map_err(fs_error(&temp_path, FileOperation::Create))?;

        let mut stream = response.bytes_stream();
        let mut downloaded = 0u64;
        let written: std::result::Result<(), FetchError> = async {
            while let Some(chunk) = stream.next().await {
                let chunk = chunk.map_err(reqwest_error)?;
                file.write_all(&chunk)
                    .await
                    .map_err(fs_error(&temp_path, FileOperation::Write))?;
                downloaded += chunk.len() as u64;
            }
            file.flush()
                .await
                .map_err(fs_error(&temp_path, FileOperation::Write))
        }
        .await;
        drop(file);

        if let Err(e) = written {
            // Drop the partial body so nothing stale is left in staging
            let _ = fs::remove_file(&temp_path).await;
            return Err(e);
        }

        atomic_rename(&temp_path, dest_path).await?;
        debug!("Fetch completed: {} bytes", downloaded);
        Ok(downloaded)
    }
}

#[async_trait]
impl ResourceFetcher for HttpFetcher {
    async fn fetch(
        &self,
        url: &Url,
        dest_path: &Path,
        _progress_callback: Option<ProgressCallback>,
    ) -> std::result::Result<u64, FetchError> {
        self.download_file(url, dest_path)
            .instrument(info_span!("http_fetch", url = %url))
            .await
    }

    fn supports_scheme(&self, scheme: &str) -> bool {
        matches!(scheme, "http" | "https")
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
