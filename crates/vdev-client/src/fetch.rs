//! Firmware asset fetching
//!
//! This module handles:
//! 1. Downloading a firmware asset from its remote URL
//! 2. Streaming the body into a uniquely named scratch file
//! 3. Exposing the result as an uploadable `FetchedAsset`
//!
//! A `FetchedAsset` owns its scratch file. The file is removed when the
//! value is dropped, so nothing is left behind whether registration
//! succeeds, fails, or the transfer is abandoned half way.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::config::RemediationConfig;

/// Content type used when uploading fetched assets
pub const OCTET_STREAM: &str = "application/octet-stream";

const SCRATCH_PREFIX: &str = "fwasset-";
const SCRATCH_SUFFIX: &str = ".tmp";

#[derive(Error, Debug)]
pub enum TransferError {
    #[error("request for {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned status {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error("{url} returned an empty body")]
    EmptyBody { url: String },
    #[error("scratch file error: {0}")]
    Io(#[from] std::io::Error),
}

/// A firmware asset downloaded to local scratch storage
#[derive(Debug)]
pub struct FetchedAsset {
    path: TempPath,
    file_name: String,
    last_modified: DateTime<Utc>,
    size: u64,
    sha256: String,
}

impl FetchedAsset {
    /// Write `data` to a new scratch file in `dir`
    ///
    /// Useful for asset sources that already hold the content in memory.
    pub fn from_bytes_in(dir: &Path, data: &[u8]) -> std::io::Result<Self> {
        let mut file = scratch_builder().tempfile_in(dir)?;
        file.write_all(data)?;
        file.as_file().sync_all()?;
        Ok(Self::from_parts(
            file.into_temp_path(),
            data.len() as u64,
            hex::encode(Sha256::digest(data)),
        ))
    }

    fn from_parts(path: TempPath, size: u64, sha256: String) -> Self {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("fwasset")
            .to_string();
        Self {
            path,
            file_name,
            last_modified: Utc::now(),
            size,
            sha256,
        }
    }

    /// Location of the scratch file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Upload file name (final segment of the scratch path)
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn content_type(&self) -> &'static str {
        OCTET_STREAM
    }

    pub fn last_modified(&self) -> DateTime<Utc> {
        self.last_modified
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Hex SHA-256 of the content
    pub fn sha256(&self) -> &str {
        &self.sha256
    }

    /// Re-open the scratch file for reading
    pub async fn open(&self) -> std::io::Result<tokio::fs::File> {
        tokio::fs::File::open(&self.path).await
    }
}

fn scratch_builder() -> tempfile::Builder<'static, 'static> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(SCRATCH_PREFIX).suffix(SCRATCH_SUFFIX);
    builder
}

/// Source of firmware assets for remediation
#[async_trait]
pub trait AssetSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedAsset, TransferError>;
}

/// Downloads firmware assets over HTTP into scratch storage
pub struct AssetFetcher {
    /// HTTP client
    client: reqwest::Client,
    scratch_dir: PathBuf,
}

impl AssetFetcher {
    /// Create a fetcher from remediation settings
    pub fn new(config: &RemediationConfig) -> Result<Self> {
        // Idle timeout only: a large image on a slow link must not be cut
        // off as long as data keeps arriving.
        let mut builder = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(30))
            .read_timeout(config.download_idle_timeout());
        if let Some(limit) = config.max_download() {
            builder = builder.timeout(limit);
        }
        let client = builder.build().context("Failed to create HTTP client")?;

        Ok(Self::with_client(client, config.scratch_dir()))
    }

    pub fn with_client(client: reqwest::Client, scratch_dir: PathBuf) -> Self {
        Self {
            client,
            scratch_dir,
        }
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// Download `url` into a fresh scratch file
    pub async fn download(&self, url: &str) -> Result<FetchedAsset, TransferError> {
        debug!(url = %url, "Fetching firmware asset");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| TransferError::Request {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransferError::Status {
                url: url.to_string(),
                status,
            });
        }

        let (std_file, path) = scratch_builder()
            .tempfile_in(&self.scratch_dir)?
            .into_parts();
        let mut file = tokio::fs::File::from_std(std_file);

        let mut hasher = Sha256::new();
        let mut size: u64 = 0;
        let mut stream = response.bytes_stream();

        // `path` outlives `file`, so any early return below closes the
        // file and then removes it.
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|source| TransferError::Request {
                url: url.to_string(),
                source,
            })?;
            hasher.update(&chunk);
            size += chunk.len() as u64;
            file.write_all(&chunk).await?;
        }

        if size == 0 {
            return Err(TransferError::EmptyBody {
                url: url.to_string(),
            });
        }

        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        let asset = FetchedAsset::from_parts(path, size, hex::encode(hasher.finalize()));

        info!(
            url = %url,
            size = asset.size(),
            sha256 = %&asset.sha256()[..16],
            path = %asset.path().display(),
            "Fetched firmware asset"
        );

        Ok(asset)
    }
}

#[async_trait]
impl AssetSource for AssetFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedAsset, TransferError> {
        self.download(url).await
    }
}
