//! # Transfer
//!
//! The network boundary: moving the bytes behind one URI into one local
//! file. The scheduler owns temporary-file placement and atomic renames;
//! implementations write to exactly the path they are given.

use std::path::Path;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, StatusCode};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::config::{DownloaderConfig, create_client};
use crate::error::DownloadError;

/// A primitive that fetches `uri` and writes its bytes to `destination`.
#[async_trait]
pub trait Transfer: Send + Sync {
    async fn transfer(&self, uri: &str, destination: &Path) -> Result<(), DownloadError>;
}

/// HTTP implementation backed by a shared reqwest client.
pub struct HttpTransfer {
    client: Client,
}

impl HttpTransfer {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn from_config(config: &DownloaderConfig) -> Result<Self, DownloadError> {
        Ok(Self::new(create_client(config)?))
    }
}

#[async_trait]
impl Transfer for HttpTransfer {
    async fn transfer(&self, uri: &str, destination: &Path) -> Result<(), DownloadError> {
        let response = self.client.get(uri).send().await?;

        // 200 is the sole success signal.
        let status = response.status();
        if status != StatusCode::OK {
            return Err(DownloadError::StatusCode(status));
        }

        let mut file = fs::File::create(destination).await?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        debug!(uri, bytes = written, "Transfer complete");
        Ok(())
    }
}
