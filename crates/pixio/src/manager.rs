//! # Fetch Manager
//!
//! Ties the cache store and the download scheduler together behind the
//! data flow consumers actually want: derive the key, probe the cache,
//! and only go to the network on a miss. One constructed instance is
//! shared per process and injected into whatever renders the images (or
//! into the CLI); there is no module-level singleton.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;

use crate::cache::{CacheKey, CacheStore};
use crate::config::DownloaderConfig;
use crate::error::DownloadError;
use crate::scheduler::{DownloadScheduler, Priority, SchedulerConfig};
use crate::transfer::{HttpTransfer, Transfer};

/// Configuration for a [`FetchManager`].
#[derive(Debug, Clone)]
pub struct FetchManagerConfig {
    /// Root directory of the file cache, environment-provided
    pub cache_dir: PathBuf,
    /// HTTP client options
    pub downloader: DownloaderConfig,
    /// Queue and retry tunables
    pub scheduler: SchedulerConfig,
}

impl FetchManagerConfig {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            downloader: DownloaderConfig::default(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

/// One image fetch: the request-identity tuple plus queue options.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub uri: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub priority: Priority,
    /// When false the cache probe is skipped and the transfer always
    /// runs; the result still lands in the cache directory.
    pub use_cache: bool,
}

impl FetchRequest {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            width: None,
            height: None,
            priority: Priority::default(),
            use_cache: true,
        }
    }

    /// Fold target dimensions into the request identity
    pub fn with_dimensions(mut self, width: Option<u32>, height: Option<u32>) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set the queue priority
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Enable or disable the cache probe for this request
    pub fn with_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    fn key(&self) -> CacheKey {
        CacheKey::new(&self.uri).with_dimensions(self.width, self.height)
    }
}

/// Long-lived service combining a [`CacheStore`] and a
/// [`DownloadScheduler`]. Construct once, clone freely.
#[derive(Clone)]
pub struct FetchManager {
    store: CacheStore,
    scheduler: DownloadScheduler,
}

impl FetchManager {
    /// Build a manager with an HTTP transfer from the given configuration.
    pub async fn new(config: FetchManagerConfig) -> Result<Self, DownloadError> {
        let transfer = Arc::new(HttpTransfer::from_config(&config.downloader)?);
        Ok(Self::with_transfer(config, transfer).await)
    }

    /// Build a manager over an explicit transfer primitive.
    pub async fn with_transfer(config: FetchManagerConfig, transfer: Arc<dyn Transfer>) -> Self {
        let store = CacheStore::new(config.cache_dir);
        store.ensure_ready().await;
        let scheduler = DownloadScheduler::new(transfer, config.scheduler);
        Self { store, scheduler }
    }

    /// Resolve `request` to a local file path: served from the cache when
    /// possible, downloaded into the cache otherwise.
    pub async fn fetch(&self, request: FetchRequest) -> Result<PathBuf, DownloadError> {
        url::Url::parse(&request.uri).map_err(|e| DownloadError::UrlError(e.to_string()))?;

        let key = request.key();
        if request.use_cache {
            if let Some(path) = self.store.lookup(&key).await {
                debug!(uri = %request.uri, path = ?path, "Cache hit");
                return Ok(path);
            }
        }

        let destination = self.store.path_for(&key);
        self.scheduler
            .submit(request.uri, destination, request.priority)
            .await
    }

    /// The underlying cache store
    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    /// The underlying scheduler, for callers that manage their own paths
    pub fn scheduler(&self) -> &DownloadScheduler {
        &self.scheduler
    }

    /// Aggregate size of the cache in bytes
    pub async fn cache_size(&self) -> u64 {
        self.store.total_size().await
    }

    /// Drop every cached entry. See [`CacheStore::clear`] for the
    /// concurrency caveats.
    pub async fn clear_cache(&self) {
        self.store.clear().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tempfile::TempDir;
    use tokio::fs;

    /// Writes the uri as the file's contents and counts invocations.
    struct CountingTransfer {
        calls: AtomicU32,
    }

    impl CountingTransfer {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicU32::new(0),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl Transfer for CountingTransfer {
        async fn transfer(&self, uri: &str, destination: &Path) -> Result<(), DownloadError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            fs::write(destination, uri.as_bytes()).await?;
            Ok(())
        }
    }

    async fn manager_in(dir: &TempDir, transfer: Arc<dyn Transfer>) -> FetchManager {
        let config = FetchManagerConfig::new(dir.path().join("cache"));
        FetchManager::with_transfer(config, transfer).await
    }

    #[tokio::test]
    async fn test_fetch_downloads_then_hits_cache() {
        let dir = TempDir::new().unwrap();
        let transfer = CountingTransfer::new();
        let manager = manager_in(&dir, transfer.clone()).await;

        let request = FetchRequest::new("https://img.example/cat.png");
        let path = manager.fetch(request.clone()).await.unwrap();
        assert!(path.starts_with(manager.store().root()));
        assert_eq!(transfer.calls(), 1);

        // Second fetch is served from the cache.
        let again = manager.fetch(request).await.unwrap();
        assert_eq!(again, path);
        assert_eq!(transfer.calls(), 1);
    }

    #[tokio::test]
    async fn test_fetch_without_cache_probe_redownloads() {
        let dir = TempDir::new().unwrap();
        let transfer = CountingTransfer::new();
        let manager = manager_in(&dir, transfer.clone()).await;

        let request = FetchRequest::new("https://img.example/cat.png");
        manager.fetch(request.clone()).await.unwrap();
        manager.fetch(request.with_cache(false)).await.unwrap();
        assert_eq!(transfer.calls(), 2);
    }

    #[tokio::test]
    async fn test_dimensions_partition_the_cache() {
        let dir = TempDir::new().unwrap();
        let transfer = CountingTransfer::new();
        let manager = manager_in(&dir, transfer.clone()).await;

        let thumb = manager
            .fetch(
                FetchRequest::new("https://img.example/cat.png")
                    .with_dimensions(Some(100), Some(100)),
            )
            .await
            .unwrap();
        let full = manager
            .fetch(FetchRequest::new("https://img.example/cat.png"))
            .await
            .unwrap();

        assert_ne!(thumb, full);
        assert_eq!(transfer.calls(), 2);
    }

    #[tokio::test]
    async fn test_clear_then_refetch() {
        let dir = TempDir::new().unwrap();
        let transfer = CountingTransfer::new();
        let manager = manager_in(&dir, transfer.clone()).await;

        let request = FetchRequest::new("https://img.example/cat.png");
        let path = manager.fetch(request.clone()).await.unwrap();
        assert!(manager.cache_size().await > 0);

        manager.clear_cache().await;
        let key = CacheKey::new("https://img.example/cat.png");
        assert_eq!(manager.store().lookup(&key).await, None);
        assert_eq!(manager.cache_size().await, 0);

        let refetched = manager.fetch(request).await.unwrap();
        assert_eq!(refetched, path);
        assert_eq!(transfer.calls(), 2);
    }

    #[tokio::test]
    async fn test_rejects_invalid_uri() {
        let dir = TempDir::new().unwrap();
        let manager = manager_in(&dir, CountingTransfer::new()).await;

        let err = manager
            .fetch(FetchRequest::new("not a url"))
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::UrlError(_)));
    }
}
