//! # Cache Store
//!
//! A flat-directory file cache with fail-open semantics: every filesystem
//! error degrades to a miss (or a zero size) and is logged, never
//! propagated. The cache must not turn an otherwise-servable request into
//! a hard failure.

use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, warn};

use crate::cache::key::CacheKey;

/// Filesystem-backed cache scoped to a single flat root directory.
///
/// No in-memory index is kept; membership is a direct filesystem query.
/// Entries are created by the download scheduler's atomic renames, never
/// mutated, and destroyed only by [`CacheStore::clear`].
#[derive(Debug, Clone)]
pub struct CacheStore {
    root: PathBuf,
}

impl CacheStore {
    /// Create a store over `root`. The directory itself is created lazily
    /// by [`CacheStore::ensure_ready`].
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The cache root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the cache root if it does not exist. Idempotent.
    ///
    /// Creation failures are logged and swallowed; the store then serves
    /// misses until the directory becomes available.
    pub async fn ensure_ready(&self) {
        if let Err(e) = fs::create_dir_all(&self.root).await {
            warn!(dir = ?self.root, error = %e, "Failed to create cache directory");
        }
    }

    /// Fully qualified path a file for `key` would occupy. No I/O; this is
    /// also the destination handed to the download scheduler.
    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.root.join(key.to_filename())
    }

    /// Path of the cached file for `key`, or `None` on a miss.
    ///
    /// Filesystem errors are treated as misses.
    pub async fn lookup(&self, key: &CacheKey) -> Option<PathBuf> {
        let path = self.path_for(key);
        match fs::try_exists(&path).await {
            Ok(true) => Some(path),
            Ok(false) => None,
            Err(e) => {
                warn!(path = ?path, error = %e, "Cache existence check failed");
                None
            }
        }
    }

    /// Total size in bytes of all direct entries under the root.
    ///
    /// Returns 0 if the directory cannot be read.
    pub async fn total_size(&self) -> u64 {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = ?self.root, error = %e, "Failed to read cache directory");
                return 0;
            }
        };

        let mut total = 0u64;
        loop {
            match entries.next_entry().await {
                Ok(Some(entry)) => match entry.metadata().await {
                    Ok(meta) if meta.is_file() => total += meta.len(),
                    Ok(_) => {}
                    Err(e) => {
                        warn!(path = ?entry.path(), error = %e, "Failed to read entry metadata");
                    }
                },
                Ok(None) => break,
                Err(e) => {
                    warn!(dir = ?self.root, error = %e, "Failed to list cache directory");
                    return 0;
                }
            }
        }
        total
    }

    /// Delete the entire root directory tree and recreate it empty.
    ///
    /// Failures are logged, not propagated; a partially cleared cache is
    /// acceptable and a later [`CacheStore::ensure_ready`] recreates the
    /// root. Not atomic with respect to concurrent lookups or in-flight
    /// downloads targeting this root: a racing lookup may observe a
    /// transient absence or a stale hit. Callers should avoid clearing
    /// while downloads into this root are in flight.
    pub async fn clear(&self) {
        match fs::remove_dir_all(&self.root).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(dir = ?self.root, error = %e, "Failed to clear cache directory");
            }
        }
        self.ensure_ready().await;
        debug!(dir = ?self.root, "Cache cleared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn key(name: &str) -> CacheKey {
        CacheKey::new(format!("https://img.example/{name}"))
    }

    async fn store_in(dir: &TempDir) -> CacheStore {
        let store = CacheStore::new(dir.path().join("cache"));
        store.ensure_ready().await;
        store
    }

    #[tokio::test]
    async fn test_ensure_ready_creates_root_and_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = CacheStore::new(dir.path().join("cache"));

        store.ensure_ready().await;
        assert!(store.root().is_dir());
        store.ensure_ready().await;
        assert!(store.root().is_dir());
    }

    #[tokio::test]
    async fn test_lookup_miss_then_hit() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir).await;
        let key = key("cat.png");

        assert_eq!(store.lookup(&key).await, None);

        let path = store.path_for(&key);
        fs::write(&path, b"image bytes").await.unwrap();
        assert_eq!(store.lookup(&key).await, Some(path));
    }

    #[tokio::test]
    async fn test_path_for_is_pure_and_matches_lookup() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir).await;
        let key = key("dog.png");

        let expected = store.root().join(key.to_filename());
        assert_eq!(store.path_for(&key), expected);
        // No file was created by path_for.
        assert_eq!(store.lookup(&key).await, None);
    }

    #[tokio::test]
    async fn test_total_size_sums_direct_entries() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir).await;

        fs::write(store.path_for(&key("a")), vec![0u8; 5])
            .await
            .unwrap();
        fs::write(store.path_for(&key("b")), vec![0u8; 7])
            .await
            .unwrap();
        assert_eq!(store.total_size().await, 12);
    }

    #[tokio::test]
    async fn test_total_size_is_zero_without_root() {
        let dir = TempDir::new().unwrap();
        let store = CacheStore::new(dir.path().join("never-created"));
        assert_eq!(store.total_size().await, 0);
    }

    #[tokio::test]
    async fn test_clear_empties_and_recreates_root() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir).await;
        let key = key("cat.png");

        fs::write(store.path_for(&key), b"image bytes").await.unwrap();
        assert!(store.lookup(&key).await.is_some());

        store.clear().await;
        assert!(store.root().is_dir());
        assert_eq!(store.lookup(&key).await, None);
        assert_eq!(store.total_size().await, 0);

        // The store keeps working after a clear.
        fs::write(store.path_for(&key), b"fresh").await.unwrap();
        assert!(store.lookup(&key).await.is_some());
    }
}
