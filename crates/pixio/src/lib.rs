//! # Pixio Engine
//!
//! A library for fetching remote images into a local, content-addressed
//! file cache. The heart of the crate is a priority-ordered download
//! scheduler with bounded concurrency and bounded retry, feeding a flat
//! cache directory keyed by request identity.
//!
//! ## Features
//!
//! - Content-addressed file cache keyed by (URI, optional dimensions)
//! - Priority queue (`high > normal > low`) with bounded concurrency
//! - Bounded retry with atomic temp-file-then-rename materialization
//! - In-flight request coalescing per destination path
//! - Fail-open cache semantics: filesystem trouble degrades to misses

pub mod builder;
pub mod cache;
pub mod config;
pub mod error;
pub mod manager;
pub mod scheduler;
pub mod transfer;

pub use builder::DownloaderConfigBuilder;
pub use cache::{CacheKey, CacheStore};
pub use config::{DownloaderConfig, create_client};
pub use error::DownloadError;
pub use manager::{FetchManager, FetchManagerConfig, FetchRequest};
pub use scheduler::{DownloadScheduler, Priority, SchedulerConfig};
pub use transfer::{HttpTransfer, Transfer};
