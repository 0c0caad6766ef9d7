use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use futures::future::join_all;
use pixio_engine::{
    CacheStore, DownloaderConfig, FetchManager, FetchManagerConfig, FetchRequest, Priority,
    SchedulerConfig,
};
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

mod cli;
mod error;
mod utils;

use cli::{CliArgs, Command};
use error::AppError;
use utils::{format_size, parse_headers};

fn main() {
    if let Err(e) = bootstrap() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

#[tokio::main]
async fn bootstrap() -> Result<(), AppError> {
    // Parse command-line arguments
    let args = CliArgs::parse();

    // Setup logging
    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_ansi(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| AppError::Initialization(e.to_string()))?;

    let cache_dir = args
        .cache_dir
        .unwrap_or_else(|| std::env::temp_dir().join("pixio-cache"));

    match args.command {
        Command::Fetch {
            urls,
            priority,
            width,
            height,
            no_cache,
            concurrency,
            retries,
            headers,
            timeout,
        } => {
            fetch(
                cache_dir,
                urls,
                &priority,
                width,
                height,
                no_cache,
                concurrency,
                retries,
                &headers,
                timeout,
            )
            .await
        }
        Command::Size => {
            let store = CacheStore::new(&cache_dir);
            let size = store.total_size().await;
            info!(
                "Cache at {} holds {} ({size} bytes)",
                cache_dir.display(),
                format_size(size)
            );
            Ok(())
        }
        Command::Clear => {
            let store = CacheStore::new(&cache_dir);
            store.clear().await;
            info!("Cache at {} cleared", cache_dir.display());
            Ok(())
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn fetch(
    cache_dir: PathBuf,
    urls: Vec<String>,
    priority: &str,
    width: Option<u32>,
    height: Option<u32>,
    no_cache: bool,
    concurrency: usize,
    retries: u32,
    headers: &[String],
    timeout: u64,
) -> Result<(), AppError> {
    let priority = match priority {
        "low" => Priority::Low,
        "normal" => Priority::Normal,
        "high" => Priority::High,
        other => {
            return Err(AppError::InvalidInput(format!(
                "Invalid priority: '{other}' (expected low, normal or high)"
            )));
        }
    };

    if concurrency == 0 {
        return Err(AppError::InvalidInput(
            "Concurrency must be at least 1".to_string(),
        ));
    }

    let downloader = DownloaderConfig::builder()
        .with_timeout(Duration::from_secs(timeout))
        .with_headers(parse_headers(headers)?)
        .build();
    let config = FetchManagerConfig {
        cache_dir,
        downloader,
        scheduler: SchedulerConfig {
            download_concurrency: concurrency,
            max_retry_count: retries,
        },
    };
    let manager = FetchManager::new(config).await?;

    let results = join_all(urls.iter().map(|url| {
        let request = FetchRequest::new(url)
            .with_dimensions(width, height)
            .with_priority(priority)
            .with_cache(!no_cache);
        manager.fetch(request)
    }))
    .await;

    let mut failed = 0usize;
    for (url, result) in urls.iter().zip(results) {
        match result {
            Ok(path) => info!("{url} -> {}", path.display()),
            Err(e) => {
                failed += 1;
                error!("{url}: {e}");
            }
        }
    }

    if failed > 0 {
        return Err(AppError::DownloadsFailed {
            failed,
            total: urls.len(),
        });
    }
    Ok(())
}
