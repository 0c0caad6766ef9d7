use reqwest::StatusCode;

// Custom error type for download operations. Cache-layer failures never
// show up here; the cache degrades to misses instead (see `cache`).
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    UrlError(String),

    #[error("Server returned status code {0}")]
    StatusCode(StatusCode),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Download of {uri} failed after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        uri: String,
        attempts: u32,
        last_error: String,
    },

    #[error("Download scheduler is no longer running")]
    SchedulerClosed,
}
