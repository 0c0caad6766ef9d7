use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Define CLI arguments
#[derive(Parser)]
#[command(
    version,
    about = "Prioritized image downloader with a content-addressed cache",
    long_about = "Fetches remote images into a local content-addressed cache.\n\
                  \n\
                  Downloads run through a priority queue with bounded concurrency\n\
                  and bounded retry; completed files are materialized atomically,\n\
                  so a path reported here never points at partial bytes. Repeated\n\
                  fetches of the same URL (and dimensions) are served from the\n\
                  cache without touching the network."
)]
pub struct CliArgs {
    /// Cache directory
    #[arg(
        long,
        global = true,
        help = "Cache root directory (default: <system tmp>/pixio-cache)"
    )]
    pub cache_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true, help = "Enable detailed debug logging")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Download one or more URLs through the cache
    Fetch {
        /// URL(s) to fetch
        #[arg(required = true, help = "URL(s) to download")]
        urls: Vec<String>,

        /// Queue priority for these downloads
        #[arg(
            short,
            long,
            default_value = "normal",
            help = "Queue priority: low, normal or high"
        )]
        priority: String,

        /// Target width, folded into the cache key
        #[arg(long, help = "Desired width; part of the cache identity")]
        width: Option<u32>,

        /// Target height, folded into the cache key
        #[arg(long, help = "Desired height; part of the cache identity")]
        height: Option<u32>,

        /// Skip the cache probe and download unconditionally
        #[arg(long, help = "Ignore cached entries and download again")]
        no_cache: bool,

        /// Maximum number of concurrent transfers
        #[arg(
            short,
            long,
            default_value_t = 4,
            help = "Maximum number of transfers running at once"
        )]
        concurrency: usize,

        /// Maximum attempts per URL
        #[arg(
            long,
            default_value_t = 3,
            help = "Maximum attempts per URL, first try included"
        )]
        retries: u32,

        /// Extra request header (repeatable)
        #[arg(
            long = "header",
            value_name = "HEADER",
            help = "Extra request header as \"Name: value\" (repeatable)"
        )]
        headers: Vec<String>,

        /// Overall HTTP timeout in seconds
        #[arg(long, default_value_t = 30, help = "Overall HTTP timeout in seconds")]
        timeout: u64,
    },

    /// Print the aggregate size of the cache
    Size,

    /// Delete every cached entry
    Clear,
}
