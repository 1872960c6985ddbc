//! # khabar_harvest
//!
//! A resumable harvester that walks a news site day by day on the Jalali
//! calendar and accumulates every article it finds into one deduplicated JSON
//! dataset.
//!
//! ## Usage
//!
//! ```sh
//! khabar_harvest -d ./data --end 1403-03-01
//! ```
//!
//! ## Architecture
//!
//! For each day from the checkpoint (or start date) through the end date:
//! 1. **Indexing**: fetch the day's sitemap and list its article URLs
//! 2. **Fetching**: download and parse each article, skipping known ids
//! 3. **Persisting**: rewrite the dataset snapshot, then the checkpoint
//!
//! Requests are strictly sequential, paced 200–400 ms apart, and a `429`
//! response pauses the crawl for 30 minutes before retrying. Interrupting the
//! process is safe: the next run resumes at the last checkpointed day.

use clap::Parser;
use std::error::Error;
use std::time::Instant;
use tracing::{debug, error, info};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod calendar;
mod cli;
mod config;
mod crawler;
mod fetch;
mod models;
mod scrapers;
mod store;
mod utils;

use cli::Cli;
use config::{CrawlConfig, FileConfig};
use crawler::Crawler;
use fetch::{HttpFetcher, Paced};
use utils::ensure_writable_dir;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = Instant::now();
    info!("khabar_harvest starting up");

    // --- Configuration ---
    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let file_config = match &args.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };
    let config = CrawlConfig::resolve(file_config, &args)?;
    info!(
        site = %config.site,
        start = %config.start,
        end = %config.end,
        dataset = %config.data_path().display(),
        checkpoint = %config.checkpoint_path().display(),
        "Resolved configuration"
    );

    // Early check: a read-only data dir should fail before the first day is crawled
    if let Err(e) = ensure_writable_dir(&config.data_dir).await {
        error!(
            path = %config.data_dir.display(),
            error = %e,
            "Data directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    // --- Crawl ---
    let http = HttpFetcher::new(&config.user_agent, config.request_timeout)?;
    let fetcher = Paced::new(http, config.pacing);
    let mut crawler = Crawler::open(&config, fetcher).await?;
    let summary = crawler.run().await?;

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        days = summary.days,
        added = summary.added,
        last_day = ?summary.last_day.map(|d| d.to_string()),
        "Execution complete"
    );

    Ok(())
}
