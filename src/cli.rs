//! Command-line interface definitions for khabar_harvest.
//!
//! Every flag is optional. Without any, the crawl runs with the compiled-in
//! site, window and file names; flags and the YAML config only override them.

use crate::calendar::JalaliDate;
use clap::Parser;
use std::path::PathBuf;
use url::Url;

/// Command-line arguments for khabar_harvest.
///
/// # Examples
///
/// ```sh
/// # Resume (or start) with the defaults, state files in the working directory
/// khabar_harvest
///
/// # Keep state under a mounted volume and stop at a given day
/// khabar_harvest -d /app/data --end 1402-12-29
///
/// # Settings from a file, with one override
/// khabar_harvest -c harvest.yaml --start 1395-01-01
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a YAML config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Directory holding the dataset and checkpoint files
    #[arg(short, long)]
    pub data_dir: Option<PathBuf>,

    /// Jalali day to start from when there is no checkpoint (YYYY-MM-DD)
    #[arg(long)]
    pub start: Option<JalaliDate>,

    /// Last Jalali day to crawl, inclusive (YYYY-MM-DD)
    #[arg(long)]
    pub end: Option<JalaliDate>,

    /// Base URL of the news site
    #[arg(long)]
    pub site: Option<Url>,
}
