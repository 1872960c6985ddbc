//! Crawl settings.
//!
//! Settings are layered, later layers winning:
//!
//! 1. compiled-in defaults ([`CrawlConfig::default`])
//! 2. an optional YAML file ([`FileConfig`], every key optional)
//! 3. command-line flags ([`Cli`])
//!
//! ```yaml
//! site: https://www.khabaronline.ir/
//! start: 1388-02-31
//! end: 1403-03-01
//! data_dir: /app/data
//! min_delay_ms: 200
//! max_delay_ms: 400
//! throttle_backoff_secs: 1800
//! ```

use crate::calendar::JalaliDate;
use crate::cli::Cli;
use crate::fetch::Pacing;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

pub const DEFAULT_SITE: &str = "https://www.khabaronline.ir/";
pub const DEFAULT_DATA_FILE: &str = "khabaronline_all.json";
pub const DEFAULT_CHECKPOINT_FILE: &str = "checkpoint.json";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {}: {source}", .path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("crawl window is empty: start {start} is after end {end}")]
    EmptyWindow { start: JalaliDate, end: JalaliDate },
    #[error("min_delay_ms ({min}) is greater than max_delay_ms ({max})")]
    DelayBounds { min: u64, max: u64 },
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlConfig {
    pub site: Url,
    /// First day to crawl when there is no checkpoint.
    pub start: JalaliDate,
    /// Last day to crawl, inclusive.
    pub end: JalaliDate,
    pub data_dir: PathBuf,
    pub data_file: PathBuf,
    pub checkpoint_file: PathBuf,
    pub pacing: Pacing,
    pub request_timeout: Option<Duration>,
    pub user_agent: String,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            site: Url::parse(DEFAULT_SITE).expect("DEFAULT_SITE is a valid URL"),
            start: JalaliDate::new(1388, 2, 31).expect("default start is a valid date"),
            end: JalaliDate::new(1403, 3, 1).expect("default end is a valid date"),
            data_dir: PathBuf::from("."),
            data_file: PathBuf::from(DEFAULT_DATA_FILE),
            checkpoint_file: PathBuf::from(DEFAULT_CHECKPOINT_FILE),
            pacing: Pacing::default(),
            request_timeout: None,
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl CrawlConfig {
    /// Merge defaults, the config file and CLI flags, then validate.
    pub fn resolve(file: FileConfig, cli: &Cli) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(site) = file.site {
            config.site = site;
        }
        if let Some(start) = file.start {
            config.start = start;
        }
        if let Some(end) = file.end {
            config.end = end;
        }
        if let Some(dir) = file.data_dir {
            config.data_dir = dir;
        }
        if let Some(name) = file.data_file {
            config.data_file = name;
        }
        if let Some(name) = file.checkpoint_file {
            config.checkpoint_file = name;
        }
        if let Some(ms) = file.min_delay_ms {
            config.pacing.min_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = file.max_delay_ms {
            config.pacing.max_delay = Duration::from_millis(ms);
        }
        if let Some(secs) = file.throttle_backoff_secs {
            config.pacing.throttle_backoff = Duration::from_secs(secs);
        }
        if let Some(secs) = file.request_timeout_secs {
            config.request_timeout = Some(Duration::from_secs(secs));
        }
        if let Some(agent) = file.user_agent {
            config.user_agent = agent;
        }

        if let Some(site) = &cli.site {
            config.site = site.clone();
        }
        if let Some(start) = cli.start {
            config.start = start;
        }
        if let Some(end) = cli.end {
            config.end = end;
        }
        if let Some(dir) = &cli.data_dir {
            config.data_dir = dir.clone();
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.start > self.end {
            return Err(ConfigError::EmptyWindow {
                start: self.start,
                end: self.end,
            });
        }
        let min = self.pacing.min_delay.as_millis() as u64;
        let max = self.pacing.max_delay.as_millis() as u64;
        if min > max {
            return Err(ConfigError::DelayBounds { min, max });
        }
        Ok(())
    }

    /// Location of the dataset snapshot.
    pub fn data_path(&self) -> PathBuf {
        self.data_dir.join(&self.data_file)
    }

    /// Location of the checkpoint file.
    pub fn checkpoint_path(&self) -> PathBuf {
        self.data_dir.join(&self.checkpoint_file)
    }
}

/// Contents of the optional YAML config file.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub site: Option<Url>,
    pub start: Option<JalaliDate>,
    pub end: Option<JalaliDate>,
    pub data_dir: Option<PathBuf>,
    pub data_file: Option<PathBuf>,
    pub checkpoint_file: Option<PathBuf>,
    pub min_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
    pub throttle_backoff_secs: Option<u64>,
    pub request_timeout_secs: Option<u64>,
    pub user_agent: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&text).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })
    }
}
