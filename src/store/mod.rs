//! Durable crawl state: the article dataset and the resume checkpoint.
//!
//! # Files
//!
//! ```text
//! data_dir/
//! ├── khabaronline_all.json   # { "1400": { "7": { "5": [Article, ...] } } }
//! └── checkpoint.json         # { "jy": 1400, "jm": 7, "jd": 5 }
//! ```
//!
//! # Overwrite vs append
//!
//! Both files are rewritten whole once per crawled day. Each write lands in a
//! sibling `*.tmp` file that is then renamed over the target, so a crash leaves
//! either the previous or the new snapshot on disk, never a torn one.

pub mod checkpoint;
pub mod dataset;

pub use checkpoint::CheckpointStore;
pub use dataset::Dataset;

use crate::calendar::CalendarError;
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("corrupt state file {}: {source}", .path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize state: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("checkpoint {} names an invalid date: {source}", .path.display())]
    InvalidCheckpoint {
        path: PathBuf,
        #[source]
        source: CalendarError,
    },
}

/// Read a state file, treating a missing file as `None`.
async fn read_if_exists(path: &Path) -> Result<Option<Vec<u8>>, StoreError> {
    match fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(source) => Err(StoreError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Replace `path` with `bytes` via a temp file and rename.
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let mut tmp = OsString::from(path.as_os_str());
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    let io_err = |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };
    fs::write(&tmp, bytes).await.map_err(io_err)?;
    fs::rename(&tmp, path).await.map_err(io_err)
}
