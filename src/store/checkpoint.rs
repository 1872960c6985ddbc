//! Resume cursor: the Jalali day the crawl last completed.

use super::{StoreError, read_if_exists, write_atomic};
use crate::calendar::JalaliDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

/// On-disk form, `{ "jy": 1400, "jm": 7, "jd": 5 }`.
#[derive(Debug, Deserialize, Serialize)]
struct CheckpointRecord {
    jy: i32,
    jm: u32,
    jd: u32,
}

#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The saved cursor, or `default` when nothing has been saved yet.
    ///
    /// # Arguments
    ///
    /// * `default` - Day to start from when no checkpoint file exists
    ///
    /// # Errors
    ///
    /// [`StoreError::Corrupt`] for a file that is not a checkpoint record, and
    /// [`StoreError::InvalidCheckpoint`] for one naming a day that does not
    /// exist on the calendar.
    #[instrument(level = "info", skip_all, fields(path = %self.path.display()))]
    pub async fn load(&self, default: JalaliDate) -> Result<JalaliDate, StoreError> {
        let Some(bytes) = read_if_exists(&self.path).await? else {
            info!(start = %default, "No checkpoint; using start date");
            return Ok(default);
        };

        let record: CheckpointRecord =
            serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt {
                path: self.path.clone(),
                source,
            })?;
        let date = JalaliDate::new(record.jy, record.jm, record.jd).map_err(|source| {
            StoreError::InvalidCheckpoint {
                path: self.path.clone(),
                source,
            }
        })?;
        info!(%date, "Resuming from checkpoint");
        Ok(date)
    }

    /// Overwrite the checkpoint with `date`.
    pub async fn save(&self, date: JalaliDate) -> Result<(), StoreError> {
        let record = CheckpointRecord {
            jy: date.year(),
            jm: date.month(),
            jd: date.day(),
        };
        write_atomic(&self.path, &serde_json::to_vec(&record)?).await?;
        info!(%date, "Checkpoint saved");
        Ok(())
    }
}
