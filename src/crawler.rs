//! The day-by-day crawl loop.
//!
//! ```text
//! Idle ──► ProcessingDay ──► PersistingDay ──► Advancing ──► Done
//!               ▲                                  │
//!               └──────────── next day ────────────┘
//! ```
//!
//! - **Idle** is [`Crawler::open`]: the checkpoint and the dataset are loaded once.
//! - **ProcessingDay** resolves the day's sitemap and extracts each link in
//!   order, adding articles whose id is not yet known.
//! - **PersistingDay** flushes the dataset, then saves the checkpoint. The
//!   checkpoint is only written after the flush succeeded.
//! - **Advancing** stops after the configured end day, inclusive.
//!
//! A restart resumes at the checkpointed day and processes it again from its
//! first link. Articles already captured are recognised by id and skipped,
//! so nothing is stored twice.

use crate::calendar::{CalendarError, JalaliDate};
use crate::config::CrawlConfig;
use crate::fetch::Fetch;
use crate::scrapers::{article, sitemap};
use crate::store::{CheckpointStore, Dataset, StoreError};
use tracing::{debug, info, instrument, warn};
use url::Url;

#[derive(Debug, thiserror::Error)]
pub enum CrawlError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Calendar(#[from] CalendarError),
}

/// Where the crawl loop is. Idle is represented by [`Crawler::open`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrawlState {
    ProcessingDay(JalaliDate),
    PersistingDay(JalaliDate, DayReport),
    Advancing(JalaliDate),
    Done,
}

/// Outcome counters for a single day.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DayReport {
    /// Links listed by the sitemap.
    pub links: usize,
    pub added: usize,
    /// Extracted, but the id was already known.
    pub duplicates: usize,
    /// Could not be fetched.
    pub unparsable: usize,
    /// Added with one or more empty fields.
    pub partial: usize,
}

/// Outcome counters for a whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlSummary {
    pub days: usize,
    /// Days whose sitemap produced no links.
    pub empty_days: usize,
    pub links: usize,
    pub added: usize,
    pub duplicates: usize,
    pub unparsable: usize,
    pub partial: usize,
    pub last_day: Option<JalaliDate>,
}

impl CrawlSummary {
    fn record(&mut self, day: JalaliDate, report: &DayReport) {
        self.days += 1;
        if report.links == 0 {
            self.empty_days += 1;
        }
        self.links += report.links;
        self.added += report.added;
        self.duplicates += report.duplicates;
        self.unparsable += report.unparsable;
        self.partial += report.partial;
        self.last_day = Some(day);
    }
}

/// Owns the crawl state and drives it to the end date.
#[derive(Debug)]
pub struct Crawler<F> {
    fetcher: F,
    site: Url,
    end: JalaliDate,
    cursor: JalaliDate,
    dataset: Dataset,
    checkpoints: CheckpointStore,
}

impl<F> Crawler<F>
where
    F: Fetch,
{
    /// Load the checkpoint (or the configured start day) and the dataset.
    #[instrument(level = "info", skip_all)]
    pub async fn open(config: &CrawlConfig, fetcher: F) -> Result<Self, CrawlError> {
        let checkpoints = CheckpointStore::new(config.checkpoint_path());
        let cursor = checkpoints.load(config.start).await?;
        let dataset = Dataset::open(config.data_path()).await?;
        info!(
            %cursor,
            end = %config.end,
            articles = dataset.len(),
            dataset = %dataset.path().display(),
            checkpoint = %checkpoints.path().display(),
            "Crawler ready"
        );

        Ok(Self {
            fetcher,
            site: config.site.clone(),
            end: config.end,
            cursor,
            dataset,
            checkpoints,
        })
    }

    /// The day being processed, or the last one processed once done.
    pub fn cursor(&self) -> JalaliDate {
        self.cursor
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    /// Crawl from the cursor through the end day.
    ///
    /// Each day is flushed to the dataset file and then checkpointed before
    /// the next one starts.
    ///
    /// # Returns
    ///
    /// Counters for the days processed in this run. A cursor already past the
    /// end date returns an empty summary without touching the network.
    ///
    /// # Errors
    ///
    /// [`CrawlError::Store`] when the dataset or the checkpoint cannot be
    /// written. A failed flush stops the run before the checkpoint moves.
    pub async fn run(&mut self) -> Result<CrawlSummary, CrawlError> {
        let mut summary = CrawlSummary::default();

        if self.cursor > self.end {
            warn!(
                cursor = %self.cursor,
                end = %self.end,
                "Checkpoint is already past the end date; nothing to do"
            );
            return Ok(summary);
        }

        let mut state = CrawlState::ProcessingDay(self.cursor);
        loop {
            debug!(?state, "Crawl state");
            state = match state {
                CrawlState::ProcessingDay(day) => {
                    self.cursor = day;
                    let report = self.process_day(day).await;
                    CrawlState::PersistingDay(day, report)
                }
                CrawlState::PersistingDay(day, report) => {
                    self.dataset.flush().await?;
                    self.checkpoints.save(day).await?;
                    summary.record(day, &report);
                    CrawlState::Advancing(day)
                }
                CrawlState::Advancing(day) if day == self.end => CrawlState::Done,
                CrawlState::Advancing(day) => CrawlState::ProcessingDay(day.next_day()?),
                CrawlState::Done => break,
            };
        }

        info!(
            days = summary.days,
            empty_days = summary.empty_days,
            added = summary.added,
            duplicates = summary.duplicates,
            unparsable = summary.unparsable,
            partial = summary.partial,
            total = self.dataset.len(),
            "All done"
        );
        Ok(summary)
    }

    /// Resolve and ingest one day's links. Failures stay inside the day.
    #[instrument(level = "info", skip(self))]
    pub async fn process_day(&mut self, day: JalaliDate) -> DayReport {
        info!("Processing day");
        let links = sitemap::links_for_day(&self.fetcher, &self.site, day).await;
        let mut report = DayReport {
            links: links.len(),
            ..DayReport::default()
        };

        for link in &links {
            let Some(extracted) = article::extract(&self.fetcher, link).await else {
                report.unparsable += 1;
                continue;
            };

            let partial = extracted.is_partial();
            let found = extracted.article;
            if self.dataset.has(&found.id) {
                report.duplicates += 1;
                info!(id = %found.id, "Skipped duplicate article");
                continue;
            }

            let id = found.id.clone();
            if self.dataset.add(day, found) {
                report.added += 1;
                if partial {
                    report.partial += 1;
                }
                info!(%id, "Added article");
            }
        }

        info!(
            links = report.links,
            added = report.added,
            duplicates = report.duplicates,
            unparsable = report.unparsable,
            "Finished day"
        );
        report
    }
}
