//! The calendar-partitioned article dataset.
//!
//! Articles are filed under the Jalali day whose sitemap listed them, which
//! is not necessarily the date printed on the page. Alongside the tree the
//! store keeps a set of every known article id; it is rebuilt on
//! [`Dataset::open`] and only ever changed by [`Dataset::add`], so it always
//! equals the ids present in the tree.

use super::{StoreError, read_if_exists, write_atomic};
use crate::calendar::JalaliDate;
use crate::models::Article;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

/// `year -> month -> day -> articles`, in discovery order within a day.
pub type Snapshot = BTreeMap<i32, BTreeMap<u32, BTreeMap<u32, Vec<Article>>>>;

#[derive(Debug)]
pub struct Dataset {
    path: PathBuf,
    snapshot: Snapshot,
    ids: HashSet<String>,
}

impl Dataset {
    /// Load the snapshot at `path`, or start empty if there is none.
    ///
    /// # Arguments
    ///
    /// * `path` - Location of the dataset JSON file
    ///
    /// # Returns
    ///
    /// The dataset with its id index rebuilt from every stored record.
    ///
    /// # Errors
    ///
    /// [`StoreError::Corrupt`] when the file exists but does not parse;
    /// starting empty would overwrite it on the next flush.
    /// [`StoreError::Io`] when it cannot be read.
    #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let snapshot = match read_if_exists(&path).await? {
            Some(bytes) => serde_json::from_slice::<Snapshot>(&bytes).map_err(|source| {
                StoreError::Corrupt {
                    path: path.clone(),
                    source,
                }
            })?,
            None => {
                info!("No dataset yet; starting empty");
                Snapshot::new()
            }
        };

        let dataset = Self::from_snapshot(path, snapshot);
        info!(
            articles = dataset.len(),
            ids = dataset.ids.len(),
            "Loaded dataset"
        );
        Ok(dataset)
    }

    /// Wrap an in-memory snapshot, indexing its ids.
    ///
    /// An empty id (a record stored without one) is indexed like any other,
    /// the same way [`add`](Self::add) treats it, so the index keeps matching
    /// the stored ids across restarts.
    pub fn from_snapshot(path: PathBuf, snapshot: Snapshot) -> Self {
        let mut ids = HashSet::new();
        let mut repeated = 0usize;
        for article in articles(&snapshot) {
            if !ids.insert(article.id.clone()) {
                repeated += 1;
            }
        }
        if repeated > 0 {
            warn!(repeated, "Snapshot already contains repeated article ids");
        }
        Self {
            path,
            snapshot,
            ids,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether an article with this id has been captured.
    pub fn has(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// File `article` under `date` and register its id.
    ///
    /// Callers check [`has`](Self::has) first. An already-known id is refused
    /// here as well, and `false` is returned.
    pub fn add(&mut self, date: JalaliDate, article: Article) -> bool {
        if !self.ids.insert(article.id.clone()) {
            return false;
        }
        self.snapshot
            .entry(date.year())
            .or_default()
            .entry(date.month())
            .or_default()
            .entry(date.day())
            .or_default()
            .push(article);
        true
    }

    /// Articles filed under `date`, in discovery order.
    pub fn day(&self, date: JalaliDate) -> &[Article] {
        self.snapshot
            .get(&date.year())
            .and_then(|months| months.get(&date.month()))
            .and_then(|days| days.get(&date.day()))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Total number of stored articles.
    pub fn len(&self) -> usize {
        articles(&self.snapshot).count()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// The id index.
    pub fn ids(&self) -> &HashSet<String> {
        &self.ids
    }

    /// Rewrite the snapshot file with the full current contents.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the temp file cannot be written or
    /// renamed over the target. The previous snapshot stays in place.
    #[instrument(level = "info", skip_all, fields(path = %self.path.display()))]
    pub async fn flush(&self) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(&self.snapshot)?;
        write_atomic(&self.path, &json).await?;
        info!(bytes = json.len(), articles = self.ids.len(), "Saved dataset");
        Ok(())
    }
}

fn articles(snapshot: &Snapshot) -> impl Iterator<Item = &Article> {
    snapshot
        .values()
        .flat_map(|months| months.values())
        .flat_map(|days| days.values())
        .flatten()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ArticleDate, Topic};

    fn article(id: &str) -> Article {
        Article {
            id: id.to_string(),
            url: format!("https://www.khabaronline.ir/news/{id}/x"),
            title: format!("Title {id}"),
            content: "Body".to_string(),
            date: ArticleDate::default(),
            topic: Topic::default(),
            publisher: None,
            images: vec![],
        }
    }

    fn day(y: i32, m: u32, d: u32) -> JalaliDate {
        JalaliDate::new(y, m, d).unwrap()
    }

    fn distinct_ids(dataset: &Dataset) -> HashSet<String> {
        articles(&dataset.snapshot).map(|a| a.id.clone()).collect()
    }

    #[tokio::test]
    async fn test_open_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = Dataset::open(dir.path().join("data.json")).await.unwrap();
        assert!(dataset.is_empty());
        assert_eq!(dataset.len(), 0);
    }

    #[test]
    fn test_add_files_under_day_in_order() {
        let mut dataset = Dataset::from_snapshot(PathBuf::from("unused.json"), Snapshot::new());
        let d = day(1400, 7, 5);

        assert!(dataset.add(d, article("1")));
        assert!(dataset.add(d, article("2")));
        assert!(dataset.add(day(1400, 7, 6), article("3")));

        let ids: Vec<&str> = dataset.day(d).iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);
        assert_eq!(dataset.day(day(1400, 7, 6)).len(), 1);
        assert!(dataset.day(day(1399, 1, 1)).is_empty());
        assert!(dataset.has("3"));
        assert!(!dataset.has("4"));
    }

    #[test]
    fn test_index_matches_store_after_any_adds() {
        let mut dataset = Dataset::from_snapshot(PathBuf::from("unused.json"), Snapshot::new());
        let days = [day(1400, 1, 1), day(1400, 1, 2), day(1401, 12, 29)];

        for i in 0..60 {
            let id = (i * 7 % 23).to_string();
            let d = days[i % days.len()];
            let before = dataset.has(&id);
            assert_eq!(dataset.add(d, article(&id)), !before);
            assert_eq!(dataset.ids(), &distinct_ids(&dataset));
        }
        assert_eq!(dataset.len(), dataset.ids().len());
    }

    #[tokio::test]
    async fn test_flush_and_reopen_rebuilds_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");

        let mut dataset = Dataset::open(&path).await.unwrap();
        dataset.add(day(1400, 7, 5), article("10"));
        dataset.add(day(1400, 7, 5), article("11"));
        dataset.add(day(1401, 1, 1), article("12"));
        dataset.flush().await.unwrap();

        let reopened = Dataset::open(&path).await.unwrap();
        assert_eq!(reopened.len(), 3);
        assert_eq!(reopened.ids(), dataset.ids());
        assert_eq!(reopened.day(day(1400, 7, 5)), dataset.day(day(1400, 7, 5)));
    }

    #[tokio::test]
    async fn test_snapshot_layout_uses_unpadded_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");

        let mut dataset = Dataset::open(&path).await.unwrap();
        dataset.add(day(1388, 2, 31), article("1"));
        dataset.flush().await.unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["1388"]["2"]["31"][0]["id"], "1");
    }

    #[tokio::test]
    async fn test_open_corrupt_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        std::fs::write(&path, "{ truncated").unwrap();

        let err = Dataset::open(&path).await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }

    #[test]
    fn test_repeated_ids_in_snapshot_are_indexed_once() {
        let mut snapshot = Snapshot::new();
        snapshot
            .entry(1400)
            .or_default()
            .entry(1)
            .or_default()
            .insert(1, vec![article("5"), article("5")]);

        let dataset = Dataset::from_snapshot(PathBuf::from("unused.json"), snapshot);
        assert_eq!(dataset.ids().len(), 1);
        assert_eq!(dataset.len(), 2);
    }

    #[tokio::test]
    async fn test_open_snapshot_with_record_lacking_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        std::fs::write(
            &path,
            r#"{"1388":{"2":{"31":[
                {"url":"https://www.khabaronline.ir/x","title":"","content":"","topic":{},"images":[]},
                {"id":"77","url":"https://www.khabaronline.ir/news/77/y","title":"T","content":"C"}
            ]}}}"#,
        )
        .unwrap();

        let mut dataset = Dataset::open(&path).await.unwrap();
        assert_eq!(dataset.len(), 2);
        assert!(dataset.has("77"));
        assert!(dataset.has(""));
        assert_eq!(dataset.day(day(1388, 2, 31))[0].id, "");
        assert_eq!(dataset.ids(), &distinct_ids(&dataset));

        assert!(!dataset.add(day(1388, 3, 1), article("")));
        assert!(dataset.add(day(1388, 3, 1), article("78")));
        dataset.flush().await.unwrap();
        assert_eq!(Dataset::open(&path).await.unwrap().len(), 3);
    }
}
