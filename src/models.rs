//! Data models for harvested articles.
//!
//! - [`Article`]: one harvested page, exactly as persisted in the dataset snapshot
//! - [`ArticleDate`], [`Topic`]: structured pieces of the article header
//! - [`Extracted`]: an article plus the fields that came back empty
//!
//! Serialized field names follow the existing snapshot files (`maintopic`,
//! `childnews`), so a dataset written by earlier runs loads unchanged. Those
//! files may hold records without an `id` key; such records load with an
//! empty id.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single harvested article.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Article {
    /// Deduplication key, taken from the article URL.
    #[serde(default)]
    pub id: String,
    /// Source URL as listed in the sitemap.
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    /// Date as displayed on the page, which may differ from the sitemap day.
    #[serde(default)]
    pub date: ArticleDate,
    #[serde(default)]
    pub topic: Topic,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    /// Distinct image sources, in document order.
    #[serde(default)]
    pub images: Vec<String>,
}

/// The page's own date line, split into its parts. Month is a month name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ArticleDate {
    #[serde(default)]
    pub year: String,
    #[serde(default)]
    pub month: String,
    #[serde(default)]
    pub day: String,
    #[serde(default)]
    pub time: String,
}

/// Two-level section breadcrumb.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Topic {
    #[serde(rename = "maintopic", default)]
    pub main_topic: String,
    /// Empty when the site exposes a single level.
    #[serde(rename = "childnews", default)]
    pub child_topic: String,
}

/// An article field that the page template failed to provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MissingField {
    Id,
    Title,
    Content,
    Date,
    Time,
    Topic,
}

impl fmt::Display for MissingField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MissingField::Id => "id",
            MissingField::Title => "title",
            MissingField::Content => "content",
            MissingField::Date => "date",
            MissingField::Time => "time",
            MissingField::Topic => "topic",
        };
        f.write_str(name)
    }
}

/// Result of parsing an article page.
///
/// Extraction never aborts on a missing element; the field is left empty and
/// recorded in `missing` so degraded records can be told apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    pub article: Article,
    pub missing: Vec<MissingField>,
}

impl Extracted {
    pub fn new(article: Article) -> Self {
        let missing = missing_fields(&article);
        Self { article, missing }
    }

    pub fn is_partial(&self) -> bool {
        !self.missing.is_empty()
    }
}

fn missing_fields(article: &Article) -> Vec<MissingField> {
    let date = &article.date;
    [
        (MissingField::Id, article.id.is_empty()),
        (MissingField::Title, article.title.is_empty()),
        (MissingField::Content, article.content.is_empty()),
        (
            MissingField::Date,
            date.year.is_empty() || date.month.is_empty() || date.day.is_empty(),
        ),
        (MissingField::Time, date.time.is_empty()),
        (MissingField::Topic, article.topic.main_topic.is_empty()),
    ]
    .into_iter()
    .filter_map(|(field, empty)| empty.then_some(field))
    .collect()
}
