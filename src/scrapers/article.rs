//! Article page extraction.
//!
//! Parses one article page of the site's template into an [`Article`]:
//!
//! | Field | Source |
//! |-------|--------|
//! | title | first `h1` |
//! | content | `div[itemprop="articleBody"]` |
//! | date | `li.date`, e.g. `5 Mehr 1400 - 14:30` |
//! | topic | `meta[property="article:section"]`, e.g. `Politics > Elections` |
//! | publisher | `meta[property="article:publisher"]` |
//! | images | `img` inside the article body and `div.item-summary` |
//! | id | 5th `/`-delimited piece of the URL |
//!
//! A missing element leaves its field empty instead of failing the page; the
//! gap shows up in [`Extracted::missing`].

use crate::fetch::Fetch;
use crate::models::{Article, ArticleDate, Extracted, Topic};
use itertools::Itertools;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use tracing::{debug, error, instrument, warn};

static TITLE: Lazy<Selector> = Lazy::new(|| selector("h1"));
static BODY: Lazy<Selector> = Lazy::new(|| selector(r#"div[itemprop="articleBody"]"#));
static DATE: Lazy<Selector> = Lazy::new(|| selector("li.date"));
static SECTION: Lazy<Selector> = Lazy::new(|| selector(r#"meta[property="article:section"]"#));
static PUBLISHER: Lazy<Selector> =
    Lazy::new(|| selector(r#"meta[property="article:publisher"]"#));
static IMAGES: Lazy<Selector> = Lazy::new(|| {
    selector(r#"div[itemprop="articleBody"] img, div.item-summary img"#)
});

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector is valid CSS")
}

/// Fetch and parse a single article.
///
/// Missing page elements are logged at `warn` together with the list of
/// fields that came back empty.
///
/// # Arguments
///
/// * `fetcher` - Source of pages, normally the paced HTTP fetcher
/// * `url` - Article URL as listed in the sitemap
///
/// # Returns
///
/// The parsed article with its missing fields, or `None` when the page
/// cannot be retrieved. The failure is logged.
#[instrument(level = "info", skip(fetcher))]
pub async fn extract<F: Fetch>(fetcher: &F, url: &str) -> Option<Extracted> {
    let page = match fetcher.get(url).await {
        Ok(page) => page,
        Err(e) => {
            error!(%url, error = %e, "Failed to fetch article");
            return None;
        }
    };

    let extracted = parse_article(url, &page.body);
    if extracted.is_partial() {
        let missing = extracted.missing.iter().join(",");
        warn!(%url, %missing, "Article parsed with missing fields");
    } else {
        debug!(%url, id = %extracted.article.id, "Parsed article");
    }
    Some(extracted)
}

/// Parse an article page. Never fails; see [`Extracted::missing`].
pub fn parse_article(url: &str, html: &str) -> Extracted {
    let document = Html::parse_document(html);

    let title = first_text(&document, &TITLE);
    let content = first_text(&document, &BODY);
    let date = parse_date(&first_text(&document, &DATE));
    let topic = parse_topic(meta_content(&document, &SECTION).as_deref());
    let publisher = meta_content(&document, &PUBLISHER).filter(|p| !p.is_empty());

    let images = document
        .select(&IMAGES)
        .filter_map(|img| img.value().attr("src"))
        .filter(|src| !src.is_empty())
        .unique()
        .map(str::to_string)
        .collect();

    Extracted::new(Article {
        id: article_id(url),
        url: url.to_string(),
        title,
        content,
        date,
        topic,
        publisher,
        images,
    })
}

/// The article id: the piece at index 4 of `url.split('/')`.
///
/// For `https://host/news/1567890/slug` that is `1567890`. URLs of another
/// shape produce an empty or meaningless id.
pub fn article_id(url: &str) -> String {
    url.split('/').nth(4).unwrap_or_default().to_string()
}

/// Split a date line such as `5 Mehr 1400 - 14:30`.
///
/// Without the `" - "` separator nothing is filled in. The date half must have
/// exactly three tokens (day, month name, year) or those three stay empty.
pub fn parse_date(raw: &str) -> ArticleDate {
    let Some((date_part, rest)) = raw.split_once(" - ") else {
        return ArticleDate::default();
    };

    let time = rest.split(" - ").next().unwrap_or_default().trim().to_string();
    let tokens: Vec<&str> = date_part.split_whitespace().collect();
    match tokens.as_slice() {
        [day, month, year] => ArticleDate {
            year: year.to_string(),
            month: month.to_string(),
            day: day.to_string(),
            time,
        },
        _ => ArticleDate {
            time,
            ..ArticleDate::default()
        },
    }
}

/// Split a section breadcrumb such as `Politics > Elections`.
pub fn parse_topic(raw: Option<&str>) -> Topic {
    let raw = raw.unwrap_or_default();
    let mut parts = raw.split('>').map(str::trim);
    Topic {
        main_topic: parts.next().unwrap_or_default().to_string(),
        child_topic: parts.next().unwrap_or_default().to_string(),
    }
}

fn first_text(document: &Html, selector: &Selector) -> String {
    document
        .select(selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .unwrap_or_default()
}

fn meta_content(document: &Html, selector: &Selector) -> Option<String> {
    document
        .select(selector)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(|c| c.trim().to_string())
}
