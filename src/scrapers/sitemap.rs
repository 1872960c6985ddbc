//! Per-day sitemap resolution.
//!
//! Every Jalali day has its own link index at
//! `https://<site>/sitemap/{YYYY}/{MM}/{DD}/sitemap.xml`. Despite the
//! extension the server has been seen answering in two encodings:
//!
//! - JSON: `{ "urls": [{ "loc": "...", ... }, ...] }`
//! - XML: a `<urlset>` root holding one or more `<url><loc>...</loc></url>` entries
//!
//! The encoding is chosen from the response `Content-Type`.

use crate::calendar::JalaliDate;
use crate::fetch::{Fetch, FetchError};
use crate::utils::truncate_for_log;
use serde::Deserialize;
use tracing::{debug, error, info, instrument};
use url::Url;

#[derive(Debug, thiserror::Error)]
pub enum SitemapError {
    #[error("invalid sitemap address: {0}")]
    Address(#[from] url::ParseError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("malformed JSON sitemap: {0}")]
    Json(#[from] serde_json::Error),
    #[error("malformed XML sitemap: {0}")]
    Xml(#[from] quick_xml::de::DeError),
}

#[derive(Debug, Deserialize)]
struct JsonSitemap {
    #[serde(default)]
    urls: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
struct UrlSet {
    #[serde(rename = "url", default)]
    urls: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
struct Entry {
    #[serde(default)]
    loc: Option<String>,
}

/// Address of the sitemap for `date` under `site`.
pub fn sitemap_url(site: &Url, date: JalaliDate) -> Result<Url, url::ParseError> {
    site.join(&format!(
        "sitemap/{}/{:02}/{:02}/sitemap.xml",
        date.year(),
        date.month(),
        date.day()
    ))
}

/// Extract article links from a sitemap body, preserving order.
///
/// # Arguments
///
/// * `content_type` - Response `Content-Type`; anything mentioning
///   `application/json` is read as JSON, everything else as XML
/// * `body` - Raw response body
///
/// # Returns
///
/// The trimmed `loc` of each entry. Entries without a `loc`, or with a blank
/// one, are skipped.
///
/// # Errors
///
/// Returns [`SitemapError::Json`] or [`SitemapError::Xml`] when the body does
/// not parse in the chosen encoding.
pub fn parse_sitemap(content_type: &str, body: &str) -> Result<Vec<String>, SitemapError> {
    let entries = if content_type.contains("application/json") {
        serde_json::from_str::<JsonSitemap>(body)?.urls
    } else {
        quick_xml::de::from_str::<UrlSet>(body)?.urls
    };

    Ok(entries
        .into_iter()
        .filter_map(|entry| entry.loc)
        .map(|loc| loc.trim().to_string())
        .filter(|loc| !loc.is_empty())
        .collect())
}

/// All article URLs listed for `date`.
///
/// Fetches the day's sitemap through `fetcher` and parses it in whichever
/// encoding the server answered with.
///
/// # Arguments
///
/// * `fetcher` - Source of pages, normally the paced HTTP fetcher
/// * `site` - Base address of the news site
/// * `date` - Jalali day whose sitemap is wanted
///
/// # Returns
///
/// Article URLs in sitemap order. Never fails: an unbuildable address, a
/// failed request or an unparsable body is logged and yields an empty list.
#[instrument(level = "info", skip_all, fields(%date))]
pub async fn links_for_day<F: Fetch>(fetcher: &F, site: &Url, date: JalaliDate) -> Vec<String> {
    let url = match sitemap_url(site, date) {
        Ok(url) => url,
        Err(e) => {
            error!(%site, error = %e, "Failed to build sitemap address");
            return Vec::new();
        }
    };

    match fetch_links(fetcher, &url).await {
        Ok(links) => {
            info!(count = links.len(), "Found sitemap links");
            debug!(urls = ?links, "Sitemap links");
            links
        }
        Err(e) => {
            error!(sitemap = %url, error = %e, "Failed to fetch sitemap");
            Vec::new()
        }
    }
}

async fn fetch_links<F: Fetch>(fetcher: &F, url: &Url) -> Result<Vec<String>, SitemapError> {
    let page = fetcher.get(url.as_str()).await?;
    parse_sitemap(&page.content_type, &page.body).inspect_err(|_| {
        debug!(
            sitemap = %page.url,
            content_type = %page.content_type,
            body = %truncate_for_log(&page.body, 300),
            "Unparsable sitemap body"
        );
    })
}
