//! Scrapers for the news site's two page types.
//!
//! The crawl runs in the same two phases for every calendar day:
//!
//! 1. **Indexing** ([`sitemap`]): fetch the day's sitemap and list its article URLs
//! 2. **Fetching** ([`article`]): download each article page and parse it into an
//!    [`Article`](crate::models::Article)
//!
//! # Failure policy
//!
//! Neither phase returns an error to the caller. A broken sitemap turns into
//! an empty link list and a broken article page turns into `None`. Both are
//! logged. One bad page or one bad day therefore never stops the crawl.

pub mod article;
pub mod sitemap;
