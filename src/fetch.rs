//! HTTP fetching with request pacing and throttle backoff.
//!
//! Every network call in the crawl goes through the [`Fetch`] trait. The
//! pieces stack the same way regardless of what is fetched:
//!
//! - [`HttpFetcher`]: issues a single GET with `reqwest` and classifies the status
//! - [`Paced`]: decorator that holds the caller for a random 200–400 ms after
//!   each success, and sleeps 30 minutes then retries on `429 Too Many Requests`
//!
//! The throttle branch has no attempt cap. It is a plain loop, so a site that
//! keeps answering 429 stalls the crawl but never grows the stack.

use rand::{Rng, rng};
use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use std::fmt;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, instrument, warn};

/// A successfully fetched resource, decoded as text.
#[derive(Debug, Clone)]
pub struct Page {
    /// The URL that was requested.
    pub url: String,
    /// Value of the `Content-Type` header, empty when the server sent none.
    pub content_type: String,
    /// Response body.
    pub body: String,
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("{url} returned {status}")]
    Status { url: String, status: u16 },
    #[error("{url} returned 429 Too Many Requests")]
    TooManyRequests { url: String },
}

/// Something that can GET a URL and hand back its body.
///
/// Implemented by [`HttpFetcher`] for real traffic and by the decorators that
/// wrap it. Tests substitute canned pages.
pub trait Fetch {
    async fn get(&self, url: &str) -> Result<Page, FetchError>;
}

impl<T: Fetch> Fetch for &T {
    async fn get(&self, url: &str) -> Result<Page, FetchError> {
        (**self).get(url).await
    }
}

/// Plain `reqwest` client. One request per call, no retries.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &str, timeout: Option<Duration>) -> Result<Self, FetchError> {
        let mut builder = reqwest::Client::builder().user_agent(user_agent);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }
}

impl Fetch for HttpFetcher {
    #[instrument(level = "debug", skip(self))]
    async fn get(&self, url: &str) -> Result<Page, FetchError> {
        let t0 = Instant::now();
        let resp = self.client.get(url).send().await?;
        let status = resp.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::TooManyRequests {
                url: url.to_string(),
            });
        }
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let body = resp.text().await?;
        debug!(
            bytes = body.len(),
            %content_type,
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Fetched"
        );

        Ok(Page {
            url: url.to_string(),
            content_type,
            body,
        })
    }
}

/// Timing policy applied by [`Paced`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    /// Lower bound of the post-success delay.
    pub min_delay: Duration,
    /// Upper bound of the post-success delay (inclusive).
    pub max_delay: Duration,
    /// Sleep before retrying a throttled request.
    pub throttle_backoff: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_millis(200),
            max_delay: Duration::from_millis(400),
            throttle_backoff: Duration::from_secs(30 * 60),
        }
    }
}

impl Pacing {
    /// A uniformly random delay in `[min_delay, max_delay]`.
    pub fn jitter(&self) -> Duration {
        let lo = self.min_delay.as_millis() as u64;
        let hi = (self.max_delay.as_millis() as u64).max(lo);
        Duration::from_millis(rng().random_range(lo..=hi))
    }
}

/// Decorator that spaces out requests and waits out throttling.
pub struct Paced<T> {
    inner: T,
    pacing: Pacing,
}

impl<T> Paced<T>
where
    T: Fetch,
{
    pub fn new(inner: T, pacing: Pacing) -> Self {
        Self { inner, pacing }
    }
}

impl<T> fmt::Debug for Paced<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Paced")
            .field("pacing", &self.pacing)
            .finish()
    }
}

impl<T> Fetch for Paced<T>
where
    T: Fetch,
{
    #[instrument(level = "debug", skip(self))]
    async fn get(&self, url: &str) -> Result<Page, FetchError> {
        let mut throttled = 0usize;

        loop {
            match self.inner.get(url).await {
                Ok(page) => {
                    sleep(self.pacing.jitter()).await;
                    return Ok(page);
                }
                Err(FetchError::TooManyRequests { .. }) => {
                    throttled += 1;
                    warn!(
                        %url,
                        attempt = throttled,
                        backoff = ?self.pacing.throttle_backoff,
                        "429 Too Many Requests; waiting before retry"
                    );
                    sleep(self.pacing.throttle_backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Canned-response fetcher shared by the module tests.

    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    #[derive(Default)]
    pub struct StubFetcher {
        pages: HashMap<String, (String, String)>,
        throttle: RefCell<HashMap<String, usize>>,
        calls: RefCell<Vec<String>>,
    }

    impl StubFetcher {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn page(mut self, url: &str, content_type: &str, body: &str) -> Self {
            self.pages
                .insert(url.to_string(), (content_type.to_string(), body.to_string()));
            self
        }

        pub fn html(self, url: &str, body: &str) -> Self {
            self.page(url, "text/html; charset=utf-8", body)
        }

        /// Answer the next `times` requests for `url` with 429.
        pub fn throttled(self, url: &str, times: usize) -> Self {
            self.throttle.borrow_mut().insert(url.to_string(), times);
            self
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }
    }

    impl Fetch for StubFetcher {
        async fn get(&self, url: &str) -> Result<Page, FetchError> {
            self.calls.borrow_mut().push(url.to_string());

            if let Some(left) = self.throttle.borrow_mut().get_mut(url) {
                if *left > 0 {
                    *left -= 1;
                    return Err(FetchError::TooManyRequests {
                        url: url.to_string(),
                    });
                }
            }

            match self.pages.get(url) {
                Some((content_type, body)) => Ok(Page {
                    url: url.to_string(),
                    content_type: content_type.clone(),
                    body: body.clone(),
                }),
                None => Err(FetchError::Status {
                    url: url.to_string(),
                    status: 404,
                }),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::StubFetcher;
    use super::*;

    fn fast() -> Pacing {
        Pacing {
            min_delay: Duration::ZERO,
            max_delay: Duration::from_millis(1),
            throttle_backoff: Duration::from_millis(1),
        }
    }

    #[test]
    fn test_default_pacing() {
        let pacing = Pacing::default();
        assert_eq!(pacing.min_delay, Duration::from_millis(200));
        assert_eq!(pacing.max_delay, Duration::from_millis(400));
        assert_eq!(pacing.throttle_backoff, Duration::from_secs(1800));
    }

    #[test]
    fn test_jitter_within_bounds() {
        let pacing = Pacing::default();
        for _ in 0..200 {
            let d = pacing.jitter();
            assert!(d >= pacing.min_delay && d <= pacing.max_delay, "{d:?}");
        }
    }

    #[test]
    fn test_jitter_with_inverted_bounds_uses_min() {
        let pacing = Pacing {
            min_delay: Duration::from_millis(50),
            max_delay: Duration::from_millis(10),
            throttle_backoff: Duration::ZERO,
        };
        assert_eq!(pacing.jitter(), Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_paced_retries_through_throttling() {
        let url = "https://example.com/a";
        let stub = StubFetcher::new().html(url, "<p>ok</p>").throttled(url, 3);
        let paced = Paced::new(&stub, fast());

        let page = paced.get(url).await.unwrap();
        assert_eq!(page.body, "<p>ok</p>");
        assert_eq!(stub.calls().len(), 4);
    }

    #[tokio::test]
    async fn test_paced_propagates_other_errors() {
        let stub = StubFetcher::new();
        let paced = Paced::new(&stub, fast());

        let err = paced.get("https://example.com/missing").await.unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 404, .. }));
        assert_eq!(stub.calls().len(), 1);
    }

    #[test]
    fn test_http_fetcher_builds() {
        assert!(HttpFetcher::new("khabar_harvest/test", Some(Duration::from_secs(5))).is_ok());
    }
}
