use crate::error::{BoxError, Result, ScanError};
use crate::result::{CrawlResult, CrawlSummary};
use reqwest::Client;
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use url::Url;

/// Upper bound on distinct URLs per crawl; also the sitemap protocol's per-file limit.
pub const DEFAULT_MAX_URLS: usize = 50_000;

pub type ProgressCallback = Arc<dyn Fn(usize, String) + Send + Sync>;

/// Receives every successfully fetched page, in visit order.
///
/// An error returned from `record` aborts the crawl.
pub trait PageSink: Send {
    fn record(&mut self, page: &CrawlResult) -> std::result::Result<(), BoxError>;
}

impl PageSink for Vec<CrawlResult> {
    fn record(&mut self, page: &CrawlResult) -> std::result::Result<(), BoxError> {
        self.push(page.clone());
        Ok(())
    }
}

/// Sequential, depth-first, same-host crawler.
///
/// The visited-set and worklist live inside a single `crawl` call, so one
/// `Crawler` can be reused for any number of sites.
pub struct Crawler {
    client: Client,
    max_urls: usize,
    progress_callback: Option<ProgressCallback>,
}

impl Crawler {
    pub fn new() -> Result<Self> {
        Self::with_timeout(10)
    }

    pub fn with_timeout(timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!(
                "Sitemapper/",
                env!("CARGO_PKG_VERSION"),
                " (https://github.com/trapdoorsec/sitemapper)"
            ))
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs((timeout_secs / 2).max(1)))
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        Ok(Self {
            client,
            max_urls: DEFAULT_MAX_URLS,
            progress_callback: None,
        })
    }

    pub fn with_max_urls(mut self, max_urls: usize) -> Self {
        self.max_urls = max_urls;
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn max_urls(&self) -> usize {
        self.max_urls
    }

    /// Crawl every reachable page on the start URL's host.
    ///
    /// Fails only when the start URL itself cannot be fetched or the sink
    /// rejects a page. Fetch errors on any other page are logged and that
    /// branch is dropped.
    pub async fn crawl<S: PageSink>(&self, start_url: &str, sink: &mut S) -> Result<CrawlSummary> {
        let mut root = Url::parse(start_url)
            .map_err(|e| ScanError::InvalidUrl(format!("{}: {}", start_url, e)))?;
        root.set_fragment(None);

        let base_host = root
            .host_str()
            .ok_or_else(|| ScanError::InvalidUrl(format!("{} has no host", start_url)))?
            .to_string();

        info!("Starting crawl of {} (max {} URLs)", root, self.max_urls);

        let mut visited: HashSet<String> = HashSet::new();
        // LIFO worklist; children are pushed in reverse so they pop in document order
        let mut worklist: Vec<String> = vec![root.to_string()];
        let mut summary = CrawlSummary {
            start_url: root.to_string(),
            ..CrawlSummary::default()
        };

        while let Some(url) = worklist.pop() {
            if visited.contains(&url) {
                continue;
            }
            if visited.len() >= self.max_urls {
                debug!("URL cap of {} reached, stopping", self.max_urls);
                break;
            }

            visited.insert(url.clone());
            summary.visited.push(url.clone());

            if let Some(ref callback) = self.progress_callback {
                callback(visited.len(), url.clone());
            }

            let page = match self.fetch_and_parse(&url, &base_host).await {
                Ok(page) => page,
                Err(e) if summary.visited.len() == 1 => {
                    warn!("Start URL {} is unreachable: {}", url, e);
                    return Err(e);
                }
                Err(e) => {
                    warn!("Crawl error for {}: {}", url, e);
                    summary.pages_failed += 1;
                    continue;
                }
            };

            sink.record(&page).map_err(ScanError::Sink)?;
            summary.pages_crawled += 1;

            for link in page.links_found.iter().rev() {
                if !visited.contains(link) {
                    worklist.push(link.clone());
                }
            }
        }

        info!(
            "Crawl of {} complete. Crawled {} pages, {} failed",
            summary.start_url, summary.pages_crawled, summary.pages_failed
        );
        Ok(summary)
    }

    async fn fetch_and_parse(&self, url: &str, base_host: &str) -> Result<CrawlResult> {
        debug!("Fetching {}", url);

        let start = Instant::now();
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| ScanError::Network {
                url: url.to_string(),
                source,
            })?;
        let response_time = start.elapsed();

        let status_code = response.status().as_u16();
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let content_length = response.content_length();
        // Relative links resolve against where redirects landed
        let final_url = response.url().clone();

        let mut result = CrawlResult::new(url.to_string());
        result.status_code = status_code;
        result.content_type = content_type;
        result.content_length = content_length;
        result.response_time = response_time;

        // Non-HTML bodies are never read
        if result.is_html() {
            let body = response.text().await.map_err(|source| ScanError::Network {
                url: url.to_string(),
                source,
            })?;
            result.links_found = Self::extract_links(&body, &final_url, base_host);
        }

        Ok(result)
    }

    /// Same-host anchor targets on the page, deduplicated, in document order.
    fn extract_links(html: &str, base_url: &Url, base_host: &str) -> Vec<String> {
        let Ok(link_selector) = Selector::parse("a[href]") else {
            return Vec::new();
        };

        let document = Html::parse_document(html);
        let mut seen = HashSet::new();
        let mut links = Vec::new();

        for element in document.select(&link_selector) {
            if let Some(href) = element.value().attr("href")
                && let Some(absolute_url) = Self::resolve_url(base_url, href)
            {
                if !Self::is_same_host(&absolute_url, base_host) {
                    debug!("  -> Skipping cross-host link {}", absolute_url);
                    continue;
                }
                let absolute_url = absolute_url.to_string();
                if seen.insert(absolute_url.clone()) {
                    links.push(absolute_url);
                }
            }
        }

        links
    }

    fn resolve_url(base: &Url, href: &str) -> Option<Url> {
        let href = href.trim();
        let lowered = href.to_ascii_lowercase();
        // Skip empty, fragment-only, javascript:, mailto:, tel:
        if href.is_empty()
            || href.starts_with('#')
            || lowered.starts_with("javascript:")
            || lowered.starts_with("mailto:")
            || lowered.starts_with("tel:")
        {
            return None;
        }

        let mut resolved = base.join(href).ok()?;
        if !matches!(resolved.scheme(), "http" | "https") {
            return None;
        }
        resolved.set_fragment(None);
        Some(resolved)
    }

    fn is_same_host(url: &Url, base_host: &str) -> bool {
        url.host_str() == Some(base_host)
    }
}
