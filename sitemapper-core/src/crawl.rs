use crate::data::{SharedDatabase, lock_database};
use crate::error::{Result, SitemapError};
use crate::model::DiscoveredUrl;
use chrono::Utc;
use sitemapper_scanner::error::BoxError;
use sitemapper_scanner::{CrawlResult, CrawlSummary, Crawler, DEFAULT_MAX_URLS, PageSink, ProgressCallback};
use tracing::{info, warn};
use url::Url;

/// A validated crawl root.
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlTarget {
    /// Lowercase hostname; the key records are stored under.
    pub domain: String,
    pub start_url: Url,
}

impl CrawlTarget {
    /// Accepts a bare host (`example.com`, crawled over https) or a full
    /// http(s) URL.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(SitemapError::Validation("Domain is required".to_string()));
        }

        let lowered = trimmed.to_ascii_lowercase();
        let candidate = if lowered.starts_with("http://") || lowered.starts_with("https://") {
            trimmed.to_string()
        } else {
            format!("https://{}", trimmed)
        };

        let mut start_url = Url::parse(&candidate)
            .map_err(|e| SitemapError::Validation(format!("Invalid domain '{}': {}", trimmed, e)))?;
        start_url.set_fragment(None);

        let domain = start_url
            .host_str()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| SitemapError::Validation(format!("Invalid domain '{}': no host", trimmed)))?
            .to_string();

        Ok(Self { domain, start_url })
    }
}

/// Options for configuring a crawl operation
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    pub max_urls: usize,
    pub timeout_secs: u64,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            max_urls: DEFAULT_MAX_URLS,
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CrawlOutcome {
    pub session_id: String,
    pub domain: String,
    pub summary: CrawlSummary,
}

/// Upserts one `DiscoveredUrl` per fetched page.
struct StoreSink<'a> {
    db: &'a SharedDatabase,
    domain: &'a str,
    stored: usize,
}

impl PageSink for StoreSink<'_> {
    fn record(&mut self, page: &CrawlResult) -> std::result::Result<(), BoxError> {
        let record = DiscoveredUrl::from_fetch(self.domain, &page.url, page.status_code, Utc::now());
        let db = lock_database(self.db)?;
        db.upsert_url(&record)?;
        self.stored += 1;
        Ok(())
    }
}

/// Crawl a site and persist every page it reaches.
///
/// The crawl is tracked as a session in the store. An unreachable start URL
/// fails the session and surfaces as `SitemapError::Network` with nothing
/// persisted for the domain.
pub async fn crawl_site(
    db: &SharedDatabase,
    target: &CrawlTarget,
    options: &CrawlOptions,
    progress_callback: Option<ProgressCallback>,
) -> Result<CrawlOutcome> {
    let mut crawler = Crawler::with_timeout(options.timeout_secs)?.with_max_urls(options.max_urls);
    if let Some(callback) = progress_callback {
        crawler = crawler.with_progress_callback(callback);
    }

    let session_id = {
        let conn = lock_database(db)?;
        conn.create_session(&target.domain, target.start_url.as_str())?
    };
    info!("Crawl session {} started for {}", session_id, target.domain);

    let mut sink = StoreSink {
        db,
        domain: &target.domain,
        stored: 0,
    };

    match crawler.crawl(target.start_url.as_str(), &mut sink).await {
        Ok(summary) => {
            {
                let conn = lock_database(db)?;
                conn.complete_session(&session_id, summary.pages_crawled, summary.pages_failed)?;
            }
            info!(
                "Crawl session {} complete: {} pages stored, {} failed",
                session_id, summary.pages_crawled, summary.pages_failed
            );
            Ok(CrawlOutcome {
                session_id,
                domain: target.domain.clone(),
                summary,
            })
        }
        Err(e) => {
            warn!("Crawl session {} failed: {}", session_id, e);
            mark_session_failed(db, &session_id, sink.stored);
            Err(e.into())
        }
    }
}

/// Record a failed session along with the pages stored before the failure.
fn mark_session_failed(db: &SharedDatabase, session_id: &str, stored: usize) {
    let result = lock_database(db).and_then(|conn| {
        conn.fail_session(session_id, stored, 0)
            .map_err(SitemapError::from)
    });
    if let Err(db_err) = result {
        warn!("Could not mark session {} failed: {}", session_id, db_err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Database, shared};
    use crate::model::SessionStatus;

    #[test]
    fn test_bare_domain_defaults_to_https() {
        let target = CrawlTarget::parse("Example.com").unwrap();
        assert_eq!(target.domain, "example.com");
        assert_eq!(target.start_url.as_str(), "https://example.com/");
    }

    #[test]
    fn test_explicit_scheme_and_port_are_kept() {
        let target = CrawlTarget::parse(" http://127.0.0.1:8080/start#top ").unwrap();
        assert_eq!(target.domain, "127.0.0.1");
        assert_eq!(target.start_url.as_str(), "http://127.0.0.1:8080/start");
    }

    #[test]
    fn test_missing_or_malformed_domain_is_a_validation_error() {
        assert!(matches!(CrawlTarget::parse("   "), Err(SitemapError::Validation(_))));
        assert!(matches!(
            CrawlTarget::parse("not a domain"),
            Err(SitemapError::Validation(_))
        ));
        assert!(matches!(CrawlTarget::parse("https://"), Err(SitemapError::Validation(_))));
    }

    #[test]
    fn test_failed_session_keeps_count_of_stored_pages() {
        let db = shared(Database::in_memory().unwrap());
        let session_id = db
            .lock()
            .unwrap()
            .create_session("example.com", "https://example.com/")
            .unwrap();

        let mut sink = StoreSink {
            db: &db,
            domain: "example.com",
            stored: 0,
        };
        for url in ["https://example.com/", "https://example.com/about"] {
            let mut page = CrawlResult::new(url.to_string());
            page.status_code = 200;
            sink.record(&page).unwrap();
        }
        assert_eq!(sink.stored, 2);

        mark_session_failed(&db, &session_id, sink.stored);

        let conn = db.lock().unwrap();
        let session = conn.latest_session("example.com").unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::Failed);
        assert_eq!(session.pages_crawled, 2);
        assert_eq!(conn.count_urls("example.com").unwrap(), 2);
    }
}
