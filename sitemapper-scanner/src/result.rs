use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One fetched page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlResult {
    pub url: String,
    pub status_code: u16,
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    pub response_time: Duration,
    /// Same-host links found on the page, absolute and fragment-free.
    pub links_found: Vec<String>,
}

impl CrawlResult {
    pub fn new(url: String) -> Self {
        Self {
            url,
            status_code: 0,
            content_type: None,
            content_length: None,
            response_time: Duration::from_secs(0),
            links_found: Vec::new(),
        }
    }

    /// True for `text/html` and `application/xhtml+xml` in any case, or when
    /// the server sent no content type.
    pub fn is_html(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|ct| {
                let essence = ct.split(';').next().unwrap_or_default().trim();
                essence.eq_ignore_ascii_case("text/html")
                    || essence.eq_ignore_ascii_case("application/xhtml+xml")
            })
            .unwrap_or(true)
    }
}

/// Totals for one `Crawler::crawl` invocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrawlSummary {
    pub start_url: String,
    pub pages_crawled: usize,
    pub pages_failed: usize,
    /// Every URL dispatched for fetch, in visit order.
    pub visited: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_content_type(content_type: Option<&str>) -> CrawlResult {
        let mut result = CrawlResult::new("https://example.com/".to_string());
        result.content_type = content_type.map(str::to_string);
        result
    }

    #[test]
    fn test_is_html_ignores_case_and_parameters() {
        assert!(with_content_type(Some("text/html")).is_html());
        assert!(with_content_type(Some("Text/HTML; charset=UTF-8")).is_html());
        assert!(with_content_type(Some("application/xhtml+xml")).is_html());
        assert!(with_content_type(None).is_html());
    }

    #[test]
    fn test_is_html_rejects_other_types() {
        assert!(!with_content_type(Some("application/json")).is_html());
        assert!(!with_content_type(Some("application/pdf")).is_html());
        assert!(!with_content_type(Some("text/plain; charset=utf-8")).is_html());
    }
}
