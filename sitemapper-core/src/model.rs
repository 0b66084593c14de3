use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Sitemap `<changefreq>` hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeFrequency {
    Daily,
    Weekly,
    Monthly,
}

impl ChangeFrequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeFrequency::Daily => "daily",
            ChangeFrequency::Weekly => "weekly",
            ChangeFrequency::Monthly => "monthly",
        }
    }
}

impl fmt::Display for ChangeFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangeFrequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(ChangeFrequency::Daily),
            "weekly" => Ok(ChangeFrequency::Weekly),
            "monthly" => Ok(ChangeFrequency::Monthly),
            other => Err(format!("unknown change frequency '{}'", other)),
        }
    }
}

/// A page found on a crawled site, as persisted in the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredUrl {
    pub domain: String,
    pub url: String,
    pub last_modified: DateTime<Utc>,
    pub change_frequency: ChangeFrequency,
    pub priority: f64,
    pub http_status: u16,
    pub last_checked: DateTime<Utc>,
}

impl DiscoveredUrl {
    /// Build a record for a page fetched at `checked_at`, deriving the
    /// sitemap hints from the URL.
    pub fn from_fetch(domain: &str, url: &str, http_status: u16, checked_at: DateTime<Utc>) -> Self {
        Self {
            domain: domain.to_string(),
            url: url.to_string(),
            last_modified: checked_at,
            change_frequency: determine_change_frequency(url),
            priority: determine_priority(url),
            http_status,
            last_checked: checked_at,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.http_status == 200
    }
}

pub fn determine_change_frequency(url: &str) -> ChangeFrequency {
    if url.contains("blog") || url.contains("news") {
        ChangeFrequency::Daily
    } else if url.contains("product") {
        ChangeFrequency::Weekly
    } else {
        ChangeFrequency::Monthly
    }
}

pub fn determine_priority(url: &str) -> f64 {
    if url.ends_with('/') {
        1.0
    } else if url.contains("product") {
        0.8
    } else if url.contains("category") {
        0.7
    } else if url.contains("blog") {
        0.6
    } else {
        0.5
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Running,
    Completed,
    Failed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Running => "running",
            SessionStatus::Completed => "completed",
            SessionStatus::Failed => "failed",
        }
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(SessionStatus::Running),
            "completed" => Ok(SessionStatus::Completed),
            "failed" => Ok(SessionStatus::Failed),
            other => Err(format!("unknown session status '{}'", other)),
        }
    }
}

/// One crawl invocation against a domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlSession {
    pub id: String,
    pub domain: String,
    pub start_url: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: SessionStatus,
    pub pages_crawled: u64,
    pub pages_failed: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SitemapStats {
    pub total: u64,
    pub ok: u64,
    pub broken: u64,
    pub last_crawled: Option<DateTime<Utc>>,
}

/// Filter and window for listing stored URLs. `page` is 1-based.
#[derive(Debug, Clone)]
pub struct UrlQuery {
    pub domain: String,
    pub status: Option<u16>,
    pub page: u32,
    pub limit: u32,
}

impl UrlQuery {
    pub const DEFAULT_LIMIT: u32 = 50;
    pub const MAX_LIMIT: u32 = 1000;

    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            status: None,
            page: 1,
            limit: Self::DEFAULT_LIMIT,
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub total: u64,
    pub pages: u64,
    pub current_page: u32,
    pub limit: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UrlPage {
    pub urls: Vec<DiscoveredUrl>,
    pub pagination: Pagination,
}
