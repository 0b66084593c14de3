pub mod crawl;
pub mod data;
pub mod error;
pub mod model;
pub mod scheduler;
pub mod sitemap;

pub use crawl::{CrawlOptions, CrawlOutcome, CrawlTarget, crawl_site};
pub use data::{Database, SharedDatabase, lock_database};
pub use error::SitemapError;
pub use model::{
    ChangeFrequency, CrawlSession, DiscoveredUrl, SessionStatus, SitemapStats, UrlPage, UrlQuery,
    determine_change_frequency, determine_priority,
};
pub use scheduler::RecrawlWorker;
pub use sitemap::{GeneratedSitemap, generate_sitemap, render_sitemap, write_sitemap_file};
