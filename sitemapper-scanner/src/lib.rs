pub mod crawler;
pub mod error;
pub mod result;

pub use crawler::{Crawler, DEFAULT_MAX_URLS, PageSink, ProgressCallback};
pub use error::ScanError;
pub use result::{CrawlResult, CrawlSummary};
