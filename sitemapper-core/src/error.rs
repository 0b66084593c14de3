use sitemapper_scanner::ScanError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SitemapError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Network error: {0}")]
    Network(#[source] ScanError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] rusqlite::Error),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Sitemap encoding error: {0}")]
    Encoding(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ScanError> for SitemapError {
    fn from(err: ScanError) -> Self {
        match err {
            // Sink failures come from the store, not the network
            ScanError::Sink(inner) => match inner.downcast::<SitemapError>() {
                Ok(err) => *err,
                Err(other) => match other.downcast::<rusqlite::Error>() {
                    Ok(db_err) => SitemapError::Persistence(*db_err),
                    Err(other) => SitemapError::StoreUnavailable(other.to_string()),
                },
            },
            other => SitemapError::Network(other),
        }
    }
}

impl From<quick_xml::Error> for SitemapError {
    fn from(err: quick_xml::Error) -> Self {
        SitemapError::Encoding(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SitemapError>;
