use crate::crawl::{CrawlOptions, CrawlTarget, crawl_site};
use crate::data::{SharedDatabase, lock_database};
use crate::error::Result;
use crate::sitemap::generate_sitemap;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info};

pub const WEEKLY: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Periodically re-crawls every domain in the store and regenerates its sitemap.
pub struct RecrawlWorker {
    db: SharedDatabase,
    interval: Duration,
    options: CrawlOptions,
}

impl RecrawlWorker {
    pub fn new(db: SharedDatabase, options: CrawlOptions) -> Self {
        Self {
            db,
            interval: WEEKLY,
            options,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Refresh every known domain once. Returns how many succeeded.
    pub async fn run_once(&self) -> Result<usize> {
        let domains = {
            let conn = lock_database(&self.db)?;
            let mut targets = Vec::new();
            for domain in conn.known_domains()? {
                // Reuse the last start URL so scheme and port survive
                let start = conn
                    .latest_session(&domain)?
                    .map(|session| session.start_url)
                    .unwrap_or_else(|| domain.clone());
                targets.push((domain, start));
            }
            targets
        };

        let mut refreshed = 0;
        for (domain, start) in domains {
            let target = match CrawlTarget::parse(&start) {
                Ok(target) => target,
                Err(e) => {
                    error!("Skipping scheduled crawl of {}: {}", domain, e);
                    continue;
                }
            };

            let outcome = match crawl_site(&self.db, &target, &self.options, None).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!("Scheduled crawl of {} failed: {}", domain, e);
                    continue;
                }
            };

            match generate_sitemap(&self.db, &outcome.domain) {
                Ok(sitemap) => {
                    info!(
                        "Scheduled sitemap update completed for {} ({} URLs)",
                        domain, sitemap.total_urls
                    );
                    refreshed += 1;
                }
                Err(e) => error!("Scheduled sitemap generation for {} failed: {}", domain, e),
            }
        }

        Ok(refreshed)
    }

    /// Spawn the worker. The first pass runs one interval after start.
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!("Recrawl worker started, running every {:?}", self.interval);
            let mut interval =
                tokio::time::interval_at(tokio::time::Instant::now() + self.interval, self.interval);

            loop {
                interval.tick().await;

                match self.run_once().await {
                    Ok(count) => info!("Scheduled recrawl refreshed {} domains", count),
                    Err(e) => error!("Scheduled sitemap update failed: {}", e),
                }
            }
        })
    }
}
