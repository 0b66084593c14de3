use crate::error::SitemapError;
use crate::model::{
    CrawlSession, DiscoveredUrl, Pagination, SessionStatus, SitemapStats, UrlPage, UrlQuery,
};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Result, Row, params};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

pub struct Database {
    conn: Connection,
}

/// Handle shared between the HTTP server, the crawl sink and the scheduler.
pub type SharedDatabase = Arc<Mutex<Database>>;

pub fn shared(db: Database) -> SharedDatabase {
    Arc::new(Mutex::new(db))
}

/// Lock the shared store. A poisoned lock means a writer panicked mid-statement.
pub fn lock_database(db: &SharedDatabase) -> std::result::Result<MutexGuard<'_, Database>, SitemapError> {
    db.lock()
        .map_err(|_| SitemapError::StoreUnavailable("database lock poisoned".to_string()))
}

const URL_COLUMNS: &str = "domain, url, last_modified, change_frequency, priority, http_status, last_checked";

fn current_timestamp() -> i64 {
    Utc::now().timestamp_millis()
}

fn timestamp_from_millis(idx: usize, millis: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, millis))
}

fn parse_column<T>(idx: usize, value: String) -> Result<T>
where
    T: std::str::FromStr<Err = String>,
{
    value
        .parse()
        .map_err(|e: String| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}

fn row_to_url(row: &Row<'_>) -> Result<DiscoveredUrl> {
    Ok(DiscoveredUrl {
        domain: row.get(0)?,
        url: row.get(1)?,
        last_modified: timestamp_from_millis(2, row.get(2)?)?,
        change_frequency: parse_column(3, row.get(3)?)?,
        priority: row.get(4)?,
        http_status: row.get(5)?,
        last_checked: timestamp_from_millis(6, row.get(6)?)?,
    })
}

fn row_to_session(row: &Row<'_>) -> Result<CrawlSession> {
    let finished_at: Option<i64> = row.get(4)?;
    Ok(CrawlSession {
        id: row.get(0)?,
        domain: row.get(1)?,
        start_url: row.get(2)?,
        started_at: timestamp_from_millis(3, row.get(3)?)?,
        finished_at: finished_at.map(|ms| timestamp_from_millis(4, ms)).transpose()?,
        status: parse_column::<SessionStatus>(5, row.get(5)?)?,
        pages_crawled: row.get::<_, i64>(6)? as u64,
        pages_failed: row.get::<_, i64>(7)? as u64,
    })
}

impl Database {
    pub fn remove(path: &Path) -> std::io::Result<()> {
        fs::remove_file(path)
    }

    pub fn exists(path: &Path) -> bool {
        path.exists()
    }

    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::configure(conn)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::configure(conn)
    }

    fn configure(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA cache_size = -64000;  -- 64MB cache
            PRAGMA temp_store = MEMORY;
            ",
        )?;

        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "
CREATE TABLE IF NOT EXISTS crawl_sessions (
    id TEXT PRIMARY KEY,
    domain TEXT NOT NULL,
    start_url TEXT NOT NULL,
    start_time INTEGER NOT NULL,
    end_time INTEGER,
    status TEXT NOT NULL CHECK(status IN ('running', 'completed', 'failed')),
    pages_crawled INTEGER NOT NULL DEFAULT 0,
    pages_failed INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_sessions_domain ON crawl_sessions(domain, start_time);

-- One row per page, keyed by absolute URL
CREATE TABLE IF NOT EXISTS discovered_urls (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    domain TEXT NOT NULL,
    url TEXT NOT NULL UNIQUE,
    last_modified INTEGER NOT NULL,
    change_frequency TEXT NOT NULL CHECK(change_frequency IN ('daily', 'weekly', 'monthly')),
    priority REAL NOT NULL CHECK(priority BETWEEN 0.0 AND 1.0),
    http_status INTEGER NOT NULL,
    last_checked INTEGER NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_urls_domain ON discovered_urls(domain);
CREATE INDEX IF NOT EXISTS idx_urls_status ON discovered_urls(domain, http_status);
CREATE INDEX IF NOT EXISTS idx_urls_priority ON discovered_urls(domain, priority);
            ",
        )?;
        Ok(())
    }

    // URL records
    pub fn upsert_url(&self, record: &DiscoveredUrl) -> Result<()> {
        let timestamp = current_timestamp();

        self.conn.execute(
            "INSERT INTO discovered_urls (
                domain, url, last_modified, change_frequency, priority,
                http_status, last_checked, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
            ON CONFLICT(url) DO UPDATE SET
                domain = excluded.domain,
                last_modified = excluded.last_modified,
                change_frequency = excluded.change_frequency,
                priority = excluded.priority,
                http_status = excluded.http_status,
                last_checked = excluded.last_checked,
                updated_at = excluded.updated_at",
            params![
                &record.domain,
                &record.url,
                record.last_modified.timestamp_millis(),
                record.change_frequency.as_str(),
                record.priority,
                record.http_status,
                record.last_checked.timestamp_millis(),
                timestamp,
            ],
        )?;

        Ok(())
    }

    pub fn get_url(&self, url: &str) -> Result<Option<DiscoveredUrl>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM discovered_urls WHERE url = ?1",
            URL_COLUMNS
        ))?;

        stmt.query_row(params![url], row_to_url).optional()
    }

    pub fn count_urls(&self, domain: &str) -> Result<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM discovered_urls WHERE domain = ?1",
            params![domain],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    pub fn list_urls(&self, query: &UrlQuery) -> Result<UrlPage> {
        let total: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM discovered_urls
             WHERE domain = ?1 AND (?2 IS NULL OR http_status = ?2)",
            params![&query.domain, query.status],
            |row| row.get(0),
        )?;

        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM discovered_urls
             WHERE domain = ?1 AND (?2 IS NULL OR http_status = ?2)
             ORDER BY priority DESC, url ASC
             LIMIT ?3 OFFSET ?4",
            URL_COLUMNS
        ))?;

        let urls = stmt
            .query_map(
                params![&query.domain, query.status, query.limit, query.offset() as i64],
                row_to_url,
            )?
            .collect::<Result<Vec<_>>>()?;

        let total = total as u64;
        let limit = u64::from(query.limit.max(1));
        Ok(UrlPage {
            urls,
            pagination: Pagination {
                total,
                pages: total.div_ceil(limit),
                current_page: query.page,
                limit: query.limit,
            },
        })
    }

    /// Reachable pages for the sitemap, highest priority first.
    pub fn sitemap_urls(&self, domain: &str) -> Result<Vec<DiscoveredUrl>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM discovered_urls
             WHERE domain = ?1 AND http_status = 200
             ORDER BY priority DESC, url ASC",
            URL_COLUMNS
        ))?;

        let urls = stmt
            .query_map(params![domain], row_to_url)?
            .collect::<Result<Vec<_>>>()?;
        Ok(urls)
    }

    pub fn stats(&self, domain: &str) -> Result<SitemapStats> {
        self.conn.query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(CASE WHEN http_status = 200 THEN 1 ELSE 0 END), 0),
                    MAX(last_checked)
             FROM discovered_urls WHERE domain = ?1",
            params![domain],
            |row| {
                let total: i64 = row.get(0)?;
                let ok: i64 = row.get(1)?;
                let last_checked: Option<i64> = row.get(2)?;
                Ok(SitemapStats {
                    total: total as u64,
                    ok: ok as u64,
                    broken: (total - ok) as u64,
                    last_crawled: last_checked.map(|ms| timestamp_from_millis(2, ms)).transpose()?,
                })
            },
        )
    }

    pub fn known_domains(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT domain FROM discovered_urls ORDER BY domain")?;

        let domains = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>>>()?;
        Ok(domains)
    }

    // Session management
    pub fn create_session(&self, domain: &str, start_url: &str) -> Result<String> {
        let session_id = uuid::Uuid::new_v4().to_string();
        let timestamp = current_timestamp();

        self.conn.execute(
            "INSERT INTO crawl_sessions (id, domain, start_url, start_time, status) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![&session_id, domain, start_url, timestamp, SessionStatus::Running.as_str()],
        )?;

        Ok(session_id)
    }

    pub fn complete_session(&self, session_id: &str, pages_crawled: usize, pages_failed: usize) -> Result<()> {
        self.finish_session(session_id, SessionStatus::Completed, pages_crawled, pages_failed)
    }

    pub fn fail_session(&self, session_id: &str, pages_crawled: usize, pages_failed: usize) -> Result<()> {
        self.finish_session(session_id, SessionStatus::Failed, pages_crawled, pages_failed)
    }

    fn finish_session(
        &self,
        session_id: &str,
        status: SessionStatus,
        pages_crawled: usize,
        pages_failed: usize,
    ) -> Result<()> {
        let timestamp = current_timestamp();
        self.conn.execute(
            "UPDATE crawl_sessions
             SET status = ?1, end_time = ?2, pages_crawled = ?3, pages_failed = ?4
             WHERE id = ?5",
            params![
                status.as_str(),
                timestamp,
                pages_crawled as i64,
                pages_failed as i64,
                session_id
            ],
        )?;
        Ok(())
    }

    pub fn latest_session(&self, domain: &str) -> Result<Option<CrawlSession>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, domain, start_url, start_time, end_time, status, pages_crawled, pages_failed
             FROM crawl_sessions WHERE domain = ?1
             ORDER BY start_time DESC, rowid DESC LIMIT 1",
        )?;

        stmt.query_row(params![domain], row_to_session).optional()
    }
}
