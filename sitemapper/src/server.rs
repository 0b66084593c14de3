use axum::{
    Json, Router,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;
use sitemapper_core::crawl::{CrawlOptions, CrawlTarget, crawl_site};
use sitemapper_core::data::{SharedDatabase, lock_database};
use sitemapper_core::model::{SitemapStats, UrlPage, UrlQuery};
use sitemapper_core::sitemap::generate_sitemap;
use sitemapper_core::SitemapError;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

#[derive(Clone)]
pub struct AppState {
    pub db: SharedDatabase,
    /// Defaults applied to crawls started through the API.
    pub options: CrawlOptions,
}

impl AppState {
    pub fn new(db: SharedDatabase, options: CrawlOptions) -> Self {
        Self { db, options }
    }
}

/// API error rendered as `{"error": message}`.
#[derive(Debug)]
pub struct ApiError(SitemapError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            SitemapError::Validation(_) => StatusCode::BAD_REQUEST,
            SitemapError::Network(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Extractor failures are client errors and keep the JSON error shape.
    fn rejected_json(rejection: JsonRejection) -> Self {
        Self(SitemapError::Validation(rejection.body_text()))
    }

    fn rejected_query(rejection: QueryRejection) -> Self {
        Self(SitemapError::Validation(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.0.to_string();
        if status.is_server_error() {
            error!("Request failed with {}: {}", status, message);
        }

        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl<E> From<E> for ApiError
where
    E: Into<SitemapError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

type ApiResult<T> = Result<T, ApiError>;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/sitemap/generate", post(generate))
        .route("/api/sitemap/{domain}/urls", get(list_urls))
        .route("/api/sitemap/{domain}/stats", get(stats))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `addr` and serve the API until the process receives Ctrl-C.
pub async fn serve(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Sitemap service listening on {}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;

    Ok(())
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "healthy" }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub crawl: bool,
    #[serde(default)]
    pub max_urls: Option<usize>,
}

async fn generate(
    State(state): State<AppState>,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(request) = payload.map_err(ApiError::rejected_json)?;
    let target = CrawlTarget::parse(request.domain.as_deref().unwrap_or_default())?;

    if request.crawl {
        let mut options = state.options.clone();
        if let Some(max_urls) = request.max_urls {
            if max_urls == 0 {
                return Err(SitemapError::Validation("maxUrls must be at least 1".to_string()).into());
            }
            options.max_urls = max_urls;
        }
        crawl_site(&state.db, &target, &options, None).await?;
    }

    let sitemap = generate_sitemap(&state.db, &target.domain)?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/xml"),
            (header::CONTENT_ENCODING, "gzip"),
        ],
        sitemap.gzipped,
    )
        .into_response())
}

#[derive(Debug, Default, Deserialize)]
pub struct UrlsParams {
    pub status: Option<u16>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl UrlsParams {
    /// Validate paging input and build the store query.
    pub fn into_query(self, domain: String) -> Result<UrlQuery, SitemapError> {
        let page = self.page.unwrap_or(1);
        if page < 1 {
            return Err(SitemapError::Validation("page must be at least 1".to_string()));
        }

        let limit = self.limit.unwrap_or(i64::from(UrlQuery::DEFAULT_LIMIT));
        if !(1..=i64::from(UrlQuery::MAX_LIMIT)).contains(&limit) {
            return Err(SitemapError::Validation(format!(
                "limit must be between 1 and {}",
                UrlQuery::MAX_LIMIT
            )));
        }

        let mut query = UrlQuery::new(domain);
        query.status = self.status;
        query.page = u32::try_from(page)
            .map_err(|_| SitemapError::Validation("page is out of range".to_string()))?;
        query.limit = limit as u32;
        Ok(query)
    }
}

async fn list_urls(
    State(state): State<AppState>,
    Path(domain): Path<String>,
    params: Result<Query<UrlsParams>, QueryRejection>,
) -> ApiResult<Json<UrlPage>> {
    let Query(params) = params.map_err(ApiError::rejected_query)?;
    let target = CrawlTarget::parse(&domain)?;
    let query = params.into_query(target.domain)?;

    let page = lock_database(&state.db)?.list_urls(&query)?;
    Ok(Json(page))
}

async fn stats(
    State(state): State<AppState>,
    Path(domain): Path<String>,
) -> ApiResult<Json<SitemapStats>> {
    let target = CrawlTarget::parse(&domain)?;

    let stats = lock_database(&state.db)?.stats(&target.domain)?;
    Ok(Json(stats))
}
