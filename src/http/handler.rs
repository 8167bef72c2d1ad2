//! Main axum router and HTTP request handlers.
//!
//! Routes:
//! - `GET /api/fires?range=24h|48h|7d` - Cached FIRMS CSV
//! - `GET /api/health`                - Cache status and uptime
//! - `GET /metrics`                   - Prometheus metrics
//! - anything else                    - Static frontend files

use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error, instrument};

use crate::cache::rounded_secs;
use crate::proxy::{Disposition, Served};
use crate::range::{InvalidRange, RangeKey};
use crate::upstream::UpstreamError;
use crate::AppState;

const X_CACHE: HeaderName = HeaderName::from_static("x-cache");
const X_CACHE_AGE: HeaderName = HeaderName::from_static("x-cache-age");
const CSV_CONTENT_TYPE: &str = "text/csv; charset=utf-8";

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the axum [`Router`] with all HTTP routes and shared state.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/fires", get(handle_fires))
        .route("/api/health", get(crate::health::health_handler))
        .route("/metrics", get(handle_metrics))
        .fallback(super::static_files::handle_static)
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Query parameter types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FiresQuery {
    range: Option<String>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /api/fires?range=24h|48h|7d`
///
/// The range is validated before the cache is consulted, so an unknown range
/// is a 400 whatever the cache holds.
#[instrument(skip(state, query))]
async fn handle_fires(
    State(state): State<Arc<AppState>>,
    query: Result<Query<FiresQuery>, QueryRejection>,
) -> Result<Response, AppError> {
    let Query(query) = query.map_err(|e| AppError::InvalidRange(InvalidRange(e.body_text())))?;
    let range = RangeKey::resolve(query.range.as_deref())?;

    let served = state
        .proxy
        .serve(range)
        .await
        .map_err(|source| AppError::Upstream { range, source })?;

    Ok(csv_response(served))
}

/// `GET /metrics`
async fn handle_metrics(State(state): State<Arc<AppState>>) -> Result<Response, AppError> {
    let buf = state
        .metrics
        .encode()
        .map_err(|e| AppError::Internal(anyhow::anyhow!("metrics encoding failed: {e}")))?;

    Ok((
        StatusCode::OK,
        [(
            header::CONTENT_TYPE,
            "application/openmetrics-text; version=1.0.0; charset=utf-8",
        )],
        buf,
    )
        .into_response())
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn csv_response(served: Served) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(CSV_CONTENT_TYPE));
    headers.insert(X_CACHE, HeaderValue::from_static(served.disposition.label()));
    if let Disposition::Hit { age } = served.disposition {
        headers.insert(X_CACHE_AGE, HeaderValue::from(rounded_secs(age)));
    }

    (StatusCode::OK, headers, served.payload).into_response()
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Application-level error type that maps cleanly to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// The requested range is not one of the supported windows.
    InvalidRange(InvalidRange),
    /// Upstream failed and there is no cached copy to fall back on.
    Upstream {
        range: RangeKey,
        source: UpstreamError,
    },
    /// An unexpected internal error.
    Internal(anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::InvalidRange(err) => {
                debug!(error = %err, "rejected fire data request");
                (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "error": "Invalid range. Use 24h, 48h, or 7d." })),
                )
                    .into_response()
            }
            AppError::Upstream { range, source } => {
                error!(%range, error = %source, "no cached data to fall back on");
                (
                    StatusCode::BAD_GATEWAY,
                    Json(json!({
                        "error": "Failed to fetch fire data from NASA FIRMS",
                        "detail": source.to_string(),
                    })),
                )
                    .into_response()
            }
            AppError::Internal(err) => {
                error!(error = %err, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Internal server error: {err:#}"),
                )
                    .into_response()
            }
        }
    }
}

impl From<InvalidRange> for AppError {
    fn from(err: InvalidRange) -> Self {
        AppError::InvalidRange(err)
    }
}
