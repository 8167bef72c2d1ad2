use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use tokio::time::Instant;

use crate::cache::{rounded_secs, FireCache};
use crate::range::RangeKey;
use crate::AppState;

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    /// Seconds since the process started serving.
    pub uptime: f64,
    /// One entry per range fetched at least once.
    pub cache: BTreeMap<RangeKey, RangeStatus>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeStatus {
    pub cached: bool,
    pub age_seconds: u64,
    pub size_bytes: u64,
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Build the status report.  Read-only with respect to the cache.
pub async fn build_report(cache: &FireCache, started_at: Instant) -> HealthResponse {
    let cache = cache
        .snapshot()
        .await
        .into_iter()
        .map(|status| {
            (
                status.range,
                RangeStatus {
                    cached: true,
                    age_seconds: rounded_secs(status.age),
                    size_bytes: status.size_bytes as u64,
                },
            )
        })
        .collect();

    HealthResponse {
        status: "ok",
        uptime: started_at.elapsed().as_secs_f64(),
        cache,
    }
}

// ---------------------------------------------------------------------------
// Axum handler
// ---------------------------------------------------------------------------

/// `GET /api/health`
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(build_report(state.proxy.cache(), state.started_at).await)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bytes::Bytes;
    use serde_json::json;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn empty_cache_reports_no_ranges() {
        let started_at = Instant::now();
        let cache = FireCache::new(Duration::from_secs(300));
        tokio::time::advance(Duration::from_millis(1500)).await;

        let report = build_report(&cache, started_at).await;
        let body = serde_json::to_value(&report).unwrap();
        assert_eq!(body, json!({ "status": "ok", "uptime": 1.5, "cache": {} }));
    }

    #[tokio::test(start_paused = true)]
    async fn reports_age_and_exact_size() {
        let started_at = Instant::now();
        let cache = FireCache::new(Duration::from_secs(300));
        cache
            .store(RangeKey::Last48h, Bytes::from("brightness,°K\n"))
            .await;
        tokio::time::advance(Duration::from_secs(42)).await;

        let report = build_report(&cache, started_at).await;
        let body = serde_json::to_value(&report).unwrap();

        assert_eq!(
            body["cache"],
            json!({ "48h": { "cached": true, "ageSeconds": 42, "sizeBytes": 15 } })
        );
        assert!(body["cache"].get("24h").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entries_are_still_reported() {
        let started_at = Instant::now();
        let cache = FireCache::new(Duration::from_secs(300));
        cache.store(RangeKey::Last7d, Bytes::from_static(b"x")).await;
        tokio::time::advance(Duration::from_secs(3600)).await;

        let report = build_report(&cache, started_at).await;
        assert_eq!(
            report.cache.get(&RangeKey::Last7d),
            Some(&RangeStatus {
                cached: true,
                age_seconds: 3600,
                size_bytes: 1,
            })
        );
    }
}
