//! Cache-aware fetch path behind `GET /api/fires`.
//!
//! Per request: a fresh entry is served as `HIT`.  Otherwise one upstream
//! fetch is attempted; success replaces the entry and is served as `MISS`,
//! failure falls back to the previous entry as `STALE` when one exists.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::cache::{FireCache, Lookup};
use crate::metrics::{CacheStatus, FetchOutcome, MetricsRegistry};
use crate::range::RangeKey;
use crate::upstream::{self, FireSource, UpstreamError};

/// Where a served payload came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Hit { age: Duration },
    Miss,
    Stale,
}

impl Disposition {
    /// Value of the `X-Cache` response header.
    pub fn label(&self) -> &'static str {
        match self {
            Disposition::Hit { .. } => "HIT",
            Disposition::Miss => "MISS",
            Disposition::Stale => "STALE",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Served {
    pub payload: Bytes,
    pub disposition: Disposition,
}

#[derive(Clone)]
pub struct FireProxy {
    cache: FireCache,
    source: Arc<dyn FireSource>,
    min_payload_bytes: usize,
    metrics: MetricsRegistry,
}

impl FireProxy {
    pub fn new(
        cache: FireCache,
        source: Arc<dyn FireSource>,
        min_payload_bytes: usize,
        metrics: MetricsRegistry,
    ) -> Self {
        Self {
            cache,
            source,
            min_payload_bytes,
            metrics,
        }
    }

    pub fn cache(&self) -> &FireCache {
        &self.cache
    }

    /// Serve `range` from cache or upstream.
    ///
    /// Returns the upstream error only when the fetch failed and nothing was
    /// ever cached for the range.
    pub async fn serve(&self, range: RangeKey) -> Result<Served, UpstreamError> {
        let metrics = &self.metrics.metrics;

        let fallback = match self.cache.lookup(range).await {
            Lookup::Fresh { entry, age } => {
                debug!(%range, age_ms = age.as_millis() as u64, "cache hit");
                metrics.record_request(range, CacheStatus::Hit);
                return Ok(Served {
                    payload: entry.payload().clone(),
                    disposition: Disposition::Hit { age },
                });
            }
            Lookup::Expired(entry) => Some(entry),
            Lookup::Missing => None,
        };

        let started = std::time::Instant::now();
        let fetched =
            upstream::fetch_checked(self.source.as_ref(), range, self.min_payload_bytes).await;
        let elapsed = started.elapsed().as_secs_f64();

        match fetched {
            Ok(body) => {
                metrics.record_fetch(range, FetchOutcome::Ok, elapsed);
                let entry = self.cache.store(range, body).await;
                metrics.set_cache_bytes(range, entry.size_bytes());
                metrics.record_request(range, CacheStatus::Miss);
                info!(%range, size_bytes = entry.size_bytes(), "refreshed from upstream");
                Ok(Served {
                    payload: entry.payload().clone(),
                    disposition: Disposition::Miss,
                })
            }
            Err(err) => {
                metrics.record_fetch(range, fetch_outcome(&err), elapsed);
                warn!(%range, error = %err, kind = err.kind(), "upstream fetch failed");

                match fallback {
                    Some(entry) => {
                        metrics.record_request(range, CacheStatus::Stale);
                        Ok(Served {
                            payload: entry.payload().clone(),
                            disposition: Disposition::Stale,
                        })
                    }
                    None => {
                        metrics.record_request(range, CacheStatus::Error);
                        Err(err)
                    }
                }
            }
        }
    }
}

fn fetch_outcome(err: &UpstreamError) -> FetchOutcome {
    match err {
        UpstreamError::Status(_) => FetchOutcome::HttpStatus,
        UpstreamError::EmptyResponse => FetchOutcome::EmptyResponse,
        UpstreamError::Network(_) => FetchOutcome::Network,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tokio::sync::oneshot;

    use super::*;
    use crate::upstream::scripted::{sample_csv, ScriptedSource};

    const TTL: Duration = Duration::from_secs(300);

    fn proxy_with(source: Arc<ScriptedSource>) -> FireProxy {
        FireProxy::new(FireCache::new(TTL), source, 100, MetricsRegistry::new())
    }

    #[tokio::test(start_paused = true)]
    async fn miss_then_hit_within_ttl() {
        let source = Arc::new(ScriptedSource::new());
        source.push_ok(sample_csv("first"));
        let proxy = proxy_with(source.clone());

        let first = proxy.serve(RangeKey::Last24h).await.unwrap();
        assert_eq!(first.disposition, Disposition::Miss);

        tokio::time::advance(Duration::from_secs(30)).await;
        let second = proxy.serve(RangeKey::Last24h).await.unwrap();
        assert_eq!(second.payload, first.payload);
        assert_eq!(
            second.disposition,
            Disposition::Hit {
                age: Duration::from_secs(30)
            }
        );

        tokio::time::advance(Duration::from_secs(30)).await;
        let third = proxy.serve(RangeKey::Last24h).await.unwrap();
        assert_eq!(
            third.disposition,
            Disposition::Hit {
                age: Duration::from_secs(60)
            }
        );
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn refetches_after_ttl() {
        let source = Arc::new(ScriptedSource::new());
        source.push_ok(sample_csv("old"));
        source.push_ok(sample_csv("new"));
        let proxy = proxy_with(source.clone());

        proxy.serve(RangeKey::Last7d).await.unwrap();
        tokio::time::advance(TTL).await;

        let refreshed = proxy.serve(RangeKey::Last7d).await.unwrap();
        assert_eq!(refreshed.disposition, Disposition::Miss);
        assert_eq!(refreshed.payload, Bytes::from(sample_csv("new")));

        let hit = proxy.serve(RangeKey::Last7d).await.unwrap();
        assert_eq!(hit.disposition, Disposition::Hit { age: Duration::ZERO });
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_entry_served_when_upstream_fails() {
        let source = Arc::new(ScriptedSource::new());
        source.push_ok(sample_csv("cached"));
        source.push_err(UpstreamError::Status(503));
        let proxy = proxy_with(source.clone());

        proxy.serve(RangeKey::Last48h).await.unwrap();
        tokio::time::advance(Duration::from_secs(301)).await;

        let served = proxy.serve(RangeKey::Last48h).await.unwrap();
        assert_eq!(served.disposition, Disposition::Stale);
        assert_eq!(served.payload, Bytes::from(sample_csv("cached")));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_refresh_keeps_old_entry() {
        let source = Arc::new(ScriptedSource::new());
        source.push_ok(sample_csv("cached"));
        source.push_ok("too short");
        source.push_err(UpstreamError::Status(502));
        let proxy = proxy_with(source.clone());

        proxy.serve(RangeKey::Last48h).await.unwrap();
        tokio::time::advance(TTL).await;

        let first = proxy.serve(RangeKey::Last48h).await.unwrap();
        assert_eq!(first.disposition, Disposition::Stale);
        assert_eq!(first.payload, Bytes::from(sample_csv("cached")));

        // The failed refresh did not touch the entry, so it is still expired.
        let second = proxy.serve(RangeKey::Last48h).await.unwrap();
        assert_eq!(second.disposition, Disposition::Stale);
        assert_eq!(source.calls(), 3);
    }

    #[tokio::test]
    async fn error_without_any_entry() {
        let source = Arc::new(ScriptedSource::new());
        source.push_err(UpstreamError::Status(500));
        let proxy = proxy_with(source.clone());

        let err = proxy.serve(RangeKey::Last24h).await.unwrap_err();
        assert!(matches!(err, UpstreamError::Status(500)));
        assert!(proxy.cache().snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn short_payload_is_not_cached() {
        let source = Arc::new(ScriptedSource::new());
        source.push_ok("latitude,longitude\n");
        let proxy = proxy_with(source.clone());

        let err = proxy.serve(RangeKey::Last24h).await.unwrap_err();
        assert!(matches!(err, UpstreamError::EmptyResponse));
        assert!(matches!(
            proxy.cache().lookup(RangeKey::Last24h).await,
            Lookup::Missing
        ));
    }

    #[tokio::test]
    async fn ranges_use_separate_slots() {
        let source = Arc::new(ScriptedSource::new());
        source.push_ok(sample_csv("day"));
        source.push_ok(sample_csv("week"));
        let proxy = proxy_with(source.clone());

        let day = proxy.serve(RangeKey::Last24h).await.unwrap();
        let week = proxy.serve(RangeKey::Last7d).await.unwrap();

        assert_eq!(day.disposition, Disposition::Miss);
        assert_eq!(week.disposition, Disposition::Miss);
        assert_ne!(day.payload, week.payload);
        assert_eq!(source.requested(), vec![RangeKey::Last24h, RangeKey::Last7d]);
    }

    #[tokio::test]
    async fn outcomes_are_counted() {
        let source = Arc::new(ScriptedSource::new());
        source.push_ok(sample_csv("a"));
        let metrics = MetricsRegistry::new();
        let proxy = FireProxy::new(FireCache::new(TTL), source, 100, metrics.clone());

        proxy.serve(RangeKey::Last24h).await.unwrap();
        proxy.serve(RangeKey::Last24h).await.unwrap();

        let text = metrics.encode().unwrap();
        assert!(text.contains("firecache_requests_total{range=\"24h\",cache_status=\"Miss\"} 1"));
        assert!(text.contains("firecache_requests_total{range=\"24h\",cache_status=\"Hit\"} 1"));
    }

    /// Holds every fetch open until its gate is released by the test.
    struct GatedSource {
        gates: Mutex<VecDeque<oneshot::Receiver<Bytes>>>,
        calls: AtomicUsize,
    }

    impl GatedSource {
        fn new(gates: Vec<oneshot::Receiver<Bytes>>) -> Self {
            Self {
                gates: Mutex::new(gates.into()),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl FireSource for GatedSource {
        async fn fetch_csv(&self, _range: RangeKey) -> Result<Bytes, UpstreamError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let gate = self.gates.lock().unwrap().pop_front();
            match gate {
                Some(rx) => rx.await.map_err(|_| UpstreamError::Status(500)),
                None => Err(UpstreamError::Status(500)),
            }
        }
    }

    async fn cached_payload(proxy: &FireProxy, range: RangeKey) -> Option<Bytes> {
        match proxy.cache().lookup(range).await {
            Lookup::Fresh { entry, .. } | Lookup::Expired(entry) => Some(entry.payload().clone()),
            Lookup::Missing => None,
        }
    }

    #[tokio::test]
    async fn concurrent_misses_each_fetch_and_last_write_wins() {
        let (first_tx, first_rx) = oneshot::channel();
        let (second_tx, second_rx) = oneshot::channel();
        let source = Arc::new(GatedSource::new(vec![first_rx, second_rx]));
        let proxy = FireProxy::new(
            FireCache::new(TTL),
            source.clone(),
            100,
            MetricsRegistry::new(),
        );

        let a = tokio::spawn({
            let proxy = proxy.clone();
            async move { proxy.serve(RangeKey::Last24h).await }
        });
        let b = tokio::spawn({
            let proxy = proxy.clone();
            async move { proxy.serve(RangeKey::Last24h).await }
        });

        while source.calls() < 2 {
            tokio::task::yield_now().await;
        }

        let first = Bytes::from(sample_csv("first"));
        let second = Bytes::from(sample_csv("second"));

        first_tx.send(first.clone()).unwrap();
        while cached_payload(&proxy, RangeKey::Last24h).await.as_ref() != Some(&first) {
            tokio::task::yield_now().await;
        }
        second_tx.send(second.clone()).unwrap();

        let a = a.await.unwrap().unwrap();
        let b = b.await.unwrap().unwrap();
        assert_eq!(a.disposition, Disposition::Miss);
        assert_eq!(b.disposition, Disposition::Miss);
        assert_eq!(source.calls(), 2);
        assert_eq!(cached_payload(&proxy, RangeKey::Last24h).await, Some(second));
    }
}
