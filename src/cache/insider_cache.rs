//! Sector-keyed cache over the slow insider-purchase aggregate query.
//!
//! The whole cache is rebuilt at once when it is empty or older than the TTL. A
//! rebuild fetches into a fresh snapshot and swaps it in atomically, so readers see
//! either the previous snapshot or the new one, and a failed fetch leaves the previous
//! snapshot serving. Two requests racing on a stale cache may both rebuild; the
//! rebuild is idempotent so the only cost is a redundant query.

use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use indexmap::IndexMap;
use tracing::{debug, error, info};

use super::clock::Clock;
use crate::api::latency::LatencyStats;
use crate::config::{Config, ALL_SECTORS, INSIDER_QUERY_LIMIT};
use crate::error::Result;
use crate::types::InsiderAggregate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsiderQuery {
    /// Only filings dated after this day count.
    pub since: NaiveDate,
    pub limit: i64,
}

/// Provider of per-company open-market purchase aggregates.
#[async_trait]
pub trait InsiderSource: Send + Sync {
    /// One row per company, ordered by total buying, largest first.
    async fn fetch_insider_aggregates(&self, query: InsiderQuery) -> Result<Vec<InsiderAggregate>>;
}

const MAX_TTL_SECS: u64 = (i64::MAX / 1000) as u64;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InsiderCacheSettings {
    pub ttl: Duration,
    pub window_days: i64,
    pub min_market_cap_home_page: f64,
    pub max_home_page: usize,
}

impl From<&Config> for InsiderCacheSettings {
    fn from(cfg: &Config) -> Self {
        Self {
            ttl: Duration::seconds(cfg.insider_cache_ttl_secs.min(MAX_TTL_SECS) as i64),
            window_days: cfg.insider_window_days,
            min_market_cap_home_page: cfg.min_market_cap_home_page,
            max_home_page: cfg.max_home_page_insiders,
        }
    }
}

/// sector -> ticker -> aggregate, both levels in total-buying order.
type SectorBuckets = IndexMap<String, IndexMap<String, InsiderAggregate>>;

#[derive(Debug)]
struct InsiderSnapshot {
    populated_at: DateTime<Utc>,
    by_sector: SectorBuckets,
}

pub struct InsiderBuyingCache {
    source: Arc<dyn InsiderSource>,
    clock: Arc<dyn Clock>,
    settings: InsiderCacheSettings,
    latency: Arc<LatencyStats>,
    snapshot: ArcSwapOption<InsiderSnapshot>,
}

impl InsiderBuyingCache {
    pub fn new(
        source: Arc<dyn InsiderSource>,
        clock: Arc<dyn Clock>,
        settings: InsiderCacheSettings,
        latency: Arc<LatencyStats>,
    ) -> Self {
        Self {
            source,
            clock,
            settings,
            latency,
            snapshot: ArcSwapOption::empty(),
        }
    }

    /// Time since the last successful rebuild. `None` before the first one.
    pub fn age(&self) -> Option<Duration> {
        self.snapshot
            .load()
            .as_ref()
            .map(|s| self.clock.now() - s.populated_at)
    }

    fn is_stale(&self) -> bool {
        match self.age() {
            None => true,
            Some(age) => age > self.settings.ttl,
        }
    }

    /// Aggregates for `sector` (or [`ALL_SECTORS`] for the home-page digest), rebuilding
    /// first if the cache is empty or stale. Unknown sectors yield an empty list.
    pub async fn get(&self, sector: &str) -> Result<Vec<InsiderAggregate>> {
        debug!(sector, age_ms = self.age().map(|a| a.num_milliseconds()), "insider cache age");
        if self.is_stale() {
            self.populate().await?;
        }

        let snapshot = self.snapshot.load();
        Ok(snapshot
            .as_ref()
            .and_then(|s| s.by_sector.get(sector))
            .map(|bucket| bucket.values().cloned().collect())
            .unwrap_or_default())
    }

    /// Runs the aggregate query and swaps in a new snapshot. On failure the previous
    /// snapshot stays in place and the error is returned.
    pub async fn populate(&self) -> Result<()> {
        let started = Instant::now();
        let query = InsiderQuery {
            since: self.clock.now().date_naive() - Duration::days(self.settings.window_days),
            limit: INSIDER_QUERY_LIMIT,
        };

        let rows = match self.source.fetch_insider_aggregates(query).await {
            Ok(rows) => rows,
            Err(e) => {
                error!("Insider cache rebuild failed, keeping previous snapshot: {e}");
                return Err(e);
            }
        };

        let row_count = rows.len();
        let by_sector = group_by_sector(
            rows,
            self.settings.min_market_cap_home_page,
            self.settings.max_home_page,
        );
        info!(
            rows = row_count,
            sectors = by_sector.len() - 1,
            home_page = by_sector.get(ALL_SECTORS).map_or(0, |b| b.len()),
            "Cached insider buying"
        );

        self.snapshot.store(Some(Arc::new(InsiderSnapshot {
            populated_at: self.clock.now(),
            by_sector,
        })));
        self.latency.record(started.elapsed());
        Ok(())
    }
}

/// Buckets rows per sector, one entry per ticker, keeping total-buying order. The
/// [`ALL_SECTORS`] bucket always exists and holds at most `max_home_page` companies
/// above `min_market_cap`.
fn group_by_sector(mut rows: Vec<InsiderAggregate>, min_market_cap: f64, max_home_page: usize) -> SectorBuckets {
    rows.sort_by(|a, b| b.total_buying.total_cmp(&a.total_buying));

    let mut buckets = SectorBuckets::new();
    buckets.insert(ALL_SECTORS.to_string(), IndexMap::new());

    for row in rows {
        if let Some(home) = buckets.get_mut(ALL_SECTORS) {
            if row.market_cap > min_market_cap && home.len() < max_home_page {
                home.insert(row.ticker.clone(), row.clone());
            }
        }
        buckets
            .entry(row.sector.clone())
            .or_default()
            .insert(row.ticker.clone(), row);
    }
    buckets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::clock::ManualClock;
    use crate::error::AppError;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FakeSource {
        calls: AtomicUsize,
        fail: AtomicBool,
        rows: Mutex<Vec<InsiderAggregate>>,
    }

    impl FakeSource {
        fn new(rows: Vec<InsiderAggregate>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail: AtomicBool::new(false),
                rows: Mutex::new(rows),
            })
        }
    }

    #[async_trait]
    impl InsiderSource for FakeSource {
        async fn fetch_insider_aggregates(&self, query: InsiderQuery) -> Result<Vec<InsiderAggregate>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert_eq!(query.limit, INSIDER_QUERY_LIMIT);
            if self.fail.load(Ordering::SeqCst) {
                return Err(AppError::NotFound("upstream unavailable".to_string()));
            }
            Ok(self.rows.lock().unwrap().clone())
        }
    }

    fn agg(ticker: &str, sector: &str, market_cap: f64, total_buying: f64) -> InsiderAggregate {
        InsiderAggregate {
            stock_id: 1,
            ticker: ticker.to_string(),
            uri: format!("{ticker}-Inc"),
            name: format!("{ticker} Inc"),
            sector: sector.to_string(),
            market_cap,
            insider_count: 1,
            total_shares_bought: 100.0,
            total_buying,
            titles: "Director".to_string(),
        }
    }

    fn settings(max_home_page: usize) -> InsiderCacheSettings {
        InsiderCacheSettings {
            ttl: Duration::hours(1),
            window_days: 30,
            min_market_cap_home_page: 10_000_000_000.0,
            max_home_page,
        }
    }

    fn start() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z").unwrap().with_timezone(&Utc)
    }

    fn cache(source: Arc<FakeSource>, clock: Arc<ManualClock>, max_home_page: usize) -> InsiderBuyingCache {
        InsiderBuyingCache::new(source, clock, settings(max_home_page), Arc::new(LatencyStats::new()))
    }

    #[tokio::test]
    async fn repeated_reads_within_ttl_query_once() {
        let source = FakeSource::new(vec![agg("AAA", "Energy", 5.0e10, 1.0e6)]);
        let clock = Arc::new(ManualClock::new(start()));
        let cache = cache(source.clone(), clock.clone(), 14);

        assert_eq!(cache.get("Energy").await.unwrap().len(), 1);
        clock.advance(Duration::minutes(59));
        assert_eq!(cache.get("Energy").await.unwrap().len(), 1);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn read_after_ttl_rebuilds() {
        let source = FakeSource::new(vec![agg("AAA", "Energy", 5.0e10, 1.0e6)]);
        let clock = Arc::new(ManualClock::new(start()));
        let cache = cache(source.clone(), clock.clone(), 14);

        assert_eq!(cache.get("Energy").await.unwrap()[0].ticker, "AAA");
        *source.rows.lock().unwrap() = vec![agg("BBB", "Energy", 6.0e10, 2.0e6), agg("CCC", "Energy", 7.0e10, 3.0e6)];
        clock.advance(Duration::minutes(61));

        let fresh = cache.get("Energy").await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        assert_eq!(fresh.iter().map(|a| a.ticker.as_str()).collect::<Vec<_>>(), vec!["CCC", "BBB"]);
        assert_eq!(cache.age(), Some(Duration::zero()));
    }

    #[tokio::test]
    async fn failed_rebuild_keeps_previous_snapshot() {
        let source = FakeSource::new(vec![agg("AAA", "Energy", 5.0e10, 1.0e6)]);
        let clock = Arc::new(ManualClock::new(start()));
        let cache = cache(source.clone(), clock.clone(), 14);

        cache.get("Energy").await.unwrap();
        source.fail.store(true, Ordering::SeqCst);
        clock.advance(Duration::hours(2));

        assert!(cache.get("Energy").await.is_err());
        // Still stale, so this retries and fails again, but the old data was not cleared.
        assert!(cache.age().is_some());
        source.fail.store(false, Ordering::SeqCst);
        assert_eq!(cache.get("Energy").await.unwrap()[0].ticker, "AAA");
    }

    #[tokio::test]
    async fn unknown_sector_is_empty_not_an_error() {
        let source = FakeSource::new(vec![agg("AAA", "Energy", 5.0e10, 1.0e6)]);
        let clock = Arc::new(ManualClock::new(start()));
        let cache = cache(source, clock, 14);
        assert!(cache.get("Utilities").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_result_still_counts_as_populated() {
        let source = FakeSource::new(Vec::new());
        let clock = Arc::new(ManualClock::new(start()));
        let cache = cache(source.clone(), clock, 14);
        assert!(cache.get(ALL_SECTORS).await.unwrap().is_empty());
        assert!(cache.get(ALL_SECTORS).await.unwrap().is_empty());
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn grouping_orders_dedups_and_caps_home_page() {
        let rows = vec![
            agg("SMALL", "Energy", 1.0e9, 9.0e6),
            agg("BIG1", "Energy", 5.0e10, 2.0e6),
            agg("BIG2", "Technology", 8.0e10, 7.0e6),
            agg("BIG3", "Technology", 9.0e10, 1.0e6),
            agg("BIG1", "Energy", 5.0e10, 0.5e6),
        ];
        let buckets = group_by_sector(rows, 1.0e10, 2);

        let energy: Vec<&str> = buckets["Energy"].keys().map(String::as_str).collect();
        assert_eq!(energy, vec!["SMALL", "BIG1"]);

        let home: Vec<&str> = buckets[ALL_SECTORS].keys().map(String::as_str).collect();
        assert_eq!(home, vec!["BIG2", "BIG1"]);

        let tech: Vec<&str> = buckets["Technology"].keys().map(String::as_str).collect();
        assert_eq!(tech, vec!["BIG2", "BIG3"]);
    }
}
