// tests/common/mod.rs
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ashare_dashboard::error::ProviderError;
use ashare_dashboard::models::{
    Breadth, IndexEntry, IndexSpec, MarketDateKey, RawSpread, SectorRecord,
};
use ashare_dashboard::services::aggregator::Aggregator;
use ashare_dashboard::services::cache::{CacheConfig, MarketDataCache};
use ashare_dashboard::services::providers::{DataProvider, SyntheticProvider};

pub fn key(s: &str) -> MarketDateKey {
    s.parse().unwrap()
}

pub fn series_end() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 10, 31).unwrap()
}

pub fn synthetic() -> SyntheticProvider {
    SyntheticProvider::new(IndexSpec::defaults(), series_end())
}

/// Synthetic data that counts bundle fetches per date and fails on demand.
///
/// One bundle fetch is one `fetch_breadth` call, so the counter tracks
/// aggregate fetches rather than individual part calls.
pub struct RecordingProvider {
    inner: SyntheticProvider,
    delay: Duration,
    calls: Mutex<HashMap<MarketDateKey, usize>>,
    fail_sectors: AtomicBool,
    failing_dates: Mutex<HashSet<MarketDateKey>>,
}

impl RecordingProvider {
    pub fn new() -> Arc<Self> {
        Self::with_delay(Duration::ZERO)
    }

    pub fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(RecordingProvider {
            inner: synthetic(),
            delay,
            calls: Mutex::new(HashMap::new()),
            fail_sectors: AtomicBool::new(false),
            failing_dates: Mutex::new(HashSet::new()),
        })
    }

    pub fn calls(&self, date: &MarketDateKey) -> usize {
        self.calls.lock().unwrap().get(date).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    pub fn set_fail_sectors(&self, fail: bool) {
        self.fail_sectors.store(fail, Ordering::SeqCst);
    }

    pub fn fail_on(&self, date: MarketDateKey) {
        self.failing_dates.lock().unwrap().insert(date);
    }

    pub fn recover(&self, date: &MarketDateKey) {
        self.failing_dates.lock().unwrap().remove(date);
    }

    fn check_date(&self, date: &MarketDateKey) -> Result<(), ProviderError> {
        if self.failing_dates.lock().unwrap().contains(date) {
            return Err(ProviderError::process(format!("no data for {}", date)));
        }
        Ok(())
    }
}

#[async_trait]
impl DataProvider for RecordingProvider {
    fn name(&self) -> &str {
        "recording"
    }

    async fn fetch_breadth(&self, date: &MarketDateKey) -> Result<Breadth, ProviderError> {
        *self.calls.lock().unwrap().entry(*date).or_insert(0) += 1;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.check_date(date)?;
        self.inner.fetch_breadth(date).await
    }

    async fn fetch_indices(&self, date: &MarketDateKey) -> Result<Vec<IndexEntry>, ProviderError> {
        self.check_date(date)?;
        self.inner.fetch_indices(date).await
    }

    async fn fetch_sectors(
        &self,
        date: &MarketDateKey,
    ) -> Result<Vec<SectorRecord>, ProviderError> {
        if self.fail_sectors.load(Ordering::SeqCst) {
            return Err(ProviderError::bad_output("get_sectors.py printed garbage"));
        }
        self.inner.fetch_sectors(date).await
    }

    async fn fetch_spread(&self, date: &MarketDateKey) -> Result<RawSpread, ProviderError> {
        self.inner.fetch_spread(date).await
    }
}

/// TTL 300s, refresh interval 60s, prefetch delay 1s, "today" pinned to 2024-03-06.
pub fn config(refresh_ahead: bool, prefetch_adjacent: bool) -> CacheConfig {
    CacheConfig {
        refresh_ahead,
        prefetch_adjacent,
        today: Arc::new(|| key("2024-03-06")),
        ..CacheConfig::default()
    }
}

pub fn cache_over(provider: Arc<RecordingProvider>, config: CacheConfig) -> MarketDataCache {
    MarketDataCache::new(Arc::new(Aggregator::new(provider)), config)
}

/// Lets detached background tasks run to completion under paused time.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}
