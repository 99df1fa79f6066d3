// src/services/cache.rs
use futures::future::join_all;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::error::MarketDataError;
use crate::models::{CacheStats, MarketBundle, MarketDateKey};
use crate::services::aggregator::Aggregator;
use crate::services::calendar::{exchange_today, previous_business_day};

pub type TodayFn = Arc<dyn Fn() -> MarketDateKey + Send + Sync>;

/// A bundle as served, plus whether it was already cached.
#[derive(Debug, Clone)]
pub struct Lookup {
    pub date: MarketDateKey,
    pub bundle: Arc<MarketBundle>,
    pub cached: bool,
}

#[derive(Clone)]
pub struct CacheConfig {
    pub ttl: Duration,
    /// Minimum gap between the starts of two background refreshes.
    pub refresh_interval: Duration,
    pub refresh_ahead: bool,
    pub prefetch_adjacent: bool,
    pub prefetch_delay: Duration,
    pub sweep_period: Duration,
    pub today: TodayFn,
}

impl fmt::Debug for CacheConfig {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("CacheConfig")
            .field("ttl", &self.ttl)
            .field("refresh_interval", &self.refresh_interval)
            .field("refresh_ahead", &self.refresh_ahead)
            .field("prefetch_adjacent", &self.prefetch_adjacent)
            .field("prefetch_delay", &self.prefetch_delay)
            .field("sweep_period", &self.sweep_period)
            .finish_non_exhaustive()
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            ttl: Duration::from_secs(300),
            refresh_interval: Duration::from_secs(60),
            refresh_ahead: true,
            prefetch_adjacent: true,
            prefetch_delay: Duration::from_secs(1),
            sweep_period: Duration::from_secs(60),
            today: Arc::new(exchange_today),
        }
    }
}

struct CacheEntry {
    bundle: Arc<MarketBundle>,
    expires_at: Instant,
    approx_size: usize,
}

impl CacheEntry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

#[derive(Default)]
struct RefreshState {
    in_flight: bool,
    last_started: Option<Instant>,
}

struct Inner {
    config: CacheConfig,
    aggregator: Arc<Aggregator>,
    entries: RwLock<HashMap<MarketDateKey, CacheEntry>>,
    hits: AtomicU64,
    misses: AtomicU64,
    /// Bumped by `clear()`; background writes from an older generation are dropped.
    generation: AtomicU64,
    refresh: Mutex<RefreshState>,
}

/// Releases the single-flight latch when the refresh task ends, however it ends.
struct RefreshGuard(Arc<Inner>);

impl Drop for RefreshGuard {
    fn drop(&mut self) {
        if let Ok(mut state) = self.0.refresh.lock() {
            state.in_flight = false;
        }
    }
}

/// Short-lived per-date bundle cache in front of the aggregator.
///
/// Hits are served immediately and may kick a background refresh; misses
/// fetch in the foreground and then warm the neighbouring trading days.
#[derive(Clone)]
pub struct MarketDataCache {
    inner: Arc<Inner>,
}

impl MarketDataCache {
    pub fn new(aggregator: Arc<Aggregator>, config: CacheConfig) -> Self {
        MarketDataCache {
            inner: Arc::new(Inner {
                config,
                aggregator,
                entries: RwLock::new(HashMap::new()),
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
                generation: AtomicU64::new(0),
                refresh: Mutex::new(RefreshState::default()),
            }),
        }
    }

    /// Like `get_or_fetch`, but also says whether the bundle came from the cache.
    pub async fn lookup(&self, date: &MarketDateKey) -> Result<Lookup, MarketDataError> {
        if let Some(bundle) = self.inner.live(date) {
            self.inner.hits.fetch_add(1, Ordering::Relaxed);
            debug!("Cache hit for {}", date);
            if self.inner.config.refresh_ahead {
                self.schedule_refresh(*date);
            }
            return Ok(Lookup {
                date: *date,
                bundle,
                cached: true,
            });
        }

        self.inner.misses.fetch_add(1, Ordering::Relaxed);
        info!("Cache miss for {}, fetching", date);
        let bundle = self.inner.aggregator.fetch(date).await?;
        let bundle = self.inner.store(*date, bundle);

        if self.inner.config.prefetch_adjacent {
            self.schedule_prefetch(*date);
        }
        Ok(Lookup {
            date: *date,
            bundle,
            cached: false,
        })
    }

    pub async fn get_or_fetch(
        &self,
        date: &MarketDateKey,
    ) -> Result<Arc<MarketBundle>, MarketDataError> {
        self.lookup(date).await.map(|found| found.bundle)
    }

    fn schedule_refresh(&self, date: MarketDateKey) {
        let now = Instant::now();
        {
            let mut state = match self.inner.refresh.lock() {
                Ok(state) => state,
                Err(_) => return,
            };
            let too_soon = state
                .last_started
                .map(|t| now.duration_since(t) < self.inner.config.refresh_interval)
                .unwrap_or(false);
            if state.in_flight || too_soon {
                debug!("Skipping background refresh for {}", date);
                return;
            }
            state.in_flight = true;
            state.last_started = Some(now);
        }

        let generation = self.inner.generation.load(Ordering::SeqCst);
        let guard = RefreshGuard(self.inner.clone());
        tokio::spawn(async move {
            let inner = guard.0.clone();
            match inner.aggregator.fetch(&date).await {
                Ok(bundle) => {
                    if inner.store_from(generation, date, bundle) {
                        info!("Background refresh updated {}", date);
                    } else {
                        debug!("Cache cleared during refresh of {}, result dropped", date);
                    }
                }
                Err(e) => warn!(
                    "Background refresh for {} failed, keeping cached data: {}",
                    date, e
                ),
            }
            drop(guard);
        });
    }

    fn schedule_prefetch(&self, date: MarketDateKey) {
        let cache = self.clone();
        let delay = self.inner.config.prefetch_delay;
        let generation = self.inner.generation.load(Ordering::SeqCst);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            cache.prefetch_from(generation, &date).await;
        });
    }

    /// Warms the previous business day and today when they are not cached yet.
    pub async fn prefetch_adjacent(&self, date: &MarketDateKey) {
        let generation = self.inner.generation.load(Ordering::SeqCst);
        self.prefetch_from(generation, date).await;
    }

    async fn prefetch_from(&self, generation: u64, date: &MarketDateKey) {
        let mut days = vec![previous_business_day(date), (self.inner.config.today)()];
        days.dedup();
        days.retain(|day| self.inner.live(day).is_none());

        join_all(days.into_iter().map(|day| async move {
            match self.inner.aggregator.fetch(&day).await {
                Ok(bundle) => {
                    if self.inner.store_from(generation, day, bundle) {
                        debug!("Prefetched {}", day);
                    }
                }
                Err(e) => debug!("Prefetch for {} failed: {}", day, e),
            }
        }))
        .await;
    }

    pub fn contains(&self, date: &MarketDateKey) -> bool {
        self.inner.live(date).is_some()
    }

    /// Drops every entry and resets the hit/miss counters.
    pub fn clear(&self) {
        if let Ok(mut entries) = self.inner.entries.write() {
            self.inner.generation.fetch_add(1, Ordering::SeqCst);
            entries.clear();
        }
        self.inner.hits.store(0, Ordering::Relaxed);
        self.inner.misses.store(0, Ordering::Relaxed);
        info!("Cache cleared");
    }

    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        match self.inner.entries.write() {
            Ok(mut entries) => {
                let before = entries.len();
                entries.retain(|_, entry| entry.is_live(now));
                before - entries.len()
            }
            Err(_) => 0,
        }
    }

    pub fn stats(&self) -> CacheStats {
        self.purge_expired();
        let (keys, ksize, vsize) = match self.inner.entries.read() {
            Ok(entries) => (
                entries.len(),
                entries.keys().map(|k| k.to_string().len()).sum::<usize>(),
                entries.values().map(|e| e.approx_size).sum::<usize>(),
            ),
            Err(_) => (0, 0, 0),
        };
        CacheStats {
            keys,
            hits: self.inner.hits.load(Ordering::Relaxed),
            misses: self.inner.misses.load(Ordering::Relaxed),
            ksize,
            vsize,
        }
    }

    /// Evicts expired entries every `sweep_period` until the handle is aborted.
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        let cache = self.clone();
        let period = self.inner.config.sweep_period;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let evicted = cache.purge_expired();
                if evicted > 0 {
                    debug!("Evicted {} expired cache entries", evicted);
                }
            }
        })
    }
}

impl Inner {
    fn live(&self, date: &MarketDateKey) -> Option<Arc<MarketBundle>> {
        let now = Instant::now();
        let entries = self.entries.read().ok()?;
        entries
            .get(date)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.bundle.clone())
    }

    fn entry(&self, bundle: MarketBundle) -> CacheEntry {
        let approx_size = serde_json::to_vec(&bundle).map(|v| v.len()).unwrap_or(0);
        CacheEntry {
            bundle: Arc::new(bundle),
            expires_at: Instant::now() + self.config.ttl,
            approx_size,
        }
    }

    fn store(&self, date: MarketDateKey, bundle: MarketBundle) -> Arc<MarketBundle> {
        let entry = self.entry(bundle);
        let bundle = entry.bundle.clone();
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(date, entry);
        }
        bundle
    }

    /// Stores a background result unless `clear()` ran since `generation` was read.
    fn store_from(&self, generation: u64, date: MarketDateKey, bundle: MarketBundle) -> bool {
        let entry = self.entry(bundle);
        match self.entries.write() {
            Ok(mut entries) if self.generation.load(Ordering::SeqCst) == generation => {
                entries.insert(date, entry);
                true
            }
            _ => false,
        }
    }
}
