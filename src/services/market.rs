// src/services/market.rs
use log::info;
use crate::error::MarketDataError;
use crate::models::{CacheStats, MarketDateKey};
use crate::services::cache::{Lookup, MarketDataCache};
use crate::services::providers::DataSource;

/// The one operation the HTTP layer needs, plus cache administration.
pub struct MarketService {
    cache: MarketDataCache,
    data_source: DataSource,
}

impl MarketService {
    pub fn new(cache: MarketDataCache, data_source: DataSource) -> Self {
        MarketService { cache, data_source }
    }

    pub fn data_source(&self) -> DataSource {
        self.data_source
    }

    pub fn cache(&self) -> &MarketDataCache {
        &self.cache
    }

    pub async fn get_market_data(&self, date: Option<&str>) -> Result<Lookup, MarketDataError> {
        let raw = match date.map(str::trim) {
            Some(raw) if !raw.is_empty() => raw,
            _ => return Err(MarketDataError::MissingParameter),
        };
        let key: MarketDateKey = raw
            .parse()
            .map_err(|_| MarketDataError::InvalidDate(raw.to_string()))?;

        info!("Market data requested for {} ({})", key, self.data_source);
        self.cache.lookup(&key).await
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}
