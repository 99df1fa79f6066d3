// src/config.rs
use anyhow::{anyhow, Context, Result};
use chrono::{Datelike, NaiveDate};
use log::warn;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::models::IndexSpec;
use crate::services::aggregator::{Aggregator, FallbackPolicy};
use crate::services::cache::{CacheConfig, MarketDataCache};
use crate::services::market::MarketService;
use crate::services::providers::synthetic::SERIES_START_YEAR;
use crate::services::providers::{
    BridgeKind, BridgeProvider, DataProvider, DataSource, PythonRunner, SyntheticProvider,
};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub data_source: DataSource,
    pub fallback: FallbackPolicy,
    pub cache: CacheConfig,
    pub python: String,
    pub akshare_dir: PathBuf,
    pub wind_dir: PathBuf,
    pub akshare_timeout: Duration,
    pub wind_timeout: Duration,
    pub spread_end: NaiveDate,
    pub indices: Vec<IndexSpec>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            port: 3002,
            data_source: DataSource::Mock,
            fallback: FallbackPolicy::Synthetic,
            cache: CacheConfig::default(),
            python: "python3".to_string(),
            akshare_dir: PathBuf::from("scripts/akshare_api"),
            wind_dir: PathBuf::from("scripts/wind_api"),
            akshare_timeout: Duration::from_secs(300),
            wind_timeout: Duration::from_secs(10),
            spread_end: NaiveDate::from_ymd_opt(2025, 10, 31).unwrap_or_default(),
            indices: IndexSpec::defaults(),
        }
    }
}

fn parse_var<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("{} has invalid value '{}': {}", key, raw, e)),
        _ => Ok(default),
    }
}

fn secs_var(key: &str, default: Duration) -> Result<Duration> {
    parse_var(key, default.as_secs()).map(Duration::from_secs)
}

impl AppConfig {
    /// Reads settings from the environment, keeping defaults for anything unset.
    pub fn from_env() -> Result<Self> {
        let defaults = AppConfig::default();

        let data_source = match env::var("DATA_SOURCE") {
            Ok(raw) if !raw.trim().is_empty() => raw
                .parse::<DataSource>()
                .map_err(|e| anyhow!(e))
                .context("DATA_SOURCE must be one of mock, akshare, wind")?,
            _ if parse_var("USE_REAL_DATA", false)? => DataSource::AkShare,
            _ => DataSource::Mock,
        };

        let fallback = if parse_var("FALLBACK_TO_SYNTHETIC", true)? {
            FallbackPolicy::Synthetic
        } else {
            FallbackPolicy::Propagate
        };

        let spread_end = match env::var("SPREAD_END_DATE") {
            Ok(raw) if !raw.trim().is_empty() => NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
                .with_context(|| format!("SPREAD_END_DATE '{}' is not YYYY-MM-DD", raw))?,
            _ => defaults.spread_end,
        };
        if spread_end.year() < SERIES_START_YEAR {
            return Err(anyhow!(
                "SPREAD_END_DATE {} is before the series start ({}-01)",
                spread_end,
                SERIES_START_YEAR
            ));
        }

        let cache = CacheConfig {
            ttl: secs_var("CACHE_TTL_SECS", defaults.cache.ttl)?,
            refresh_interval: secs_var(
                "CACHE_REFRESH_INTERVAL_SECS",
                defaults.cache.refresh_interval,
            )?,
            refresh_ahead: parse_var("CACHE_REFRESH_AHEAD", defaults.cache.refresh_ahead)?,
            prefetch_adjacent: parse_var("CACHE_PREFETCH", defaults.cache.prefetch_adjacent)?,
            prefetch_delay: Duration::from_millis(parse_var(
                "CACHE_PREFETCH_DELAY_MS",
                defaults.cache.prefetch_delay.as_millis() as u64,
            )?),
            sweep_period: secs_var("CACHE_SWEEP_SECS", defaults.cache.sweep_period)?,
            today: defaults.cache.today.clone(),
        };
        if cache.sweep_period.is_zero() {
            return Err(anyhow!("CACHE_SWEEP_SECS must be greater than zero"));
        }

        let config = AppConfig {
            port: parse_var("PORT", defaults.port)?,
            data_source,
            fallback,
            cache,
            python: parse_var("PYTHON_BIN", defaults.python.clone())?,
            akshare_dir: parse_var("AKSHARE_SCRIPT_DIR", defaults.akshare_dir.clone())?,
            wind_dir: parse_var("WIND_SCRIPT_DIR", defaults.wind_dir.clone())?,
            akshare_timeout: secs_var("AKSHARE_TIMEOUT_SECS", defaults.akshare_timeout)?,
            wind_timeout: secs_var("WIND_TIMEOUT_SECS", defaults.wind_timeout)?,
            spread_end,
            indices: defaults.indices,
        };

        if config.data_source.is_real() && config.fallback == FallbackPolicy::Propagate {
            warn!(
                "{} failures will be returned to clients (FALLBACK_TO_SYNTHETIC=false)",
                config.data_source
            );
        }
        Ok(config)
    }

    pub fn synthetic_provider(&self) -> Arc<dyn DataProvider> {
        Arc::new(SyntheticProvider::new(self.indices.clone(), self.spread_end))
    }

    /// The provider named by `data_source`, without any fallback.
    pub fn provider(&self, source: DataSource) -> Arc<dyn DataProvider> {
        let bridge = |kind, dir: &PathBuf, timeout| -> Arc<dyn DataProvider> {
            let runner = Arc::new(PythonRunner::new(self.python.clone(), dir.clone(), timeout));
            Arc::new(BridgeProvider::new(kind, runner, self.indices.clone()))
        };
        match source {
            DataSource::Mock => self.synthetic_provider(),
            DataSource::AkShare => {
                bridge(BridgeKind::Open, &self.akshare_dir, self.akshare_timeout)
            }
            DataSource::Wind => bridge(BridgeKind::Proprietary, &self.wind_dir, self.wind_timeout),
        }
    }

    pub fn aggregator(&self) -> Aggregator {
        let primary = self.provider(self.data_source);
        if self.data_source.is_real() {
            Aggregator::with_fallback(primary, self.fallback, self.synthetic_provider())
        } else {
            Aggregator::new(primary)
        }
    }

    /// Wires provider, aggregator and cache together.
    pub fn market_service(&self) -> MarketService {
        let cache = MarketDataCache::new(Arc::new(self.aggregator()), self.cache.clone());
        MarketService::new(cache, self.data_source)
    }
}
