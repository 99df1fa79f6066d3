// src/services/providers/mod.rs
pub mod bridge;
pub mod runner;
pub mod synthetic;
mod wire;

use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;

use crate::error::ProviderError;
use crate::models::{Breadth, IndexEntry, MarketDateKey, RawSpread, SectorRecord};

pub use bridge::{BridgeKind, BridgeProvider};
pub use runner::{PythonRunner, ScriptRunner};
pub use synthetic::SyntheticProvider;

/// A source of raw market data for one trading day.
///
/// Each part is fetched on its own so the aggregator can run them concurrently.
#[async_trait]
pub trait DataProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch_breadth(&self, date: &MarketDateKey) -> Result<Breadth, ProviderError>;

    async fn fetch_indices(&self, date: &MarketDateKey) -> Result<Vec<IndexEntry>, ProviderError>;

    async fn fetch_sectors(&self, date: &MarketDateKey) -> Result<Vec<SectorRecord>, ProviderError>;

    /// Valuation series, with or without precomputed metrics.
    async fn fetch_spread(&self, date: &MarketDateKey) -> Result<RawSpread, ProviderError>;
}

/// Which backend serves real requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    Mock,
    AkShare,
    Wind,
}

impl DataSource {
    pub fn is_real(&self) -> bool {
        !matches!(self, DataSource::Mock)
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            DataSource::Mock => "mock",
            DataSource::AkShare => "akshare",
            DataSource::Wind => "wind",
        };
        f.write_str(name)
    }
}

impl FromStr for DataSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mock" | "synthetic" => Ok(DataSource::Mock),
            "akshare" | "real" => Ok(DataSource::AkShare),
            "wind" => Ok(DataSource::Wind),
            other => Err(format!("unknown data source '{}'", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_source_parses_aliases() {
        assert_eq!("MOCK".parse::<DataSource>().unwrap(), DataSource::Mock);
        assert_eq!("real".parse::<DataSource>().unwrap(), DataSource::AkShare);
        assert_eq!(" wind ".parse::<DataSource>().unwrap(), DataSource::Wind);
        assert!("bloomberg".parse::<DataSource>().is_err());
        assert!(DataSource::Wind.is_real());
        assert!(!DataSource::Mock.is_real());
    }
}
