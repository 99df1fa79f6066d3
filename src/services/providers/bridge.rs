// src/services/providers/bridge.rs
use async_trait::async_trait;
use log::{info, warn};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::wire::{self, WireBreadth, WireIndex, WireSector};
use super::{DataProvider, ScriptRunner};
use crate::error::{ProviderError, ProviderErrorKind};
use crate::models::{Breadth, IndexEntry, IndexSpec, MarketDateKey, RawSpread, SectorRecord};

const OVERVIEW_SCRIPT: &str = "get_market_overview.py";
const INDICES_SCRIPT: &str = "get_indices.py";
const SECTORS_SCRIPT: &str = "get_sectors.py";
const SPREAD_SCRIPT: &str = "get_equity_bond_spread.py";

// One install hint per script family for the life of the process.
static OPEN_HINT_SHOWN: AtomicBool = AtomicBool::new(false);
static PROPRIETARY_HINT_SHOWN: AtomicBool = AtomicBool::new(false);

/// Which family of scripts a bridge drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeKind {
    /// Open data via AKShare.
    Open,
    /// The Wind terminal's WindPy API.
    Proprietary,
}

impl BridgeKind {
    pub fn label(&self) -> &'static str {
        match self {
            BridgeKind::Open => "akshare",
            BridgeKind::Proprietary => "wind",
        }
    }

    /// Python module the scripts import.
    pub fn dependency(&self) -> &'static str {
        match self {
            BridgeKind::Open => "akshare",
            BridgeKind::Proprietary => "WindPy",
        }
    }

    fn setup_hint(&self) -> &'static str {
        match self {
            BridgeKind::Open => "install it with `pip install akshare` or set DATA_SOURCE=mock",
            BridgeKind::Proprietary => {
                "install WindPy from the Wind terminal (修复Python接口), \
                 make sure the terminal is logged in, or set DATA_SOURCE=mock"
            }
        }
    }

    fn hint_shown(&self) -> &'static AtomicBool {
        match self {
            BridgeKind::Open => &OPEN_HINT_SHOWN,
            BridgeKind::Proprietary => &PROPRIETARY_HINT_SHOWN,
        }
    }

    fn index_code<'a>(&self, spec: &'a IndexSpec) -> &'a str {
        match self {
            BridgeKind::Open => &spec.open_code,
            BridgeKind::Proprietary => &spec.terminal_code,
        }
    }

    fn default_category(&self) -> &'static str {
        match self {
            BridgeKind::Open => "行业板块",
            BridgeKind::Proprietary => "Wind行业",
        }
    }
}

/// Market data from external Python scripts.
pub struct BridgeProvider {
    kind: BridgeKind,
    runner: Arc<dyn ScriptRunner>,
    indices: Vec<IndexSpec>,
}

impl BridgeProvider {
    pub fn new(kind: BridgeKind, runner: Arc<dyn ScriptRunner>, indices: Vec<IndexSpec>) -> Self {
        BridgeProvider {
            kind,
            runner,
            indices,
        }
    }

    async fn call(&self, script: &str, args: Vec<String>) -> Result<Value, ProviderError> {
        let result = self.runner.run(script, &args).await;
        if let Err(e) = &result {
            let missing = e.kind == ProviderErrorKind::NotInstalled;
            if missing && !self.kind.hint_shown().swap(true, Ordering::SeqCst) {
                warn!(
                    "Python module '{}' is not available for the {} data source: {}. \
                     To use real data, {}.",
                    self.kind.dependency(),
                    self.kind.label(),
                    e.message,
                    self.kind.setup_hint()
                );
            }
        }
        result
    }

    /// Zeroed entries for every configured index, used when the index script misbehaves.
    fn fallback_indices(&self) -> Vec<IndexEntry> {
        self.indices
            .iter()
            .map(|spec| IndexEntry {
                name: spec.name.clone(),
                change_percent: 0.0,
                volume: 0.0,
            })
            .collect()
    }

    fn merge_indices(&self, rows: Vec<WireIndex>) -> Vec<IndexEntry> {
        self.indices
            .iter()
            .map(|spec| {
                let code = self.kind.index_code(spec);
                match rows.iter().find(|r| r.code == code) {
                    Some(row) => {
                        if let Some(err) = &row.error {
                            warn!(
                                "{} index {} came back with an error: {}",
                                self.kind.label(),
                                code,
                                err
                            );
                        }
                        IndexEntry {
                            name: spec.name.clone(),
                            change_percent: row.pct_chg,
                            volume: row.volume,
                        }
                    }
                    None => IndexEntry {
                        name: spec.name.clone(),
                        change_percent: 0.0,
                        volume: 0.0,
                    },
                }
            })
            .collect()
    }
}

#[async_trait]
impl DataProvider for BridgeProvider {
    fn name(&self) -> &str {
        self.kind.label()
    }

    async fn fetch_breadth(&self, date: &MarketDateKey) -> Result<Breadth, ProviderError> {
        let value = self.call(OVERVIEW_SCRIPT, vec![date.to_string()]).await?;
        let breadth: WireBreadth = wire::parse(OVERVIEW_SCRIPT, value)?;
        Ok(breadth.into())
    }

    async fn fetch_indices(&self, date: &MarketDateKey) -> Result<Vec<IndexEntry>, ProviderError> {
        let codes = self
            .indices
            .iter()
            .map(|spec| self.kind.index_code(spec))
            .collect::<Vec<_>>()
            .join(",");

        let rows = match self.call(INDICES_SCRIPT, vec![codes, date.to_string()]).await {
            Ok(value) => wire::parse::<Vec<WireIndex>>(INDICES_SCRIPT, value),
            Err(e) => Err(e),
        };

        match rows {
            Ok(rows) => Ok(self.merge_indices(rows)),
            Err(e)
                if matches!(
                    e.kind,
                    ProviderErrorKind::BadOutput | ProviderErrorKind::ProcessFailure
                ) =>
            {
                warn!(
                    "{} index detail unavailable for {} ({}), using placeholder values",
                    self.kind.label(),
                    date,
                    e
                );
                Ok(self.fallback_indices())
            }
            Err(e) => Err(e),
        }
    }

    async fn fetch_sectors(
        &self,
        date: &MarketDateKey,
    ) -> Result<Vec<SectorRecord>, ProviderError> {
        let value = self.call(SECTORS_SCRIPT, vec![date.to_string()]).await?;
        let rows: Vec<WireSector> = wire::parse(SECTORS_SCRIPT, value)?;
        info!("{} returned {} sectors for {}", self.kind.label(), rows.len(), date);
        let category = self.kind.default_category();
        Ok(rows.into_iter().map(|row| row.into_record(category)).collect())
    }

    async fn fetch_spread(&self, date: &MarketDateKey) -> Result<RawSpread, ProviderError> {
        let value = self.call(SPREAD_SCRIPT, vec![date.to_string()]).await?;
        wire::parse_spread(SPREAD_SCRIPT, value)
    }
}
