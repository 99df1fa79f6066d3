// src/models.rs
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A trading day, always written as `YYYY-MM-DD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MarketDateKey(NaiveDate);

impl MarketDateKey {
    pub const FORMAT: &'static str = "%Y-%m-%d";

    pub fn new(date: NaiveDate) -> Self {
        MarketDateKey(date)
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    /// `YYYY-MM` used to match a day against monthly series points.
    pub fn year_month(&self) -> (i32, u32) {
        (self.0.year(), self.0.month())
    }
}

impl FromStr for MarketDateKey {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveDate::parse_from_str(s.trim(), Self::FORMAT).map(MarketDateKey)
    }
}

impl fmt::Display for MarketDateKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0.format(Self::FORMAT))
    }
}

impl Serialize for MarketDateKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IndexEntry {
    pub name: String,
    pub change_percent: f64,
    pub volume: f64,
}

/// Advancing / declining counts plus the aggregate move, before index detail is merged in.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Breadth {
    pub up_limit: u32,
    pub up: u32,
    pub flat: u32,
    pub down: u32,
    pub down_limit: u32,
    pub change_percent: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MarketOverview {
    #[serde(flatten)]
    pub breadth: Breadth,
    pub indices: Vec<IndexEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Mover {
    pub name: String,
    pub change_percent: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SectorRecord {
    pub category: String,
    pub name: String,
    pub change_percent: f64,
    pub top_gainer: Mover,
    pub top_loser: Mover,
    pub up_count: u32,
    pub down_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChartPoint {
    /// First day of the sampled month.
    pub date: NaiveDate,
    pub spread: f64,
    pub index_level: f64,
    /// Year shown on the x axis, only set on January points.
    pub year_label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SpreadMetrics {
    pub spread: f64,
    pub spread_percentile: f64,
    pub pb: f64,
    pub pb_percentile: f64,
    pub pe: f64,
    pub pe_percentile: f64,
    #[serde(rename = "bond10Y", skip_serializing_if = "Option::is_none", default)]
    pub bond_yield: Option<f64>,
    #[serde(rename = "bond10YPercentile", skip_serializing_if = "Option::is_none", default)]
    pub bond_yield_percentile: Option<f64>,
}

impl SpreadMetrics {
    pub(crate) fn clamp_percentiles(mut self) -> Self {
        let clamp = |v: f64| v.clamp(0.0, 100.0);
        self.spread_percentile = clamp(self.spread_percentile);
        self.pb_percentile = clamp(self.pb_percentile);
        self.pe_percentile = clamp(self.pe_percentile);
        self.bond_yield_percentile = self.bond_yield_percentile.map(clamp);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EquityBondSpread {
    pub metrics: SpreadMetrics,
    pub chart_data: Vec<ChartPoint>,
}

/// Valuation series as a provider hands it over; metrics may still be missing.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSpread {
    pub metrics: Option<SpreadMetrics>,
    pub chart_data: Vec<ChartPoint>,
}

/// Everything the report needs for one trading day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MarketBundle {
    pub overview: MarketOverview,
    pub sectors: Vec<SectorRecord>,
    pub equity_bond_spread: EquityBondSpread,
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct CacheStats {
    pub keys: usize,
    pub hits: u64,
    pub misses: u64,
    pub ksize: usize,
    pub vsize: usize,
}

/// An index shown in the overview, with the code each bridge knows it by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    pub name: String,
    pub open_code: String,
    pub terminal_code: String,
}

impl IndexSpec {
    pub fn new(name: &str, open_code: &str, terminal_code: &str) -> Self {
        IndexSpec {
            name: name.to_string(),
            open_code: open_code.to_string(),
            terminal_code: terminal_code.to_string(),
        }
    }

    pub fn defaults() -> Vec<IndexSpec> {
        vec![
            IndexSpec::new("上证指数", "sh000001", "000001.SH"),
            IndexSpec::new("深证成指", "sz399001", "399001.SZ"),
            IndexSpec::new("创业板指", "sz399006", "399006.SZ"),
            IndexSpec::new("科创50", "sh000688", "000688.SH"),
        ]
    }
}
