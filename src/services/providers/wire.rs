// src/services/providers/wire.rs
//! JSON shapes printed by the bridge scripts.
//!
//! The scripts are loose about types: numbers sometimes arrive as strings,
//! counts as floats, and year labels as either an int or "".

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::ProviderError;
use crate::models::{Breadth, ChartPoint, Mover, RawSpread, SectorRecord, SpreadMetrics};

fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Number(n) => Ok(n.as_f64().unwrap_or(0.0)),
        Value::String(s) if s.trim().is_empty() => Ok(0.0),
        Value::String(s) => s
            .trim()
            .trim_end_matches('%')
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("not a number: {}", s))),
        Value::Null => Ok(0.0),
        other => Err(serde::de::Error::custom(format!("not a number: {}", other))),
    }
}

fn lenient_opt_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        other => lenient_f64(other).map(Some).map_err(serde::de::Error::custom),
    }
}

fn lenient_u32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    lenient_f64(deserializer).map(|v| v.max(0.0).round() as u32)
}

fn year_label<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s,
        _ => String::new(),
    })
}

fn flexible_date<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
    let raw = String::deserialize(deserializer)?;
    let day = raw.get(..10).unwrap_or(raw.as_str());
    NaiveDate::parse_from_str(day, "%Y-%m-%d")
        .or_else(|_| {
            let month = raw.get(..7).unwrap_or(raw.as_str());
            NaiveDate::parse_from_str(&format!("{}-01", month), "%Y-%m-%d")
        })
        .map_err(|_| serde::de::Error::custom(format!("bad date: {}", raw)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireBreadth {
    #[serde(deserialize_with = "lenient_u32", default)]
    up_limit: u32,
    #[serde(deserialize_with = "lenient_u32", default)]
    up: u32,
    #[serde(deserialize_with = "lenient_u32", default)]
    flat: u32,
    #[serde(deserialize_with = "lenient_u32", default)]
    down: u32,
    #[serde(deserialize_with = "lenient_u32", default)]
    down_limit: u32,
    #[serde(deserialize_with = "lenient_f64", default)]
    change_percent: f64,
}

impl From<WireBreadth> for Breadth {
    fn from(w: WireBreadth) -> Self {
        Breadth {
            up_limit: w.up_limit,
            up: w.up,
            flat: w.flat,
            down: w.down,
            down_limit: w.down_limit,
            change_percent: w.change_percent,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireIndex {
    pub code: String,
    #[serde(deserialize_with = "lenient_f64", default)]
    pub pct_chg: f64,
    #[serde(deserialize_with = "lenient_f64", default)]
    pub volume: f64,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireMover {
    #[serde(default)]
    name: String,
    #[serde(deserialize_with = "lenient_f64", default)]
    change_percent: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireSector {
    #[serde(default)]
    category: Option<String>,
    name: String,
    #[serde(deserialize_with = "lenient_f64", default)]
    change_percent: f64,
    #[serde(default)]
    top_gainer: WireMover,
    #[serde(default)]
    top_loser: WireMover,
    #[serde(deserialize_with = "lenient_u32", default)]
    up_count: u32,
    #[serde(deserialize_with = "lenient_u32", default)]
    down_count: u32,
}

impl WireSector {
    pub fn into_record(self, default_category: &str) -> SectorRecord {
        SectorRecord {
            category: self.category.unwrap_or_else(|| default_category.to_string()),
            name: self.name,
            change_percent: self.change_percent,
            top_gainer: Mover {
                name: self.top_gainer.name,
                change_percent: self.top_gainer.change_percent,
            },
            top_loser: Mover {
                name: self.top_loser.name,
                change_percent: self.top_loser.change_percent,
            },
            up_count: self.up_count,
            down_count: self.down_count,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePoint {
    #[serde(deserialize_with = "flexible_date")]
    date: NaiveDate,
    #[serde(deserialize_with = "lenient_f64")]
    spread: f64,
    #[serde(alias = "windA", deserialize_with = "lenient_f64")]
    index_level: f64,
    #[serde(alias = "displayYear", deserialize_with = "year_label", default)]
    year_label: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireMetrics {
    #[serde(deserialize_with = "lenient_f64")]
    spread: f64,
    #[serde(deserialize_with = "lenient_f64")]
    spread_percentile: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pb: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pb_percentile: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pe: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pe_percentile: f64,
    #[serde(rename = "bond10Y", deserialize_with = "lenient_opt_f64", default)]
    bond_yield: Option<f64>,
    #[serde(rename = "bond10YPercentile", deserialize_with = "lenient_opt_f64", default)]
    bond_yield_percentile: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireSpread {
    Blob {
        #[serde(default)]
        metrics: Option<WireMetrics>,
        #[serde(rename = "chartData")]
        chart_data: Vec<WirePoint>,
    },
    Series(Vec<WirePoint>),
}

fn point(w: WirePoint) -> ChartPoint {
    ChartPoint {
        date: w.date,
        spread: w.spread,
        index_level: w.index_level,
        year_label: w.year_label,
    }
}

pub(crate) fn parse<T: for<'de> Deserialize<'de>>(
    script: &str,
    value: Value,
) -> Result<T, ProviderError> {
    serde_json::from_value(value).map_err(|e| {
        ProviderError::bad_output(format!("{} output has unexpected shape: {}", script, e))
    })
}

pub(crate) fn parse_spread(script: &str, value: Value) -> Result<RawSpread, ProviderError> {
    let raw = match parse::<WireSpread>(script, value)? {
        WireSpread::Blob { metrics, chart_data } => RawSpread {
            metrics: metrics.map(|m| SpreadMetrics {
                spread: m.spread,
                spread_percentile: m.spread_percentile,
                pb: m.pb,
                pb_percentile: m.pb_percentile,
                pe: m.pe,
                pe_percentile: m.pe_percentile,
                bond_yield: m.bond_yield,
                bond_yield_percentile: m.bond_yield_percentile,
            }),
            chart_data: chart_data.into_iter().map(point).collect(),
        },
        WireSpread::Series(points) => RawSpread {
            metrics: None,
            chart_data: points.into_iter().map(point).collect(),
        },
    };
    Ok(raw)
}
