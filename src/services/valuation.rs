// src/services/valuation.rs
use chrono::Datelike;

use crate::error::ProviderError;
use crate::models::{ChartPoint, MarketDateKey, SpreadMetrics};

const REFERENCE_LEVEL: f64 = 3000.0;
const REFERENCE_PB: f64 = 1.5;
const REFERENCE_PE: f64 = 15.0;

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Share of `values` at or below `value`, as a percentage rounded to 2 decimals.
pub fn percentile_rank(values: &[f64], value: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let rank = sorted.iter().take_while(|v| **v <= value).count();
    round2(rank as f64 / sorted.len() as f64 * 100.0)
}

pub fn estimate_pb(index_level: f64) -> f64 {
    REFERENCE_PB * index_level / REFERENCE_LEVEL
}

pub fn estimate_pe(index_level: f64) -> f64 {
    REFERENCE_PE * index_level / REFERENCE_LEVEL
}

/// Picks the point for the target month, or the latest point when the month is not covered.
fn point_for<'a>(series: &'a [ChartPoint], target: &MarketDateKey) -> Option<&'a ChartPoint> {
    let (year, month) = target.year_month();
    series
        .iter()
        .find(|p| p.date.year() == year && p.date.month() == month)
        .or_else(|| series.last())
}

pub fn derive_metrics(
    series: &[ChartPoint],
    target: &MarketDateKey,
) -> Result<SpreadMetrics, ProviderError> {
    let point = point_for(series, target)
        .ok_or_else(|| ProviderError::bad_output("valuation series is empty"))?;

    let spreads: Vec<f64> = series.iter().map(|p| p.spread).collect();
    let pbs: Vec<f64> = series.iter().map(|p| estimate_pb(p.index_level)).collect();
    let pes: Vec<f64> = series.iter().map(|p| estimate_pe(p.index_level)).collect();

    let pb = round2(estimate_pb(point.index_level));
    let pe = round2(estimate_pe(point.index_level));

    Ok(SpreadMetrics {
        spread: point.spread,
        spread_percentile: percentile_rank(&spreads, point.spread),
        pb,
        pb_percentile: percentile_rank(&pbs, pb),
        pe,
        pe_percentile: percentile_rank(&pes, pe),
        bond_yield: None,
        bond_yield_percentile: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn point(year: i32, month: u32, spread: f64, level: f64) -> ChartPoint {
        ChartPoint {
            date: NaiveDate::from_ymd_opt(year, month, 1).unwrap(),
            spread,
            index_level: level,
            year_label: String::new(),
        }
    }

    #[test]
    fn percentile_of_maximum_is_100() {
        assert_eq!(percentile_rank(&[3.0, 1.0, 2.0, 5.0], 5.0), 100.0);
    }

    #[test]
    fn percentile_of_minimum_counts_duplicates() {
        assert_eq!(percentile_rank(&[1.0, 4.0, 1.0, 3.0], 1.0), 50.0);
        assert_eq!(percentile_rank(&[2.0, 3.0, 4.0], 2.0), 33.33);
    }

    #[test]
    fn percentile_of_empty_series_is_zero() {
        assert_eq!(percentile_rank(&[], 1.0), 0.0);
    }

    #[test]
    fn metrics_use_matching_month() {
        let series = vec![
            point(2024, 1, 1.0, 3000.0),
            point(2024, 2, 2.0, 6000.0),
            point(2024, 3, 3.0, 1500.0),
        ];
        let target: MarketDateKey = "2024-02-20".parse().unwrap();
        let metrics = derive_metrics(&series, &target).unwrap();
        assert_eq!(metrics.spread, 2.0);
        assert_eq!(metrics.spread_percentile, 66.67);
        assert_eq!(metrics.pb, 3.0);
        assert_eq!(metrics.pe, 30.0);
        assert_eq!(metrics.pb_percentile, 100.0);
        assert_eq!(metrics.pe_percentile, 100.0);
        assert!(metrics.bond_yield.is_none());
    }

    #[test]
    fn metrics_fall_back_to_last_point() {
        let series = vec![point(2024, 1, 1.0, 3000.0), point(2024, 2, 0.5, 1500.0)];
        let target: MarketDateKey = "2030-06-01".parse().unwrap();
        let metrics = derive_metrics(&series, &target).unwrap();
        assert_eq!(metrics.spread, 0.5);
        assert_eq!(metrics.spread_percentile, 50.0);
        assert_eq!(metrics.pb, 0.75);
        assert_eq!(metrics.pe, 7.5);
        assert_eq!(metrics.pe_percentile, 50.0);
    }

    #[test]
    fn empty_series_is_bad_output() {
        let target: MarketDateKey = "2024-01-01".parse().unwrap();
        let err = derive_metrics(&[], &target).unwrap_err();
        assert_eq!(err.kind, crate::error::ProviderErrorKind::BadOutput);
    }
}
