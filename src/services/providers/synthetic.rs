// src/services/providers/synthetic.rs
use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::DataProvider;
use crate::error::ProviderError;
use crate::models::{
    Breadth, ChartPoint, IndexEntry, IndexSpec, MarketDateKey, Mover, RawSpread, SectorRecord,
};

/// First year of the generated valuation series.
pub const SERIES_START_YEAR: i32 = 2005;

// (category, sector, leader, laggard)
const SECTOR_CATALOG: &[(&str, &str, &str, &str)] = &[
    ("1. 概念板块", "上证50", "中国平安", "贵州茅台"),
    ("1. 概念板块", "沪深300", "招商银行", "五粮液"),
    ("1. 概念板块", "中证500", "宁德时代", "比亚迪"),
    ("1. 概念板块", "科创50", "中芯国际", "澜起科技"),
    ("2. 银行", "银行", "招商银行", "兴业银行"),
    ("2. 银行", "证券", "中信证券", "华泰证券"),
    ("2. 银行", "保险", "中国平安", "中国人寿"),
    ("3. 工业", "工业", "三一重工", "中国中车"),
    ("3. 工业", "工程机械", "徐工机械", "柳工"),
    ("4. 原材料", "有色金属", "紫金矿业", "中国铝业"),
    ("4. 原材料", "钢铁", "宝钢股份", "河钢股份"),
    ("5. 可选消费", "汽车", "比亚迪", "上汽集团"),
    ("5. 可选消费", "锂电池", "赣锋锂业", "天齐锂业"),
    ("6. 日常消费", "白酒", "贵州茅台", "泸州老窖"),
    ("6. 日常消费", "食品饮料", "伊利股份", "海天味业"),
    ("7. 医疗保健", "医疗器械", "迈瑞医疗", "鱼跃医疗"),
    ("7. 医疗保健", "医药", "恒瑞医药", "云南白药"),
    ("8. 信息技术", "半导体", "中芯国际", "韦尔股份"),
    ("8. 信息技术", "消费电子", "立讯精密", "歌尔股份"),
    ("10. 公用事业", "电力", "长江电力", "华电国际"),
    ("11. 房地产", "房地产开发", "万科A", "招商蛇口"),
];

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Generates plausible-looking market data. The same date always yields the same bundle.
#[derive(Debug, Clone)]
pub struct SyntheticProvider {
    indices: Vec<IndexSpec>,
    series_end: NaiveDate,
}

impl SyntheticProvider {
    /// `series_end` earlier than January of the start year still yields that one month.
    pub fn new(indices: Vec<IndexSpec>, series_end: NaiveDate) -> Self {
        let start = NaiveDate::from_ymd_opt(SERIES_START_YEAR, 1, 1).unwrap_or(series_end);
        SyntheticProvider {
            indices,
            series_end: series_end.max(start),
        }
    }

    fn rng(date: &MarketDateKey, salt: u64) -> StdRng {
        let day = date.date().num_days_from_ce() as u64;
        StdRng::seed_from_u64(day.wrapping_mul(31).wrapping_add(salt))
    }

    /// Monthly spread / index level series from January 2005 to the configured end month.
    fn spread_series(&self, date: &MarketDateKey) -> Vec<ChartPoint> {
        let mut rng = Self::rng(date, 4);
        let mut points = Vec::new();
        let mut year = SERIES_START_YEAR;
        let mut month = 1;

        while (year, month) <= (self.series_end.year(), self.series_end.month()) {
            let (spread, level) = match year {
                2005..=2007 => (
                    1.5 + rng.gen::<f64>() * 2.0,
                    1000.0 + (year - 2005) as f64 * 1500.0 + rng.gen::<f64>() * 500.0,
                ),
                2008 => (
                    -1.0 + month as f64 * 0.3 + rng.gen::<f64>(),
                    4000.0 - month as f64 * 200.0 + rng.gen::<f64>() * 300.0,
                ),
                2009..=2010 => (
                    0.5 + rng.gen::<f64>() * 1.5,
                    2000.0 + (year - 2009) as f64 * 500.0 + rng.gen::<f64>() * 400.0,
                ),
                2011..=2014 => (2.0 + rng.gen::<f64>() * 2.0, 2200.0 + rng.gen::<f64>() * 600.0),
                2015 if month <= 6 => (1.0 + rng.gen::<f64>(), 3000.0 + month as f64 * 600.0),
                2015 => (4.0 + rng.gen::<f64>() * 2.0, 6500.0 - (month - 6) as f64 * 500.0),
                2016..=2019 => (
                    2.0 + rng.gen::<f64>() * 2.5,
                    3000.0 + (year - 2016) as f64 * 400.0 + rng.gen::<f64>() * 500.0,
                ),
                2020 if month <= 3 => (4.5 + rng.gen::<f64>(), 4500.0 - month as f64 * 200.0),
                2020 => (3.0 + rng.gen::<f64>(), 4000.0 + (month - 3) as f64 * 150.0),
                2021..=2022 => (2.5 + rng.gen::<f64>() * 2.0, 5000.0 + rng.gen::<f64>() * 1000.0),
                2023..=2024 => (3.5 + rng.gen::<f64>() * 2.5, 4500.0 + rng.gen::<f64>() * 1000.0),
                _ => (3.5 + rng.gen::<f64>() * 1.5, 5000.0 + rng.gen::<f64>() * 800.0),
            };

            if let Some(date) = NaiveDate::from_ymd_opt(year, month, 1) {
                points.push(ChartPoint {
                    date,
                    spread: round2(spread),
                    index_level: level.round(),
                    year_label: if month == 1 { year.to_string() } else { String::new() },
                });
            }

            month += 1;
            if month > 12 {
                month = 1;
                year += 1;
            }
        }

        points
    }
}

#[async_trait]
impl DataProvider for SyntheticProvider {
    fn name(&self) -> &str {
        "synthetic"
    }

    async fn fetch_breadth(&self, date: &MarketDateKey) -> Result<Breadth, ProviderError> {
        let mut rng = Self::rng(date, 1);
        Ok(Breadth {
            up_limit: rng.gen_range(0..50),
            up: rng.gen_range(1000..3000),
            flat: rng.gen_range(0..500),
            down: rng.gen_range(500..2000),
            down_limit: rng.gen_range(0..30),
            change_percent: round2((rng.gen::<f64>() - 0.5) * 4.0),
        })
    }

    async fn fetch_indices(&self, date: &MarketDateKey) -> Result<Vec<IndexEntry>, ProviderError> {
        let mut rng = Self::rng(date, 2);
        Ok(self
            .indices
            .iter()
            .map(|spec| IndexEntry {
                name: spec.name.clone(),
                change_percent: round2((rng.gen::<f64>() - 0.5) * 4.0),
                volume: (rng.gen::<f64>() * 3000.0 + 1000.0).round(),
            })
            .collect())
    }

    async fn fetch_sectors(
        &self,
        date: &MarketDateKey,
    ) -> Result<Vec<SectorRecord>, ProviderError> {
        let mut rng = Self::rng(date, 3);
        Ok(SECTOR_CATALOG
            .iter()
            .map(|(category, name, leader, laggard)| {
                let up_count = rng.gen_range(5..300);
                let down_count = rng.gen_range(5..200);
                let change = (rng.gen::<f64>() - 0.45) * 6.0;
                SectorRecord {
                    category: category.to_string(),
                    name: name.to_string(),
                    change_percent: round2(change),
                    top_gainer: Mover {
                        name: leader.to_string(),
                        change_percent: round2(change.abs() + rng.gen::<f64>() * 8.0),
                    },
                    top_loser: Mover {
                        name: laggard.to_string(),
                        change_percent: round2(-(rng.gen::<f64>() * 8.0)),
                    },
                    up_count,
                    down_count,
                }
            })
            .collect())
    }

    async fn fetch_spread(&self, date: &MarketDateKey) -> Result<RawSpread, ProviderError> {
        Ok(RawSpread {
            metrics: None,
            chart_data: self.spread_series(date),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> SyntheticProvider {
        let end = NaiveDate::from_ymd_opt(2025, 10, 31).unwrap();
        SyntheticProvider::new(IndexSpec::defaults(), end)
    }

    fn key(s: &str) -> MarketDateKey {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn same_date_yields_same_data() {
        let provider = provider();
        let a = provider.fetch_sectors(&key("2024-03-01")).await.unwrap();
        let b = provider.fetch_sectors(&key("2024-03-01")).await.unwrap();
        assert_eq!(a, b);
        let other = provider.fetch_breadth(&key("2024-03-04")).await.unwrap();
        assert_ne!(provider.fetch_breadth(&key("2024-03-01")).await.unwrap(), other);
    }

    #[tokio::test]
    async fn series_is_monthly_from_2005() {
        let spread = provider().fetch_spread(&key("2024-03-01")).await.unwrap();
        let chart = spread.chart_data;
        assert!(spread.metrics.is_none());
        assert_eq!(chart.len(), 20 * 12 + 10);
        assert_eq!(chart.first().unwrap().date.to_string(), "2005-01-01");
        assert_eq!(chart.last().unwrap().date.to_string(), "2025-10-01");
        assert_eq!(chart[0].year_label, "2005");
        assert_eq!(chart[1].year_label, "");
        assert!(chart.windows(2).all(|w| w[0].date < w[1].date));
    }

    #[tokio::test]
    async fn indices_follow_configuration() {
        let provider = SyntheticProvider::new(
            vec![IndexSpec::new("沪深300", "sh000300", "000300.SH")],
            NaiveDate::from_ymd_opt(2010, 1, 31).unwrap(),
        );
        let indices = provider.fetch_indices(&key("2024-03-01")).await.unwrap();
        assert_eq!(indices.len(), 1);
        assert_eq!(indices[0].name, "沪深300");
    }

    #[tokio::test]
    async fn early_end_date_still_builds_a_bundle() {
        let end = NaiveDate::from_ymd_opt(2004, 12, 31).unwrap();
        let provider = SyntheticProvider::new(IndexSpec::defaults(), end);
        let chart = provider.fetch_spread(&key("2024-03-01")).await.unwrap().chart_data;
        assert_eq!(chart.len(), 1);
        assert_eq!(chart[0].date.to_string(), "2005-01-01");

        let bundle = crate::services::aggregator::compose(&provider, &key("2024-03-01"))
            .await
            .unwrap();
        assert_eq!(bundle.equity_bond_spread.chart_data.len(), 1);
    }
}
