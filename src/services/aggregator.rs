// src/services/aggregator.rs
use log::{info, warn};
use std::sync::Arc;

use crate::error::{BundlePart, MarketDataError};
use crate::models::{EquityBondSpread, MarketBundle, MarketDateKey, MarketOverview};
use crate::services::providers::DataProvider;
use crate::services::valuation::derive_metrics;

/// What to do when the configured provider cannot build a bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackPolicy {
    /// Surface the failure to the caller.
    Propagate,
    /// Serve synthetic data instead.
    Synthetic,
}

/// Builds complete bundles out of a provider's parts.
pub struct Aggregator {
    provider: Arc<dyn DataProvider>,
    fallback: Option<Arc<dyn DataProvider>>,
}

impl Aggregator {
    pub fn new(provider: Arc<dyn DataProvider>) -> Self {
        Aggregator {
            provider,
            fallback: None,
        }
    }

    /// Falls back to `synthetic` after any primary failure when the policy says so.
    pub fn with_fallback(
        provider: Arc<dyn DataProvider>,
        policy: FallbackPolicy,
        synthetic: Arc<dyn DataProvider>,
    ) -> Self {
        Aggregator {
            provider,
            fallback: match policy {
                FallbackPolicy::Propagate => None,
                FallbackPolicy::Synthetic => Some(synthetic),
            },
        }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn policy(&self) -> FallbackPolicy {
        if self.fallback.is_some() {
            FallbackPolicy::Synthetic
        } else {
            FallbackPolicy::Propagate
        }
    }

    pub async fn fetch(&self, date: &MarketDateKey) -> Result<MarketBundle, MarketDataError> {
        match compose(self.provider.as_ref(), date).await {
            Ok(bundle) => Ok(bundle),
            Err(e) => match &self.fallback {
                Some(fallback) => {
                    warn!(
                        "{} data for {} unavailable ({}), substituting {} data",
                        self.provider.name(),
                        date,
                        e,
                        fallback.name()
                    );
                    compose(fallback.as_ref(), date).await
                }
                None => Err(e),
            },
        }
    }
}

async fn fetch_overview(
    provider: &dyn DataProvider,
    date: &MarketDateKey,
) -> Result<MarketOverview, MarketDataError> {
    let (breadth, indices) =
        tokio::try_join!(provider.fetch_breadth(date), provider.fetch_indices(date))
            .map_err(|e| MarketDataError::from_part(BundlePart::Overview, e))?;
    Ok(MarketOverview { breadth, indices })
}

async fn fetch_equity_bond_spread(
    provider: &dyn DataProvider,
    date: &MarketDateKey,
) -> Result<EquityBondSpread, MarketDataError> {
    let part = |e| MarketDataError::from_part(BundlePart::EquityBondSpread, e);
    let raw = provider.fetch_spread(date).await.map_err(part)?;

    let mut chart_data = raw.chart_data;
    chart_data.sort_by_key(|p| p.date);

    let metrics = match raw.metrics {
        Some(metrics) => metrics,
        None => {
            info!(
                "{} sent no valuation metrics for {}, deriving from the series",
                provider.name(),
                date
            );
            derive_metrics(&chart_data, date).map_err(part)?
        }
    };

    Ok(EquityBondSpread {
        metrics: metrics.clamp_percentiles(),
        chart_data,
    })
}

/// Fetches the three parts concurrently; the first failure fails the whole bundle.
pub async fn compose(
    provider: &dyn DataProvider,
    date: &MarketDateKey,
) -> Result<MarketBundle, MarketDataError> {
    let (overview, sectors, equity_bond_spread) = tokio::try_join!(
        fetch_overview(provider, date),
        async {
            provider
                .fetch_sectors(date)
                .await
                .map_err(|e| MarketDataError::from_part(BundlePart::Sectors, e))
        },
        fetch_equity_bond_spread(provider, date),
    )?;

    Ok(MarketBundle {
        overview,
        sectors,
        equity_bond_spread,
    })
}
