// src/bin/probe_provider.rs
//
// Usage: probe_provider <mock|akshare|wind> [YYYY-MM-DD]
use anyhow::{anyhow, Context};
use ashare_dashboard::config::AppConfig;
use ashare_dashboard::models::MarketDateKey;
use ashare_dashboard::services::aggregator::compose;
use ashare_dashboard::services::calendar::exchange_today;
use ashare_dashboard::services::providers::DataSource;
use std::env;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();

    let mut args = env::args().skip(1);
    let source: DataSource = args
        .next()
        .ok_or_else(|| anyhow!("usage: probe_provider <mock|akshare|wind> [YYYY-MM-DD]"))?
        .parse()
        .map_err(|e: String| anyhow!(e))?;
    let date: MarketDateKey = match args.next() {
        Some(raw) => raw.parse().with_context(|| format!("bad date '{}'", raw))?,
        None => exchange_today(),
    };

    let config = AppConfig::from_env()?;
    let provider = config.provider(source);
    println!("Probing {} for {}", provider.name(), date);

    let bundle = compose(provider.as_ref(), &date).await?;

    let breadth = &bundle.overview.breadth;
    println!(
        "Breadth:     limit-up {} / up {} / flat {} / down {} / limit-down {} ({:+.2}%)",
        breadth.up_limit,
        breadth.up,
        breadth.flat,
        breadth.down,
        breadth.down_limit,
        breadth.change_percent
    );
    for index in &bundle.overview.indices {
        println!("  {:<8} {:+.2}%  vol {:.0}", index.name, index.change_percent, index.volume);
    }
    println!("Sectors:     {}", bundle.sectors.len());
    if let Some(best) = bundle
        .sectors
        .iter()
        .max_by(|a, b| a.change_percent.total_cmp(&b.change_percent))
    {
        println!("  best       {} {:+.2}%", best.name, best.change_percent);
    }

    let spread = &bundle.equity_bond_spread;
    println!(
        "Spread:      {:.2} (pct {:.2}), PB {:.2}, PE {:.2}",
        spread.metrics.spread,
        spread.metrics.spread_percentile,
        spread.metrics.pb,
        spread.metrics.pe
    );
    match (spread.chart_data.first(), spread.chart_data.last()) {
        (Some(first), Some(last)) => println!(
            "Chart:       {} points, {} .. {}",
            spread.chart_data.len(),
            first.date,
            last.date
        ),
        _ => println!("Chart:       empty"),
    }
    Ok(())
}
