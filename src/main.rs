// src/main.rs
use ashare_dashboard::config::AppConfig;
use ashare_dashboard::routes;
use log::{info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use warp::Filter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine
    dotenv::dotenv().ok();

    // Initialize the logger
    env_logger::init();
    info!("Logger initialized. Starting the application...");

    let config = AppConfig::from_env()?;
    info!(
        "Data source: {} (fallback: {:?}, cache ttl {:?})",
        config.data_source, config.fallback, config.cache.ttl
    );
    if !config.data_source.is_real() {
        warn!(
            "Serving synthetic data; \
             set DATA_SOURCE=akshare or DATA_SOURCE=wind for real market data"
        );
    }

    let service = Arc::new(config.market_service());
    let _sweeper = service.cache().spawn_sweeper();

    let addr: SocketAddr = ([0, 0, 0, 0], config.port).into();
    info!("Will bind to: {}", addr);

    // Set up CORS
    let cors = warp::cors()
        .allow_any_origin()
        .allow_header("content-type")
        .allow_methods(vec!["GET", "POST", "OPTIONS"]);

    let api = routes::routes(service).with(cors);
    info!("Routes configured successfully with CORS.");

    info!("Starting server on {}", addr);
    warp::serve(api).run(addr).await;
    Ok(())
}
