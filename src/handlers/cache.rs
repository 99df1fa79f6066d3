// src/handlers/cache.rs
use log::info;
use std::convert::Infallible;
use std::sync::Arc;
use warp::reply::Json;

use crate::services::market::MarketService;

pub async fn clear_cache(service: Arc<MarketService>) -> Result<Json, Infallible> {
    info!("Handling request to clear the cache.");
    service.clear_cache();
    Ok(warp::reply::json(&serde_json::json!({
        "success": true,
        "message": "Cache cleared",
    })))
}

pub async fn get_cache_stats(service: Arc<MarketService>) -> Result<Json, Infallible> {
    Ok(warp::reply::json(&serde_json::json!({
        "success": true,
        "stats": service.cache_stats(),
    })))
}
