// src/handlers/health.rs
use chrono::Utc;
use std::convert::Infallible;
use std::sync::Arc;
use warp::reply::Json;

use crate::services::market::MarketService;

pub async fn health(service: Arc<MarketService>) -> Result<Json, Infallible> {
    let source = service.data_source();
    Ok(warp::reply::json(&serde_json::json!({
        "success": true,
        "message": format!("Market dashboard backend is running ({} data)", source),
        "dataSource": source.to_string(),
        "timestamp": Utc::now().to_rfc3339(),
    })))
}
