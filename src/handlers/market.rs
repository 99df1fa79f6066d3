// src/handlers/market.rs
use log::{error, info};
use serde::Deserialize;
use std::sync::Arc;
use warp::reply::Json;
use warp::Rejection;

use super::error::ApiError;
use crate::services::market::MarketService;

#[derive(Debug, Default, Deserialize)]
pub struct MarketQuery {
    pub date: Option<String>,
}

pub async fn get_market_data(
    query: MarketQuery,
    service: Arc<MarketService>,
) -> Result<Json, Rejection> {
    info!("Handling request for market data, date={:?}", query.date);

    let found = service.get_market_data(query.date.as_deref()).await.map_err(|e| {
        if e.is_bad_request() {
            info!("Rejected market data request: {}", e);
        } else {
            error!("Failed to build market data: {}", e);
        }
        warp::reject::custom(ApiError::from(e))
    })?;

    Ok(warp::reply::json(&serde_json::json!({
        "success": true,
        "data": found.bundle.as_ref(),
        "date": found.date,
        "cached": found.cached,
        "dataSource": service.data_source().to_string(),
    })))
}
