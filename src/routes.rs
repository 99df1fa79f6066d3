// src/routes.rs
use std::sync::Arc;
use warp::reject::Rejection;
use crate::handlers::{
    cache::clear_cache, cache::get_cache_stats, health::health, market::get_market_data,
    market::MarketQuery,
};
use crate::services::market::MarketService;
use log::info;

use std::convert::Infallible;
use warp::http::StatusCode;
use warp::{Filter, Reply};
use crate::handlers::error::ApiError;

// Every failure goes out in the same {success: false, ...} envelope
async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let api_error = if err.is_not_found() {
        ApiError {
            status: StatusCode::NOT_FOUND,
            ..ApiError::new("Not Found")
        }
    } else if let Some(api_error) = err.find::<ApiError>() {
        api_error.clone()
    } else if err.find::<warp::reject::InvalidQuery>().is_some() {
        ApiError::bad_request("Invalid query string")
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        ApiError {
            status: StatusCode::METHOD_NOT_ALLOWED,
            ..ApiError::new("Method Not Allowed")
        }
    } else {
        ApiError::new("Internal Server Error")
    };

    let mut body = serde_json::json!({
        "success": false,
        "message": api_error.message,
        "error": api_error.detail,
    });
    if let Some(code) = api_error.code {
        body["code"] = serde_json::Value::from(code);
    }

    Ok(warp::reply::with_status(warp::reply::json(&body), api_error.status))
}

pub fn routes(
    service: Arc<MarketService>,
) -> impl Filter<Extract = impl Reply, Error = Infallible> + Clone {
    info!("Configuring routes...");

    let service_filter = warp::any().map(move || service.clone());

    let market_data_route = warp::path!("api" / "market-data")
        .and(warp::get())
        .and(warp::query::<MarketQuery>())
        .and(service_filter.clone())
        .and_then(get_market_data);

    let cache_clear_route = warp::path!("api" / "cache" / "clear")
        .and(warp::post())
        .and(service_filter.clone())
        .and_then(clear_cache);

    let cache_stats_route = warp::path!("api" / "cache" / "stats")
        .and(warp::get())
        .and(service_filter.clone())
        .and_then(get_cache_stats);

    let health_route = warp::path!("api" / "health")
        .and(warp::get())
        .and(service_filter.clone())
        .and_then(health);

    info!("All routes configured successfully.");

    market_data_route
        .or(cache_clear_route)
        .or(cache_stats_route)
        .or(health_route)
        .recover(handle_rejection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::models::{Breadth, IndexEntry, IndexSpec, MarketDateKey, RawSpread, SectorRecord};
    use crate::services::aggregator::Aggregator;
    use crate::services::cache::{CacheConfig, MarketDataCache};
    use crate::services::providers::{DataProvider, DataSource, SyntheticProvider};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use serde_json::Value;

    /// Behaves like a bridge whose Python module is missing.
    struct Uninstalled;

    #[async_trait]
    impl DataProvider for Uninstalled {
        fn name(&self) -> &str {
            "wind"
        }

        async fn fetch_breadth(&self, _date: &MarketDateKey) -> Result<Breadth, ProviderError> {
            Err(ProviderError::not_installed("No module named 'WindPy'"))
        }

        async fn fetch_indices(
            &self,
            _date: &MarketDateKey,
        ) -> Result<Vec<IndexEntry>, ProviderError> {
            Err(ProviderError::not_installed("No module named 'WindPy'"))
        }

        async fn fetch_sectors(
            &self,
            _date: &MarketDateKey,
        ) -> Result<Vec<SectorRecord>, ProviderError> {
            Err(ProviderError::not_installed("No module named 'WindPy'"))
        }

        async fn fetch_spread(&self, _date: &MarketDateKey) -> Result<RawSpread, ProviderError> {
            Err(ProviderError::not_installed("No module named 'WindPy'"))
        }
    }

    fn service_with(provider: Arc<dyn DataProvider>, source: DataSource) -> Arc<MarketService> {
        let config = CacheConfig {
            refresh_ahead: false,
            prefetch_adjacent: false,
            ..CacheConfig::default()
        };
        let cache = MarketDataCache::new(Arc::new(Aggregator::new(provider)), config);
        Arc::new(MarketService::new(cache, source))
    }

    fn synthetic_service() -> Arc<MarketService> {
        let end = NaiveDate::from_ymd_opt(2025, 10, 31).unwrap();
        service_with(Arc::new(SyntheticProvider::new(IndexSpec::defaults(), end)), DataSource::Mock)
    }

    fn body(resp: &warp::http::Response<warp::hyper::body::Bytes>) -> Value {
        serde_json::from_slice(resp.body()).unwrap()
    }

    #[tokio::test]
    async fn health_reports_data_source() {
        let api = routes(synthetic_service());
        let resp = warp::test::request().method("GET").path("/api/health").reply(&api).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body(&resp);
        assert_eq!(json["success"], true);
        assert_eq!(json["dataSource"], "mock");
        assert!(json["timestamp"].is_string());
    }

    #[tokio::test]
    async fn missing_date_is_bad_request() {
        let api = routes(synthetic_service());
        let resp = warp::test::request().method("GET").path("/api/market-data").reply(&api).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let json = body(&resp);
        assert_eq!(json["success"], false);
        assert!(json["message"].as_str().unwrap().contains("date"));
    }

    #[tokio::test]
    async fn malformed_date_is_bad_request() {
        let api = routes(synthetic_service());
        let resp = warp::test::request()
            .method("GET")
            .path("/api/market-data?date=2024-02-30")
            .reply(&api)
            .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn market_data_is_wrapped_in_envelope() {
        let api = routes(synthetic_service());
        let resp = warp::test::request()
            .method("GET")
            .path("/api/market-data?date=2024-03-01")
            .reply(&api)
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body(&resp);
        assert_eq!(json["success"], true);
        assert_eq!(json["dataSource"], "mock");
        assert_eq!(json["date"], "2024-03-01");
        assert_eq!(json["cached"], false);
        assert_eq!(json["data"]["overview"]["indices"].as_array().unwrap().len(), 4);
        assert!(json["data"]["overview"]["upLimit"].is_number());
        assert!(!json["data"]["sectors"].as_array().unwrap().is_empty());
        assert!(json["data"]["equityBondSpread"]["metrics"]["spreadPercentile"].is_number());
    }

    #[tokio::test]
    async fn missing_python_module_is_service_unavailable() {
        let api = routes(service_with(Arc::new(Uninstalled), DataSource::Wind));
        let resp = warp::test::request()
            .method("GET")
            .path("/api/market-data?date=2024-03-01")
            .reply(&api)
            .await;
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        let json = body(&resp);
        assert_eq!(json["success"], false);
        assert_eq!(json["code"], "PROVIDER_NOT_CONFIGURED");
        assert!(json["error"].as_str().unwrap().contains("WindPy"));
    }

    #[tokio::test]
    async fn cache_stats_and_clear() {
        let service = synthetic_service();
        let api = routes(service.clone());

        for cached in [false, true] {
            let resp = warp::test::request()
                .method("GET")
                .path("/api/market-data?date=2024-03-01")
                .reply(&api)
                .await;
            assert_eq!(resp.status(), StatusCode::OK);
            assert_eq!(body(&resp)["cached"], cached);
        }

        let resp = warp::test::request().method("GET").path("/api/cache/stats").reply(&api).await;
        let stats = body(&resp)["stats"].clone();
        assert_eq!(stats["keys"], 1);
        assert_eq!(stats["hits"], 1);
        assert_eq!(stats["misses"], 1);
        assert!(stats["vsize"].as_u64().unwrap() > 0);

        let resp = warp::test::request().method("POST").path("/api/cache/clear").reply(&api).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body(&resp)["success"], true);

        let stats = service.cache_stats();
        assert_eq!(
            (stats.keys, stats.hits, stats.misses, stats.ksize, stats.vsize),
            (0, 0, 0, 0, 0)
        );
    }

    #[tokio::test]
    async fn unknown_path_is_not_found() {
        let api = routes(synthetic_service());
        let resp = warp::test::request().method("GET").path("/api/nope").reply(&api).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(body(&resp)["success"], false);
    }
}
