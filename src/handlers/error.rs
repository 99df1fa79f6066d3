// src/handlers/error.rs
use std::fmt;
use warp::http::StatusCode;
use warp::reject::Reject;

use crate::error::MarketDataError;

pub const PROVIDER_NOT_CONFIGURED: &str = "PROVIDER_NOT_CONFIGURED";

#[derive(Debug, Clone)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: Option<&'static str>,
    pub message: String,
    pub detail: String,
}

impl ApiError {
    pub fn new(message: impl Into<String>) -> Self {
        let message = message.into();
        ApiError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: None,
            detail: message.clone(),
            message,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError {
            status: StatusCode::BAD_REQUEST,
            ..ApiError::new(message)
        }
    }
}

impl From<MarketDataError> for ApiError {
    fn from(err: MarketDataError) -> Self {
        let detail = err.to_string();
        if err.is_bad_request() {
            return ApiError {
                status: StatusCode::BAD_REQUEST,
                code: None,
                message: detail.clone(),
                detail,
            };
        }
        if err.is_not_configured() {
            return ApiError {
                status: StatusCode::SERVICE_UNAVAILABLE,
                code: Some(PROVIDER_NOT_CONFIGURED),
                message: "Data provider is not configured; \
                          install its Python dependencies or switch DATA_SOURCE to mock"
                    .to_string(),
                detail,
            };
        }
        ApiError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: None,
            message: "Failed to fetch market data".to_string(),
            detail,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {}
impl Reject for ApiError {}
