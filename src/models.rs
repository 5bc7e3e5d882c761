//! HTTP API のレスポンス型とエラーコード
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::Bounds;

// =============================================================================
// Response Types
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootResponse {
    pub message: String,
    pub version: String,
    pub endpoints: BTreeMap<String, String>,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub version: String,
    pub active_connections: usize,
    pub uptime_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResponse {
    pub status: String,
    pub message: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomLocationResponse {
    pub lat: f64,
    pub lng: f64,
    pub message: String,
    pub service_area: Bounds,
    pub is_within_bounds: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IntentRequest {
    #[serde(default)]
    pub query: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassthruResponse {
    pub status: String,
    pub message: String,
}

// =============================================================================
// Error Types
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    pub details: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApiErrorCode {
    InvalidInput,
    NotFound,
    ServerOverloaded,
    InternalError,
}

impl ApiErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiErrorCode::InvalidInput => "INVALID_INPUT",
            ApiErrorCode::NotFound => "NOT_FOUND",
            ApiErrorCode::ServerOverloaded => "SERVER_OVERLOADED",
            ApiErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }
}
