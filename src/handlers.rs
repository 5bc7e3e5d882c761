use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{rejection::JsonRejection, ws::WebSocketUpgrade, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use tracing::{error, info, warn};

use crate::config::ConfigSet;
use crate::locator::{
    detect_intent, IntentReport, LocationDetails, LocationService, LocatorError, NearbyOutcome,
    NearbyQuery, NearbyRequest, PointOfInterest, ServiceAreaInfo,
};
use crate::models::*;
use crate::session::{CallSessionStore, SessionError};
use crate::telephony::{CallAgent, CallMetadata, GreetingAgent, MediaStreamHandler};

// =============================================================================
// Application State
// - 設定・地点検索・通話セッション・エージェントをハンドラ間で共有
// =============================================================================

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ConfigSet>,
    pub locator: Arc<LocationService>,
    pub sessions: Arc<CallSessionStore>,
    pub agent: Arc<dyn CallAgent>,
    pub start_time: Arc<Instant>,
}

impl AppState {
    pub fn new(config: ConfigSet) -> Self {
        let agent = Arc::new(GreetingAgent::new(config.telephony.greeting.clone()));
        Self::with_agent(config, agent)
    }

    /// 通話エージェントを差し替えて構築
    pub fn with_agent(config: ConfigSet, agent: Arc<dyn CallAgent>) -> Self {
        Self {
            locator: Arc::new(LocationService::from_config(&config)),
            sessions: Arc::new(CallSessionStore::new(config.telephony.max_sessions)),
            agent,
            config: Arc::new(config),
            start_time: Arc::new(Instant::now()),
        }
    }
}

// =============================================================================
// Error Handling
// - 型安全な API エラーを定義し、`IntoResponse` で JSON へ変換
// =============================================================================

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug)]
pub struct ApiError {
    pub code: ApiErrorCode,
    pub message: String,
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(code: ApiErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

impl From<LocatorError> for ApiError {
    fn from(err: LocatorError) -> Self {
        if err.is_validation() {
            ApiError::new(ApiErrorCode::InvalidInput, err.to_string())
        } else {
            ApiError::new(ApiErrorCode::NotFound, err.to_string())
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::LimitExceeded { .. } => {
                ApiError::new(ApiErrorCode::ServerOverloaded, err.to_string())
            }
            SessionError::NotFound { .. } => ApiError::new(ApiErrorCode::NotFound, err.to_string()),
            SessionError::AlreadyExists { .. } => {
                ApiError::new(ApiErrorCode::InvalidInput, err.to_string())
            }
        }
    }
}

/// ハンドラ内のパニックを 500 INTERNAL_ERROR の JSON に変換（`CatchPanicLayer` 用）
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let details = panic
        .downcast_ref::<String>()
        .cloned()
        .or_else(|| panic.downcast_ref::<&str>().map(|s| s.to_string()));
    error!(
        details = details.as_deref().unwrap_or("unknown"),
        "ハンドラがパニック"
    );
    ApiError::new(ApiErrorCode::InternalError, "Internal server error").into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status_code = match self.code {
            ApiErrorCode::InvalidInput => StatusCode::BAD_REQUEST,
            ApiErrorCode::NotFound => StatusCode::NOT_FOUND,
            ApiErrorCode::ServerOverloaded => StatusCode::TOO_MANY_REQUESTS,
            ApiErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let response = ErrorResponse {
            error: self.message,
            code: self.code.as_str().to_string(),
            details: self.details,
        };

        (status_code, Json(response)).into_response()
    }
}

// =============================================================================
// Request Handlers
// =============================================================================

fn now_iso() -> String {
    chrono::Local::now().to_rfc3339()
}

/// API情報
pub async fn root(State(state): State<AppState>) -> Json<RootResponse> {
    let endpoints = [
        ("websocket", "/media"),
        ("passthru", "/passthru"),
        ("health", "/health"),
        ("test", "/api/test"),
        ("find_nearby", "/api/find-nearby"),
        ("random_location", "/api/random-location"),
        ("locations", "/api/locations"),
        ("service_area", "/api/service-area"),
        ("intent", "/api/intent"),
    ]
    .into_iter()
    .map(|(name, path)| (name.to_string(), path.to_string()))
    .collect::<BTreeMap<_, _>>();

    Json(RootResponse {
        message: "EcoMatrix Locator".to_string(),
        version: state.config.server.version.clone(),
        endpoints,
        timestamp: now_iso(),
    })
}

/// ヘルスチェックエンドポイント
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: now_iso(),
        version: state.config.server.version.clone(),
        active_connections: state.sessions.active_sessions(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
    })
}

pub async fn api_test() -> Json<TestResponse> {
    Json(TestResponse {
        status: "ok".to_string(),
        message: "Server is running".to_string(),
        timestamp: now_iso(),
    })
}

/// 全地点
pub async fn list_locations(State(state): State<AppState>) -> Json<Vec<PointOfInterest>> {
    Json(state.locator.locations().to_vec())
}

/// 地点詳細
pub async fn location_detail(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> ApiResult<Json<LocationDetails>> {
    Ok(Json(state.locator.location_details(id)?))
}

pub async fn service_area(State(state): State<AppState>) -> Json<ServiceAreaInfo> {
    Json(state.locator.service_area_info())
}

/// 最寄り地点検索
///
/// 圏外は 200 で `error` フィールド付きの結果を返す。入力不正のみ 400。
pub async fn find_nearby(
    State(state): State<AppState>,
    payload: Result<Json<NearbyRequest>, JsonRejection>,
) -> ApiResult<Json<NearbyOutcome>> {
    let Json(request) = payload.map_err(|e| {
        ApiError::new(ApiErrorCode::InvalidInput, "リクエストボディが不正なJSONです")
            .with_details(e.body_text())
    })?;
    let query = NearbyQuery::try_from(request)?;
    let outcome = state.locator.find_nearby(&query)?;

    match &outcome {
        NearbyOutcome::Found(found) => info!(
            lat = query.location.lat,
            lng = query.location.lng,
            query = %query.query,
            returned = found.nearest_locations.len(),
            total_found = found.total_found,
            "nearby search"
        ),
        NearbyOutcome::OutOfArea(_) => info!(
            lat = query.location.lat,
            lng = query.location.lng,
            "nearby search outside service area"
        ),
    }

    Ok(Json(outcome))
}

/// サービスエリア内のランダム座標（動作確認用）
pub async fn random_location(State(state): State<AppState>) -> Json<RandomLocationResponse> {
    let point = state.locator.random_point(&mut rand::rng());
    Json(RandomLocationResponse {
        lat: point.lat,
        lng: point.lng,
        message: "Random location within service area".to_string(),
        service_area: state.locator.service_area().bounds,
        is_within_bounds: state.locator.is_within_service_area(point),
    })
}

pub async fn intent(
    payload: Result<Json<IntentRequest>, JsonRejection>,
) -> ApiResult<Json<IntentReport>> {
    let Json(request) = payload.map_err(|e| {
        ApiError::new(ApiErrorCode::InvalidInput, "リクエストボディが不正なJSONです")
            .with_details(e.body_text())
    })?;
    Ok(Json(detect_intent(&request.query)))
}

/// Exotel passthru Webhook
pub async fn passthru(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<PassthruResponse> {
    let metadata = CallMetadata::from_params(&params);
    info!(
        call_sid = metadata.call_sid.as_deref().unwrap_or(""),
        direction = metadata.direction.as_deref().unwrap_or(""),
        from = metadata.from.as_deref().unwrap_or(""),
        to = metadata.to.as_deref().unwrap_or(""),
        stream_sid = metadata.stream.stream_sid.as_deref().unwrap_or(""),
        status = metadata.stream.status.as_deref().unwrap_or(""),
        duration = metadata.stream.duration.as_deref().unwrap_or(""),
        "passthru received"
    );

    if metadata.is_terminal() {
        if let Some(stream_sid) = metadata.stream.stream_sid.as_deref() {
            if let Err(e) = state.sessions.evict(stream_sid) {
                warn!(stream_sid, error = %e, "終了通知に対応するセッションなし");
            }
        }
    }

    Json(PassthruResponse {
        status: "success".to_string(),
        message: "Passthru processed successfully".to_string(),
    })
}

/// Exotel メディアストリーム（WebSocket）
///
/// セッション上限に達している場合はアップグレード前に 429 を返す。
pub async fn media_stream(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> ApiResult<Response> {
    let max = state.sessions.max_sessions();
    if state.sessions.active_sessions() >= max {
        warn!(max, "通話セッション上限のため接続を拒否");
        return Err(SessionError::LimitExceeded { max }.into());
    }

    let handler = MediaStreamHandler::new(
        Arc::clone(&state.sessions),
        Arc::clone(&state.locator),
        Arc::clone(&state.agent),
        &state.config.telephony,
    );
    Ok(ws.on_upgrade(move |socket| handler.handle_socket(socket)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locator_errors_map_to_status_codes() {
        let err: ApiError = LocatorError::MissingCoordinate { field: "lat" }.into();
        assert_eq!(err.code, ApiErrorCode::InvalidInput);
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);

        let err: ApiError = LocatorError::LocationNotFound { id: 7 }.into();
        assert_eq!(err.code, ApiErrorCode::NotFound);
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn session_limit_is_overload() {
        let err: ApiError = SessionError::LimitExceeded { max: 1 }.into();
        assert_eq!(err.code.as_str(), "SERVER_OVERLOADED");
        assert_eq!(err.into_response().status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn panics_become_internal_errors() {
        let response = panic_response(Box::new("boom"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["code"], "INTERNAL_ERROR");
        assert_eq!(json["details"], serde_json::Value::Null);

        let response = panic_response(Box::new(String::from("owned boom")));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
