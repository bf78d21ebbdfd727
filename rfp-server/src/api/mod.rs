//! HTTP API routes for the RFP pipeline.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::de::DeserializeOwned;
use serde_json::json;

use shared_types::ApiError;

use crate::app_state::AppState;
use crate::db::{RecordStore, StoreError};

pub mod agents;
pub mod webhooks;

#[derive(Clone)]
pub struct ApiState {
    pub app_state: Arc<AppState>,
}

/// Configure all API routes
pub fn router() -> Router<ApiState> {
    Router::new()
        .route("/api/health", get(health_check))
        // Pipeline routes
        .route("/api/agents/execute", post(agents::execute_agent))
        .route("/api/agents/delegate", post(agents::delegate_agent))
        .route("/api/tasks/{task_id}", get(agents::get_task))
        // Workflow host webhooks
        .route("/api/webhooks/n8n/callback", post(webhooks::workflow_callback))
        .route(
            "/api/webhooks/n8n/test",
            get(webhooks::test_webhook).post(webhooks::test_webhook),
        )
        .route("/api/webhooks/n8n/status", get(webhooks::webhook_status))
        .route("/api/webhooks/n8n/setup", get(webhooks::delegate_setup))
        .route(
            "/api/webhooks/n8n/executions/{execution_id}",
            get(webhooks::execution_status),
        )
}

/// Machine-readable error codes returned in `{"error": {code, message}}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorCode {
    InvalidRequest,
    NotFound,
    DelegateUnavailable,
    DelegateFailed,
    InternalError,
}

impl ApiErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiErrorCode::InvalidRequest => "INVALID_REQUEST",
            ApiErrorCode::NotFound => "NOT_FOUND",
            ApiErrorCode::DelegateUnavailable => "DELEGATE_UNAVAILABLE",
            ApiErrorCode::DelegateFailed => "DELEGATE_FAILED",
            ApiErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiErrorCode::InvalidRequest => StatusCode::BAD_REQUEST,
            ApiErrorCode::NotFound => StatusCode::NOT_FOUND,
            ApiErrorCode::DelegateUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiErrorCode::DelegateFailed => StatusCode::BAD_GATEWAY,
            ApiErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug)]
pub struct ApiFailure {
    code: ApiErrorCode,
    message: String,
}

impl ApiFailure {
    pub fn new(code: ApiErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::InvalidRequest, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::NotFound, message)
    }
}

impl From<StoreError> for ApiFailure {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { .. } => Self::not_found(e.to_string()),
            other => {
                tracing::error!(error = %other, "record store error");
                Self::new(ApiErrorCode::InternalError, "Record store error")
            }
        }
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        let body = ApiError {
            code: self.code.as_str().to_string(),
            message: self.message,
        };
        (self.code.status_code(), Json(json!({ "error": body }))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiFailure>;

/// Decodes a JSON request body, answering malformed input with the API
/// error shape instead of axum's plain-text rejection.
pub fn parse_json<T: DeserializeOwned>(body: &Bytes) -> ApiResult<T> {
    serde_json::from_slice(body).map_err(|e| ApiFailure::invalid(format!("Invalid JSON body: {e}")))
}

/// Health check endpoint
pub async fn health_check(State(state): State<ApiState>) -> impl IntoResponse {
    let database = match state.app_state.store().ping().await {
        Ok(()) => "connected",
        Err(e) => {
            tracing::warn!(error = %e, "health check could not reach database");
            "disconnected"
        }
    };
    let status = if database == "connected" { "ok" } else { "degraded" };

    (
        StatusCode::OK,
        Json(json!({
            "status": status,
            "service": "rfp-server",
            "version": env!("CARGO_PKG_VERSION"),
            "database": database,
            "uptime": state.app_state.uptime_secs(),
        })),
    )
}
