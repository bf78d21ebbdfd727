//! Webhook endpoints called by the external workflow host.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde_json::{json, Value};

use shared_types::WorkflowCallback;

use crate::api::{parse_json, ApiErrorCode, ApiFailure, ApiResult, ApiState};
use crate::delegate::{process_callback, DelegateError, CALLBACK_PATH, TEST_PATH};

/// POST /api/webhooks/n8n/callback
pub async fn workflow_callback(
    State(state): State<ApiState>,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let body: Value = parse_json(&body)?;
    let has_task_id = body
        .get("taskId")
        .and_then(Value::as_str)
        .is_some_and(|id| !id.trim().is_empty());
    if !has_task_id {
        return Err(ApiFailure::invalid("taskId is required"));
    }

    let callback: WorkflowCallback = serde_json::from_value(body)
        .map_err(|e| ApiFailure::invalid(format!("Invalid callback body: {e}")))?;

    let store = state.app_state.store();
    let task = match process_callback(store.as_ref(), callback).await {
        Ok(task) => task,
        Err(DelegateError::MissingTaskId) => {
            return Err(ApiFailure::invalid("taskId is required"));
        }
        Err(DelegateError::Store(e)) => return Err(e.into()),
        Err(e) => {
            return Err(ApiFailure::new(ApiErrorCode::InternalError, e.to_string()));
        }
    };

    tracing::info!(task_id = %task.id, status = task.status.as_str(), "workflow callback processed");
    Ok(Json(json!({
        "success": true,
        "message": "Callback processed successfully",
        "task": task,
    })))
}

/// GET|POST /api/webhooks/n8n/test
pub async fn test_webhook(body: Bytes) -> impl IntoResponse {
    let received = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&body).into_owned()))
    };
    tracing::debug!("test webhook received");

    Json(json!({
        "success": true,
        "message": "Webhook endpoint is working",
        "timestamp": Utc::now(),
        "received": received,
    }))
}

/// GET /api/webhooks/n8n/status
pub async fn webhook_status(State(state): State<ApiState>) -> impl IntoResponse {
    let base = state.app_state.callback_base_url();
    Json(json!({
        "success": true,
        "delegateEnabled": state.app_state.delegate().is_some(),
        "webhooks": {
            "callback": format!("{base}{CALLBACK_PATH}"),
            "test": format!("{base}{TEST_PATH}"),
        },
    }))
}

/// GET /api/webhooks/n8n/executions/{execution_id}
pub async fn execution_status(
    State(state): State<ApiState>,
    Path(execution_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let Some(delegate) = state.app_state.delegate() else {
        return Err(delegate_unavailable());
    };

    match delegate.execution_status(&execution_id).await {
        Ok(status) => Ok(Json(status)),
        Err(DelegateError::NotConfigured) => Err(delegate_unavailable()),
        Err(e @ (DelegateError::Status { .. } | DelegateError::Request(_))) => {
            tracing::warn!(execution_id = %execution_id, error = %e, "execution status lookup failed");
            Err(ApiFailure::new(ApiErrorCode::DelegateFailed, e.to_string()))
        }
        Err(e) => Err(ApiFailure::new(ApiErrorCode::InternalError, e.to_string())),
    }
}

fn delegate_unavailable() -> ApiFailure {
    ApiFailure::new(
        ApiErrorCode::DelegateUnavailable,
        "Workflow delegate is not configured",
    )
}

/// GET /api/webhooks/n8n/setup
pub async fn delegate_setup(State(state): State<ApiState>) -> ApiResult<impl IntoResponse> {
    let Some(delegate) = state.app_state.delegate() else {
        return Err(delegate_unavailable());
    };

    Ok(Json(delegate.validate_setup().await))
}
