//! Agent execution endpoints.
//!
//! Runs are started in the background; callers poll `/api/tasks/{task_id}`.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde_json::json;

use shared_types::{
    DelegateRequest, DelegateResponse, ExecuteAgentRequest, ExecuteAgentResponse, NewTask,
    RfpRecord, TaskStatus, TaskUpdate,
};

use crate::api::{parse_json, ApiErrorCode, ApiFailure, ApiResult, ApiState};
use crate::db::RecordStore;

const RFP_NOT_FOUND: &str = "RFP not found or access denied";

fn require(value: &str, field: &str) -> ApiResult<()> {
    if value.trim().is_empty() {
        return Err(ApiFailure::invalid(format!("{field} cannot be empty")));
    }
    Ok(())
}

/// Loads the RFP and checks it belongs to `user_id`. Both cases answer 404.
async fn owned_rfp(store: &dyn RecordStore, rfp_id: &str, user_id: &str) -> ApiResult<RfpRecord> {
    match store.get_rfp(rfp_id).await? {
        Some(rfp) if rfp.user_id == user_id => Ok(rfp),
        Some(_) => {
            tracing::warn!(rfp_id, user_id, "RFP owned by another user");
            Err(ApiFailure::not_found(RFP_NOT_FOUND))
        }
        None => Err(ApiFailure::not_found(RFP_NOT_FOUND)),
    }
}

/// POST /api/agents/execute
pub async fn execute_agent(
    State(state): State<ApiState>,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let request: ExecuteAgentRequest = parse_json(&body)?;
    require(&request.rfp_id, "rfp_id")?;
    require(&request.user_id, "user_id")?;

    let app = &state.app_state;
    let store = app.store();
    let rfp = owned_rfp(store.as_ref(), &request.rfp_id, &request.user_id).await?;

    let task = store
        .create_task(NewTask {
            agent_id: request.agent_id.clone(),
            rfp_id: rfp.id.clone(),
            status: TaskStatus::Running,
        })
        .await?;

    tracing::info!(
        task_id = %task.id,
        rfp_id = %rfp.id,
        user_id = %request.user_id,
        "agent execution requested"
    );
    app.spawn_run(rfp.id, request.user_id, task.id.clone());

    Ok((
        StatusCode::ACCEPTED,
        Json(ExecuteAgentResponse {
            message: "Agent execution started".to_string(),
            task,
        }),
    ))
}

/// POST /api/agents/delegate
pub async fn delegate_agent(
    State(state): State<ApiState>,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let app = &state.app_state;
    let Some(delegate) = app.delegate() else {
        return Err(ApiFailure::new(
            ApiErrorCode::DelegateUnavailable,
            "Workflow delegate is not configured",
        ));
    };

    let request: DelegateRequest = parse_json(&body)?;
    require(&request.rfp_id, "rfp_id")?;
    require(&request.user_id, "user_id")?;

    let store = app.store();
    let rfp = owned_rfp(store.as_ref(), &request.rfp_id, &request.user_id).await?;

    let agent_id = format!("{}-agent", request.agent_type.as_str());
    let task = store
        .create_task(NewTask {
            agent_id: Some(agent_id.clone()),
            rfp_id: rfp.id.clone(),
            status: TaskStatus::Running,
        })
        .await?;

    let payload = delegate.build_payload(&task.id, request.agent_type, &rfp, &agent_id);
    let trigger = match delegate.trigger(&payload).await {
        Ok(trigger) => trigger,
        Err(e) => {
            tracing::error!(task_id = %task.id, error = %e, "delegate trigger failed");
            let update = TaskUpdate {
                status: Some(TaskStatus::Failed),
                completed_at: Some(Utc::now()),
                result: Some(json!({ "error": e.to_string() })),
                ..Default::default()
            };
            if let Err(store_err) = store.update_task(&task.id, update).await {
                tracing::error!(task_id = %task.id, error = %store_err, "failed to mark task failed");
            }
            return Err(ApiFailure::new(ApiErrorCode::DelegateFailed, e.to_string()));
        }
    };

    let task = store
        .update_task(
            &task.id,
            TaskUpdate {
                delegate_execution_id: Some(trigger.execution_id.clone()),
                ..Default::default()
            },
        )
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(DelegateResponse { task, trigger }),
    ))
}

/// GET /api/tasks/{task_id}
pub async fn get_task(
    State(state): State<ApiState>,
    Path(task_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let task = state
        .app_state
        .store()
        .get_task(&task_id)
        .await?
        .ok_or_else(|| ApiFailure::not_found(format!("Task '{task_id}' not found")))?;
    Ok(Json(task))
}
