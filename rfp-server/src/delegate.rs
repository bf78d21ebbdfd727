//! Delegate path: hands an agent run to an external n8n-compatible workflow
//! host and folds its callback back into the record store.

use std::time::Duration;

use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::Value;
use tracing::{error, info, warn};

use shared_types::{
    AgentTaskRecord, CallbackStatus, DelegateAgent, DelegateAgentType, DelegateExecutionState,
    DelegateExecutionStatus, DelegateRfp, DelegateSetupReport, DelegateTriggerPayload,
    DelegateTriggerResponse, MatchedProduct, NewReport, Pricing, ReportStatus, ReportUpdate,
    RfpRecord, RfpStatus, RfpUpdate, TaskStatus, TaskUpdate, WorkflowCallback,
};

use crate::config::DelegateConfig;
use crate::db::{RecordStore, StoreError};

const API_TIMEOUT: Duration = Duration::from_secs(30);
const TRIGGER_TIMEOUT: Duration = Duration::from_secs(60);
const CONNECTION_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

pub const CALLBACK_PATH: &str = "/api/webhooks/n8n/callback";
pub const TEST_PATH: &str = "/api/webhooks/n8n/test";

#[derive(Debug, thiserror::Error)]
pub enum DelegateError {
    #[error("workflow delegate is not configured")]
    NotConfigured,

    #[error("workflow host request failed: {0}")]
    Request(String),

    #[error("workflow host returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("callback is missing taskId")]
    MissingTaskId,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Client for the external workflow host.
pub struct WorkflowDelegate {
    config: DelegateConfig,
    callback_base_url: String,
    api: reqwest::Client,
    webhooks: reqwest::Client,
}

impl WorkflowDelegate {
    /// `None` when no webhook base URL is configured.
    pub fn from_config(
        config: &DelegateConfig,
        callback_base_url: &str,
    ) -> Result<Option<Self>, DelegateError> {
        if !config.is_enabled() {
            return Ok(None);
        }
        Self::new(config.clone(), callback_base_url).map(Some)
    }

    pub fn new(config: DelegateConfig, callback_base_url: &str) -> Result<Self, DelegateError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "X-N8N-API-KEY",
            HeaderValue::from_str(&config.api_key)
                .map_err(|e| DelegateError::Request(format!("invalid N8N_API_KEY: {e}")))?,
        );

        let api = reqwest::Client::builder()
            .timeout(API_TIMEOUT)
            .default_headers(headers)
            .build()
            .map_err(|e| DelegateError::Request(e.to_string()))?;
        let webhooks = reqwest::Client::builder()
            .timeout(TRIGGER_TIMEOUT)
            .build()
            .map_err(|e| DelegateError::Request(e.to_string()))?;

        Ok(Self {
            config,
            callback_base_url: callback_base_url.trim_end_matches('/').to_string(),
            api,
            webhooks,
        })
    }

    pub fn callback_url(&self) -> String {
        format!("{}{}", self.callback_base_url, CALLBACK_PATH)
    }

    pub fn webhook_url(&self, agent_type: DelegateAgentType) -> Result<String, DelegateError> {
        let base = self
            .config
            .webhook_base_url
            .as_deref()
            .ok_or(DelegateError::NotConfigured)?;
        Ok(format!(
            "{}/{}-agent",
            base.trim_end_matches('/'),
            agent_type.as_str()
        ))
    }

    pub fn build_payload(
        &self,
        task_id: &str,
        agent_type: DelegateAgentType,
        rfp: &RfpRecord,
        agent_id: &str,
    ) -> DelegateTriggerPayload {
        DelegateTriggerPayload {
            task_id: task_id.to_string(),
            agent_type,
            rfp: DelegateRfp::from(rfp),
            agent: DelegateAgent {
                id: agent_id.to_string(),
                name: agent_type.display_name().to_string(),
                agent_type,
            },
            callback_url: self.callback_url(),
            timestamp: Utc::now(),
        }
    }

    pub async fn trigger(
        &self,
        payload: &DelegateTriggerPayload,
    ) -> Result<DelegateTriggerResponse, DelegateError> {
        let url = self.webhook_url(payload.agent_type)?;
        info!(task_id = %payload.task_id, url = %url, "triggering delegate workflow");

        let response = self
            .webhooks
            .post(&url)
            .json(payload)
            .send()
            .await
            .map_err(|e| DelegateError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(task_id = %payload.task_id, status = status.as_u16(), "delegate trigger rejected");
            return Err(DelegateError::Status {
                status: status.as_u16(),
                body,
            });
        }

        // Webhook replies are free-form; only an execution id is picked out.
        let body: Value = response.json().await.unwrap_or(Value::Null);
        let execution_id = execution_id_from(&body).unwrap_or_else(|| "pending".to_string());
        info!(task_id = %payload.task_id, execution_id = %execution_id, "delegate workflow triggered");

        Ok(DelegateTriggerResponse {
            success: true,
            execution_id,
            message: format!("{} workflow triggered", payload.agent_type.as_str()),
        })
    }

    pub async fn execution_status(
        &self,
        execution_id: &str,
    ) -> Result<DelegateExecutionStatus, DelegateError> {
        let url = format!(
            "{}/executions/{execution_id}",
            self.config.base_url.trim_end_matches('/')
        );
        let response = self
            .api
            .get(&url)
            .send()
            .await
            .map_err(|e| DelegateError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DelegateError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| DelegateError::Request(e.to_string()))?;
        Ok(execution_status_from(execution_id, &body))
    }

    pub async fn check_connection(&self) -> bool {
        let url = format!("{}/workflows", self.config.base_url.trim_end_matches('/'));
        match self
            .api
            .get(&url)
            .timeout(CONNECTION_CHECK_TIMEOUT)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                warn!(status = response.status().as_u16(), "workflow host rejected connection check");
                false
            }
            Err(e) => {
                warn!(error = %e, "workflow host unreachable");
                false
            }
        }
    }

    pub async fn validate_setup(&self) -> DelegateSetupReport {
        let connected = self.check_connection().await;
        setup_report(connected, &self.config)
    }
}

fn execution_id_from(body: &Value) -> Option<String> {
    match body.get("executionId")? {
        Value::String(id) if !id.is_empty() => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

/// Finished wins over stopped; anything else is still running.
pub fn execution_status_from(execution_id: &str, body: &Value) -> DelegateExecutionStatus {
    let finished = body.get("finished").and_then(Value::as_bool).unwrap_or(false);
    let stopped_at = body
        .get("stoppedAt")
        .and_then(Value::as_str)
        .map(ToString::to_string);

    let status = if finished {
        DelegateExecutionState::Completed
    } else if stopped_at.is_some() {
        DelegateExecutionState::Failed
    } else {
        DelegateExecutionState::Running
    };

    DelegateExecutionStatus {
        id: body
            .get("id")
            .and_then(|v| match v {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .unwrap_or_else(|| execution_id.to_string()),
        status,
        started_at: body
            .get("startedAt")
            .and_then(Value::as_str)
            .map(ToString::to_string),
        stopped_at,
        mode: body
            .get("mode")
            .and_then(Value::as_str)
            .map(ToString::to_string),
        data: body.get("data").cloned(),
    }
}

pub fn setup_report(connected: bool, config: &DelegateConfig) -> DelegateSetupReport {
    if !connected {
        return DelegateSetupReport {
            valid: false,
            connected,
            missing_workflows: Vec::new(),
            message: format!("Cannot connect to workflow host at {}", config.base_url),
        };
    }

    let missing: Vec<DelegateAgentType> = DelegateAgentType::ALL
        .iter()
        .copied()
        .filter(|agent| !config.workflow_ids.contains_key(agent))
        .collect();

    let message = if missing.is_empty() {
        "Workflow host setup is valid".to_string()
    } else {
        let names: Vec<_> = missing.iter().map(|a| a.as_str()).collect();
        format!("Missing workflow IDs for: {}", names.join(", "))
    };

    DelegateSetupReport {
        valid: missing.is_empty(),
        connected,
        missing_workflows: missing,
        message,
    }
}

// ── Callback processing ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct CallbackRfpUpdates {
    #[serde(rename = "rfpId", alias = "rfp_id")]
    rfp_id: String,
    #[serde(default)]
    status: Option<RfpStatus>,
    #[serde(default)]
    products: Option<Vec<MatchedProduct>>,
    #[serde(default, alias = "matchScore")]
    match_score: Option<u32>,
    #[serde(default)]
    pricing: Option<Pricing>,
}

#[derive(Debug, Deserialize)]
struct CallbackReportData {
    #[serde(default, rename = "reportId", alias = "report_id")]
    report_id: Option<String>,
    #[serde(default, alias = "rfpId")]
    rfp_id: Option<String>,
    #[serde(default, alias = "userId")]
    user_id: Option<String>,
    #[serde(default, alias = "rfpName")]
    rfp_name: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    summary: Option<Value>,
    #[serde(default, alias = "matchScore")]
    match_score: Option<u32>,
    #[serde(default)]
    status: Option<ReportStatus>,
}

/// Applies a workflow host callback: closes the task, then best-effort
/// applies any RFP or report changes carried in `result`.
pub async fn process_callback(
    store: &dyn RecordStore,
    callback: WorkflowCallback,
) -> Result<AgentTaskRecord, DelegateError> {
    let task_id = callback
        .task_id
        .filter(|id| !id.trim().is_empty())
        .ok_or(DelegateError::MissingTaskId)?;

    let status = match callback.status {
        CallbackStatus::Success => TaskStatus::Completed,
        CallbackStatus::Failure => TaskStatus::Failed,
    };
    info!(task_id = %task_id, status = status.as_str(), execution_id = ?callback.execution_id, "processing delegate callback");

    let task = store
        .update_task(
            &task_id,
            TaskUpdate {
                status: Some(status),
                completed_at: Some(Utc::now()),
                result: callback.result.clone(),
                actions: callback.actions,
                delegate_execution_id: callback.execution_id,
            },
        )
        .await?;

    if let Some(result) = callback.result.as_ref() {
        if let Some(raw) = result.get("rfpUpdates") {
            apply_rfp_updates(store, raw).await;
        }
        if let Some(raw) = result.get("reportData") {
            apply_report_data(store, raw).await;
        }
    }

    Ok(task)
}

async fn apply_rfp_updates(store: &dyn RecordStore, raw: &Value) {
    let updates: CallbackRfpUpdates = match serde_json::from_value(raw.clone()) {
        Ok(updates) => updates,
        Err(e) => {
            warn!(error = %e, "ignoring malformed rfpUpdates");
            return;
        }
    };

    let update = RfpUpdate {
        status: updates.status,
        products: updates.products,
        match_score: updates.match_score,
        pricing: updates.pricing,
    };
    match store.update_rfp(&updates.rfp_id, update).await {
        Ok(()) => info!(rfp_id = %updates.rfp_id, "RFP updated from workflow"),
        Err(e) => error!(rfp_id = %updates.rfp_id, error = %e, "failed to update RFP from workflow"),
    }
}

async fn apply_report_data(store: &dyn RecordStore, raw: &Value) {
    let data: CallbackReportData = match serde_json::from_value(raw.clone()) {
        Ok(data) => data,
        Err(e) => {
            warn!(error = %e, "ignoring malformed reportData");
            return;
        }
    };

    if let Some(report_id) = data.report_id {
        let update = ReportUpdate {
            content: data.content,
            summary: data.summary,
            match_score: data.match_score,
            status: data.status,
        };
        match store.update_report(&report_id, update).await {
            Ok(()) => info!(report_id = %report_id, "report updated from workflow"),
            Err(e) => error!(report_id = %report_id, error = %e, "failed to update report from workflow"),
        }
        return;
    }

    let (Some(rfp_id), Some(user_id), Some(rfp_name), Some(content)) =
        (data.rfp_id, data.user_id, data.rfp_name, data.content)
    else {
        warn!("reportData without reportId needs rfp_id, user_id, rfp_name and content");
        return;
    };

    let report = NewReport {
        rfp_id,
        user_id,
        rfp_name,
        content,
        summary: data.summary,
        match_score: data.match_score,
        status: data.status.unwrap_or(ReportStatus::Completed),
    };
    match store.insert_report(report).await {
        Ok(report) => info!(report_id = %report.id, "report created from workflow"),
        Err(e) => error!(error = %e, "failed to create report from workflow"),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde_json::json;

    use super::*;

    fn config(webhook: Option<&str>) -> DelegateConfig {
        DelegateConfig {
            base_url: "http://localhost:5678/api/v1".to_string(),
            api_key: "test-key".to_string(),
            webhook_base_url: webhook.map(ToString::to_string),
            workflow_ids: BTreeMap::new(),
        }
    }

    #[test]
    fn test_disabled_without_webhook_base() {
        assert!(WorkflowDelegate::from_config(&config(None), "http://localhost:5000")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_urls() {
        let delegate = WorkflowDelegate::new(
            config(Some("http://localhost:5678/webhook/")),
            "http://localhost:5000/",
        )
        .unwrap();
        assert_eq!(
            delegate.webhook_url(DelegateAgentType::Pricing).unwrap(),
            "http://localhost:5678/webhook/pricing-agent"
        );
        assert_eq!(
            delegate.callback_url(),
            "http://localhost:5000/api/webhooks/n8n/callback"
        );
    }

    #[test]
    fn test_execution_status_mapping() {
        let done = execution_status_from("1", &json!({"id": 1, "finished": true, "stoppedAt": "t"}));
        assert_eq!(done.status, DelegateExecutionState::Completed);
        assert_eq!(done.id, "1");

        let stopped = execution_status_from("2", &json!({"finished": false, "stoppedAt": "t"}));
        assert_eq!(stopped.status, DelegateExecutionState::Failed);

        let running = execution_status_from("3", &json!({"startedAt": "t", "stoppedAt": null}));
        assert_eq!(running.status, DelegateExecutionState::Running);
        assert_eq!(running.started_at.as_deref(), Some("t"));
    }

    #[test]
    fn test_execution_id_from_reply() {
        assert_eq!(
            execution_id_from(&json!({"executionId": "abc"})).as_deref(),
            Some("abc")
        );
        assert_eq!(
            execution_id_from(&json!({"executionId": 42})).as_deref(),
            Some("42")
        );
        assert_eq!(execution_id_from(&json!({"message": "ok"})), None);
        assert_eq!(execution_id_from(&Value::Null), None);
    }

    #[test]
    fn test_setup_report_lists_missing_workflows() {
        let mut cfg = config(Some("http://localhost:5678/webhook"));
        cfg.workflow_ids
            .insert(DelegateAgentType::Sales, "wf-sales".to_string());
        cfg.workflow_ids
            .insert(DelegateAgentType::Master, "wf-master".to_string());

        let report = setup_report(true, &cfg);
        assert!(!report.valid);
        assert_eq!(
            report.missing_workflows,
            [
                DelegateAgentType::Technical,
                DelegateAgentType::Pricing,
                DelegateAgentType::Report
            ]
        );
        assert_eq!(
            report.message,
            "Missing workflow IDs for: technical, pricing, report"
        );

        let offline = setup_report(false, &cfg);
        assert!(!offline.valid);
        assert!(!offline.connected);
    }
}
