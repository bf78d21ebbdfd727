use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::FutureExt;
use serde_json::json;
use tokio::task::JoinHandle;

use shared_types::{TaskStatus, TaskUpdate};

use crate::db::{RecordStore, SharedRecordStore};
use crate::delegate::WorkflowDelegate;
use crate::orchestrator::Orchestrator;

pub struct AppState {
    store: SharedRecordStore,
    orchestrator: Arc<Orchestrator>,
    delegate: Option<Arc<WorkflowDelegate>>,
    callback_base_url: String,
    started_at: Instant,
}

impl AppState {
    pub fn new(
        store: SharedRecordStore,
        orchestrator: Orchestrator,
        delegate: Option<WorkflowDelegate>,
        callback_base_url: impl Into<String>,
    ) -> Self {
        Self {
            store,
            orchestrator: Arc::new(orchestrator),
            delegate: delegate.map(Arc::new),
            callback_base_url: callback_base_url.into().trim_end_matches('/').to_string(),
            started_at: Instant::now(),
        }
    }

    pub fn store(&self) -> SharedRecordStore {
        self.store.clone()
    }

    pub fn delegate(&self) -> Option<Arc<WorkflowDelegate>> {
        self.delegate.clone()
    }

    pub fn callback_base_url(&self) -> &str {
        &self.callback_base_url
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    /// Runs the pipeline in the background. The HTTP caller only gets the
    /// task id; progress is read back from the task record.
    ///
    /// Stage failures are folded into the workflow state by the orchestrator.
    /// A run that cannot start, or that panics, leaves the task `failed`.
    pub fn spawn_run(&self, rfp_id: String, user_id: String, task_id: String) -> JoinHandle<()> {
        let orchestrator = self.orchestrator.clone();
        let store = self.store.clone();

        tokio::spawn(async move {
            let outcome = AssertUnwindSafe(orchestrator.run(&rfp_id, &user_id, &task_id))
                .catch_unwind()
                .await;

            let failure = match outcome {
                Ok(Ok(state)) => {
                    tracing::info!(
                        task_id = %task_id,
                        execution_id = %state.execution_id,
                        delivered = state.delivered(),
                        "workflow run finished"
                    );
                    return;
                }
                Ok(Err(e)) => e.to_string(),
                Err(_) => "workflow run panicked".to_string(),
            };

            tracing::error!(task_id = %task_id, rfp_id = %rfp_id, error = %failure, "workflow run failed");
            let update = TaskUpdate {
                status: Some(TaskStatus::Failed),
                completed_at: Some(Utc::now()),
                result: Some(json!({ "error": failure })),
                ..Default::default()
            };
            if let Err(e) = store.update_task(&task_id, update).await {
                tracing::error!(task_id = %task_id, error = %e, "failed to mark task failed");
            }
        })
    }
}
