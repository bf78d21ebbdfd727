//! Communication stage: closes out the task record and marks the RFP submitted.
//!
//! Every write here is best effort. A failed write is logged and the stage
//! still reports delivery.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use tracing::{info, warn};

use shared_types::{
    ActionEntry, CommunicationOutput, RfpStatus, RfpUpdate, StageKind, TaskResultSnapshot,
    TaskStatus, TaskUpdate, WorkflowState,
};

use super::{ActionLog, StageAgent, StageError, StageOutput};
use crate::db::SharedRecordStore;

/// Flattens audit entries into the `"{agent}: {action}"` lines kept on the task.
pub fn flatten_actions<'a>(actions: impl IntoIterator<Item = &'a ActionEntry>) -> Vec<String> {
    actions
        .into_iter()
        .map(|a| format!("{}: {}", a.agent, a.action))
        .collect()
}

pub fn delivery_channels(email_notifications: bool) -> Vec<String> {
    let mut channels = vec!["database".to_string(), "system".to_string()];
    if email_notifications {
        channels.push("email".to_string());
    }
    channels
}

pub struct CommunicationAgent {
    store: SharedRecordStore,
    email_notifications: bool,
}

impl CommunicationAgent {
    pub fn new(store: SharedRecordStore, email_notifications: bool) -> Self {
        Self {
            store,
            email_notifications,
        }
    }

    async fn update_task(&self, task_id: &str, update: TaskUpdate, what: &str) {
        match self.store.update_task(task_id, update).await {
            Ok(_) => info!(task_id, what, "task updated"),
            Err(e) => warn!(task_id, what, error = %e, "failed to update task"),
        }
    }
}

#[async_trait]
impl StageAgent for CommunicationAgent {
    fn kind(&self) -> StageKind {
        StageKind::Communication
    }

    async fn run(
        &self,
        state: &WorkflowState,
        log: &mut ActionLog,
    ) -> Result<StageOutput, StageError> {
        log.record("Starting delivery process");

        let snapshot = TaskResultSnapshot::from_state(state);
        self.update_task(
            &state.task_id,
            TaskUpdate {
                status: Some(TaskStatus::Completed),
                completed_at: Some(Utc::now()),
                result: serde_json::to_value(&snapshot).ok(),
                ..Default::default()
            },
            "status",
        )
        .await;
        log.record("Task status updated");

        let actions = flatten_actions(state.actions.iter().chain(log.entries()));
        self.update_task(
            &state.task_id,
            TaskUpdate {
                actions: Some(actions),
                ..Default::default()
            },
            "actions",
        )
        .await;
        log.record("Actions logged");

        let update = RfpUpdate {
            status: Some(RfpStatus::Submitted),
            ..Default::default()
        };
        if let Err(e) = self.store.update_rfp(&state.rfp_id, update).await {
            warn!(rfp_id = %state.rfp_id, error = %e, "failed to mark RFP submitted");
        }
        log.record("RFP status updated to submitted");

        let channels = delivery_channels(self.email_notifications);
        log.record_with("Delivery completed", json!({ "channels": channels }));

        Ok(StageOutput::Communication(CommunicationOutput {
            delivered: true,
            delivery_channel: channels,
            notifications_sent: true,
        }))
    }
}
