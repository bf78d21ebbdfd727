//! Runs the stage pipeline for one RFP.
//!
//! `sales → technical → {pricing → generation → communication} | end`

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use shared_types::{
    AgentCursor, StageKind, TaskResultSnapshot, TaskStatus, TaskUpdate, WorkflowState,
};

use crate::catalog::SharedProductCatalog;
use crate::db::{RecordStore, SharedRecordStore, StoreError};
use crate::model_gateway::SharedModelGateway;
use crate::stages::communication::flatten_actions;
use crate::stages::{
    execute_stage, CommunicationAgent, GenerationAgent, PricingAgent, SalesAgent,
    SharedStageAgent, TechnicalAgent,
};

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("RFP '{0}' not found")]
    RfpNotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Default)]
pub struct PipelineSettings {
    pub email_notifications: bool,
}

/// The five stage agents, one per slot.
#[derive(Clone)]
pub struct Pipeline {
    sales: SharedStageAgent,
    technical: SharedStageAgent,
    pricing: SharedStageAgent,
    generation: SharedStageAgent,
    communication: SharedStageAgent,
}

impl Pipeline {
    pub fn new(
        sales: SharedStageAgent,
        technical: SharedStageAgent,
        pricing: SharedStageAgent,
        generation: SharedStageAgent,
        communication: SharedStageAgent,
    ) -> Self {
        Self {
            sales,
            technical,
            pricing,
            generation,
            communication,
        }
    }

    pub fn standard(
        store: SharedRecordStore,
        model: SharedModelGateway,
        catalog: SharedProductCatalog,
        settings: &PipelineSettings,
    ) -> Self {
        Self::new(
            Arc::new(SalesAgent::new(model.clone())),
            Arc::new(TechnicalAgent::new(model.clone(), catalog, store.clone())),
            Arc::new(PricingAgent::new(model.clone(), store.clone())),
            Arc::new(GenerationAgent::new(model, store.clone())),
            Arc::new(CommunicationAgent::new(store, settings.email_notifications)),
        )
    }

    fn agent(&self, kind: StageKind) -> &SharedStageAgent {
        match kind {
            StageKind::Sales => &self.sales,
            StageKind::Technical => &self.technical,
            StageKind::Pricing => &self.pricing,
            StageKind::Generation => &self.generation,
            StageKind::Communication => &self.communication,
        }
    }
}

/// Stage to run after `completed`, or `None` to stop.
///
/// The only conditional edge is the qualification gate after Technical.
/// Soft failures recorded in `state.errors` never block advancement.
pub fn next_stage(completed: StageKind, state: &WorkflowState) -> Option<StageKind> {
    match completed {
        StageKind::Sales => Some(StageKind::Technical),
        StageKind::Technical => {
            if state.qualified() && !state.matched_products().is_empty() {
                Some(StageKind::Pricing)
            } else {
                None
            }
        }
        StageKind::Pricing => Some(StageKind::Generation),
        StageKind::Generation => Some(StageKind::Communication),
        StageKind::Communication => None,
    }
}

/// `exec_` followed by a lowercase ULID.
pub fn generate_execution_id() -> String {
    format!("exec_{}", ulid::Ulid::new().to_string().to_lowercase())
}

pub struct Orchestrator {
    store: SharedRecordStore,
    pipeline: Pipeline,
}

impl Orchestrator {
    pub fn new(store: SharedRecordStore, pipeline: Pipeline) -> Self {
        Self { store, pipeline }
    }

    /// Runs every applicable stage in order and returns the final state.
    ///
    /// Only loading the RFP can fail; stage failures are recorded in the
    /// returned state.
    pub async fn run(
        &self,
        rfp_id: &str,
        user_id: &str,
        task_id: &str,
    ) -> Result<WorkflowState, OrchestratorError> {
        let rfp = self
            .store
            .get_rfp(rfp_id)
            .await?
            .ok_or_else(|| OrchestratorError::RfpNotFound(rfp_id.to_string()))?;

        let mut state = WorkflowState::new(rfp, user_id, task_id, generate_execution_id());
        info!(
            rfp_id,
            task_id,
            execution_id = %state.execution_id,
            title = %state.rfp.title,
            "starting RFP workflow"
        );

        let mut next = Some(StageKind::Sales);
        while let Some(kind) = next {
            state.current_agent = AgentCursor::Stage(kind);
            let errors_before = state.errors.len();
            state = execute_stage(self.pipeline.agent(kind).as_ref(), state).await;
            if state.errors.len() > errors_before {
                warn!(
                    execution_id = %state.execution_id,
                    stage = kind.as_str(),
                    "stage failed, continuing"
                );
            }
            next = next_stage(kind, &state);
        }

        if !state.current_agent.is_terminal() {
            state.current_agent = AgentCursor::End;
        }
        if state.communication.is_none() {
            self.close_task(&state).await;
        }

        info!(
            execution_id = %state.execution_id,
            qualified = state.qualified(),
            report_id = state.report_id().unwrap_or("-"),
            errors = state.errors.len(),
            completed = state.completed_agents.len(),
            "RFP workflow finished"
        );
        Ok(state)
    }

    /// Settles the task of a run that ended before Communication could.
    /// Clean early exits (unqualified, no matches) are `completed`; runs that
    /// recorded stage errors are `failed`.
    async fn close_task(&self, state: &WorkflowState) {
        let status = if state.errors.is_empty() {
            TaskStatus::Completed
        } else {
            TaskStatus::Failed
        };
        let update = TaskUpdate {
            status: Some(status),
            completed_at: Some(Utc::now()),
            result: serde_json::to_value(TaskResultSnapshot::from_state(state)).ok(),
            actions: Some(flatten_actions(&state.actions)),
            delegate_execution_id: None,
        };
        match self.store.update_task(&state.task_id, update).await {
            Ok(_) => info!(
                task_id = %state.task_id,
                status = status.as_str(),
                "task closed after early stop"
            ),
            Err(e) => warn!(task_id = %state.task_id, error = %e, "failed to close task"),
        }
    }
}
