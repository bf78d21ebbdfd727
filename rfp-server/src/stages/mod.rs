//! Pipeline stages.
//!
//! Each stage reads the workflow state, talks to its collaborators, and
//! returns a typed [`StageOutput`]. [`execute_stage`] folds that output (or
//! the failure) into a new state so stages never mutate state directly.

pub mod communication;
pub mod generation;
pub mod pricing;
pub mod sales;
pub mod technical;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};

use shared_types::{
    ActionEntry, AgentCursor, CommunicationOutput, GenerationOutput, Pricing, SalesOutput,
    StageErrorEntry, StageKind, TechnicalOutput, WorkflowState,
};

use crate::catalog::CatalogError;
use crate::db::StoreError;
use crate::model_gateway::ModelError;

pub use communication::CommunicationAgent;
pub use generation::GenerationAgent;
pub use pricing::PricingAgent;
pub use sales::SalesAgent;
pub use technical::TechnicalAgent;

#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error("{stage} requires '{field}' in state")]
    MissingInput {
        stage: StageKind,
        field: &'static str,
    },

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl StageError {
    pub fn missing(stage: StageKind, field: &'static str) -> Self {
        Self::MissingInput { stage, field }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StageOutput {
    Sales(SalesOutput),
    Technical(TechnicalOutput),
    /// Technical stage saw an unqualified RFP and skipped matching.
    NotQualified,
    Pricing(Pricing),
    Generation(GenerationOutput),
    Communication(CommunicationOutput),
}

impl StageOutput {
    /// Stage that owns this output slot.
    pub fn stage(&self) -> StageKind {
        match self {
            Self::Sales(_) => StageKind::Sales,
            Self::Technical(_) | Self::NotQualified => StageKind::Technical,
            Self::Pricing(_) => StageKind::Pricing,
            Self::Generation(_) => StageKind::Generation,
            Self::Communication(_) => StageKind::Communication,
        }
    }

    /// Cursor value once this output is applied.
    fn cursor_after(&self) -> AgentCursor {
        match self {
            Self::Sales(_) => AgentCursor::Stage(StageKind::Technical),
            Self::Technical(_) => AgentCursor::Stage(StageKind::Pricing),
            Self::NotQualified => AgentCursor::End,
            Self::Pricing(_) => AgentCursor::Stage(StageKind::Generation),
            Self::Generation(_) => AgentCursor::Stage(StageKind::Communication),
            Self::Communication(_) => AgentCursor::Completed,
        }
    }
}

/// Audit entries a stage collects during one run.
#[derive(Debug)]
pub struct ActionLog {
    stage: StageKind,
    rfp_id: String,
    entries: Vec<ActionEntry>,
}

impl ActionLog {
    pub fn new(stage: StageKind, rfp_id: impl Into<String>) -> Self {
        Self {
            stage,
            rfp_id: rfp_id.into(),
            entries: Vec::new(),
        }
    }

    pub fn record(&mut self, action: impl Into<String>) {
        self.push(action.into(), None);
    }

    pub fn record_with(&mut self, action: impl Into<String>, data: serde_json::Value) {
        self.push(action.into(), Some(data));
    }

    pub fn entries(&self) -> &[ActionEntry] {
        &self.entries
    }

    fn push(&mut self, action: String, data: Option<serde_json::Value>) {
        info!(
            stage = self.stage.as_str(),
            rfp_id = %self.rfp_id,
            data = ?data,
            "{action}"
        );
        self.entries.push(ActionEntry {
            agent: self.stage,
            action,
            timestamp: Utc::now(),
            data,
        });
    }

    fn into_entries(self) -> Vec<ActionEntry> {
        self.entries
    }
}

#[async_trait]
pub trait StageAgent: Send + Sync {
    fn kind(&self) -> StageKind;

    async fn run(
        &self,
        state: &WorkflowState,
        log: &mut ActionLog,
    ) -> Result<StageOutput, StageError>;
}

pub type SharedStageAgent = Arc<dyn StageAgent>;

/// Runs one stage and returns the next state.
///
/// On success the output lands in the stage's own slot, the stage is added to
/// `completed_agents`, and the cursor advances. On failure the error and a
/// failure action are appended and everything else is left as it was.
pub async fn execute_stage(agent: &dyn StageAgent, state: WorkflowState) -> WorkflowState {
    let kind = agent.kind();
    let mut log = ActionLog::new(kind, state.rfp_id.clone());
    let result = agent.run(&state, &mut log).await;

    let mut next = state;
    match result {
        Ok(output) if output.stage() == kind => {
            next.actions.extend(log.into_entries());
            next.current_agent = output.cursor_after();
            next.completed_agents.push(kind);
            match output {
                StageOutput::Sales(sales) => next.sales = Some(sales),
                StageOutput::Technical(technical) => next.technical = Some(technical),
                StageOutput::NotQualified => {}
                StageOutput::Pricing(pricing) => next.pricing = Some(pricing),
                StageOutput::Generation(generation) => next.generation = Some(generation),
                StageOutput::Communication(communication) => {
                    next.communication = Some(communication)
                }
            }
        }
        Ok(output) => {
            let message = format!("{kind} produced output owned by {}", output.stage());
            record_failure(&mut next, log, kind, message);
        }
        Err(err) => record_failure(&mut next, log, kind, err.to_string()),
    }
    next
}

fn record_failure(state: &mut WorkflowState, mut log: ActionLog, kind: StageKind, message: String) {
    error!(
        stage = kind.as_str(),
        rfp_id = %state.rfp_id,
        execution_id = %state.execution_id,
        error = %message,
        "stage failed"
    );
    log.record_with("Stage failed", json!({ "error": message }));
    state.actions.extend(log.into_entries());
    state.errors.push(StageErrorEntry {
        agent: kind,
        error: message,
        timestamp: Utc::now(),
    });
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::Utc;

    use shared_types::{RfpRecord, RfpStatus};

    use crate::model_gateway::{CompletionRequest, ModelError, ModelGateway};

    pub fn sample_rfp(specs: &[&str]) -> RfpRecord {
        RfpRecord {
            id: "rfp-1".to_string(),
            user_id: "user-1".to_string(),
            title: "Industrial Pump System RFP".to_string(),
            content: Some("Centrifugal pumps for a water treatment plant".to_string()),
            source: "ThomasNet".to_string(),
            source_url: None,
            status: RfpStatus::New,
            specs: specs.iter().map(|s| (*s).to_string()).collect(),
            products: vec![],
            pricing: None,
            match_score: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    /// Replies with queued answers in order, then with `fallback`.
    pub struct ScriptedModel {
        replies: Mutex<Vec<String>>,
        fallback: String,
        calls: AtomicUsize,
        pub seen: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedModel {
        pub fn new(replies: &[&str]) -> Self {
            Self {
                replies: Mutex::new(replies.iter().rev().map(|r| (*r).to_string()).collect()),
                fallback: "I'm not able to produce JSON right now.".to_string(),
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ModelGateway for ScriptedModel {
        async fn complete(&self, request: &CompletionRequest) -> Result<String, ModelError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(request.clone());
            Ok(self
                .replies
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| self.fallback.clone()))
        }

        fn model_id(&self) -> &str {
            "scripted"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::sample_rfp;
    use super::*;

    struct Fixed(Result<StageOutput, &'static str>, StageKind);

    #[async_trait]
    impl StageAgent for Fixed {
        fn kind(&self) -> StageKind {
            self.1
        }

        async fn run(
            &self,
            _state: &WorkflowState,
            log: &mut ActionLog,
        ) -> Result<StageOutput, StageError> {
            log.record("working");
            match &self.0 {
                Ok(output) => Ok(output.clone()),
                Err(field) => Err(StageError::missing(self.1, *field)),
            }
        }
    }

    fn state() -> WorkflowState {
        WorkflowState::new(sample_rfp(&[]), "user-1", "task-1", "exec_test")
    }

    #[tokio::test]
    async fn test_success_fills_own_slot_and_advances() {
        let output = StageOutput::Pricing(Pricing {
            unit_price: 1.0,
            quantity: 1,
            total_price: 1.0,
            discount: None,
            lead_time: "1 week".to_string(),
            breakdown: vec![],
        });
        let next = execute_stage(&Fixed(Ok(output), StageKind::Pricing), state()).await;
        assert!(next.pricing.is_some());
        assert_eq!(next.completed_agents, vec![StageKind::Pricing]);
        assert_eq!(
            next.current_agent,
            AgentCursor::Stage(StageKind::Generation)
        );
        assert_eq!(next.actions.len(), 1);
        assert!(next.errors.is_empty());
    }

    #[tokio::test]
    async fn test_failure_records_error_and_keeps_actions() {
        let before = state();
        let next = execute_stage(
            &Fixed(Err("pricing"), StageKind::Generation),
            before.clone(),
        )
        .await;
        assert!(next.generation.is_none());
        assert!(next.completed_agents.is_empty());
        assert_eq!(next.current_agent, before.current_agent);
        assert_eq!(next.errors.len(), 1);
        assert_eq!(
            next.errors[0].error,
            "Generation Agent requires 'pricing' in state"
        );
        let actions: Vec<_> = next.actions.iter().map(|a| a.action.as_str()).collect();
        assert_eq!(actions, ["working", "Stage failed"]);
    }

    #[tokio::test]
    async fn test_output_for_foreign_slot_is_rejected() {
        let output = StageOutput::NotQualified;
        let next = execute_stage(&Fixed(Ok(output), StageKind::Sales), state()).await;
        assert!(next.sales.is_none());
        assert!(next.technical.is_none());
        assert_eq!(next.errors.len(), 1);
        assert!(next.completed_agents.is_empty());
    }

    #[tokio::test]
    async fn test_not_qualified_routes_to_end() {
        let next = execute_stage(
            &Fixed(Ok(StageOutput::NotQualified), StageKind::Technical),
            state(),
        )
        .await;
        assert_eq!(next.current_agent, AgentCursor::End);
        assert_eq!(next.completed_agents, vec![StageKind::Technical]);
        assert!(next.technical.is_none());
    }
}
