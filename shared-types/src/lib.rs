//! Shared types for the RFP pipeline
//!
//! These types are used by:
//! - the pipeline stages and orchestrator (native Rust)
//! - the HTTP API and any dashboard client consuming it
//!
//! Serializable with serde for JSON over HTTP and for JSON columns in the
//! record store.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Stage Identity
// ============================================================================

/// One unit of the fixed five-step pipeline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Sales,
    Technical,
    Pricing,
    Generation,
    Communication,
}

impl StageKind {
    /// Stage execution order of a full run.
    pub const PIPELINE: [StageKind; 5] = [
        StageKind::Sales,
        StageKind::Technical,
        StageKind::Pricing,
        StageKind::Generation,
        StageKind::Communication,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sales => "sales",
            Self::Technical => "technical",
            Self::Pricing => "pricing",
            Self::Generation => "generation",
            Self::Communication => "communication",
        }
    }

    /// Human-facing agent name used in audit trails.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Sales => "Sales Agent",
            Self::Technical => "Technical Agent",
            Self::Pricing => "Pricing Agent",
            Self::Generation => "Generation Agent",
            Self::Communication => "Communication Agent",
        }
    }
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Where a run currently points: a stage still to run, or a terminal sentinel.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AgentCursor {
    Stage(StageKind),
    /// Stopped after the qualification gate, or a stage routed straight to the end.
    End,
    /// Communication finished its bookkeeping.
    Completed,
}

impl AgentCursor {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Stage(_))
    }
}

// ============================================================================
// Catalog & Stage Outputs
// ============================================================================

/// Catalog entry offered to the product matcher.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    pub sku: String,
    pub name: String,
    pub description: String,
    pub category: String,
    #[serde(default)]
    pub specifications: BTreeMap<String, String>,
}

/// A catalog product scored against the extracted requirements.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MatchedProduct {
    pub sku: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub similarity_score: f64,
    pub compatibility: f64,
    #[serde(default)]
    pub matched_requirements: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PricingLine {
    pub item: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    pub quantity: u32,
    pub unit_price: f64,
    pub total: f64,
}

/// Price quote for the matched products. `discount` is a percentage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Pricing {
    pub unit_price: f64,
    pub quantity: u32,
    pub total_price: f64,
    #[serde(default)]
    pub discount: Option<f64>,
    pub lead_time: String,
    #[serde(default)]
    pub breakdown: Vec<PricingLine>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SalesOutput {
    pub qualified: bool,
    pub qualification_score: u32,
    pub qualification_reason: String,
    pub extracted_requirements: Vec<String>,
    pub rfp_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TechnicalOutput {
    pub matched_products: Vec<MatchedProduct>,
    pub overall_match_score: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProposalSummary {
    pub client_name: String,
    pub total_value: f64,
    pub products: Vec<String>,
    pub delivery_timeline: String,
    pub key_highlights: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationOutput {
    pub generated_document: String,
    pub report_id: String,
    pub summary: ProposalSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommunicationOutput {
    pub delivered: bool,
    pub delivery_channel: Vec<String>,
    pub notifications_sent: bool,
}

// ============================================================================
// Workflow State
// ============================================================================

/// Audit log entry appended by a stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionEntry {
    pub agent: StageKind,
    pub action: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Soft failure recorded by a stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StageErrorEntry {
    pub agent: StageKind,
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

/// The accumulating record threaded through all stages for one RFP run.
///
/// Each stage owns exactly one of the `Option` output slots; a slot stays
/// `None` when its stage failed or never ran.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowState {
    pub rfp_id: String,
    pub user_id: String,
    pub task_id: String,
    pub execution_id: String,
    pub start_time: DateTime<Utc>,

    /// Snapshot of the RFP record taken when the run started.
    pub rfp: RfpRecord,

    pub sales: Option<SalesOutput>,
    pub technical: Option<TechnicalOutput>,
    pub pricing: Option<Pricing>,
    pub generation: Option<GenerationOutput>,
    pub communication: Option<CommunicationOutput>,

    pub current_agent: AgentCursor,
    pub completed_agents: Vec<StageKind>,
    pub errors: Vec<StageErrorEntry>,
    pub actions: Vec<ActionEntry>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl WorkflowState {
    pub fn new(
        rfp: RfpRecord,
        user_id: impl Into<String>,
        task_id: impl Into<String>,
        execution_id: impl Into<String>,
    ) -> Self {
        Self {
            rfp_id: rfp.id.clone(),
            user_id: user_id.into(),
            task_id: task_id.into(),
            execution_id: execution_id.into(),
            start_time: Utc::now(),
            rfp,
            sales: None,
            technical: None,
            pricing: None,
            generation: None,
            communication: None,
            current_agent: AgentCursor::Stage(StageKind::Sales),
            completed_agents: Vec::new(),
            errors: Vec::new(),
            actions: Vec::new(),
            metadata: serde_json::Map::new(),
        }
    }

    pub fn qualified(&self) -> bool {
        self.sales.as_ref().map(|s| s.qualified).unwrap_or(false)
    }

    pub fn qualification_score(&self) -> Option<u32> {
        self.sales.as_ref().map(|s| s.qualification_score)
    }

    pub fn extracted_requirements(&self) -> &[String] {
        self.sales
            .as_ref()
            .map(|s| s.extracted_requirements.as_slice())
            .unwrap_or(&[])
    }

    pub fn rfp_type(&self) -> Option<&str> {
        self.sales.as_ref().map(|s| s.rfp_type.as_str())
    }

    pub fn matched_products(&self) -> &[MatchedProduct] {
        self.technical
            .as_ref()
            .map(|t| t.matched_products.as_slice())
            .unwrap_or(&[])
    }

    pub fn overall_match_score(&self) -> u32 {
        self.technical
            .as_ref()
            .map(|t| t.overall_match_score)
            .unwrap_or(0)
    }

    pub fn report_id(&self) -> Option<&str> {
        self.generation.as_ref().map(|g| g.report_id.as_str())
    }

    pub fn generated_document(&self) -> Option<&str> {
        self.generation
            .as_ref()
            .map(|g| g.generated_document.as_str())
    }

    pub fn delivered(&self) -> bool {
        self.communication
            .as_ref()
            .map(|c| c.delivered)
            .unwrap_or(false)
    }

    pub fn is_terminal(&self) -> bool {
        self.current_agent.is_terminal()
    }
}

// ============================================================================
// Record Store Entities
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RfpStatus {
    New,
    Processing,
    Processed,
    Submitted,
    Rejected,
}

impl RfpStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Processing => "processing",
            Self::Processed => "processed",
            Self::Submitted => "submitted",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "new" => Some(Self::New),
            "processing" => Some(Self::Processing),
            "processed" => Some(Self::Processed),
            "submitted" => Some(Self::Submitted),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Draft,
    Completed,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(Self::Draft),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RfpRecord {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub content: Option<String>,
    pub source: String,
    pub source_url: Option<String>,
    pub status: RfpStatus,
    #[serde(default)]
    pub specs: Vec<String>,
    #[serde(default)]
    pub products: Vec<MatchedProduct>,
    pub pricing: Option<Pricing>,
    pub match_score: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for inserting an RFP.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewRfp {
    pub user_id: String,
    pub title: String,
    pub content: Option<String>,
    pub source: String,
    pub source_url: Option<String>,
    #[serde(default)]
    pub specs: Vec<String>,
}

/// Partial RFP update; `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RfpUpdate {
    pub status: Option<RfpStatus>,
    pub products: Option<Vec<MatchedProduct>>,
    pub match_score: Option<u32>,
    pub pricing: Option<Pricing>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentTaskRecord {
    pub id: String,
    pub agent_id: Option<String>,
    pub rfp_id: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub actions: Vec<String>,
    pub result: Option<serde_json::Value>,
    pub delegate_execution_id: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewTask {
    pub agent_id: Option<String>,
    pub rfp_id: String,
    pub status: TaskStatus,
}

/// Partial task update; `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TaskUpdate {
    pub status: Option<TaskStatus>,
    pub completed_at: Option<DateTime<Utc>>,
    pub result: Option<serde_json::Value>,
    pub actions: Option<Vec<String>>,
    pub delegate_execution_id: Option<String>,
}

/// Result snapshot written onto the task when a run finishes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskResultSnapshot {
    pub qualified: bool,
    pub qualification_score: Option<u32>,
    pub matched_products: usize,
    pub overall_match_score: u32,
    pub pricing: Option<Pricing>,
    pub report_id: Option<String>,
}

impl TaskResultSnapshot {
    pub fn from_state(state: &WorkflowState) -> Self {
        Self {
            qualified: state.qualified(),
            qualification_score: state.qualification_score(),
            matched_products: state.matched_products().len(),
            overall_match_score: state.overall_match_score(),
            pricing: state.pricing.clone(),
            report_id: state.report_id().map(ToString::to_string),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportRecord {
    pub id: String,
    pub rfp_id: String,
    pub user_id: String,
    pub rfp_name: String,
    pub content: String,
    pub summary: Option<serde_json::Value>,
    pub match_score: Option<u32>,
    pub status: ReportStatus,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewReport {
    pub rfp_id: String,
    pub user_id: String,
    pub rfp_name: String,
    pub content: String,
    pub summary: Option<serde_json::Value>,
    pub match_score: Option<u32>,
    pub status: ReportStatus,
}

/// Partial report update; `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ReportUpdate {
    pub content: Option<String>,
    pub summary: Option<serde_json::Value>,
    pub match_score: Option<u32>,
    pub status: Option<ReportStatus>,
}

// ============================================================================
// Delegate Path
// ============================================================================

/// Agent types an external workflow host can run on our behalf.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DelegateAgentType {
    Sales,
    Technical,
    Pricing,
    Report,
    Master,
}

impl DelegateAgentType {
    pub const ALL: [DelegateAgentType; 5] = [
        DelegateAgentType::Sales,
        DelegateAgentType::Technical,
        DelegateAgentType::Pricing,
        DelegateAgentType::Report,
        DelegateAgentType::Master,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sales => "sales",
            Self::Technical => "technical",
            Self::Pricing => "pricing",
            Self::Report => "report",
            Self::Master => "master",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Sales => "Sales Agent",
            Self::Technical => "Technical Agent",
            Self::Pricing => "Pricing Agent",
            Self::Report => "Report Agent",
            Self::Master => "Master Agent",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DelegateRfp {
    pub id: String,
    pub title: String,
    pub source: String,
    pub source_url: Option<String>,
    pub specs: Vec<String>,
    pub products: Vec<MatchedProduct>,
    pub pricing: serde_json::Value,
    pub match_score: Option<u32>,
}

impl From<&RfpRecord> for DelegateRfp {
    fn from(rfp: &RfpRecord) -> Self {
        Self {
            id: rfp.id.clone(),
            title: rfp.title.clone(),
            source: rfp.source.clone(),
            source_url: rfp.source_url.clone(),
            specs: rfp.specs.clone(),
            products: rfp.products.clone(),
            pricing: rfp
                .pricing
                .as_ref()
                .and_then(|p| serde_json::to_value(p).ok())
                .unwrap_or_else(|| serde_json::json!({})),
            match_score: rfp.match_score,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DelegateAgent {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub agent_type: DelegateAgentType,
}

/// Payload POSTed to the external workflow host.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DelegateTriggerPayload {
    pub task_id: String,
    pub agent_type: DelegateAgentType,
    pub rfp: DelegateRfp,
    pub agent: DelegateAgent,
    pub callback_url: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DelegateTriggerResponse {
    pub success: bool,
    pub execution_id: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CallbackStatus {
    Success,
    Failure,
}

/// Callback body the external workflow host sends when it finishes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowCallback {
    #[serde(default)]
    pub task_id: Option<String>,
    pub status: CallbackStatus,
    #[serde(default)]
    pub execution_id: Option<String>,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub actions: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DelegateExecutionState {
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DelegateExecutionStatus {
    pub id: String,
    pub status: DelegateExecutionState,
    pub started_at: Option<String>,
    pub stopped_at: Option<String>,
    pub mode: Option<String>,
    pub data: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DelegateSetupReport {
    pub valid: bool,
    pub connected: bool,
    pub missing_workflows: Vec<DelegateAgentType>,
    pub message: String,
}

// ============================================================================
// API Types
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteAgentRequest {
    pub rfp_id: String,
    pub user_id: String,
    #[serde(default)]
    pub agent_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteAgentResponse {
    pub message: String,
    pub task: AgentTaskRecord,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelegateRequest {
    pub rfp_id: String,
    pub user_id: String,
    pub agent_type: DelegateAgentType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelegateResponse {
    pub task: AgentTaskRecord,
    pub trigger: DelegateTriggerResponse,
}

/// Machine-readable API error body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_rfp() -> RfpRecord {
        RfpRecord {
            id: "rfp-1".to_string(),
            user_id: "user-1".to_string(),
            title: "Industrial Pump System RFP".to_string(),
            content: Some("pump system, 500 GPM, stainless steel".to_string()),
            source: "ThomasNet".to_string(),
            source_url: None,
            status: RfpStatus::New,
            specs: vec![],
            products: vec![],
            pricing: None,
            match_score: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_new_state_starts_at_sales() {
        let state = WorkflowState::new(sample_rfp(), "user-1", "task-1", "exec_1");
        assert_eq!(state.rfp_id, "rfp-1");
        assert_eq!(state.current_agent, AgentCursor::Stage(StageKind::Sales));
        assert!(state.completed_agents.is_empty());
        assert!(!state.qualified());
        assert_eq!(state.overall_match_score(), 0);
        assert!(state.extracted_requirements().is_empty());
        assert!(!state.is_terminal());
    }

    #[test]
    fn test_stage_kind_names() {
        assert_eq!(StageKind::Sales.display_name(), "Sales Agent");
        assert_eq!(StageKind::Communication.to_string(), "Communication Agent");
        let json = serde_json::to_string(&StageKind::Technical).unwrap();
        assert_eq!(json, "\"technical\"");
    }

    #[test]
    fn test_agent_cursor_serialization() {
        let end = serde_json::to_value(AgentCursor::End).unwrap();
        assert_eq!(end, serde_json::json!("end"));
        let stage = serde_json::to_value(AgentCursor::Stage(StageKind::Pricing)).unwrap();
        assert_eq!(stage, serde_json::json!({"stage": "pricing"}));
        assert!(AgentCursor::Completed.is_terminal());
    }

    #[test]
    fn test_matched_product_accepts_sparse_seed_shape() {
        let product: MatchedProduct = serde_json::from_value(serde_json::json!({
            "sku": "SKU-P2847",
            "name": "Industrial Centrifugal Pump - Heavy Duty",
            "compatibility": 94
        }))
        .unwrap();
        assert_eq!(product.compatibility, 94.0);
        assert!(product.description.is_empty());
        assert!(product.matched_requirements.is_empty());
    }

    #[test]
    fn test_pricing_uses_camel_case_keys() {
        let pricing = Pricing {
            unit_price: 2847.0,
            quantity: 500,
            total_price: 1_209_975.0,
            discount: Some(15.0),
            lead_time: "12-14 weeks".to_string(),
            breakdown: vec![],
        };
        let json = serde_json::to_value(&pricing).unwrap();
        assert_eq!(json["unitPrice"], 2847.0);
        assert_eq!(json["leadTime"], "12-14 weeks");
    }

    #[test]
    fn test_callback_status_parses_lowercase() {
        let callback: WorkflowCallback = serde_json::from_value(serde_json::json!({
            "taskId": "task-9",
            "status": "failure",
            "executionId": "42"
        }))
        .unwrap();
        assert_eq!(callback.status, CallbackStatus::Failure);
        assert_eq!(callback.task_id.as_deref(), Some("task-9"));
        assert!(callback.result.is_none());
    }

    #[test]
    fn test_status_string_round_trip() {
        for status in [
            TaskStatus::Pending,
            TaskStatus::Running,
            TaskStatus::Completed,
            TaskStatus::Failed,
        ] {
            assert_eq!(TaskStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(RfpStatus::parse("submitted"), Some(RfpStatus::Submitted));
        assert_eq!(RfpStatus::parse("bogus"), None);
    }

    #[test]
    fn test_result_snapshot_from_partial_state() {
        let state = WorkflowState::new(sample_rfp(), "user-1", "task-1", "exec_1");
        let snapshot = TaskResultSnapshot::from_state(&state);
        assert!(!snapshot.qualified);
        assert_eq!(snapshot.matched_products, 0);
        assert!(snapshot.report_id.is_none());
    }

    #[test]
    fn test_delegate_rfp_defaults_pricing_to_empty_object() {
        let rfp = DelegateRfp::from(&sample_rfp());
        assert_eq!(rfp.pricing, serde_json::json!({}));
        assert_eq!(rfp.title, "Industrial Pump System RFP");
    }
}
