//! Generation stage: drafts the proposal and stores it as a report.

use async_trait::async_trait;
use serde_json::json;
use tracing::info;

use shared_types::{
    GenerationOutput, NewReport, Pricing, ProposalSummary, ReportStatus, StageKind, WorkflowState,
};

use super::{ActionLog, StageAgent, StageError, StageOutput};
use crate::db::SharedRecordStore;
use crate::model_gateway::{AnswerKind, CompletionRequest, ModelError, SharedModelGateway};
use crate::stages::sales::DEFAULT_RFP_TYPE;

const PROPOSAL_SYSTEM: &str = "You are an expert proposal writer. Create a professional RFP response document.

The proposal should include:
1. Executive Summary
2. Technical Compliance
3. Product Specifications
4. Pricing Breakdown
5. Delivery Timeline
6. Terms and Conditions

Write in a professional, persuasive tone that highlights our competitive advantages.";

const PROPOSAL_USER: &str = "RFP Details:
Title: {title}
Type: {rfp_type}
Source: {source}

Requirements:
{requirements}

Matched Products:
{products}

Pricing:
- Unit Price: ${unit_price}
- Quantity: {quantity}
- Total: ${total_price}
- Lead Time: {lead_time}

Generate a comprehensive RFP response proposal.";

pub fn build_summary(state: &WorkflowState, pricing: &Pricing) -> ProposalSummary {
    let client_name = if state.rfp.source.trim().is_empty() {
        "Client".to_string()
    } else {
        state.rfp.source.clone()
    };

    ProposalSummary {
        client_name,
        total_value: pricing.total_price,
        products: state
            .matched_products()
            .iter()
            .map(|p| format!("{}: {}", p.sku, p.name))
            .collect(),
        delivery_timeline: pricing.lead_time.clone(),
        key_highlights: vec![
            format!("{}% specification match", state.overall_match_score()),
            "Competitive pricing with volume discounts".to_string(),
            format!("Delivery in {}", pricing.lead_time),
            "Full technical compliance".to_string(),
            "Extended warranty included".to_string(),
        ],
    }
}

pub struct GenerationAgent {
    model: SharedModelGateway,
    store: SharedRecordStore,
}

impl GenerationAgent {
    pub fn new(model: SharedModelGateway, store: SharedRecordStore) -> Self {
        Self { model, store }
    }

    pub async fn draft_proposal(
        &self,
        state: &WorkflowState,
        pricing: &Pricing,
    ) -> Result<String, ModelError> {
        let products = state
            .matched_products()
            .iter()
            .map(|p| format!("{} (SKU: {}) - Compatibility: {}%", p.name, p.sku, p.compatibility))
            .collect::<Vec<_>>()
            .join("\n");

        let request = CompletionRequest::new(PROPOSAL_SYSTEM, PROPOSAL_USER)
            .var("title", state.rfp.title.as_str())
            .var("rfp_type", state.rfp_type().unwrap_or(DEFAULT_RFP_TYPE))
            .var("source", state.rfp.source.as_str())
            .var("requirements", state.extracted_requirements().join("\n"))
            .var("products", products)
            .var("unit_price", pricing.unit_price.to_string())
            .var("quantity", pricing.quantity.to_string())
            .var("total_price", pricing.total_price.to_string())
            .var("lead_time", pricing.lead_time.as_str())
            .temperature(0.7)
            .kind(AnswerKind::Prose);

        self.model.complete(&request).await
    }
}

#[async_trait]
impl StageAgent for GenerationAgent {
    fn kind(&self) -> StageKind {
        StageKind::Generation
    }

    async fn run(
        &self,
        state: &WorkflowState,
        log: &mut ActionLog,
    ) -> Result<StageOutput, StageError> {
        if state.matched_products().is_empty() {
            return Err(StageError::missing(
                StageKind::Generation,
                "matched_products",
            ));
        }
        let pricing = state
            .pricing
            .as_ref()
            .ok_or_else(|| StageError::missing(StageKind::Generation, "pricing"))?;

        log.record("Starting document generation");

        let document = self.draft_proposal(state, pricing).await?;
        log.record("Proposal content generated");

        let summary = build_summary(state, pricing);
        log.record("Summary created");

        let report = self
            .store
            .insert_report(NewReport {
                rfp_id: state.rfp_id.clone(),
                user_id: state.user_id.clone(),
                rfp_name: format!("{} - Response", state.rfp.title),
                content: document.clone(),
                summary: serde_json::to_value(&summary).ok(),
                match_score: Some(state.overall_match_score()),
                status: ReportStatus::Completed,
            })
            .await?;
        info!(rfp_id = %state.rfp_id, report_id = %report.id, "report saved");
        log.record_with("Report saved to database", json!({ "reportId": report.id }));

        Ok(StageOutput::Generation(GenerationOutput {
            generated_document: document,
            report_id: report.id,
            summary,
        }))
    }
}
