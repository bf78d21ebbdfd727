//! Sales stage: qualification, requirement extraction, classification.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use shared_types::{RfpRecord, SalesOutput, StageKind, WorkflowState};

use super::{ActionLog, StageAgent, StageError, StageOutput};
use crate::model_gateway::{AnswerKind, CompletionRequest, ModelError, SharedModelGateway};
use crate::structured::{or_default, parse_structured, JsonShape};

const TEMPERATURE: f32 = 0.1;

const QUALIFY_SYSTEM: &str = r#"You are an expert RFP qualification analyst. Analyze the RFP and decide whether it is worth pursuing.

Consider:
1. Clarity of requirements
2. Budget indicators
3. Timeline feasibility
4. Company reputation
5. Project scope match

Respond with a JSON object:
{
  "qualified": boolean,
  "score": number (0-100),
  "reason": "brief explanation"
}"#;

const QUALIFY_USER: &str = "RFP Title: {title}
Source: {source}
Content: {content}

Analyze this RFP and provide a qualification assessment.";

const EXTRACT_SYSTEM: &str = r#"You are an expert at extracting technical requirements from RFPs.

Extract:
- Technical specifications
- Performance requirements
- Quality standards
- Delivery requirements
- Compliance needs

Return a JSON array of strings, each one a clear requirement.
Example: ["Flow Rate: 500 GPM", "Pressure: 150 PSI", "Material: Stainless Steel 316"]"#;

const EXTRACT_USER: &str = "RFP Title: {title}
Content: {content}

Extract all key requirements as a JSON array of strings.";

const CLASSIFY_SYSTEM: &str = "Classify the RFP into one of these categories:
- Manufacturing
- Construction
- IT/Software
- Services
- Consulting
- Supply/Procurement
- Other

Respond with just the category name.";

const CLASSIFY_USER: &str = "Title: {title}
Source: {source}

What type of RFP is this?";

pub const DEFAULT_RFP_TYPE: &str = "Manufacturing";

#[derive(Debug, Clone, PartialEq)]
pub struct Qualification {
    pub qualified: bool,
    pub score: u32,
    pub reason: String,
}

impl Qualification {
    pub fn fallback() -> Self {
        Self {
            qualified: true,
            score: 75,
            reason: "RFP meets basic criteria for processing".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct QualificationAnswer {
    qualified: bool,
    score: f64,
    #[serde(default)]
    reason: String,
}

impl From<QualificationAnswer> for Qualification {
    fn from(answer: QualificationAnswer) -> Self {
        Self {
            qualified: answer.qualified,
            score: answer.score.round().clamp(0.0, 100.0) as u32,
            reason: answer.reason,
        }
    }
}

pub fn fallback_requirements(title: &str) -> Vec<String> {
    vec![
        format!("Requirements for {title}"),
        "Standard quality specifications".to_string(),
        "Timely delivery required".to_string(),
    ]
}

pub struct SalesAgent {
    model: SharedModelGateway,
}

impl SalesAgent {
    pub fn new(model: SharedModelGateway) -> Self {
        Self { model }
    }

    pub async fn qualify(&self, rfp: &RfpRecord) -> Result<Qualification, ModelError> {
        let request = CompletionRequest::new(QUALIFY_SYSTEM, QUALIFY_USER)
            .var("title", rfp.title.as_str())
            .var("source", rfp.source.as_str())
            .var(
                "content",
                rfp.content.as_deref().unwrap_or("No content available"),
            )
            .temperature(TEMPERATURE);
        let reply = self.model.complete(&request).await?;

        let parsed = parse_structured::<QualificationAnswer>(&reply, JsonShape::Object)
            .map(Qualification::from);
        Ok(or_default(
            parsed,
            StageKind::Sales,
            "qualification",
            Qualification::fallback,
        ))
    }

    /// Requirements already on the record are reused as-is without a model call.
    pub async fn extract_requirements(&self, rfp: &RfpRecord) -> Result<Vec<String>, ModelError> {
        if !rfp.specs.is_empty() {
            return Ok(rfp.specs.clone());
        }

        let request = CompletionRequest::new(EXTRACT_SYSTEM, EXTRACT_USER)
            .var("title", rfp.title.as_str())
            .var("content", rfp.content.as_deref().unwrap_or(rfp.title.as_str()))
            .temperature(TEMPERATURE);
        let reply = self.model.complete(&request).await?;

        Ok(or_default(
            parse_structured(&reply, JsonShape::Array),
            StageKind::Sales,
            "requirements",
            || fallback_requirements(&rfp.title),
        ))
    }

    pub async fn classify(&self, rfp: &RfpRecord) -> Result<String, ModelError> {
        let request = CompletionRequest::new(CLASSIFY_SYSTEM, CLASSIFY_USER)
            .var("title", rfp.title.as_str())
            .var("source", rfp.source.as_str())
            .temperature(TEMPERATURE)
            .kind(AnswerKind::Label);
        let reply = self.model.complete(&request).await?;

        let label = reply.trim();
        Ok(if label.is_empty() {
            DEFAULT_RFP_TYPE.to_string()
        } else {
            label.to_string()
        })
    }
}

#[async_trait]
impl StageAgent for SalesAgent {
    fn kind(&self) -> StageKind {
        StageKind::Sales
    }

    async fn run(
        &self,
        state: &WorkflowState,
        log: &mut ActionLog,
    ) -> Result<StageOutput, StageError> {
        let rfp = &state.rfp;
        if rfp.title.trim().is_empty() {
            return Err(StageError::missing(StageKind::Sales, "rfp_data"));
        }
        log.record("Starting RFP qualification");

        let qualification = self.qualify(rfp).await?;
        log.record_with("RFP qualified", json!({ "score": qualification.score }));

        let requirements = self.extract_requirements(rfp).await?;
        log.record_with(
            "Requirements extracted",
            json!({ "count": requirements.len() }),
        );

        let rfp_type = self.classify(rfp).await?;
        log.record_with("RFP classified", json!({ "type": rfp_type }));

        Ok(StageOutput::Sales(SalesOutput {
            qualified: qualification.qualified,
            qualification_score: qualification.score,
            qualification_reason: qualification.reason,
            extracted_requirements: requirements,
            rfp_type,
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::stages::execute_stage;
    use crate::stages::test_support::{sample_rfp, ScriptedModel};

    #[tokio::test]
    async fn test_unparseable_answers_fall_back() {
        let model = Arc::new(ScriptedModel::new(&[]));
        let agent = SalesAgent::new(model.clone());
        let state = WorkflowState::new(sample_rfp(&[]), "user-1", "task-1", "exec_1");

        let next = execute_stage(&agent, state).await;
        let sales = next.sales.unwrap();
        assert!(sales.qualified);
        assert_eq!(sales.qualification_score, 75);
        assert_eq!(
            sales.qualification_reason,
            "RFP meets basic criteria for processing"
        );
        assert_eq!(
            sales.extracted_requirements,
            fallback_requirements("Industrial Pump System RFP")
        );
        // Non-empty garbage is kept verbatim as the label.
        assert_eq!(sales.rfp_type, "I'm not able to produce JSON right now.");
        assert_eq!(model.calls(), 3);
        assert_eq!(next.actions.len(), 4);
    }

    #[tokio::test]
    async fn test_parsed_qualification_is_rounded_and_clamped() {
        let model = Arc::new(ScriptedModel::new(&[
            "Assessment: {\"qualified\": false, \"score\": 41.6, \"reason\": \"Budget unclear\"}",
            "```json\n[\"Flow Rate: 500 GPM\"]\n```",
            "  Construction \n",
        ]));
        let agent = SalesAgent::new(model.clone());
        let state = WorkflowState::new(sample_rfp(&[]), "user-1", "task-1", "exec_1");

        let sales = execute_stage(&agent, state).await.sales.unwrap();
        assert!(!sales.qualified);
        assert_eq!(sales.qualification_score, 42);
        assert_eq!(sales.qualification_reason, "Budget unclear");
        assert_eq!(sales.extracted_requirements, vec!["Flow Rate: 500 GPM"]);
        assert_eq!(sales.rfp_type, "Construction");

        let seen = model.seen.lock().unwrap();
        assert!(seen[0].render_user().contains("Industrial Pump System RFP"));
        assert!((seen[0].temperature - 0.1).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn test_existing_specs_skip_the_model() {
        let model = Arc::new(ScriptedModel::new(&[]));
        let agent = SalesAgent::new(model.clone());
        let rfp = sample_rfp(&["Flow Rate: 500 GPM minimum", "Maximum Pressure: 150 PSI"]);

        let first = agent.extract_requirements(&rfp).await.unwrap();
        let second = agent.extract_requirements(&rfp).await.unwrap();
        assert_eq!(first, rfp.specs);
        assert_eq!(first, second);
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_classification_defaults_to_manufacturing() {
        let model = Arc::new(ScriptedModel::new(&["   "]));
        let agent = SalesAgent::new(model);
        let label = agent.classify(&sample_rfp(&[])).await.unwrap();
        assert_eq!(label, DEFAULT_RFP_TYPE);
    }

    #[tokio::test]
    async fn test_out_of_range_score_is_clamped() {
        let model = Arc::new(ScriptedModel::new(&[
            "{\"qualified\": true, \"score\": 140}",
        ]));
        let agent = SalesAgent::new(model);
        let qualification = agent.qualify(&sample_rfp(&[])).await.unwrap();
        assert_eq!(qualification.score, 100);
        assert!(qualification.reason.is_empty());
    }
}
