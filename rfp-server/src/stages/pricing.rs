//! Pricing stage.

use async_trait::async_trait;
use tracing::{info, warn};

use shared_types::{MatchedProduct, Pricing, PricingLine, RfpUpdate, StageKind, WorkflowState};

use super::{ActionLog, StageAgent, StageError, StageOutput};
use crate::db::SharedRecordStore;
use crate::model_gateway::{CompletionRequest, ModelError, SharedModelGateway};
use crate::structured::{or_default, parse_structured, JsonShape};

const FALLBACK_QUANTITY: u32 = 500;
const FALLBACK_UNIT_PRICE: f64 = 2847.0;
const FALLBACK_DISCOUNT_PERCENT: f64 = 15.0;
const FALLBACK_LEAD_TIME: &str = "12-14 weeks";
/// Each further breakdown line is priced this much above the previous one.
const BREAKDOWN_PRICE_STEP: f64 = 200.0;
const MAX_BREAKDOWN_LINES: usize = 3;

const PRICING_SYSTEM: &str = r#"You are an expert pricing analyst. Calculate competitive pricing for the given products.

Consider:
1. Base product costs
2. Volume discounts (>100 units: 10%, >500 units: 15%)
3. Complexity of requirements
4. Market conditions
5. Lead time estimates

Respond with a JSON object:
{
  "unitPrice": number,
  "quantity": number (estimate),
  "totalPrice": number,
  "discount": number (percentage),
  "leadTime": "string (e.g., '12-14 weeks')",
  "breakdown": [
    {
      "item": "Product name",
      "quantity": number,
      "unitPrice": number,
      "total": number
    }
  ]
}"#;

const PRICING_USER: &str = "Products:
{products}

Requirements:
{requirements}

Calculate competitive pricing with breakdown.";

/// Quote used when the model answer cannot be parsed: 500 units at 2847 with
/// a 15% discount, split evenly over up to three products.
pub fn fallback_pricing(products: &[MatchedProduct]) -> Pricing {
    let quantity = f64::from(FALLBACK_QUANTITY);
    let total = FALLBACK_UNIT_PRICE * quantity * (1.0 - FALLBACK_DISCOUNT_PERCENT / 100.0);
    let share = quantity / products.len().max(1) as f64;

    Pricing {
        unit_price: FALLBACK_UNIT_PRICE,
        quantity: FALLBACK_QUANTITY,
        total_price: total.round(),
        discount: Some(FALLBACK_DISCOUNT_PERCENT),
        lead_time: FALLBACK_LEAD_TIME.to_string(),
        breakdown: products
            .iter()
            .take(MAX_BREAKDOWN_LINES)
            .enumerate()
            .map(|(index, product)| {
                let unit_price = FALLBACK_UNIT_PRICE + BREAKDOWN_PRICE_STEP * index as f64;
                PricingLine {
                    item: product.name.clone(),
                    sku: Some(product.sku.clone()),
                    quantity: share.round() as u32,
                    unit_price,
                    total: (unit_price * share).round(),
                }
            })
            .collect(),
    }
}

pub struct PricingAgent {
    model: SharedModelGateway,
    store: SharedRecordStore,
}

impl PricingAgent {
    pub fn new(model: SharedModelGateway, store: SharedRecordStore) -> Self {
        Self { model, store }
    }

    pub async fn calculate(
        &self,
        products: &[MatchedProduct],
        requirements: &[String],
    ) -> Result<Pricing, ModelError> {
        let request = CompletionRequest::new(PRICING_SYSTEM, PRICING_USER)
            .var(
                "products",
                serde_json::to_string_pretty(products).unwrap_or_default(),
            )
            .var("requirements", requirements.join("\n"))
            .temperature(0.0);
        let reply = self.model.complete(&request).await?;

        Ok(or_default(
            parse_structured(&reply, JsonShape::Object),
            StageKind::Pricing,
            "pricing",
            || fallback_pricing(products),
        ))
    }

    async fn persist_pricing(&self, rfp_id: &str, pricing: &Pricing) {
        let update = RfpUpdate {
            pricing: Some(pricing.clone()),
            ..Default::default()
        };
        match self.store.update_rfp(rfp_id, update).await {
            Ok(()) => info!(rfp_id, "RFP updated with pricing"),
            Err(e) => warn!(rfp_id, error = %e, "failed to store pricing"),
        }
    }
}

#[async_trait]
impl StageAgent for PricingAgent {
    fn kind(&self) -> StageKind {
        StageKind::Pricing
    }

    async fn run(
        &self,
        state: &WorkflowState,
        log: &mut ActionLog,
    ) -> Result<StageOutput, StageError> {
        let products = state.matched_products();
        if products.is_empty() {
            return Err(StageError::missing(StageKind::Pricing, "matched_products"));
        }

        log.record("Starting pricing calculation");

        let pricing = self
            .calculate(products, state.extracted_requirements())
            .await?;
        log.record_with(
            "Pricing calculated",
            serde_json::to_value(&pricing).unwrap_or_default(),
        );

        self.persist_pricing(&state.rfp_id, &pricing).await;

        Ok(StageOutput::Pricing(pricing))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use shared_types::TechnicalOutput;

    use super::*;
    use crate::db::{connect_in_memory, SqliteRecordStore};
    use crate::stages::execute_stage;
    use crate::stages::test_support::{sample_rfp, ScriptedModel};

    fn product(sku: &str, name: &str, compatibility: f64) -> MatchedProduct {
        MatchedProduct {
            sku: sku.to_string(),
            name: name.to_string(),
            description: String::new(),
            similarity_score: compatibility,
            compatibility,
            matched_requirements: vec![],
        }
    }

    async fn agent(model: Arc<ScriptedModel>) -> PricingAgent {
        let store = Arc::new(SqliteRecordStore::new(connect_in_memory().await.unwrap()));
        PricingAgent::new(model, store)
    }

    #[test]
    fn test_fallback_pricing_for_two_products() {
        let pricing = fallback_pricing(&[
            product("PUMP-2847", "Industrial Centrifugal Pump", 94.0),
            product("VALVE-1842", "Hydraulic Control Valve", 88.0),
        ]);
        assert_eq!(pricing.quantity, 500);
        assert_eq!(pricing.unit_price, 2847.0);
        assert_eq!(pricing.discount, Some(15.0));
        assert_eq!(pricing.total_price, 1_209_975.0);
        assert_eq!(pricing.lead_time, "12-14 weeks");

        assert_eq!(pricing.breakdown.len(), 2);
        assert_eq!(pricing.breakdown[0].quantity, 250);
        assert_eq!(pricing.breakdown[0].total, 711_750.0);
        assert_eq!(pricing.breakdown[1].unit_price, 3047.0);
        assert_eq!(pricing.breakdown[1].total, 761_750.0);
        assert_eq!(pricing.breakdown[1].sku.as_deref(), Some("VALVE-1842"));
    }

    #[test]
    fn test_fallback_breakdown_caps_at_three_lines() {
        let products: Vec<_> = (0..4)
            .map(|i| product(&format!("SKU-{i}"), "Part", 80.0))
            .collect();
        let pricing = fallback_pricing(&products);
        assert_eq!(pricing.breakdown.len(), 3);
        // 500 / 4 = 125 per line even though only three lines are listed.
        assert_eq!(pricing.breakdown[2].quantity, 125);
        assert_eq!(pricing.breakdown[2].total, 405_875.0);
    }

    #[tokio::test]
    async fn test_parsed_pricing_is_used() {
        let model = Arc::new(ScriptedModel::new(&[
            r#"Here you go: {"unitPrice": 485, "quantity": 1000, "totalPrice": 436500, "discount": 10, "leadTime": "8-10 weeks", "breakdown": []}"#,
        ]));
        let agent = agent(model).await;
        let pricing = agent
            .calculate(&[product("VALVE-1842", "Valve", 88.0)], &[])
            .await
            .unwrap();
        assert_eq!(pricing.quantity, 1000);
        assert_eq!(pricing.total_price, 436_500.0);
        assert_eq!(pricing.lead_time, "8-10 weeks");
    }

    #[tokio::test]
    async fn test_missing_products_is_stage_error() {
        let model = Arc::new(ScriptedModel::new(&[]));
        let agent = agent(model.clone()).await;
        let mut state = WorkflowState::new(sample_rfp(&[]), "user-1", "task-1", "exec_1");
        state.technical = Some(TechnicalOutput {
            matched_products: vec![],
            overall_match_score: 0,
        });

        let next = execute_stage(&agent, state).await;
        assert!(next.pricing.is_none());
        assert_eq!(next.errors.len(), 1);
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn test_store_failure_does_not_fail_stage() {
        // The RFP was never inserted, so the write-back hits a missing row.
        let model = Arc::new(ScriptedModel::new(&[]));
        let agent = agent(model).await;
        let mut state = WorkflowState::new(sample_rfp(&[]), "user-1", "task-1", "exec_1");
        state.technical = Some(TechnicalOutput {
            matched_products: vec![product("PUMP-2847", "Pump", 94.0)],
            overall_match_score: 94,
        });

        let next = execute_stage(&agent, state).await;
        assert!(next.errors.is_empty());
        assert_eq!(next.pricing.unwrap().total_price, 1_209_975.0);
    }
}
