//! Chat-completion gateway used by the stage agents.
//!
//! Stages build a [`CompletionRequest`] (system prompt, user template with
//! `{name}` placeholders, variables, temperature) and get raw text back.
//! Structured answers are parsed by the caller, see [`crate::structured`].

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, warn};

use crate::config::ModelConfig;

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("model request failed: {0}")]
    Request(String),

    #[error("model host returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("model response had no message content")]
    EmptyResponse,

    #[error("model gateway misconfigured: {0}")]
    Config(String),
}

/// Shape of answer the caller expects. Only the offline gateway looks at it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerKind {
    /// A JSON object or array embedded somewhere in the text.
    Structured,
    /// A single short label.
    Label,
    /// Free text meant for humans.
    Prose,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    pub user_template: String,
    pub vars: BTreeMap<String, String>,
    pub temperature: f32,
    pub kind: AnswerKind,
}

impl CompletionRequest {
    pub fn new(system: impl Into<String>, user_template: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user_template: user_template.into(),
            vars: BTreeMap::new(),
            temperature: 0.0,
            kind: AnswerKind::Structured,
        }
    }

    pub fn var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn kind(mut self, kind: AnswerKind) -> Self {
        self.kind = kind;
        self
    }

    /// User message with every known `{name}` placeholder substituted.
    pub fn render_user(&self) -> String {
        render_template(&self.user_template, &self.vars)
    }
}

/// Substitutes `{name}` placeholders. Unknown names and other braces are kept
/// verbatim so JSON examples survive.
pub fn render_template(template: &str, vars: &BTreeMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let substituted = after.find('}').and_then(|close| {
            let name = &after[..close];
            vars.get(name).map(|value| (value, close))
        });
        match substituted {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

#[async_trait]
pub trait ModelGateway: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ModelError>;

    fn model_id(&self) -> &str;
}

pub type SharedModelGateway = Arc<dyn ModelGateway>;

/// Picks the OpenAI-compatible client when a key is configured, the offline
/// gateway otherwise.
pub fn from_config(config: &ModelConfig) -> Result<SharedModelGateway, ModelError> {
    match config.api_key.as_deref() {
        Some(key) => Ok(Arc::new(OpenAiModelGateway::new(
            key,
            &config.base_url,
            &config.model,
            config.timeout,
        )?)),
        None => {
            warn!("OPENAI_API_KEY not set, stages will use their fallback answers");
            Ok(Arc::new(OfflineModelGateway))
        }
    }
}

/// Chat-completions client for OpenAI and compatible hosts.
pub struct OpenAiModelGateway {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    model: String,
}

impl OpenAiModelGateway {
    pub fn new(
        api_key: &str,
        base_url: &str,
        model: &str,
        timeout: Duration,
    ) -> Result<Self, ModelError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ModelError::Config(e.to_string()))?;
        Ok(Self {
            client,
            api_key: api_key.to_string(),
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl ModelGateway for OpenAiModelGateway {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ModelError> {
        let body = json!({
            "model": self.model,
            "temperature": request.temperature,
            "messages": [
                { "role": "system", "content": request.system },
                { "role": "user", "content": request.render_user() },
            ],
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ModelError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ModelError::Request(e.to_string()))?;

        let content = payload["choices"][0]["message"]["content"]
            .as_str()
            .ok_or(ModelError::EmptyResponse)?;
        debug!(model = %self.model, chars = content.len(), "model completion received");
        Ok(content.to_string())
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

/// Gateway for running without a model host. Structured requests get text
/// with no JSON in it, labels get an empty answer, prose is drafted from the
/// rendered prompt.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineModelGateway;

#[async_trait]
impl ModelGateway for OfflineModelGateway {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ModelError> {
        Ok(match request.kind {
            AnswerKind::Structured => "No model host is configured for this deployment.".to_string(),
            AnswerKind::Label => String::new(),
            AnswerKind::Prose => format!(
                "# Proposal Draft\n\nPrepared without a language model. Source details follow.\n\n{}",
                request.render_user()
            ),
        })
    }

    fn model_id(&self) -> &str {
        "offline"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_template_substitutes_known_vars() {
        let request = CompletionRequest::new("sys", "RFP Title: {title}\nSource: {source}")
            .var("title", "Industrial Pump System RFP")
            .var("source", "ThomasNet");
        assert_eq!(
            request.render_user(),
            "RFP Title: Industrial Pump System RFP\nSource: ThomasNet"
        );
    }

    #[test]
    fn test_render_template_keeps_unknown_braces() {
        let mut vars = BTreeMap::new();
        vars.insert("n".to_string(), "3".to_string());
        let rendered = render_template("{\"qualified\": true} {n} {missing} {", &vars);
        assert_eq!(rendered, "{\"qualified\": true} 3 {missing} {");
    }

    #[test]
    fn test_render_template_does_not_recurse_into_values() {
        let mut vars = BTreeMap::new();
        vars.insert("a".to_string(), "{b}".to_string());
        vars.insert("b".to_string(), "nope".to_string());
        assert_eq!(render_template("x{a}y", &vars), "x{b}y");
    }

    #[tokio::test]
    async fn test_offline_gateway_answers_by_kind() {
        let gateway = OfflineModelGateway;
        let structured = gateway
            .complete(&CompletionRequest::new("s", "u"))
            .await
            .unwrap();
        assert!(!structured.contains('{') && !structured.contains('['));

        let label = gateway
            .complete(&CompletionRequest::new("s", "u").kind(AnswerKind::Label))
            .await
            .unwrap();
        assert!(label.is_empty());

        let prose = gateway
            .complete(
                &CompletionRequest::new("s", "Title: {title}")
                    .var("title", "Valves")
                    .kind(AnswerKind::Prose),
            )
            .await
            .unwrap();
        assert!(prose.contains("Title: Valves"));
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let gateway = OpenAiModelGateway::new(
            "sk-test",
            "https://api.openai.com/v1/",
            "gpt-4",
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(gateway.endpoint, "https://api.openai.com/v1/chat/completions");
        assert_eq!(gateway.model_id(), "gpt-4");
    }
}
