use std::collections::BTreeMap;
use std::time::Duration;

use shared_types::DelegateAgentType;

#[derive(Debug, Clone)]
pub struct Config {
    /// Port the API server listens on
    pub port: u16,
    /// SQLite database URL (`sqlite:./path.db` or `sqlite::memory:`)
    pub database_url: String,
    pub model: ModelConfig,
    /// Adds the email channel to the delivery record.
    pub email_notifications: bool,
    /// Browser origin allowed by CORS.
    pub cors_origin: String,
    /// Public base URL external workflow hosts use to call us back.
    pub callback_base_url: String,
    pub delegate: DelegateConfig,
    /// Insert the demo user and sample RFPs on startup.
    pub seed_demo_data: bool,
}

#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// No key means the offline gateway is used.
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct DelegateConfig {
    /// REST API base of the workflow host.
    pub base_url: String,
    pub api_key: String,
    /// Webhook base; unset disables the delegate path.
    pub webhook_base_url: Option<String>,
    pub workflow_ids: BTreeMap<DelegateAgentType, String>,
}

impl DelegateConfig {
    pub fn is_enabled(&self) -> bool {
        self.webhook_base_url.is_some()
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let port = env_parse("PORT", 5000)?;

        Ok(Self {
            port,
            database_url: env_str("DATABASE_URL", "sqlite:./data/rfp.db"),
            model: ModelConfig {
                api_key: env_opt("OPENAI_API_KEY"),
                model: env_str("OPENAI_MODEL", "gpt-4"),
                base_url: env_str("OPENAI_BASE_URL", "https://api.openai.com/v1"),
                timeout: Duration::from_secs(env_parse("MODEL_HTTP_TIMEOUT_SECS", 120)?),
            },
            email_notifications: env_bool("ENABLE_EMAIL_NOTIFICATIONS", false)?,
            cors_origin: env_str("CORS_ORIGIN", "http://localhost:5173"),
            callback_base_url: env_str("CALLBACK_BASE_URL", &format!("http://localhost:{port}")),
            delegate: DelegateConfig {
                base_url: env_str("N8N_BASE_URL", "http://localhost:5678"),
                api_key: env_str("N8N_API_KEY", ""),
                webhook_base_url: env_opt("N8N_WEBHOOK_BASE_URL"),
                workflow_ids: DelegateAgentType::ALL
                    .iter()
                    .filter_map(|agent| {
                        let key = format!(
                            "N8N_{}_AGENT_WORKFLOW_ID",
                            agent.as_str().to_ascii_uppercase()
                        );
                        env_opt(&key).map(|id| (*agent, id))
                    })
                    .collect(),
            },
            seed_demo_data: env_bool("SEED_DEMO_DATA", false)?,
        })
    }
}

fn env_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Unset and blank values both count as absent.
fn env_opt(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> anyhow::Result<T>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(val) => val
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("Failed to parse env var {key}={val}: {e}")),
        Err(_) => Ok(default),
    }
}

fn env_bool(key: &str, default: bool) -> anyhow::Result<bool> {
    match std::env::var(key) {
        Ok(val) => parse_bool(&val)
            .ok_or_else(|| anyhow::anyhow!("Failed to parse env var {key}={val}: expected a boolean")),
        Err(_) => Ok(default),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool_variants() {
        assert_eq!(parse_bool("true"), Some(true));
        assert_eq!(parse_bool(" ON "), Some(true));
        assert_eq!(parse_bool("1"), Some(true));
        assert_eq!(parse_bool("false"), Some(false));
        assert_eq!(parse_bool(""), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn test_env_parse_uses_default_when_unset() {
        let port: u16 = env_parse("RFP_SERVER_TEST_UNSET_PORT", 5000).unwrap();
        assert_eq!(port, 5000);
        assert!(env_opt("RFP_SERVER_TEST_UNSET_KEY").is_none());
    }

    #[test]
    fn test_delegate_enabled_only_with_webhook_base() {
        let mut delegate = DelegateConfig {
            base_url: "http://localhost:5678".to_string(),
            api_key: String::new(),
            webhook_base_url: None,
            workflow_ids: BTreeMap::new(),
        };
        assert!(!delegate.is_enabled());
        delegate.webhook_base_url = Some("http://localhost:5678/webhook".to_string());
        assert!(delegate.is_enabled());
    }
}
