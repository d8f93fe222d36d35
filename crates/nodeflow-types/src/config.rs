//! Global configuration types.
//!
//! `GlobalConfig` represents the top-level `config.toml` in the data
//! directory. Every section and field has a default, so an empty or
//! partial file is valid.

use serde::{Deserialize, Serialize};

/// Top-level configuration for nodeflow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub llm: LlmConfig,
}

/// Execution engine tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Node types that seed traversal with the trigger payload.
    #[serde(default = "default_entry_node_types")]
    pub entry_node_types: Vec<String>,
    /// Iteration cap per run is `iteration_factor * node count`.
    #[serde(default = "default_iteration_factor")]
    pub iteration_factor: usize,
    /// Capacity of the broadcast channel carrying execution events.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_entry_node_types() -> Vec<String> {
    vec!["webhookTrigger".to_string()]
}

fn default_iteration_factor() -> usize {
    3
}

fn default_event_capacity() -> usize {
    1024
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            entry_node_types: default_entry_node_types(),
            iteration_factor: default_iteration_factor(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl EngineConfig {
    pub fn is_entry_type(&self, node_type: &str) -> bool {
        self.entry_node_types.iter().any(|t| t == node_type)
    }
}

/// HTTP server bind settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3001
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Outbound HTTP client settings used by the HTTP request step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    "nodeflow/0.1".to_string()
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

/// LLM provider endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_openai_base_url")]
    pub openai_base_url: String,
    #[serde(default = "default_anthropic_base_url")]
    pub anthropic_base_url: String,
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_anthropic_base_url() -> String {
    "https://api.anthropic.com/v1".to_string()
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            openai_base_url: default_openai_base_url(),
            anthropic_base_url: default_anthropic_base_url(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_config_default_values() {
        let config = GlobalConfig::default();
        assert_eq!(config.engine.entry_node_types, vec!["webhookTrigger"]);
        assert_eq!(config.engine.iteration_factor, 3);
        assert_eq!(config.server.port, 3001);
        assert_eq!(config.http.timeout_secs, 30);
        assert!(config.llm.openai_base_url.starts_with("https://"));
    }

    #[test]
    fn test_global_config_deserialize_empty() {
        let config: GlobalConfig = toml::from_str("").unwrap();
        assert_eq!(config, GlobalConfig::default());
    }

    #[test]
    fn test_global_config_deserialize_partial() {
        let toml_str = r#"
[engine]
entry_node_types = ["webhookTrigger", "scheduleTrigger"]

[server]
port = 8080
"#;
        let config: GlobalConfig = toml::from_str(toml_str).unwrap();
        assert!(config.engine.is_entry_type("scheduleTrigger"));
        assert!(!config.engine.is_entry_type("errorTrigger"));
        assert_eq!(config.engine.iteration_factor, 3);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "127.0.0.1");
    }
}
