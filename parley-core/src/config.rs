//! Configuration for a parley run.
//!
//! Maps directly to `parley.toml`. Every section and field has a default, so
//! an empty file (or no file at all) yields a runnable configuration.

use serde::{Deserialize, Serialize};

/// Top-level configuration, loadable from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParleyConfig {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,
    /// Turn scheduler behavior.
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Conversation pacing used by the decision collaborators.
    #[serde(default)]
    pub conversation: ConversationConfig,
    /// LLM integration settings.
    #[serde(default)]
    pub llm: LlmConfig,
    /// Conversation log storage.
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

impl ParleyConfig {
    /// Load configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `ParleyError::Config` if the TOML is invalid.
    pub fn from_toml(toml_str: &str) -> crate::error::Result<Self> {
        toml::from_str(toml_str).map_err(|e| crate::ParleyError::Config(e.to_string()))
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error. `RUST_LOG` wins when set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Emit logs as JSON lines.
    #[serde(default)]
    pub json_logs: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

/// What the scheduler does when a steady-state reply is rejected by the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionPolicy {
    /// Abort the run, like every other rejected submission.
    #[default]
    Fatal,
    /// Log the rejection and carry on with the cycle.
    BestEffort,
}

/// Turn scheduler settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Handling of rejected steady-state replies.
    #[serde(default)]
    pub reply_submission: SubmissionPolicy,
}

/// Conversation pacing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationConfig {
    /// Once the history reaches this many messages, agents always withdraw.
    #[serde(default = "default_max_messages")]
    pub max_messages: usize,
    /// Generated utterances are clamped to this many characters.
    #[serde(default = "default_max_reply_chars")]
    pub max_reply_chars: usize,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            max_messages: 8,
            max_reply_chars: 400,
        }
    }
}

/// LLM integration configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider: "ollama", "openai", "none".
    #[serde(default = "default_ollama")]
    pub provider: String,
    /// Base URL for the LLM API.
    #[serde(default = "default_ollama_url")]
    pub base_url: String,
    /// Environment variable holding the API key (OpenAI-compatible only).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Small model, used for yes/no decisions.
    #[serde(default = "default_small_model")]
    pub small_model: String,
    /// Large model, used for utterances.
    #[serde(default = "default_large_model")]
    pub large_model: String,
    /// Hard timeout for any LLM call in milliseconds.
    #[serde(default = "default_5000")]
    pub request_timeout_ms: u64,
    /// Max retries before falling back to templates.
    #[serde(default = "default_2")]
    pub max_retries: u32,
    /// Directory of TOML prompt overrides. Unset uses the built-in prompts.
    #[serde(default)]
    pub prompt_dir: Option<std::path::PathBuf>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            base_url: "http://localhost:11434".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            small_model: "qwen2.5:1.5b".to_string(),
            large_model: "mistral:7b-instruct".to_string(),
            request_timeout_ms: 5000,
            max_retries: 2,
            prompt_dir: None,
        }
    }
}

/// Conversation log configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// SQLite file path. Unset keeps memories in process only.
    #[serde(default)]
    pub path: Option<std::path::PathBuf>,
    /// Use WAL mode for concurrent reads.
    #[serde(default = "default_true")]
    pub wal_mode: bool,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            path: None,
            wal_mode: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Serde default helpers
// ---------------------------------------------------------------------------

fn default_true() -> bool { true }
fn default_log_level() -> String { "info".to_string() }
fn default_ollama() -> String { "ollama".to_string() }
fn default_ollama_url() -> String { "http://localhost:11434".to_string() }
fn default_api_key_env() -> String { "OPENAI_API_KEY".to_string() }
fn default_small_model() -> String { "qwen2.5:1.5b".to_string() }
fn default_large_model() -> String { "mistral:7b-instruct".to_string() }
fn default_max_messages() -> usize { 8 }
fn default_max_reply_chars() -> usize { 400 }
fn default_2() -> u32 { 2 }
fn default_5000() -> u64 { 5000 }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let config = ParleyConfig::from_toml("").expect("parse");
        assert_eq!(config.scheduler.reply_submission, SubmissionPolicy::Fatal);
        assert_eq!(config.conversation.max_messages, 8);
        assert_eq!(config.llm.provider, "ollama");
        assert!(config.persistence.path.is_none());
    }

    #[test]
    fn sections_override_defaults() {
        let config = ParleyConfig::from_toml(
            r#"
            [scheduler]
            reply_submission = "best_effort"

            [conversation]
            max_messages = 3

            [llm]
            provider = "none"

            [persistence]
            path = "convos.db"
            wal_mode = false
            "#,
        )
        .expect("parse");
        assert_eq!(config.scheduler.reply_submission, SubmissionPolicy::BestEffort);
        assert_eq!(config.conversation.max_messages, 3);
        assert_eq!(config.conversation.max_reply_chars, 400);
        assert_eq!(config.llm.provider, "none");
        assert_eq!(
            config.persistence.path.as_deref(),
            Some(std::path::Path::new("convos.db"))
        );
        assert!(!config.persistence.wal_mode);
    }

    #[test]
    fn invalid_toml_is_config_error() {
        let err = ParleyConfig::from_toml("[scheduler]\nreply_submission = 3")
            .expect_err("must fail");
        assert!(matches!(err, crate::ParleyError::Config(_)));
    }

    #[test]
    fn from_file_reads_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("parley.toml");
        std::fs::write(&path, "[general]\nlog_level = \"debug\"\n").expect("write");
        let config = ParleyConfig::from_file(&path).expect("load");
        assert_eq!(config.general.log_level, "debug");
    }
}
