//! Prompt templates for conversation decisions.
//!
//! Every prompt is a versioned, testable artifact. The built-in templates
//! below can be overridden per deployment by a directory of TOML files
//! (see [`PromptEngine::from_directory`]).

/// Opening line for a conversation with newly met agents (large model).
pub const START_CONVERSATION_SYSTEM: &str = r"You are {name}.
About you: {identity}
What you are doing today: {plan}

You just started a conversation with {participants}. You have never met them before.

RULES:
- Stay in character. Never mention that you are simulated.
- Introduce yourself and say one thing about what you are doing.
- Keep it under 2 sentences.";

pub const START_CONVERSATION_USER: &str = r"Say your opening line to {participants}.";

/// Reply within an ongoing conversation (large model).
pub const CONTINUE_CONVERSATION_SYSTEM: &str = r"You are {name}.
About you: {identity}
What you are doing today: {plan}

You are in a conversation with {participants}. The transcript so far follows,
one line per message, in the form `<speaker> to <listeners>: <text>`.

RULES:
- Stay in character. Never mention that you are simulated.
- Respond to what was said last; do not repeat yourself.
- Keep it under 3 sentences.";

pub const CONTINUE_CONVERSATION_USER: &str =
    r"What do you say next, {name}? Reply with the words only.";

/// Whether to leave the conversation (small model, JSON output).
pub const LEAVE_CONVERSATION_SYSTEM: &str = r"You are {name}.
About you: {identity}
What you are doing today: {plan}

You are in a conversation. The transcript so far follows, one line per message.";

pub const LEAVE_CONVERSATION_USER: &str = r#"Has this conversation run its course, {name}? Would you like to leave now?
Return JSON:
{"leave": <bool>}"#;

/// Simple template interpolation for prompts.
///
/// Replaces `{key}` with the corresponding value.
#[must_use]
pub fn render_template(template: &str, vars: &[(&str, &str)]) -> String {
    let mut result = template.to_string();
    for (key, value) in vars {
        result = result.replace(&format!("{{{key}}}"), value);
    }
    result
}

// ---------------------------------------------------------------------------
// PromptEngine — Versioned TOML Template Loader
// ---------------------------------------------------------------------------

use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::types::LlmTier;

/// Identifies a prompt template by purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptId {
    /// Opening line for newly met participants.
    StartConversation,
    /// Reply in an ongoing conversation.
    ContinueConversation,
    /// Leave-or-stay decision.
    LeaveConversation,
}

impl PromptId {
    /// Returns the TOML filename (without path) for this prompt.
    #[must_use]
    pub fn filename(self) -> &'static str {
        match self {
            Self::StartConversation => "start_conversation.toml",
            Self::ContinueConversation => "continue_conversation.toml",
            Self::LeaveConversation => "leave_conversation.toml",
        }
    }

    /// All prompt IDs.
    #[must_use]
    pub fn all() -> &'static [PromptId] {
        &[
            Self::StartConversation,
            Self::ContinueConversation,
            Self::LeaveConversation,
        ]
    }
}

impl fmt::Display for PromptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::StartConversation => "start_conversation",
            Self::ContinueConversation => "continue_conversation",
            Self::LeaveConversation => "leave_conversation",
        };
        write!(f, "{name}")
    }
}

impl FromStr for PromptId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start_conversation" => Ok(Self::StartConversation),
            "continue_conversation" => Ok(Self::ContinueConversation),
            "leave_conversation" => Ok(Self::LeaveConversation),
            _ => Err(format!("unknown prompt id: '{s}'")),
        }
    }
}

/// Inner `[prompt]` section of a TOML file.
#[derive(Debug, Clone, Deserialize)]
struct TomlPromptFile {
    prompt: TomlPromptData,
}

#[derive(Debug, Clone, Deserialize)]
struct TomlPromptData {
    version: String,
    tier: u8,
    max_tokens: u32,
    temperature: f32,
    system: String,
    user: String,
}

/// A loaded, ready-to-render prompt template.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    /// Prompt version string (e.g., "1.0").
    pub version: String,
    /// Which model size answers this prompt.
    pub tier: LlmTier,
    /// Maximum output tokens.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
    /// System prompt template (contains `{key}` placeholders).
    pub system: String,
    /// Final user instruction (contains `{key}` placeholders).
    pub user: String,
}

/// Engine that holds versioned prompt templates and renders them.
///
/// # Example
///
/// ```
/// use parley_llm::prompt::{PromptEngine, PromptId};
///
/// let engine = PromptEngine::builtin();
/// let (system, _user) = engine
///     .render(PromptId::StartConversation, &[("name", "Lucky"), ("participants", "Bob")])
///     .expect("built-in template");
/// assert!(system.starts_with("You are Lucky."));
/// ```
#[derive(Debug, Clone)]
pub struct PromptEngine {
    templates: HashMap<PromptId, PromptTemplate>,
}

impl PromptEngine {
    /// Create a `PromptEngine` pre-loaded with the compiled-in templates.
    #[must_use]
    pub fn builtin() -> Self {
        let mut templates = HashMap::new();

        templates.insert(PromptId::StartConversation, PromptTemplate {
            version: "builtin".into(),
            tier: LlmTier::Large,
            max_tokens: 120,
            temperature: 0.8,
            system: START_CONVERSATION_SYSTEM.into(),
            user: START_CONVERSATION_USER.into(),
        });

        templates.insert(PromptId::ContinueConversation, PromptTemplate {
            version: "builtin".into(),
            tier: LlmTier::Large,
            max_tokens: 160,
            temperature: 0.8,
            system: CONTINUE_CONVERSATION_SYSTEM.into(),
            user: CONTINUE_CONVERSATION_USER.into(),
        });

        templates.insert(PromptId::LeaveConversation, PromptTemplate {
            version: "builtin".into(),
            tier: LlmTier::Small,
            max_tokens: 20,
            temperature: 0.2,
            system: LEAVE_CONVERSATION_SYSTEM.into(),
            user: LEAVE_CONVERSATION_USER.into(),
        });

        Self { templates }
    }

    /// Load prompt templates from a directory of TOML files.
    ///
    /// Each TOML file must match a known [`PromptId`] filename; prompts with
    /// no file keep their built-in template. Unknown files are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory does not exist, or a TOML file exists
    /// but cannot be parsed or names an unknown tier.
    pub fn from_directory(dir: impl AsRef<Path>) -> Result<Self, String> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(format!("prompt directory not found: {}", dir.display()));
        }

        let mut engine = Self::builtin();
        for id in PromptId::all() {
            let path: PathBuf = dir.join(id.filename());
            if path.exists() {
                let content = std::fs::read_to_string(&path)
                    .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
                let parsed: TomlPromptFile = toml::from_str(&content)
                    .map_err(|e| format!("failed to parse {}: {e}", path.display()))?;

                let d = parsed.prompt;
                let tier = match d.tier {
                    1 => LlmTier::Small,
                    2 => LlmTier::Large,
                    other => return Err(format!("{}: unknown tier {other}", path.display())),
                };
                engine.templates.insert(*id, PromptTemplate {
                    version: d.version,
                    tier,
                    max_tokens: d.max_tokens,
                    temperature: d.temperature,
                    system: d.system,
                    user: d.user,
                });
            }
        }

        Ok(engine)
    }

    /// Get a loaded prompt template by ID.
    #[must_use]
    pub fn get(&self, id: PromptId) -> Option<&PromptTemplate> {
        self.templates.get(&id)
    }

    /// Render both system and user prompts for a given ID.
    ///
    /// Returns `(system_prompt, user_prompt)` with all `{key}` placeholders
    /// replaced.
    ///
    /// # Errors
    ///
    /// Returns an error if the prompt ID is not loaded.
    pub fn render(
        &self,
        id: PromptId,
        vars: &[(&str, &str)],
    ) -> Result<(String, String), String> {
        let tpl = self.get(id).ok_or_else(|| {
            format!("prompt template '{id}' not loaded")
        })?;

        let system = render_template(&tpl.system, vars);
        let user = render_template(&tpl.user, vars);
        Ok((system, user))
    }
}
