//! [`ConversationDecider`] backed by [`LlmClient`], with template fallback.
//!
//! ## Tiered Approach
//!
//! - **Templates:** deterministic lines built from the agent's persona.
//!   Always available. Used when the LLM is unavailable or returns nothing usable.
//! - **Small model:** leave-or-stay decisions, JSON output.
//! - **Large model:** opening lines and replies.

use async_trait::async_trait;
use parley_core::chat::ChatMessage;
use parley_core::collab::ConversationDecider;
use parley_core::config::{ConversationConfig, ParleyConfig};
use parley_core::error::Result;
use parley_core::snapshot::NearbyAgent;
use parley_core::types::AgentRecord;
use tracing::{debug, warn};

use crate::client::LlmClient;
use crate::error::LlmError;
use crate::prompt::{PromptEngine, PromptId};
use crate::types::{LeaveDecision, LlmRequest, LlmTier};

/// Decision collaborator driven by an LLM.
#[derive(Debug)]
pub struct LlmDecider {
    client: LlmClient,
    prompts: PromptEngine,
    conversation: ConversationConfig,
    timeout_ms: u64,
}

impl LlmDecider {
    /// Create a decider over `client` with the built-in prompts.
    #[must_use]
    pub fn new(client: LlmClient, conversation: ConversationConfig) -> Self {
        Self {
            client,
            prompts: PromptEngine::builtin(),
            conversation,
            timeout_ms: 5000,
        }
    }

    /// A decider that never calls a model.
    #[must_use]
    pub fn templates_only(conversation: ConversationConfig) -> Self {
        Self::new(LlmClient::none(), conversation)
    }

    /// Build the client and prompts from a full configuration.
    ///
    /// # Errors
    /// Returns [`LlmError::ConfigError`] for an invalid provider or an
    /// unreadable prompt directory.
    pub fn from_config(config: &ParleyConfig) -> std::result::Result<Self, LlmError> {
        let client = LlmClient::from_config(&config.llm)?;
        let prompts = match &config.llm.prompt_dir {
            Some(dir) => PromptEngine::from_directory(dir).map_err(LlmError::ConfigError)?,
            None => PromptEngine::builtin(),
        };
        Ok(Self {
            client,
            prompts,
            conversation: config.conversation.clone(),
            timeout_ms: config.llm.request_timeout_ms,
        })
    }

    /// Replace the prompt set.
    #[must_use]
    pub fn with_prompts(mut self, prompts: PromptEngine) -> Self {
        self.prompts = prompts;
        self
    }

    /// Render `id` for `agent` and build a request carrying `history`.
    fn request(
        &self,
        id: PromptId,
        agent: &AgentRecord,
        participants: &str,
        history: &[ChatMessage],
    ) -> std::result::Result<LlmRequest, LlmError> {
        let template = self
            .prompts
            .get(id)
            .ok_or_else(|| LlmError::ConfigError(format!("prompt template '{id}' not loaded")))?;
        let (system, user) = self
            .prompts
            .render(
                id,
                &[
                    ("name", agent.name.as_str()),
                    ("identity", agent.identity.as_str()),
                    ("plan", agent.plan.as_str()),
                    ("participants", participants),
                ],
            )
            .map_err(LlmError::ConfigError)?;

        let mut messages = history.to_vec();
        messages.push(ChatMessage::user(user));
        let request = match template.tier {
            LlmTier::Small => LlmRequest::small(system, messages),
            LlmTier::Large => LlmRequest::large(system, messages),
        };
        Ok(request
            .with_sampling(template.max_tokens, template.temperature)
            .with_timeout(self.timeout_ms))
    }

    /// Ask the model for an utterance; `None` means "use the template".
    async fn utterance(
        &self,
        id: PromptId,
        agent: &AgentRecord,
        participants: &str,
        history: &[ChatMessage],
    ) -> Option<String> {
        if !self.client.is_available() {
            return None;
        }
        let result = match self.request(id, agent, participants, history) {
            Ok(request) => self.client.generate(&request).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(response) => {
                let max_chars = self.conversation.max_reply_chars;
                let line = clean_utterance(&response.text, &agent.name, max_chars);
                if line.is_none() {
                    warn!(agent = %agent.id, prompt = %id, "LLM returned an empty utterance, using template");
                }
                line
            }
            Err(e) => {
                warn!(agent = %agent.id, prompt = %id, error = %e, "LLM unavailable, using template");
                None
            }
        }
    }
}

#[async_trait]
impl ConversationDecider for LlmDecider {
    async fn begin_conversation(
        &self,
        participants: &[String],
        agent: &AgentRecord,
    ) -> Result<String> {
        let names = participants.join(", ");
        let line = match self.utterance(PromptId::StartConversation, agent, &names, &[]).await {
            Some(line) => line,
            None => template_greeting(participants, agent),
        };
        debug!(agent = %agent.id, chars = line.len(), "Opening line chosen");
        Ok(line)
    }

    async fn continue_conversation(
        &self,
        history: &[ChatMessage],
        agent: &AgentRecord,
        nearby: &[NearbyAgent],
    ) -> Result<String> {
        let names: Vec<&str> = nearby.iter().map(|n| n.agent.name.as_str()).collect();
        let joined = names.join(", ");
        let line = match self
            .utterance(PromptId::ContinueConversation, agent, &joined, history)
            .await
        {
            Some(line) => line,
            None => template_reply(history.len(), &names, agent),
        };
        debug!(agent = %agent.id, history = history.len(), "Reply chosen");
        Ok(line)
    }

    async fn should_withdraw(&self, history: &[ChatMessage], agent: &AgentRecord) -> Result<bool> {
        if history.len() >= self.conversation.max_messages {
            debug!(agent = %agent.id, history = history.len(), "Message cap reached, leaving");
            return Ok(true);
        }
        if !self.client.is_available() {
            return Ok(false);
        }

        let decision = match self.request(PromptId::LeaveConversation, agent, "", history) {
            Ok(request) => match self.client.generate(&request.with_json()).await {
                Ok(response) => self.client.parse_structured::<LeaveDecision>(&response),
                Err(e) => Err(e),
            },
            Err(e) => Err(e),
        };
        match decision {
            Ok(LeaveDecision { leave }) => Ok(leave),
            Err(e) => {
                warn!(agent = %agent.id, error = %e, "Leave decision failed, staying");
                Ok(false)
            }
        }
    }
}

/// Normalise raw model output into a single utterance.
///
/// Strips whitespace, a leading `"<name>:"` speaker tag and wrapping quotes,
/// then clamps to `max_chars` characters. Returns `None` when nothing is left.
#[must_use]
pub fn clean_utterance(raw: &str, speaker: &str, max_chars: usize) -> Option<String> {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix(speaker).and_then(|r| r.strip_prefix(':')) {
        text = rest.trim();
    }
    if text.len() >= 2 && text.starts_with('"') && text.ends_with('"') {
        text = text[1..text.len() - 1].trim();
    }
    let clamped: String = text.chars().take(max_chars).collect();
    let clamped = clamped.trim_end();
    if clamped.is_empty() {
        return None;
    }
    Some(clamped.to_string())
}

fn template_greeting(participants: &[String], agent: &AgentRecord) -> String {
    if participants.is_empty() {
        format!("Hello? Is anyone there? I'm {}.", agent.name)
    } else {
        format!(
            "Hi {}! I'm {}. I'm trying to {} today.",
            participants.join(" and "),
            agent.name,
            agent.plan
        )
    }
}

const REPLIES: [&str; 4] = [
    "That's interesting. Tell me more.",
    "Ha, I hadn't thought of it that way.",
    "What are you up to today?",
    "I should get back to what I was doing soon.",
];

fn template_reply(turn: usize, nearby: &[&str], agent: &AgentRecord) -> String {
    let line = if turn % (REPLIES.len() + 1) == REPLIES.len() {
        format!("I've been busy trying to {}.", agent.plan)
    } else {
        REPLIES[turn % (REPLIES.len() + 1)].to_string()
    };
    match nearby.first() {
        Some(name) => format!("{name}, {}{}", line[..1].to_lowercase(), &line[1..]),
        None => line,
    }
}
