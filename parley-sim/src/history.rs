//! Transcript → chat history.

use parley_core::{ChatMessage, Message};

/// Render a conversation transcript as decider chat history.
///
/// Each message becomes one `user` turn of the form
/// `"<sender> to <recipients>: <text>"`, oldest first.
#[must_use]
pub fn render(messages: &[Message]) -> Vec<ChatMessage> {
    messages.iter().map(|m| ChatMessage::user(m.render())).collect()
}
