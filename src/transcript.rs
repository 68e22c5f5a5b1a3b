//! The chat transcript: an ordered, append-only list of rendered messages.

use serde_json::Value;

use crate::api::ChatReply;

/// Marker that precedes a copyable shell command in a technical message.
pub const COMMAND_MARKER: &str = "Command:\n";

pub const THINKING_TEXT: &str = "Thinking...";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    User,
    Bot,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub text: String,
    pub sender: Sender,
    /// Rendered verbatim in a code style, and copyable when it carries a command.
    pub technical: bool,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self { text: text.into(), sender: Sender::User, technical: false }
    }

    pub fn bot(text: impl Into<String>) -> Self {
        Self { text: text.into(), sender: Sender::Bot, technical: false }
    }

    pub fn technical(text: impl Into<String>) -> Self {
        Self { text: text.into(), sender: Sender::Bot, technical: true }
    }

    /// The command embedded after [`COMMAND_MARKER`], if this is a technical message that has one.
    pub fn command(&self) -> Option<&str> {
        if !self.technical {
            return None;
        }
        let start = self.text.find(COMMAND_MARKER)? + COMMAND_MARKER.len();
        Some(self.text[start..].trim())
    }
}

/// Stable handle to a transcript entry, so an entry can be removed without
/// searching by content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageId(u64);

#[derive(Debug, Default)]
pub struct Transcript {
    entries: Vec<(MessageId, ChatMessage)>,
    next_id: u64,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: ChatMessage) -> MessageId {
        let id = MessageId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, message));
        id
    }

    /// Remove an entry by handle, returning the index it sat at.
    pub fn remove(&mut self, id: MessageId) -> Option<(usize, ChatMessage)> {
        let index = self.entries.iter().position(|(entry_id, _)| *entry_id == id)?;
        Some((index, self.entries.remove(index).1))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ChatMessage> {
        self.entries.get(index).map(|(_, message)| message)
    }

    pub fn iter(&self) -> impl Iterator<Item = (MessageId, &ChatMessage)> {
        self.entries.iter().map(|(id, message)| (*id, message))
    }
}

/// JavaScript-style truthiness, which is what the backend's optional fields are written against.
pub(crate) fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

pub(crate) fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn pretty_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// Format a suggested action for the transcript: a labelled block when it
/// carries a command, otherwise the raw JSON.
pub fn technical_action_message(action: &Value) -> ChatMessage {
    match action.get("command").filter(|c| truthy(c)) {
        Some(command) => {
            let kind = action
                .get("type")
                .filter(|t| !t.is_null())
                .map(display_value)
                .unwrap_or_else(|| "N/A".to_string());
            ChatMessage::technical(format!(
                "Technical Action:\nType: {}\n{}{}",
                kind,
                COMMAND_MARKER,
                display_value(command)
            ))
        }
        None => ChatMessage::technical(format!("Technical Action: {}", pretty_json(action))),
    }
}

/// Messages to append for a successful `/chat` reply, in order.
pub fn reply_messages(reply: &ChatReply) -> Vec<ChatMessage> {
    let mut messages = Vec::new();

    if let Some(text) = reply.user_response.as_deref().filter(|t| !t.is_empty()) {
        messages.push(ChatMessage::bot(text));
    }
    if let Some(action) = reply.action() {
        messages.push(technical_action_message(action));
    }

    messages
}
