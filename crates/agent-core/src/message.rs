//! Conversation Messages
//!
//! Tagged message variants and the per-invocation conversation state that
//! every orchestration node reads from and appends to.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// A tool invocation requested by the model backend
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Call identifier, unique within the owning assistant message
    pub id: String,

    /// Registered tool name
    pub name: String,

    /// Arguments as parameter-name to value pairs
    pub arguments: Map<String, Value>,
}

impl ToolCallRequest {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: Map<String, Value>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// A single message in a conversation
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Message {
    /// Opaque text authored by the end user
    Human { content: String },

    /// Model backend reply: text and/or tool call requests
    Assistant {
        content: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCallRequest>,
    },

    /// Output of one tool execution, tagged with the originating call
    ToolResult {
        call_id: String,
        tool_name: String,
        content: String,
        #[serde(default)]
        is_error: bool,
    },
}

impl Message {
    /// Create a human message
    pub fn human(content: impl Into<String>) -> Self {
        Self::Human {
            content: content.into(),
        }
    }

    /// Create a text-only assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::Assistant {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    /// Create an assistant message carrying tool call requests
    pub fn assistant_with_calls(
        content: impl Into<String>,
        tool_calls: Vec<ToolCallRequest>,
    ) -> Self {
        Self::Assistant {
            content: content.into(),
            tool_calls,
        }
    }

    /// Create a successful tool result message
    pub fn tool_result(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self::ToolResult {
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            content: content.into(),
            is_error: false,
        }
    }

    /// Create an error-bearing tool result message
    pub fn tool_error(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self::ToolResult {
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            content: content.into(),
            is_error: true,
        }
    }

    /// Tool call requests carried by this message (empty unless assistant)
    pub fn tool_calls(&self) -> &[ToolCallRequest] {
        match self {
            Message::Assistant { tool_calls, .. } => tool_calls,
            _ => &[],
        }
    }

    /// Text content of the message, regardless of variant
    pub fn text(&self) -> &str {
        match self {
            Message::Human { content }
            | Message::Assistant { content, .. }
            | Message::ToolResult { content, .. } => content,
        }
    }

    pub fn is_assistant(&self) -> bool {
        matches!(self, Message::Assistant { .. })
    }

    pub fn is_tool_result(&self) -> bool {
        matches!(self, Message::ToolResult { .. })
    }
}

/// Unique identifier for one orchestrator invocation
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InvocationId(String);

impl InvocationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for InvocationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for InvocationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Conversation state owned by a single orchestrator invocation.
///
/// The log is append-only: messages are never edited or removed. The final
/// response is absent until a terminal node populates it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConversationState {
    /// Invocation identifier, for log correlation
    id: InvocationId,

    /// Ordered message log
    messages: Vec<Message>,

    /// Structured final response, set by the formatting node
    final_response: Option<Value>,

    /// Creation timestamp
    created_at: DateTime<Utc>,

    /// Last append timestamp
    updated_at: DateTime<Utc>,
}

impl ConversationState {
    /// Create state seeded with the caller's initial human message
    pub fn new(initial_human_text: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: InvocationId::new(),
            messages: vec![Message::human(initial_human_text)],
            final_response: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn id(&self) -> &InvocationId {
        &self.id
    }

    /// Append a message
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
        self.updated_at = Utc::now();
    }

    /// All messages, oldest first
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// The most recent message
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Set the structured final response
    pub fn set_final_response(&mut self, response: Value) {
        self.final_response = Some(response);
        self.updated_at = Utc::now();
    }

    pub fn final_response(&self) -> Option<&Value> {
        self.final_response.as_ref()
    }

    /// Consume the state, yielding the final response if one was set
    pub fn into_final_response(self) -> Option<Value> {
        self.final_response
    }

    /// Number of messages
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}
