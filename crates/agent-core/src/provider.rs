//! Model Backend Interface
//!
//! Strategy trait every model backend implements. The orchestrator works
//! exclusively through this interface; backends are constructed once with
//! their own configuration and injected by reference.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::message::{Message, ToolCallRequest};
use crate::schema::ResponseSchema;
use crate::tool::ToolSpec;

/// Tool selection constraint for a model turn
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolChoice {
    /// The model decides whether to call a tool
    Auto,

    /// The model must issue at least one tool call request
    Required,
}

/// One assistant turn as returned by the backend
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AssistantReply {
    /// Text content, possibly empty when the reply is tool calls only
    pub content: String,

    /// Tool call requests, in the order the model issued them
    #[serde(default)]
    pub tool_calls: Vec<ToolCallRequest>,
}

impl AssistantReply {
    /// Text-only reply
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    /// Reply carrying tool call requests
    pub fn with_calls(content: impl Into<String>, tool_calls: Vec<ToolCallRequest>) -> Self {
        Self {
            content: content.into(),
            tool_calls,
        }
    }

    /// Convert into the assistant message appended to the log
    pub fn into_message(self) -> Message {
        Message::assistant_with_calls(self.content, self.tool_calls)
    }
}

/// Strategy trait for model backends.
///
/// `invoke` performs one chat turn against the advertised tools; failures
/// propagate as [`crate::AgentError::Backend`] with no retries at this
/// layer. `invoke_structured` is the distinct mode whose contract guarantees
/// a schema-conformant object by construction.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// One model turn over the message log with advertised capabilities
    async fn invoke(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
        tool_choice: ToolChoice,
    ) -> Result<AssistantReply>;

    /// One model turn constrained to return an object conforming to the
    /// schema: never free text, never a tool call
    async fn invoke_structured(
        &self,
        messages: &[Message],
        schema: &ResponseSchema,
    ) -> Result<Value>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_reply_into_message() {
        let call = ToolCallRequest::new(
            "call_1",
            "get_weather",
            [("city".to_string(), json!("sf"))].into_iter().collect(),
        );
        let message = AssistantReply::with_calls("checking", vec![call]).into_message();

        assert!(message.is_assistant());
        assert_eq!(message.text(), "checking");
        assert_eq!(message.tool_calls().len(), 1);
    }

    #[test]
    fn test_text_reply_has_no_calls() {
        let message = AssistantReply::text("75 and sunny").into_message();
        assert!(message.tool_calls().is_empty());
    }
}
