//! Role-tagged chat messages in the OpenAI-compatible wire shape.

use serde::{Deserialize, Serialize};

/// One message of a conversation.
///
/// Messages are a closed set of role variants, each carrying exactly the
/// fields that role requires: a `tool` message cannot exist without its
/// `tool_call_id`, a `function` result cannot exist without the function
/// `name`. Serde tags the variant with the standard `role` field, so the
/// serialized form is the plain `{"role": ..., "content": ...}` object the
/// chat-completion endpoints expect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        #[serde(default)]
        content: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tool_calls: Option<Vec<ToolCall>>,
    },
    Tool {
        content: String,
        tool_call_id: String,
    },
    Function {
        name: String,
        #[serde(default)]
        content: Option<String>,
    },
}

impl Message {
    pub fn system(text: impl Into<String>) -> Self {
        Message::System {
            content: text.into(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Message::User {
            content: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Message::Assistant {
            content: Some(text.into()),
            tool_calls: None,
        }
    }

    pub fn tool(text: impl Into<String>, tool_call_id: impl Into<String>) -> Self {
        Message::Tool {
            content: text.into(),
            tool_call_id: tool_call_id.into(),
        }
    }

    /// The textual content of the message, if any.
    pub fn content(&self) -> Option<&str> {
        match self {
            Message::System { content }
            | Message::User { content }
            | Message::Tool { content, .. } => Some(content),
            Message::Assistant { content, .. } | Message::Function { content, .. } => {
                content.as_deref()
            }
        }
    }

    /// The wire name of this message's role.
    pub fn role(&self) -> &'static str {
        match self {
            Message::System { .. } => "system",
            Message::User { .. } => "user",
            Message::Assistant { .. } => "assistant",
            Message::Tool { .. } => "tool",
            Message::Function { .. } => "function",
        }
    }
}

/// A tool invocation requested by the assistant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub call_type: String,
    pub function: FunctionCall,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded argument object, exactly as the endpoint produced it.
    pub arguments: String,
}
