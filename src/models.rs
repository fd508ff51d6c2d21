//! Core data models shared by the conversation loop, tools and completion client

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

//
// ================= Ledger =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LedgerEntry {
    pub name: String,
    pub amount: Decimal,
    pub recorded_at: DateTime<Utc>,
}

//
// ================= Transcript =================
//

/// One transcript unit, tagged by role the way the chat-completions wire
/// format expects it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },
    Tool {
        tool_call_id: String,
        content: String,
    },
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Message::System {
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Message::User {
            content: content.into(),
        }
    }

    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Message::Tool {
            tool_call_id: tool_call_id.into(),
            content: content.into(),
        }
    }

    pub fn role(&self) -> &'static str {
        match self {
            Message::System { .. } => "system",
            Message::User { .. } => "user",
            Message::Assistant { .. } => "assistant",
            Message::Tool { .. } => "tool",
        }
    }
}

/// One model-issued request to run a tool.
///
/// `arguments` stays the raw JSON-encoded string the model produced so the
/// assistant message can be echoed back unchanged.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type", default = "function_kind")]
    pub kind: String,
    pub function: FunctionCall,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: String,
}

fn function_kind() -> String {
    "function".to_string()
}

impl ToolCall {
    pub fn new(
        id: impl Into<String>,
        tool_name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind: function_kind(),
            function: FunctionCall {
                name: tool_name.into(),
                arguments: arguments.into(),
            },
        }
    }

    pub fn tool_name(&self) -> &str {
        &self.function.name
    }

    pub fn arguments(&self) -> &str {
        &self.function.arguments
    }
}

//
// ================= Tool Declarations =================
//

/// Static description of a callable tool, included in every completion request.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ToolDeclaration {
    pub name: &'static str,
    pub description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_assistant_tool_call_wire_shape() {
        let message = Message::Assistant {
            content: None,
            tool_calls: vec![ToolCall::new(
                "call_1",
                "addExpense",
                r#"{"name":"coffee","amount":5}"#,
            )],
        };

        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(
            value,
            json!({
                "role": "assistant",
                "tool_calls": [{
                    "id": "call_1",
                    "type": "function",
                    "function": {
                        "name": "addExpense",
                        "arguments": "{\"name\":\"coffee\",\"amount\":5}"
                    }
                }]
            })
        );
    }

    #[test]
    fn test_provider_message_with_null_content_parses() {
        let raw = json!({
            "role": "assistant",
            "content": null,
            "tool_calls": [{
                "id": "call_9",
                "type": "function",
                "function": { "name": "getMoneyBalance", "arguments": "{}" }
            }]
        });

        let message: Message = serde_json::from_value(raw).unwrap();
        match message {
            Message::Assistant { content, tool_calls } => {
                assert!(content.is_none());
                assert_eq!(tool_calls.len(), 1);
                assert_eq!(tool_calls[0].tool_name(), "getMoneyBalance");
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_tool_message_carries_call_id() {
        let value = serde_json::to_value(Message::tool("call_1", "Added to the expense database.")).unwrap();
        assert_eq!(value["role"], "tool");
        assert_eq!(value["tool_call_id"], "call_1");
    }
}
