//! Completion client trait and implementations
//!
//! A completion client takes the transcript and the tool catalog and returns
//! the model's next assistant message.

use crate::error::AgentError;
use crate::models::{Message, ToolCall, ToolDeclaration};
use crate::Result;
use async_trait::async_trait;

pub mod groq;
pub mod scripted;

pub use groq::GroqClient;
pub use scripted::ScriptedClient;

/// What the model wants next.
#[derive(Debug, Clone, PartialEq)]
pub enum CompletionResult {
    FinalAnswer(String),
    ToolRequest(Vec<ToolCall>),
}

/// One completion: the assistant message to append verbatim plus its
/// interpretation.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub message: Message,
    pub result: CompletionResult,
}

impl Completion {
    /// Interpret an assistant message. Tool calls win over text; a message
    /// with neither is a provider error.
    pub fn from_assistant(content: Option<String>, tool_calls: Vec<ToolCall>) -> Result<Self> {
        let result = if !tool_calls.is_empty() {
            CompletionResult::ToolRequest(tool_calls.clone())
        } else {
            match content.as_deref().map(str::trim) {
                Some(text) if !text.is_empty() => CompletionResult::FinalAnswer(text.to_string()),
                _ => {
                    return Err(AgentError::Provider(
                        "assistant message has neither text nor tool calls".to_string(),
                    ))
                }
            }
        };

        Ok(Self {
            message: Message::Assistant {
                content,
                tool_calls,
            },
            result,
        })
    }

    pub fn final_answer(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            message: Message::Assistant {
                content: Some(text.clone()),
                tool_calls: Vec::new(),
            },
            result: CompletionResult::FinalAnswer(text),
        }
    }

    pub fn tool_request(calls: Vec<ToolCall>) -> Self {
        Self {
            message: Message::Assistant {
                content: None,
                tool_calls: calls.clone(),
            },
            result: CompletionResult::ToolRequest(calls),
        }
    }
}

/// Adapter over an LLM provider's chat-completions endpoint
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(
        &self,
        transcript: &[Message],
        tools: &[ToolDeclaration],
    ) -> Result<Completion>;
}
