//! Groq chat-completions client
//!
//! Speaks the OpenAI-compatible `/chat/completions` contract.
//! Uses a long-lived reqwest::Client for connection pooling.

use super::{Completion, CompletionClient, CompletionResult};
use crate::config::AgentConfig;
use crate::error::AgentError;
use crate::models::{Message, ToolCall, ToolDeclaration};
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info};

pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";

/// Reusable Groq client (connection-pooled)
pub struct GroqClient {
    client: Client,
    api_key: String,
    model: String,
    endpoint: String,
}

impl GroqClient {
    pub fn new(
        api_key: String,
        model: String,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            api_key,
            model,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
        })
    }

    pub fn from_config(config: &AgentConfig) -> Result<Self> {
        Self::new(
            config.api_key.clone(),
            config.model.clone(),
            &config.api_base_url,
            config.completion_timeout,
        )
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl CompletionClient for GroqClient {
    async fn complete(
        &self,
        transcript: &[Message],
        tools: &[ToolDeclaration],
    ) -> Result<Completion> {
        if self.api_key.is_empty() {
            return Err(AgentError::Provider(
                "GROQ_API_KEY not configured".to_string(),
            ));
        }

        let request = build_request(&self.model, transcript, tools);

        debug!(
            model = %self.model,
            messages = transcript.len(),
            tools = tools.len(),
            "Calling completion API"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Completion request failed: {}", e);
                AgentError::Provider(format!("completion request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!(%status, "Completion API error response: {}", error_text);
            return Err(AgentError::Provider(format!(
                "completion API returned {}: {}",
                status, error_text
            )));
        }

        let body: ChatResponse = response.json().await.map_err(|e| {
            error!("Failed to parse completion response: {}", e);
            AgentError::Provider(format!("completion parse error: {}", e))
        })?;

        let completion = parse_response(body)?;
        let tool_calls = match &completion.result {
            CompletionResult::ToolRequest(calls) => calls.len(),
            CompletionResult::FinalAnswer(_) => 0,
        };
        info!(model = %self.model, tool_calls, "Completion received");

        Ok(completion)
    }
}

fn build_request<'a>(
    model: &'a str,
    transcript: &'a [Message],
    tools: &'a [ToolDeclaration],
) -> ChatRequest<'a> {
    let tools: Vec<ToolSpec<'a>> = tools
        .iter()
        .map(|function| ToolSpec {
            kind: "function",
            function,
        })
        .collect();

    ChatRequest {
        model,
        messages: transcript,
        tool_choice: if tools.is_empty() { None } else { Some("auto") },
        tools,
    }
}

fn parse_response(body: ChatResponse) -> Result<Completion> {
    let choice = body
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| AgentError::Provider("No choices in completion response".to_string()))?;

    if let Some(reason) = choice.finish_reason.as_deref() {
        debug!(finish_reason = reason, "Completion finished");
    }

    Completion::from_assistant(
        choice.message.content,
        choice.message.tool_calls.unwrap_or_default(),
    )
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ToolSpec<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
}

#[derive(Debug, Serialize)]
struct ToolSpec<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: &'a ToolDeclaration,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ToolCall>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::Ledger;
    use crate::tools::ToolRegistry;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_request_serialization() {
        let registry = ToolRegistry::new(Arc::new(Ledger::new()));
        let transcript = vec![
            Message::system("You are a personal finance assistant."),
            Message::user("What is my balance?"),
        ];

        let request = build_request(DEFAULT_MODEL, &transcript, registry.declarations());
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["model"], DEFAULT_MODEL);
        assert_eq!(value["messages"][1], json!({"role": "user", "content": "What is my balance?"}));
        assert_eq!(value["tool_choice"], "auto");
        assert_eq!(value["tools"][0]["type"], "function");
        assert_eq!(value["tools"][0]["function"]["name"], "getTotalExpense");
        assert!(value["tools"][3]["function"].get("parameters").is_none());
    }

    #[test]
    fn test_parse_tool_call_response() {
        let body: ChatResponse = serde_json::from_value(json!({
            "id": "chatcmpl-1",
            "choices": [{
                "index": 0,
                "finish_reason": "tool_calls",
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_abc",
                        "type": "function",
                        "function": {
                            "name": "addExpense",
                            "arguments": "{\"name\":\"coffee\",\"amount\":\"5\"}"
                        }
                    }]
                }
            }]
        }))
        .unwrap();

        let completion = parse_response(body).unwrap();
        match completion.result {
            CompletionResult::ToolRequest(calls) => {
                assert_eq!(calls.len(), 1);
                assert_eq!(calls[0].id, "call_abc");
                assert_eq!(calls[0].arguments(), "{\"name\":\"coffee\",\"amount\":\"5\"}");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_parse_text_response_with_null_tool_calls() {
        let body: ChatResponse = serde_json::from_value(json!({
            "choices": [{
                "finish_reason": "stop",
                "message": { "role": "assistant", "content": "Done.", "tool_calls": null }
            }]
        }))
        .unwrap();

        let completion = parse_response(body).unwrap();
        assert_eq!(completion.result, CompletionResult::FinalAnswer("Done.".into()));
    }

    #[test]
    fn test_parse_empty_choices_is_provider_error() {
        let body: ChatResponse = serde_json::from_value(json!({ "choices": [] })).unwrap();
        assert!(matches!(parse_response(body), Err(AgentError::Provider(_))));
    }

    #[tokio::test]
    async fn test_missing_api_key() {
        let client = GroqClient::new(
            String::new(),
            DEFAULT_MODEL.to_string(),
            DEFAULT_BASE_URL,
            Duration::from_secs(5),
        )
        .unwrap();

        let err = client
            .complete(&[Message::user("hi")], &[])
            .await
            .unwrap_err();

        assert!(matches!(err, AgentError::Provider(_)));
        assert!(err.to_string().contains("GROQ_API_KEY"));
    }
}
