//! Conversation loop
//!
//! USER → COMPLETE → (DISPATCH TOOLS → COMPLETE)* → ANSWER
//!
//! A [`Conversation`] owns one transcript. Each call to
//! [`Conversation::respond`] is one user turn: the model is asked for a
//! completion, requested tools are run in order against the ledger, and the
//! loop repeats until the model answers in plain text.

use crate::completion::{CompletionClient, CompletionResult};
use crate::error::AgentError;
use crate::models::{Message, ToolCall, ToolDeclaration};
use crate::tools::ToolRegistry;
use crate::Result;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Shown to the user when a turn fails.
pub const GENERIC_FAILURE: &str = "Sorry, something went wrong. Please try again.";

/// Build the system prompt: role, tool catalog and current date-time.
pub fn build_system_prompt(tools: &[ToolDeclaration], now: DateTime<Utc>) -> String {
    let catalog = tools
        .iter()
        .enumerate()
        .map(|(i, tool)| format!("{}. {}: {}", i + 1, tool.name, tool.description))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You are a personal finance assistant. Your task is to assist user with their expenses, balances and financial planning.
You have access to following tools:
{}

current datetime: {}"#,
        catalog,
        now.to_rfc2822()
    )
}

/// Ordered, append-only message history.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    pub fn new(system_prompt: String) -> Self {
        Self {
            messages: vec![Message::system(system_prompt)],
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    fn truncate(&mut self, len: usize) {
        self.messages.truncate(len);
    }
}

/// Messages appended during a turn are discarded unless the turn commits,
/// including when the turn future is dropped mid-flight.
struct TurnGuard<'a> {
    transcript: &'a mut Transcript,
    mark: usize,
    committed: bool,
}

impl<'a> TurnGuard<'a> {
    fn begin(transcript: &'a mut Transcript) -> Self {
        let mark = transcript.len();
        Self {
            transcript,
            mark,
            committed: false,
        }
    }

    fn push(&mut self, message: Message) {
        self.transcript.push(message);
    }

    fn messages(&self) -> &[Message] {
        self.transcript.messages()
    }

    fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for TurnGuard<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.transcript.truncate(self.mark);
        }
    }
}

pub struct Conversation {
    session_id: Uuid,
    transcript: Transcript,
    client: Arc<dyn CompletionClient>,
    registry: Arc<ToolRegistry>,
    max_tool_rounds: u32,
}

impl Conversation {
    pub fn new(
        client: Arc<dyn CompletionClient>,
        registry: Arc<ToolRegistry>,
        max_tool_rounds: u32,
    ) -> Self {
        let system_prompt = build_system_prompt(registry.declarations(), Utc::now());

        Self {
            session_id: Uuid::new_v4(),
            transcript: Transcript::new(system_prompt),
            client,
            registry,
            max_tool_rounds,
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Process one user utterance and return the model's final answer.
    ///
    /// On error the transcript is left as it was before the call. Ledger
    /// writes made by tools during the failed turn are kept.
    pub async fn respond(&mut self, utterance: &str) -> Result<String> {
        let session_id = self.session_id;
        let mut turn = TurnGuard::begin(&mut self.transcript);
        turn.push(Message::user(utterance));

        info!(%session_id, "User turn started");

        let mut rounds: u32 = 0;

        loop {
            let completion = self
                .client
                .complete(turn.messages(), self.registry.declarations())
                .await
                .map_err(|e| {
                    warn!(%session_id, round = rounds, error = %e, "Completion failed, turn aborted");
                    e
                })?;

            turn.push(completion.message);

            match completion.result {
                CompletionResult::FinalAnswer(text) => {
                    turn.commit();
                    info!(%session_id, rounds, "User turn answered");
                    return Ok(text);
                }
                CompletionResult::ToolRequest(calls) => {
                    if rounds >= self.max_tool_rounds {
                        warn!(
                            %session_id,
                            max_rounds = self.max_tool_rounds,
                            "Model kept requesting tools, turn aborted"
                        );
                        return Err(AgentError::ToolLoopExceeded(self.max_tool_rounds));
                    }
                    rounds += 1;

                    debug!(%session_id, round = rounds, calls = calls.len(), "Dispatching tool calls");

                    for call in &calls {
                        let reply = run_tool_call(&self.registry, call).await;
                        turn.push(Message::tool(call.id.clone(), reply));
                    }
                }
            }
        }
    }
}

/// Tool failures become the tool reply so the model can recover.
async fn run_tool_call(registry: &ToolRegistry, call: &ToolCall) -> String {
    match registry.dispatch(call.tool_name(), call.arguments()).await {
        Ok(reply) => {
            debug!(tool = call.tool_name(), call_id = %call.id, "Tool call succeeded");
            reply
        }
        Err(e) => {
            warn!(tool = call.tool_name(), call_id = %call.id, error = %e, "Tool call failed");
            format!("Error: {}", e)
        }
    }
}
