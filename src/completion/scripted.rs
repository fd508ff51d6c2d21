//! Scripted completion client for development & testing
//!
//! Replays a fixed queue of completions and keeps a copy of every request,
//! so the conversation loop can run without a provider.

use super::{Completion, CompletionClient};
use crate::error::AgentError;
use crate::models::{Message, ToolCall, ToolDeclaration};
use crate::Result;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

enum Step {
    Reply(Completion),
    Fail(String),
}

#[derive(Default)]
pub struct ScriptedClient {
    steps: Mutex<VecDeque<Step>>,
    requests: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then_answer(self, text: &str) -> Self {
        self.push(Step::Reply(Completion::final_answer(text)))
    }

    /// Queue a tool request; each call is `(id, tool name, JSON argument string)`.
    pub fn then_call(self, calls: &[(&str, &str, &str)]) -> Self {
        let calls = calls
            .iter()
            .map(|(id, name, args)| ToolCall::new(*id, *name, *args))
            .collect();
        self.push(Step::Reply(Completion::tool_request(calls)))
    }

    pub fn then_fail(self, reason: &str) -> Self {
        self.push(Step::Fail(reason.to_string()))
    }

    fn push(self, step: Step) -> Self {
        if let Ok(mut steps) = self.steps.lock() {
            steps.push_back(step);
        }
        self
    }

    /// Transcripts received so far, one per `complete` call.
    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    pub fn remaining(&self) -> usize {
        self.steps.lock().map(|steps| steps.len()).unwrap_or(0)
    }
}

#[async_trait]
impl CompletionClient for ScriptedClient {
    async fn complete(
        &self,
        transcript: &[Message],
        _tools: &[ToolDeclaration],
    ) -> Result<Completion> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(transcript.to_vec());
        }

        let step = self
            .steps
            .lock()
            .map_err(|_| AgentError::Provider("script lock poisoned".to_string()))?
            .pop_front();

        match step {
            Some(Step::Reply(completion)) => Ok(completion),
            Some(Step::Fail(reason)) => Err(AgentError::Provider(reason)),
            None => Err(AgentError::Provider("script exhausted".to_string())),
        }
    }
}
