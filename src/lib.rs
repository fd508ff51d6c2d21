//! Ledger Agent
//!
//! A personal-finance chat agent that:
//! - Keeps an in-memory expense and income ledger
//! - Exposes ledger operations to an LLM as callable tools
//! - Runs the tool-calling loop until the model answers in plain text
//! - Serves console and WebSocket chat sessions
//!
//! TURN LOOP:
//! USER → COMPLETE → (DISPATCH TOOLS → COMPLETE)* → ANSWER

pub mod api;
pub mod completion;
pub mod config;
pub mod console;
pub mod conversation;
pub mod error;
pub mod ledger;
pub mod models;
pub mod tools;

pub use error::Result;

// Re-export common types
pub use models::*;
pub use config::AgentConfig;
pub use conversation::Conversation;
