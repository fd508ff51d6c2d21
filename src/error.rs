//! Error types for the ledger agent

use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

#[derive(Error, Debug)]
pub enum AgentError {

    // =============================
    // Conversation Errors
    // =============================

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Tool loop exceeded: model kept requesting tools after {0} rounds")]
    ToolLoopExceeded(u32),

    // =============================
    // Tool Errors (reported back to the model)
    // =============================

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid tool arguments: {0}")]
    ArgumentParse(String),

    #[error("Amount out of range: {0}")]
    AmountOutOfRange(String),

    // =============================
    // Startup
    // =============================

    #[error("Configuration error: {0}")]
    Config(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AgentError {
    /// Tool-level failures are fed back to the model instead of ending the turn.
    pub fn is_tool_error(&self) -> bool {
        matches!(
            self,
            AgentError::UnknownTool(_) | AgentError::ArgumentParse(_) | AgentError::AmountOutOfRange(_)
        )
    }
}
