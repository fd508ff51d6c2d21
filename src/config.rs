//! Environment configuration
//!
//! Binaries call `dotenv` first, then [`AgentConfig::from_env`].

use crate::completion::groq::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use crate::error::AgentError;
use crate::ledger::DEFAULT_CURRENCY;
use crate::Result;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_MAX_TOOL_ROUNDS: u32 = 8;
pub const DEFAULT_COMPLETION_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub api_key: String,
    pub model: String,
    pub api_base_url: String,
    pub port: u16,
    pub max_tool_rounds: u32,
    pub completion_timeout: Duration,
    pub currency: String,
    pub static_dir: PathBuf,
}

impl AgentConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the config from any key lookup; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let timeout_secs = parse_or(&get, "COMPLETION_TIMEOUT_SECS", DEFAULT_COMPLETION_TIMEOUT_SECS)?;
        if timeout_secs == 0 {
            return Err(AgentError::Config(
                "COMPLETION_TIMEOUT_SECS must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            api_key: get("GROQ_API_KEY").unwrap_or_default(),
            model: get("GROQ_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            api_base_url: get("GROQ_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            port: parse_or(&get, "PORT", DEFAULT_PORT)?,
            max_tool_rounds: parse_or(&get, "MAX_TOOL_ROUNDS", DEFAULT_MAX_TOOL_ROUNDS)?,
            completion_timeout: Duration::from_secs(timeout_secs),
            currency: get("LEDGER_CURRENCY").unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
            static_dir: get("STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("public")),
        })
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            api_base_url: DEFAULT_BASE_URL.to_string(),
            port: DEFAULT_PORT,
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
            completion_timeout: Duration::from_secs(DEFAULT_COMPLETION_TIMEOUT_SECS),
            currency: DEFAULT_CURRENCY.to_string(),
            static_dir: PathBuf::from("public"),
        }
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .parse()
            .map_err(|e| AgentError::Config(format!("{}={:?}: {}", key, raw, e))),
        None => Ok(default),
    }
}
