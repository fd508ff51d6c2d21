use ledger_agent::{
    api::{start_server, ApiState},
    completion::GroqClient,
    config::AgentConfig,
    ledger::Ledger,
    tools::ToolRegistry,
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load environment variables
    dotenv::dotenv().ok();

    let config = AgentConfig::from_env()?;
    if config.api_key.is_empty() {
        warn!("GROQ_API_KEY not set; chat turns will fail until it is configured");
    }

    info!("Ledger Agent - Web Server");
    info!(port = config.port, model = %config.model, "Configuration loaded");

    // One ledger for the whole process, one conversation per socket
    let ledger = Arc::new(Ledger::with_currency(config.currency.clone()));
    let registry = Arc::new(ToolRegistry::new(ledger));
    let client = Arc::new(GroqClient::from_config(&config)?);

    let state = ApiState {
        client,
        registry,
        max_tool_rounds: config.max_tool_rounds,
    };

    start_server(state, &config.static_dir, config.port).await?;

    Ok(())
}
