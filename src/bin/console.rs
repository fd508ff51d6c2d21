use ledger_agent::{
    completion::GroqClient,
    config::AgentConfig,
    console,
    conversation::Conversation,
    ledger::Ledger,
    tools::ToolRegistry,
};
use std::sync::Arc;
use tokio::io::BufReader;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so they don't interleave with the chat
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    dotenv::dotenv().ok();

    let config = AgentConfig::from_env()?;
    if config.api_key.is_empty() {
        eprintln!("GROQ_API_KEY not set; every turn will fail until it is configured");
    }

    let ledger = Arc::new(Ledger::with_currency(config.currency.clone()));
    let registry = Arc::new(ToolRegistry::new(ledger));
    let client = Arc::new(GroqClient::from_config(&config)?);

    info!(model = %client.model(), "Ledger agent console starting");

    let mut conversation = Conversation::new(client, registry, config.max_tool_rounds);

    console::run(
        &mut conversation,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
    )
    .await?;

    Ok(())
}
