use std::sync::Arc;

use agent_memory::{Config, LlmSummarizer, MemoryService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    agent_memory::telemetry::init_tracing();

    let config = Config::from_env()?;
    let summarizer = Arc::new(LlmSummarizer::from_config(&config)?);
    let service = MemoryService::open(&config, summarizer)?;
    service.initialize(false)?;

    let status = service.get_status()?;
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}
