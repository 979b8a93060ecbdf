use std::sync::Arc;

use murmur_app::{config::Config, logging::init_logging, repl::Repl};
use murmur_llm::ClientFactory;
use murmur_persist::{InMemoryPersistenceClient, PersistenceClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    let config = Config::load()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

    init_logging(&config.logging);

    tracing::info!(model = %config.llm.model, "Starting murmur");

    let client = ClientFactory::create_chat_client(config.chat_provider())?;
    let speech = config
        .speech_provider()
        .map(ClientFactory::create_speech_client)
        .transpose()?;
    if speech.is_none() {
        tracing::info!("GOOGLE_API_KEY not set; speech output disabled");
    }

    let store: Arc<dyn PersistenceClient> = Arc::new(InMemoryPersistenceClient::new());

    let mut repl = Repl::new(
        client,
        speech,
        store,
        config.llm.model.clone(),
        config.chat_options(),
    )
    .await?;

    repl.run().await
}
