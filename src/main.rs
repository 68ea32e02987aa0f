mod blocks;
mod config;
mod ingest;
mod notion;

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::ingest::{start_polling, Ingestor};
use crate::notion::NotionClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "notion_rss=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenv::dotenv().ok();
    let config = Config::from_env()?;
    info!(
        "Configured for feed database {} and content database {}",
        config.feeds_database_id, config.content_database_id
    );

    // Create client and ingestor
    let notion = NotionClient::new(&config);
    let ingestor = Arc::new(Ingestor::new(notion, &config));

    // Run the polling loop
    start_polling(ingestor, config.poll_interval).await;

    Ok(())
}
