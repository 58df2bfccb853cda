use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use feedwatch::config::Config;
use feedwatch::fetcher::Fetcher;
use feedwatch::store::Store;
use feedwatch::sync::{start_sync_loop, SyncEngine};

const CONFIG_PATH: &str = "feedwatch.toml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "feedwatch=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration, falling back to defaults when absent
    let config = if Path::new(CONFIG_PATH).exists() {
        Config::load(CONFIG_PATH)?
    } else {
        Config::default()
    };
    info!("Sync interval: {} minutes", config.sync_interval);

    // Initialize the store
    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "sqlite:feedwatch.db?mode=rwc".to_string());
    let store = Store::new(&database_url).await?;
    store.initialize().await?;
    info!("Store initialized");

    let store = Arc::new(store);

    // Seed subscriptions from configuration on first start
    if store.list_sources().await?.is_empty() && !config.sources.is_empty() {
        for source in &config.sources {
            if store.add_source(&source.name, &source.url).await? {
                info!("Registered source '{}'", source.name);
            } else {
                warn!("Skipping configured source with empty name or url");
            }
        }
    }

    // Create the sync engine
    let engine = Arc::new(SyncEngine::new(store.clone(), Fetcher::new()));

    // Log progress as sources are visited
    let mut progress = engine.progress();
    tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            let p = *progress.borrow();
            if p.sources_total > 0 {
                info!(
                    "Sync progress: {}/{} sources",
                    p.sources_done, p.sources_total
                );
            }
        }
    });

    // Drive sync cycles in the foreground
    start_sync_loop(engine, store, config.sync_interval).await;

    Ok(())
}
