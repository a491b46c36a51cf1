use anyhow::Result;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use linkgate::config::Config;
use linkgate::counter::{CounterStore, MemoryCounterStore, RedisCounterStore};
use linkgate::handlers::AppState;
use linkgate::rate_gate::RateGate;
use linkgate::registry::Registry;
use linkgate::server::Server;
use linkgate::store::RemoteStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    let config = Config::from_env()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("linkgate={},tower_http=debug", config.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("starting linkgate");

    // Configuration problems are reported per request (fail closed), the
    // process still starts so operators see 500s instead of silence.
    if let Err(e) = config.check_credentials() {
        tracing::error!("{}", e);
    }
    if let Err(e) = config.check_tunables() {
        tracing::error!("{}", e);
    }

    let counter_store: Arc<dyn CounterStore> = if config.redis_url.is_empty() {
        tracing::info!("counter backend: in-memory (single instance)");
        Arc::new(MemoryCounterStore::new())
    } else {
        match RedisCounterStore::connect(&config.redis_url).await {
            Ok(store) => {
                tracing::info!("counter backend: redis");
                Arc::new(store)
            }
            Err(e) => {
                tracing::error!("redis unavailable, falling back to in-memory counters: {}", e);
                Arc::new(MemoryCounterStore::new())
            }
        }
    };

    let rate_gate = RateGate::new(
        counter_store,
        config.rate_limit_interval(),
        config.max_daily_writes,
        config.quota_window(),
    );

    let store = RemoteStore::new(
        &config.store_url,
        &config.store_hidden_path,
        config.store_timeout(),
    )
    .map_err(|e| anyhow::anyhow!("Failed to create store client: {}", e))?;

    let registry = Registry::new(Arc::new(store), config.store_entries_limit);

    let bind_addr = config.bind_addr;
    let state = AppState {
        config: Arc::new(config),
        registry,
        rate_gate,
    };

    Server::new(state, bind_addr).run().await
}
