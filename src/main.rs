use std::sync::Arc;

use anyhow::Result;
use dotenvy::dotenv;
use tracing_subscriber::EnvFilter;

use joycycles_backend::clock::SystemClock;
use joycycles_backend::config::AppConfig;
use joycycles_backend::service::CycleService;
use joycycles_backend::store::{MemoryStore, PgStore};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::from_env()?;
    let clock = Arc::new(SystemClock);

    let service = match config.database_url.as_deref() {
        Some(url) => {
            let store = Arc::new(PgStore::connect(url, config.max_connections).await?);
            tracing::info!("🐘 Connected to Postgres");
            CycleService::new(store.clone(), store.clone(), store, clock, config.defaults)
        }
        None => {
            tracing::warn!("⚠️ DATABASE_URL not set, keeping data in memory");
            let store = Arc::new(MemoryStore::new());
            CycleService::new(store.clone(), store.clone(), store, clock, config.defaults)
        }
    };

    let app = joycycles_backend::app(service);

    let addr = config.socket_addr();
    tracing::info!("🧠 Server running at {}", addr);

    axum::serve(
        tokio::net::TcpListener::bind(addr).await?,
        app.into_make_service(),
    )
    .await?;

    Ok(())
}
