use dotenv::dotenv;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use staff_directory::{app, AppConfig, BackupService, MemoryUserStore, PgUserStore, SharedStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "staff_directory=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;

    // Connect to PostgreSQL, or keep everything in memory
    let store: SharedStore = match &config.database_url {
        Some(database_url) => {
            let store = PgUserStore::connect(database_url).await?;
            store.migrate().await?;
            tracing::info!("connected to PostgreSQL");
            Arc::new(store)
        }
        None => {
            tracing::warn!("DATABASE_URL not set; users are kept in memory and lost on exit");
            Arc::new(MemoryUserStore::new())
        }
    };

    let backups = Arc::new(BackupService::new(
        store.clone(),
        config.backup_dir.clone(),
        config.restore_mode,
    ));
    tracing::info!(
        dir = %config.backup_dir.display(),
        restore_mode = %config.restore_mode,
        "backup service ready"
    );

    let router = match &config.frontend_dir {
        Some(dist) => {
            tracing::info!(dir = %dist.display(), "serving frontend");
            app::router_with_frontend(store, backups, dist)
        }
        None => app::router(store, backups),
    };

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("🚀 Listening on http://{}", config.bind_addr);

    axum::serve(listener, router).await?;
    Ok(())
}
