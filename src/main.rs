use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tinumind::api::router;
use tinumind::config::AppConfig;
use tinumind::db;
use tinumind::services::ArchiveScheduler;
use tinumind::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::from_env()?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "tinumind=debug,tower_http=info".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let pool = db::connect_lazy(&config.database_url, config.max_connections)?;
    db::migrate(&pool).await?;

    if let Some(interval) = config.archive_interval {
        let scheduler = ArchiveScheduler::new(pool.clone(), interval);
        tokio::spawn(scheduler.start());
    } else {
        info!("archive scheduler disabled");
    }

    let state = AppState { db: pool.clone() };

    let app = router(state);

    info!("listening on http://{}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
