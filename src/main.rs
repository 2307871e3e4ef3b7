use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use presence::api::router;
use presence::clock::SystemClock;
use presence::config::AppConfig;
use presence::db;
use presence::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "presence=debug".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;

    let pool = db::connect(&config.database_url, config.db_max_connections).await?;

    let state = AppState {
        db: pool.clone(),
        clock: Arc::new(SystemClock),
        policy: config.policy,
    };

    let app = router(state);

    info!(
        "listening on http://{} (edit window {} min)",
        config.bind_addr,
        config.policy.edit_window.num_minutes()
    );

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
