use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use bookit::config::AppConfig;
use bookit::db;
use bookit::services::accounts;
use bookit::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();
    if config.jwt_secret == "changeme" {
        tracing::warn!("JWT_SECRET_KEY is not set, using the insecure default");
    }

    let mut conn = db::init_db(&config.database_url)?;
    accounts::ensure_admin(&mut conn, &config)
        .map_err(|e| anyhow::anyhow!("failed to ensure admin account: {e}"))?;

    let addr = format!("0.0.0.0:{}", config.port);
    let state = Arc::new(AppState::new(conn, config));
    let app = bookit::app(state);

    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
