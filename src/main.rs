use anyhow::Context;
use startup_scout::{config::AppConfig, create_app, db, logging};
use std::net::SocketAddr;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env (if present) so DATABASE_URL from file is visible
    let _ = dotenvy::dotenv();

    // Initialize tracing
    logging::init();

    let config = AppConfig::from_env()?;
    let db_conn = db::connect(&config).await.context("failed to connect to database")?;
    db::migrate(&db_conn).await.context("failed to apply migrations")?;

    // Run our server
    let app = create_app(db_conn, &config);
    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    tracing::info!("Server running on http://{}", config.bind_addr);

    // Peer addresses feed the per-IP rate limiter
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}
