//! pmbook server
//!
//! Usage:
//!   cargo run --bin load_data    # seed admin, PM and a sample project
//!   cargo run --bin pmbook       # start the REST API
//!
//! Configuration comes from the environment (a `.env` file is honoured);
//! `SECRET` and `REFRESH_TOKEN_SECRET` are required.

use tokio::net::TcpListener;

use pmbook::config::Config;
use pmbook::logging;
use pmbook::rest::create_router;
use pmbook::storage::Storage;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    let _log_guard = logging::init(&config)?;

    let addr = config.bind_addr();
    tracing::info!(db = %config.db_path.display(), "opening storage");
    let storage = Storage::open(&config.db_path)?;

    let app = create_router(storage, config);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "pmbook listening; docs at /api/docs");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
    }
}
