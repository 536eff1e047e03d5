use std::sync::Arc;

use infocenter::broker::Broker;
use infocenter::config::load_config;
use infocenter::stream::SessionConfig;
use infocenter::transport::{self, AppState, Cors};
use infocenter::utils::{Result, logging};
use tokio::net::TcpListener;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();

    if let Err(e) = run_server().await {
        // Logging may not be set up yet if the config failed to load.
        logging::init("error");
        error!("Server failed: {e}");
        std::process::exit(1);
    }
}

async fn run_server() -> Result<()> {
    let config = load_config()?;
    logging::init(&config.logging.level);

    let broker = Arc::new(Broker::with_mailbox_capacity(
        config.broker.mailbox_capacity,
    ));
    let state = AppState::new(broker, SessionConfig::from(&config.broker));
    let cors = Cors::from_settings(&config.server);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;

    transport::serve(listener, state, cors, shutdown_signal()).await?;
    info!("Server stopped.");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {e}");
        // Without a signal handler there is nothing to wait for; keep serving.
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received. Exiting gracefully.");
}
