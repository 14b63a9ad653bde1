use std::sync::Arc;

use clap::Parser;
use dotenv::dotenv;
use eyre::{eyre, Result};
use log::info;

use rebalancer::bootstrap::build_rebalancer;
use rebalancer::bridge::http::build_http_client;
use rebalancer::configure::load_config_from;
use rebalancer::gateway::{create_app, AppState};
use rebalancer::logger;

#[derive(Parser)]
#[clap(author, version, about = "Checkpoint-bridge rebalancer HTTP gateway", long_about = None)]
struct Args {
    #[clap(long, default_value = rebalancer::configure::DEFAULT_CONFIG_PATH)]
    config: String,
    /// Overrides `listen_addr` from the config
    #[clap(long)]
    listen: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let args = Args::parse();

    let config = load_config_from(&args.config)?;
    logger::setup_logger(&config).map_err(|e| eyre!("Failed to set up logger: {}", e))?;

    let client = build_http_client(config.http_timeout())?;
    let rebalancer = Arc::new(build_rebalancer(&config, &client)?);
    let state = Arc::new(AppState::new(rebalancer, client));
    state.spawn_watch_sweeper(config.exit_poll_interval());

    let listen_addr = args.listen.unwrap_or_else(|| config.listen_addr.clone());
    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    info!("Rebalancer API running on http://{}", listen_addr);
    axum::serve(listener, create_app(state)).await?;

    Ok(())
}
