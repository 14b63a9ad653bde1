use std::sync::Arc;

use clap::{Parser, Subcommand};
use dotenv::dotenv;
use ethers::types::{Address, H256};
use eyre::{eyre, Result};
use tokio::sync::mpsc;

use rebalancer::bootstrap::build_rebalancer;
use rebalancer::bridge::chain_profile::{ETHEREUM_MAINNET, POLYGON_MAINNET};
use rebalancer::bridge::http::build_http_client;
use rebalancer::bridge::{ChannelSink, StatusRequest, WatchOutcome};
use rebalancer::configure;
use rebalancer::logger::setup_logger;

#[derive(Parser)]
#[command(name = "bridge_status")]
#[command(about = "One-shot deposit and withdrawal status checks")]
struct Cli {
    #[arg(long, default_value = configure::DEFAULT_CONFIG_PATH)]
    config: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct TxArgs {
    #[arg(long)]
    tx_hash: H256,
    /// Account that sent the transaction
    #[arg(long)]
    signer: Address,
    #[arg(long)]
    root_chain_id: Option<u64>,
    #[arg(long)]
    child_chain_id: Option<u64>,
    /// Burn block, read from the receipt when omitted
    #[arg(long)]
    block_number: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Has a root -> child deposit been credited?
    DepositStatus(TxArgs),
    /// Is a child-chain burn checkpointed, and what is its exit tx?
    BurnStatus(TxArgs),
    /// Poll until the burn's exit tx is ready, then print it
    WatchExit(TxArgs),
}

impl TxArgs {
    fn deposit(&self) -> StatusRequest {
        self.request(self.root(), self.child())
    }

    fn withdraw(&self) -> StatusRequest {
        self.request(self.child(), self.root())
    }

    fn root(&self) -> u64 {
        self.root_chain_id.unwrap_or(ETHEREUM_MAINNET)
    }

    fn child(&self) -> u64 {
        self.child_chain_id.unwrap_or(POLYGON_MAINNET)
    }

    fn request(&self, from: u64, to: u64) -> StatusRequest {
        StatusRequest {
            tx_hash: self.tx_hash,
            initiator: self.signer,
            source_chain_id: from,
            destination_chain_id: to,
            block_number: self.block_number,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();

    let config = configure::load_config_from(&cli.config)?;
    setup_logger(&config).map_err(|e| eyre!("Failed to initialize logger: {}", e))?;

    let client = build_http_client(config.http_timeout())?;
    let rebalancer = build_rebalancer(&config, &client)?;

    match cli.command {
        Commands::DepositStatus(args) => {
            let status = rebalancer.get_deposit_status(&args.deposit()).await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Commands::BurnStatus(args) => {
            let status = rebalancer.get_burn_status(&args.withdraw()).await?;
            println!("state: {}", status.as_str());
            if let Some(tx) = status.exit_transaction() {
                println!("{}", serde_json::to_string_pretty(tx)?);
            }
        }
        Commands::WatchExit(args) => {
            let (tx, mut rx) = mpsc::channel(1);
            let mut handle = rebalancer.watch_exit(&args.withdraw(), Arc::new(ChannelSink::new(tx))).await?;
            tokio::select! {
                received = rx.recv() => {
                    if let Some(notification) = received {
                        println!("{}", serde_json::to_string_pretty(&notification)?);
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    println!("interrupted, cancelling watch");
                    handle.cancel();
                }
            }
            match handle.wait().await {
                WatchOutcome::Failed(e) => return Err(e.into()),
                outcome => log::info!("watch ended: {:?}", outcome),
            }
        }
    }

    Ok(())
}
