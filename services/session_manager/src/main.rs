//! Contract session manager binary

use anyhow::Result;
use clap::Parser;
use contract_session_manager::{Config, SessionHost};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<String>,

    /// Contract to join instead of the configured one
    #[arg(short, long)]
    address: Option<String>,

    /// Log level, used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting contract session manager");

    let mut config = Config::load(args.config.as_deref())?;
    if let Some(address) = args.address {
        config.contract_address = Some(address);
    }

    let host = SessionHost::new(config)?;

    tokio::select! {
        result = host.run() => {
            if let Err(e) = result {
                error!("Session manager error: {:#}", e);
                host.shutdown().await;
                return Err(e);
            }
        }
        result = signal::ctrl_c() => {
            if let Err(e) = result {
                error!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutting down gracefully...");
        }
    }

    host.shutdown().await;
    info!("Contract session manager stopped");
    Ok(())
}
