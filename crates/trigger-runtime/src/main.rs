//! # Trigger Runtime
//!
//! Entry point for the trigger gateway.
//!
//! ## Startup Sequence
//!
//! 1. Parse CLI arguments, install logging
//! 2. Load configuration (defaults → file → env)
//! 3. Provision the trigger secret (never fatal; absent means fail closed)
//! 4. Build the privileged operation (workflow dispatch or command)
//! 5. Bind listeners, serve until Ctrl+C, then drain

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use trigger_gateway::adapters::{build_operation, provision, source_from_config};
use trigger_gateway::TriggerGatewayService;
use trigger_runtime::{init_tracing, load_config, LogFormat};

#[derive(Parser, Debug)]
#[command(name = "trigger-runtime")]
#[command(about = "Secret-token trigger for the job-search run", version)]
struct Args {
    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.log_format)?;

    info!("===========================================");
    info!("  Trigger Gateway v{}", trigger_gateway::VERSION);
    info!("===========================================");

    let config = load_config(args.config.as_deref()).context("Failed to load configuration")?;

    let source = source_from_config(&config.secret);
    let secret = provision(source.as_ref());

    let operation =
        build_operation(&config.operation).context("Failed to build privileged operation")?;
    info!(operation = operation.name(), "Privileged operation ready");

    let mut service = TriggerGatewayService::new(config, secret, operation)
        .context("Failed to create trigger gateway")?;
    service
        .start()
        .await
        .context("Failed to start trigger gateway")?;

    info!("Gateway is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;

    service.shutdown().await;

    Ok(())
}
