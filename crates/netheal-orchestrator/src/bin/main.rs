//! NetHeal service executable

use clap::{Arg, Command};
use netheal_common::Config;
use netheal_orchestrator::HealingService;
use netheal_remediation::SimulatedExecutor;
use netheal_store::MemoryStore;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let matches = Command::new("netheal")
        .version(env!("CARGO_PKG_VERSION"))
        .about("NetHeal - autonomous network healing pipeline")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path (TOML)")
                .required(false),
        )
        .arg(
            Arg::new("dry-run")
                .long("dry-run")
                .help("Generate actions but never execute them")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    let mut config = match matches.get_one::<String>("config") {
        Some(path) => {
            info!("loading configuration from {}", path);
            Config::load(std::path::Path::new(path))?
        }
        None => {
            info!("using default configuration");
            Config::default()
        }
    };
    config.apply_env_overrides();
    if matches.get_flag("dry-run") {
        config.remediation.dry_run = true;
    }

    info!("starting NetHeal v{}", env!("CARGO_PKG_VERSION"));

    let store = Arc::new(MemoryStore::new());
    let executor = Arc::new(SimulatedExecutor::new());
    let service = HealingService::new(config, store, executor);

    match service.clone().start().await {
        Ok(()) => {
            info!("service started, press Ctrl+C to stop");
        }
        Err(e) => {
            error!("failed to start service: {}", e);
            std::process::exit(1);
        }
    }

    tokio::signal::ctrl_c().await?;
    info!("received shutdown signal, shutting down gracefully");
    service.stop();
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("netheal_orchestrator=info,netheal_telemetry=info,netheal_correlation=info,netheal_rca=info,netheal_remediation=info")
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .init();
}
