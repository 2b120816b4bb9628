//! Parasure deploy binary

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use parasure_common::{format_units, VERSION};
use parasure_deploy::{AccountSelector, DeployConfig, DeployScenario, UpdateStatus};

#[derive(Parser, Debug)]
#[command(name = "parasure-deploy", version, about = "Deploy a Parasure provider and drive one contract")]
struct Cli {
    /// Network to deploy to (overrides the config file)
    #[arg(long, env = "PARASURE_NETWORK")]
    network: Option<String>,

    /// Acting account: `default`, `user`, a dev account index, or `key:<secret>`
    #[arg(long, default_value = "default")]
    account: AccountSelector,

    /// Config file (defaults to ./parasure.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the final ledger snapshot as JSON to this path
    #[arg(long)]
    snapshot: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    info!("Starting Parasure deploy v{}", VERSION);

    let mut config = DeployConfig::load(cli.config.as_deref())?;
    if let Some(network) = cli.network {
        config.network = network;
    }

    let report = DeployScenario::new(config)
        .with_account(cli.account)
        .run()
        .await?;

    match &report.update {
        UpdateStatus::Completed(outcome) => info!(?outcome, "Update completed"),
        UpdateStatus::Deferred(reason) => info!(%reason, "Update deferred"),
    }
    info!(
        network = %report.network,
        provider = %report.provider_id,
        contract = %report.contract_id,
        withdrawn = %format_units(report.withdrawn),
        "Deploy finished"
    );

    if let Some(path) = cli.snapshot {
        let json = report.snapshot.to_json()?;
        std::fs::write(&path, json)
            .with_context(|| format!("failed to write snapshot to {}", path.display()))?;
        info!(path = %path.display(), "Snapshot written");
    }

    Ok(())
}
