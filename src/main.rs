//! idmctl - command-line client for a multi-tenant identity manager
//!
//! Main entry point for the idmctl binary.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use idmctl::cli::{Cli, Commands};
use idmctl::commands;
use idmctl::config::{default_config_path, Config};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();

    let config_path = cli
        .config
        .as_deref()
        .map(PathBuf::from)
        .unwrap_or_else(default_config_path);
    tracing::debug!("Using config file {}", config_path.display());

    let mut config = Config::load(&config_path, &cli)?;
    config.validate()?;

    match cli.command {
        Commands::Target {
            url,
            name,
            force,
            insecure,
        } => {
            if force {
                tracing::debug!("Skipping server health check");
            }
            commands::target::select_target(&mut config, &config_path, url, name, force, insecure)
                .await
        }
        Commands::Targets => commands::target::list_targets(&config),
        Commands::Login(args) => {
            tracing::info!("Starting login");
            commands::login::login(&mut config, &config_path, &args).await
        }
        Commands::Logout => commands::login::logout(&mut config, &config_path),
        Commands::Get { path, accept } => commands::api::get(&config, &path, &accept).await,
        Commands::Upload {
            path,
            file,
            field,
            media_type,
            json,
        } => commands::api::upload(&config, &path, &file, &field, &media_type, &json).await,
    }
}

/// Initialize tracing subscriber with environment filter
///
/// Logs go to stderr so command output on stdout stays clean.
fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("idmctl=info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
