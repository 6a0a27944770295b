//! Taskora - stateless conversational agent server
//!
//! Main entry point for the Taskora server binary.

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use taskora::cli::{Cli, Commands};
use taskora::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse_args();

    // Mirror a CLI/env database override into TASKORA_DB so the storage
    // initializer picks it up without threading the path everywhere.
    if let Some(db_path) = &cli.db {
        std::env::set_var("TASKORA_DB", db_path);
        tracing::info!("Using conversation DB override: {}", db_path);
    }

    let config_path = cli.config.as_deref().unwrap_or("config/taskora.yaml");
    let mut config = Config::load(config_path)?;

    match cli.command {
        Commands::Serve { bind } => {
            if let Some(bind) = bind {
                config.server.bind = bind;
            }
            config.validate()?;
            tracing::info!("Starting server with provider '{}'", config.provider.provider_type);
            taskora::server::run(config).await
        }
        Commands::CheckConfig => {
            config.validate()?;
            println!("Configuration OK ({})", config_path);
            Ok(())
        }
    }
}

/// Initialize tracing subscriber with environment filter
fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("taskora=info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
