//! Command-line interface definition for Taskora

use clap::{Parser, Subcommand};

/// Taskora - stateless conversational agent for task management
#[derive(Debug, Parser)]
#[command(name = "taskora", version, about)]
pub struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long, env = "TASKORA_CONFIG")]
    pub config: Option<String>,

    /// Override the conversation database path
    #[arg(long, env = "TASKORA_DB")]
    pub db: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the HTTP server
    Serve {
        /// Override the bind address (e.g. 0.0.0.0:8080)
        #[arg(short, long)]
        bind: Option<String>,
    },
    /// Load and validate the configuration, then exit
    CheckConfig,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_serve() {
        let cli = Cli::try_parse_from(["taskora", "serve"]).unwrap();
        assert!(matches!(cli.command, Commands::Serve { bind: None }));
    }

    #[test]
    fn test_parse_serve_with_bind_override() {
        let cli = Cli::try_parse_from(["taskora", "serve", "--bind", "0.0.0.0:9000"]).unwrap();
        match cli.command {
            Commands::Serve { bind } => assert_eq!(bind.as_deref(), Some("0.0.0.0:9000")),
            _ => panic!("expected serve command"),
        }
    }

    #[test]
    fn test_parse_check_config_with_config_path() {
        let cli =
            Cli::try_parse_from(["taskora", "--config", "custom.yaml", "check-config"]).unwrap();
        assert_eq!(cli.config.as_deref(), Some("custom.yaml"));
        assert!(matches!(cli.command, Commands::CheckConfig));
    }

    #[test]
    fn test_missing_subcommand_fails() {
        assert!(Cli::try_parse_from(["taskora"]).is_err());
    }
}
