// SPDX-FileCopyrightText: 2026 Modrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! modrelay - a ticket relay between user DMs and a moderator channel.
//!
//! This is the binary entry point for the modrelay daemon.

use clap::{Parser, Subcommand};

mod serve;
mod stdio;

/// modrelay - a ticket relay between user DMs and a moderator channel.
#[derive(Parser, Debug)]
#[command(name = "modrelay", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the relay daemon against the stdio transport.
    Serve,
    /// Load and validate configuration, then exit.
    Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Load and validate configuration at startup.
    let config = match modrelay_config::load_and_validate() {
        Ok(config) => config,
        Err(errors) => {
            modrelay_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    init_tracing(&config.agent.log_level);

    match cli.command {
        Some(Commands::Serve) => {
            if let Err(e) = serve::run(config).await {
                eprintln!("modrelay serve: {e}");
                std::process::exit(1);
            }
        }
        Some(Commands::Config) => {
            println!(
                "modrelay: configuration OK (agent.name={}, idle_timeout={}s)",
                config.agent.name, config.relay.idle_timeout_secs
            );
        }
        None => {
            println!("modrelay: use --help for available commands");
        }
    }
}

/// Initialize the tracing subscriber from `RUST_LOG`, falling back to the
/// configured log level.
fn init_tracing(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_declaration_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn serve_subcommand_parses() {
        let cli = Cli::try_parse_from(["modrelay", "serve"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Serve)));
    }

    #[test]
    fn binary_loads_config_defaults() {
        // Verify config loads with defaults (no config file needed).
        let config = modrelay_config::load_and_validate()
            .expect("default config should be valid");
        assert_eq!(config.relay.sweep_interval_secs, 30);
    }
}
