// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # AEGIS Fabric CLI
//!
//! The `aegis-fabric` binary hosts a fabric node and talks to one.
//!
//! ## Commands
//!
//! - `aegis-fabric serve` - Run a node with the shared in-memory graph store
//! - `aegis-fabric dispatch <message_type> --payload <json|@file>` - Send a coordinator message
//! - `aegis-fabric health` - Probe a running node
//! - `aegis-fabric config show|validate|generate` - Configuration management

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use aegis_fabric_cli::client::FabricClient;
use aegis_fabric_cli::commands::{self, ConfigCommand, DispatchArgs, ServeArgs};

/// AEGIS Fabric - capability-addressed task coordination
#[derive(Parser)]
#[command(name = "aegis-fabric")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "AEGIS_FABRIC_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Node HTTP port used by client commands
    #[arg(long, global = true, env = "AEGIS_FABRIC_PORT", default_value = "8088")]
    port: u16,

    /// Node host used by client commands
    #[arg(long, global = true, env = "AEGIS_FABRIC_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "AEGIS_FABRIC_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a fabric node
    #[command(name = "serve")]
    Serve(ServeArgs),

    /// Send one coordinator message to a running node
    #[command(name = "dispatch")]
    Dispatch(DispatchArgs),

    /// Check that a node is up
    #[command(name = "health")]
    Health,

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level)?;

    match cli.command {
        Some(Commands::Serve(args)) => commands::serve::run(cli.config, args).await,
        Some(Commands::Dispatch(args)) => commands::dispatch::run(args, &cli.host, cli.port).await,
        Some(Commands::Health) => {
            let health = FabricClient::new(&cli.host, cli.port)?.health().await?;
            println!("{}", serde_json::to_string_pretty(&health)?);
            Ok(())
        }
        Some(Commands::Config { command }) => {
            commands::config::handle_command(command, cli.config).await
        }
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    Ok(())
}
