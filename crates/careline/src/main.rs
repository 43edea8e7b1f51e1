// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Careline - caregiver/patient telehealth call session engine.
//!
//! This is the binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod serve;
mod shutdown;

use std::path::PathBuf;
use std::process::ExitCode;

use careline_config::{CarelineConfig, ConfigError};
use clap::{Parser, Subcommand};

/// Careline - caregiver/patient telehealth call session engine.
#[derive(Parser, Debug)]
#[command(name = "careline", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the call session engine and its HTTP gateway.
    Serve,
    /// Validate configuration and exit.
    CheckConfig,
}

fn load(path: Option<&PathBuf>) -> Result<CarelineConfig, Vec<ConfigError>> {
    match path {
        Some(path) => careline_config::load_and_validate_path(path),
        None => careline_config::load_and_validate(),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load(cli.config.as_ref()) {
        Ok(config) => config,
        Err(errors) => {
            careline_config::render_errors(&errors);
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Some(Commands::Serve) => match serve::run_serve(config).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("careline: {e}");
                ExitCode::FAILURE
            }
        },
        Some(Commands::CheckConfig) => {
            println!(
                "careline: config ok (gateway={}:{}, media ports {}-{}, database={})",
                config.gateway.host,
                config.gateway.port,
                config.listener.port_range_start,
                config.listener.port_range_end,
                config.storage.database_path,
            );
            ExitCode::SUCCESS
        }
        None => {
            println!("careline: use --help for available commands");
            ExitCode::SUCCESS
        }
    }
}
