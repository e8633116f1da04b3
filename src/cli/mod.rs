//! CLI module
//!
//! This module defines the command-line interface using clap and implements
//! the command execution logic.

use crate::{Config, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

pub mod commands;
pub mod output;

/// Offline Step Functions CLI
#[derive(Parser, Debug)]
#[command(name = "offline-step-functions")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the emulator, register every state machine and wait for Ctrl+C
    Start {
        #[command(flatten)]
        service: ServiceArgs,

        /// How to print the published ARNs
        #[arg(long, value_enum, default_value = "env")]
        format: OutputFormat,

        /// Also write the published ARNs to a dotenv file (overrides config)
        #[arg(long)]
        env_file: Option<PathBuf>,
    },

    /// Print resolved definitions without contacting the emulator
    Resolve {
        #[command(flatten)]
        service: ServiceArgs,

        /// Only resolve this state machine
        #[arg(short, long)]
        name: Option<String>,
    },
}

/// Where the service manifest is and which deployment it targets
#[derive(Args, Debug, Clone)]
pub struct ServiceArgs {
    /// Path to the service manifest
    #[arg(short = 'f', long, default_value = "serverless.yml")]
    pub service_file: PathBuf,

    /// Stage (overrides provider.stage)
    #[arg(short, long)]
    pub stage: Option<String>,

    /// Region (overrides provider.region)
    #[arg(short, long)]
    pub region: Option<String>,
}

/// Output format types
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Shell `export` lines
    Env,
    /// JSON output
    Json,
    /// Plain text table
    Table,
}

/// Execute the CLI command
pub async fn execute(args: Cli, config: Config) -> Result<()> {
    match args.command {
        Commands::Start { .. } => commands::start::execute(args, config).await,
        Commands::Resolve { service, name } => commands::resolve::execute(&service, name.as_deref()),
    }
}
