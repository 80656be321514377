//! CLI argument types.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use super::commands::config::ConfigArgs;
use super::commands::fetch::FetchArgs;
use super::commands::status::StatusArgs;

#[derive(Parser, Debug)]
#[command(name = "ledgerbridge")]
#[command(about = "Ledgerbridge - cached, session-managing client for accounting APIs", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Read configuration from this file instead of .ledgerbridge/
    #[arg(short, long, global = true, env = "LEDGERBRIDGE_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch a resource through the cache
    Fetch(FetchArgs),

    /// Check connectivity and authentication
    Status(StatusArgs),

    /// Inspect configuration
    Config(ConfigArgs),
}
