//! Ledgerbridge CLI entry point.

use clap::Parser;

use ledgerbridge::cli::{self, Cli};
use ledgerbridge::infrastructure::logging::LoggerImpl;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json_mode = cli.json;

    let config = match cli::load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => cli::handle_error(err, json_mode),
    };

    let _logger = match LoggerImpl::init(&config.logging) {
        Ok(logger) => Some(logger),
        Err(err) => {
            eprintln!("Warning: logging disabled: {err:#}");
            None
        }
    };

    if let Err(err) = cli::run(cli, config).await {
        cli::handle_error(err, json_mode);
    }
}
