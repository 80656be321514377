//! Command-line interface.

pub mod commands;
pub mod output;
pub mod types;

pub use types::{Cli, Commands};

use anyhow::Result;
use std::path::Path;

use crate::domain::errors::{FetchError, FetchErrorKind};
use crate::domain::models::Config;
use crate::infrastructure::config::ConfigLoader;

/// Exit code for failures without a more specific classification
pub const EXIT_FAILURE: i32 = 1;
/// Exit code for credential or session failures
pub const EXIT_AUTH: i32 = 3;
/// Exit code for failures worth retrying later
pub const EXIT_TRANSIENT: i32 = 4;
/// Exit code for requests the API refused
pub const EXIT_CLIENT: i32 = 5;

/// Load configuration from `path`, or from the project directory and environment
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    }
}

/// Dispatch a parsed command line
pub async fn run(cli: Cli, config: Config) -> Result<()> {
    match cli.command {
        Commands::Fetch(args) => commands::fetch::execute(args, config, cli.json).await,
        Commands::Status(args) => commands::status::execute(args, config, cli.json).await,
        Commands::Config(args) => commands::config::execute(&args, config, cli.json),
    }
}

/// Process exit code for an error
pub fn exit_code(err: &anyhow::Error) -> i32 {
    let fetch_error = err
        .chain()
        .find_map(|cause| cause.downcast_ref::<FetchError>());

    match fetch_error.map(FetchError::kind) {
        Some(FetchErrorKind::Auth) => EXIT_AUTH,
        Some(FetchErrorKind::Transient) => EXIT_TRANSIENT,
        Some(FetchErrorKind::Client) => EXIT_CLIENT,
        Some(FetchErrorKind::Fatal) | None => EXIT_FAILURE,
    }
}

/// Report `err` on stderr and exit with its classified code
pub fn handle_error(err: anyhow::Error, json_mode: bool) -> ! {
    let code = exit_code(&err);
    if json_mode {
        let body = serde_json::json!({
            "error": format!("{err:#}"),
            "exit_code": code,
        });
        eprintln!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        eprintln!("Error: {err:#}");
    }
    std::process::exit(code);
}
