//! Atrium Platform Server (APS)
//!
//! Boots the platform kernel in the selected runtime mode and exits with the
//! documented exit code when bootstrap fails.

use std::path::PathBuf;

use atrium_kernel::bootstrap::{self, classify, BootOptions, RuntimeMode};
use atrium_kernel::init_logging;
use clap::{Parser, ValueEnum};
use tracing::info;

/// Command-line and environment flags for the server process.
///
/// The platform configuration tree (realms, tenants, orgs) lives in the JSON
/// document named by `--config`; these flags only select how the process
/// runs.
#[derive(Debug, Parser)]
#[command(name = "aps")]
#[command(about = "Atrium Platform Server")]
struct Cli {
    /// Path to the platform configuration file.
    #[arg(short, long, env = "ATRIUM_CONFIG", default_value = "atrium.json")]
    config: PathBuf,

    /// Runtime mode to start.
    #[arg(long, env = "ATRIUM_MODE", value_enum, default_value_t = Mode::Api)]
    mode: Mode,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long, env = "ATRIUM_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

/// Runtime mode flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Serve the HTTP API.
    Api,
    /// Drain background jobs.
    Worker,
    /// Run scheduled work.
    Scheduler,
}

impl From<Mode> for RuntimeMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Api => RuntimeMode::Api,
            Mode::Worker => RuntimeMode::Worker,
            Mode::Scheduler => RuntimeMode::Scheduler,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    info!(
        config = %cli.config.display(),
        mode = ?cli.mode,
        "starting Atrium Platform Server"
    );

    let options = BootOptions::new(cli.config, cli.mode.into());
    match bootstrap::run(options).await {
        Ok(kernel) => kernel.wait().await,
        Err(error) => std::process::exit(classify(&error)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["aps"]);
        assert_eq!(cli.config, PathBuf::from("atrium.json"));
        assert_eq!(cli.mode, Mode::Api);
        assert_eq!(cli.log_level, "info");
    }

    #[test]
    fn test_cli_mode_parsing() {
        let cli = Cli::parse_from(["aps", "--mode", "worker", "--config", "/etc/atrium.json"]);
        assert_eq!(cli.mode, Mode::Worker);
        assert_eq!(RuntimeMode::from(cli.mode), RuntimeMode::Worker);
        assert_eq!(cli.config, PathBuf::from("/etc/atrium.json"));
    }
}
