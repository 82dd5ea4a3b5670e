//! Optic CLI: the main entry point.
//!
//! Commands:
//! - `run`       Poll mentions and answer photo questions until stopped
//! - `once`      Run a single poll cycle and print its report
//! - `status`    Show configuration and the stored checkpoint
//! - `doctor`    Diagnose configuration and credentials
//! - `onboard`   Write a default config file
//! - `config`    Validate, show or locate the config file

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "optic",
    about = "Optic: answers questions about photos posted in Twitter mentions",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (default: ~/.optic/config.toml)
    #[arg(short, long, global = true, env = "OPTIC_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log as JSON lines and print reports as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll for mentions until Ctrl-C or SIGTERM
    Run,

    /// Run exactly one poll cycle
    Once,

    /// Show configuration and checkpoint
    Status,

    /// Diagnose configuration and credentials
    Doctor {
        /// Also spend one probe query per inference credential
        #[arg(long)]
        probe: bool,
    },

    /// Initialize configuration
    Onboard,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Check the config file and environment
    Validate,
    /// Print the effective configuration with secrets redacted
    Show,
    /// Print the config file path
    Path,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env is fine
    let dotenv = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.json);

    if let Ok(path) = dotenv {
        tracing::debug!(path = %path.display(), "Loaded .env");
    }

    let opts = commands::GlobalOpts {
        config_path: cli
            .config
            .unwrap_or_else(optic_config::AppConfig::config_path),
        json: cli.json,
    };

    match cli.command {
        Commands::Run => commands::run::run(&opts).await?,
        Commands::Once => commands::once::run(&opts).await?,
        Commands::Status => commands::status::run(&opts).await?,
        Commands::Doctor { probe } => commands::doctor::run(&opts, probe).await?,
        Commands::Onboard => commands::onboard::run(&opts).await?,
        Commands::Config { action } => match action {
            ConfigAction::Validate => commands::config_cmd::validate(&opts).await?,
            ConfigAction::Show => commands::config_cmd::show(&opts).await?,
            ConfigAction::Path => commands::config_cmd::path(&opts).await?,
        },
    }

    Ok(())
}

fn init_tracing(verbose: bool, json: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
