//! Bundlekeeper CLI entry point

use bundlekeeper::cli::{commands, Cli, Commands};
use bundlekeeper::config::{Config, ConfigManager};
use bundlekeeper::error::BundleResult;
use clap::Parser;
use console::style;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> BundleResult<()> {
    let cli = Cli::parse();

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };
    let config = config_manager.load().await?;

    init_logging(cli.verbose, &config);

    match cli.command {
        Commands::Run(args) => commands::run(args, config).await,
        Commands::Fetch(args) => commands::fetch(args, &config).await,
        Commands::List(args) => commands::list(args, &config).await,
        Commands::Status => commands::status(&config).await,
        Commands::Config(args) => commands::config(args, &config_manager, &config).await,
    }
}

/// 0 = warn, 1 = info, 2+ = debug. Logs go to stderr so stdout stays scriptable.
fn init_logging(verbose: u8, config: &Config) {
    let level = verbose.max(u8::from(config.general.verbose));
    let filter = match level {
        0 => EnvFilter::new("bundlekeeper=warn"),
        1 => EnvFilter::new("bundlekeeper=info"),
        _ => EnvFilter::new("bundlekeeper=debug"),
    };

    if config.general.log_format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .without_time()
            .with_writer(std::io::stderr)
            .init();
    }
}
