//! CLI argument definitions using clap derive

use crate::bundle::InstallType;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Bundlekeeper - background bundle update service
///
/// Keeps a local cache of versioned bundles fresh by polling a bundle
/// repository and answers on-demand requests from the cache.
#[derive(Parser, Debug)]
#[command(name = "bundlekeeper")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "BUNDLEKEEPER_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the update service in the foreground
    Run(RunArgs),

    /// Request a bundle and wait until it is available
    Fetch(FetchArgs),

    /// List cached bundles
    List(ListArgs),

    /// Show storage, connectivity and polling status
    Status,

    /// Show or edit configuration
    Config(ConfigArgs),
}

/// Arguments for the run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Seconds between background polls (floor: 600)
    #[arg(long, value_name = "SECS")]
    pub poll_interval: Option<u64>,

    /// Poll every 30 seconds
    #[arg(long)]
    pub debug: bool,
}

/// Arguments for the fetch command
#[derive(Parser, Debug)]
pub struct FetchArgs {
    /// Bundle identifier
    pub bundle_id: String,

    /// Reason for the request
    #[arg(short = 't', long, default_value = "install")]
    pub install_type: InstallTypeArg,

    /// Print completion events as JSON lines
    #[arg(long)]
    pub json: bool,
}

/// Install type accepted on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum InstallTypeArg {
    /// Routine update check
    Update,
    /// Fresh install
    Install,
    /// Launch-time check (may refresh in the background)
    Launch,
}

impl From<InstallTypeArg> for InstallType {
    fn from(arg: InstallTypeArg) -> Self {
        match arg {
            InstallTypeArg::Update => InstallType::Update,
            InstallTypeArg::Install => InstallType::Install,
            InstallTypeArg::Launch => InstallType::Launch,
        }
    }
}

/// Arguments for the list command
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., fetch.base_url)
        key: String,
        /// Value to set
        value: String,
    },
}

/// Output format for the list command
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
    /// Simple text (one per line)
    Plain,
}
