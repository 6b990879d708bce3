//! Config command - show or edit configuration

use crate::cli::args::{ConfigAction, ConfigArgs};
use crate::config::schema::PreferredConnectivity;
use crate::config::{Config, ConfigManager};
use crate::error::{BundleError, BundleResult};
use crate::ui::{self, UiContext};
use std::path::PathBuf;

/// Keys accepted by `config set`
const VALID_KEYS: &[&str] = &[
    "general.verbose",
    "general.log_format",
    "update.poll_interval_secs",
    "update.debug_mode",
    "update.copy_asset_on_miss",
    "update.poll_only_on_preferred_connectivity",
    "update.refresh_on_launch",
    "update.max_concurrent_fetches",
    "storage.download_dir",
    "storage.asset_dir",
    "storage.extensions",
    "fetch.base_url",
    "fetch.timeout_secs",
    "network.preferred",
];

/// Execute the config command
pub async fn execute(args: ConfigArgs, manager: &ConfigManager, config: &Config) -> BundleResult<()> {
    match args.action {
        None | Some(ConfigAction::Show) => show_config(config)?,
        Some(ConfigAction::Path) => println!("{}", manager.path().display()),
        Some(ConfigAction::Init { force }) => init_config(manager, force).await?,
        Some(ConfigAction::Set { key, value }) => {
            let ctx = UiContext::detect();
            let mut updated = config.clone();
            if let Err(e) = apply(&mut updated, &key, &value) {
                if matches!(e, BundleError::ConfigKey(_)) {
                    ui::remark(&ctx, &format!("Valid keys: {}", VALID_KEYS.join(", ")));
                }
                return Err(e);
            }
            updated.validate().map_err(BundleError::User)?;
            manager.save(&updated).await?;
            ui::step_ok(&ctx, &format!("Set {} = {}", key, value));
        }
    }

    Ok(())
}

fn show_config(config: &Config) -> BundleResult<()> {
    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

async fn init_config(manager: &ConfigManager, force: bool) -> BundleResult<()> {
    let ctx = UiContext::detect();
    let path = manager.path();

    if path.exists() && !force {
        ui::step_warn_hint(
            &ctx,
            &format!("Config already exists at {}", path.display()),
            "Use --force to overwrite",
        );
        return Ok(());
    }

    manager.save(&Config::default()).await?;
    ui::step_ok_detail(&ctx, "Configuration initialized", &path.display().to_string());
    Ok(())
}

/// Set a dot-separated key on a config
fn apply(config: &mut Config, key: &str, value: &str) -> BundleResult<()> {
    let parts: Vec<&str> = key.split('.').collect();

    match parts.as_slice() {
        ["general", "verbose"] => config.general.verbose = parse_bool(value)?,
        ["general", "log_format"] => match value {
            "text" | "json" => config.general.log_format = value.to_string(),
            _ => {
                return Err(BundleError::User(format!(
                    "Invalid log format: {}. Use text or json",
                    value
                )))
            }
        },

        ["update", "poll_interval_secs"] => config.update.poll_interval_secs = parse_num(value)?,
        ["update", "debug_mode"] => config.update.debug_mode = parse_bool(value)?,
        ["update", "copy_asset_on_miss"] => config.update.copy_asset_on_miss = parse_bool(value)?,
        ["update", "poll_only_on_preferred_connectivity"] => {
            config.update.poll_only_on_preferred_connectivity = parse_bool(value)?
        }
        ["update", "refresh_on_launch"] => config.update.refresh_on_launch = parse_bool(value)?,
        ["update", "max_concurrent_fetches"] => {
            config.update.max_concurrent_fetches = parse_num(value)?
        }

        ["storage", "download_dir"] => config.storage.download_dir = optional_path(value),
        ["storage", "asset_dir"] => config.storage.asset_dir = optional_path(value),
        ["storage", "extensions"] => {
            config.storage.extensions = value
                .split(',')
                .map(|s| s.trim().trim_start_matches('.').to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        ["fetch", "base_url"] => {
            config.fetch.base_url = (!value.is_empty()).then(|| value.to_string())
        }
        ["fetch", "timeout_secs"] => config.fetch.timeout_secs = parse_num(value)?,

        ["network", "preferred"] => config.network.preferred = parse_preferred(value)?,

        _ => return Err(BundleError::ConfigKey(key.to_string())),
    }

    Ok(())
}

fn optional_path(value: &str) -> Option<PathBuf> {
    (!value.is_empty()).then(|| PathBuf::from(value))
}

fn parse_bool(value: &str) -> BundleResult<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(BundleError::User(format!(
            "Invalid boolean value: {}. Use true/false",
            value
        ))),
    }
}

fn parse_num<T: std::str::FromStr>(value: &str) -> BundleResult<T> {
    value
        .parse()
        .map_err(|_| BundleError::User(format!("Invalid number: {}", value)))
}

fn parse_preferred(value: &str) -> BundleResult<PreferredConnectivity> {
    match value.to_lowercase().as_str() {
        "wifi" => Ok(PreferredConnectivity::Wifi),
        "ethernet" => Ok(PreferredConnectivity::Ethernet),
        "any" => Ok(PreferredConnectivity::Any),
        _ => Err(BundleError::User(format!(
            "Invalid connectivity: {}. Use wifi, ethernet or any",
            value
        ))),
    }
}
