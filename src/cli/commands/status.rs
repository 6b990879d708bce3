//! Status command - storage, connectivity and polling policy at a glance

use crate::bundle::BundleRegistry;
use crate::config::{Config, ConfigManager, Settings};
use crate::error::BundleResult;
use crate::network::{NetworkPolicyGate, SystemConnectivity};
use crate::scheduler::initial_interval;
use console::{style, Emoji};
use std::sync::Arc;
use std::time::Duration;

static CHECK: Emoji<'_, '_> = Emoji("✓ ", "[OK] ");
static CROSS: Emoji<'_, '_> = Emoji("✗ ", "[FAIL] ");
static WARN: Emoji<'_, '_> = Emoji("⚠ ", "[WARN] ");

/// Execute the status command
pub async fn execute(config: &Config) -> BundleResult<()> {
    println!("{}", style("Bundlekeeper Status").bold().cyan());

    let settings = Settings::from_config(config);
    let storage_dir = ConfigManager::storage_dir(config);

    println!();
    println!("{}", style("Storage:").bold());
    let registry = BundleRegistry::new(storage_dir.clone(), config.storage.extensions.clone());
    match registry.load() {
        Ok(count) => println!(
            "  {} {} ({} bundle(s))",
            CHECK,
            storage_dir.display(),
            count
        ),
        Err(e) => println!("  {} {} - {}", CROSS, storage_dir.display(), e),
    }
    match &config.storage.asset_dir {
        Some(dir) if dir.exists() => println!("  {} Assets: {}", CHECK, dir.display()),
        Some(dir) => println!("  {} Assets: {} (missing)", WARN, dir.display()),
        None => println!("  {} Assets: not configured", style("-").dim()),
    }
    let queue = registry.queue();
    if !queue.is_empty() {
        println!("  {} Poll order: {}", CHECK, queue.join(", "));
    }

    println!();
    println!("{}", style("Repository:").bold());
    match &config.fetch.base_url {
        Some(url) => println!("  {} {}", CHECK, url),
        None => println!(
            "  {} {} - Run: bundlekeeper config set fetch.base_url <url>",
            CROSS,
            style("Not configured").red()
        ),
    }

    println!();
    println!("{}", style("Network:").bold());
    let gate = NetworkPolicyGate::new(
        Arc::new(SystemConnectivity::new()),
        config.network.preferred,
        settings.poll_only_on_preferred_connectivity,
    );
    let class = gate.connection_class();
    let preferred_label = format!("{:?}", config.network.preferred).to_lowercase();
    if gate.is_preferred_connectivity() {
        println!("  {} Connection: {} (preferred: {})", CHECK, class, preferred_label);
    } else {
        println!("  {} Connection: {} (preferred: {})", WARN, class, preferred_label);
    }
    if gate.allows_background_poll() {
        println!("  {} Background polling allowed", CHECK);
    } else {
        println!(
            "  {} {}",
            WARN,
            style("Background polling paused until preferred connectivity").yellow()
        );
    }

    println!();
    println!("{}", style("Policy:").bold());
    let interval = initial_interval(
        settings.debug_mode,
        Duration::from_secs(config.update.poll_interval_secs),
    );
    println!("  Poll interval: {}s", interval.as_secs());
    println!("  Seed from assets on miss: {}", settings.copy_asset_on_miss);
    println!("  Refresh on launch: {}", settings.refresh_on_launch);
    if settings.debug_mode {
        println!("  {} {}", WARN, style("Debug mode").yellow());
    }

    Ok(())
}
