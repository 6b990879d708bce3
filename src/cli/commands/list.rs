//! List command - show cached bundles

use crate::bundle::{BundleRegistry, CachedVersion};
use crate::cli::args::{ListArgs, OutputFormat};
use crate::config::{Config, ConfigManager};
use crate::error::BundleResult;
use crate::ui::{self, UiContext};
use chrono::{DateTime, Local, Utc};
use console::style;
use serde::Serialize;
use std::path::PathBuf;

/// One row of the listing
#[derive(Debug, Serialize)]
struct BundleRow {
    bundle_id: String,
    version: String,
    location: PathBuf,
    size: Option<u64>,
    modified: Option<DateTime<Utc>>,
}

impl From<CachedVersion> for BundleRow {
    fn from(cached: CachedVersion) -> Self {
        let metadata = std::fs::metadata(&cached.location).ok();
        Self {
            size: metadata.as_ref().map(|m| m.len()),
            modified: metadata
                .and_then(|m| m.modified().ok())
                .map(DateTime::<Utc>::from),
            bundle_id: cached.bundle_id,
            version: cached.version,
            location: cached.location,
        }
    }
}

/// Execute the list command
pub async fn execute(args: ListArgs, config: &Config) -> BundleResult<()> {
    let registry = BundleRegistry::new(
        ConfigManager::storage_dir(config),
        config.storage.extensions.clone(),
    );
    registry.load()?;

    let rows: Vec<BundleRow> = registry.present().into_iter().map(BundleRow::from).collect();

    if rows.is_empty() {
        match args.format {
            OutputFormat::Json => println!("[]"),
            OutputFormat::Plain => {}
            OutputFormat::Table => {
                let ctx = UiContext::detect();
                ui::step_info(&ctx, "No cached bundles");
            }
        }
        return Ok(());
    }

    match args.format {
        OutputFormat::Table => print_table(&rows),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
        OutputFormat::Plain => {
            for row in &rows {
                println!("{}@{}", row.bundle_id, row.version);
            }
        }
    }

    Ok(())
}

fn print_table(rows: &[BundleRow]) {
    println!(
        "{:<24} {:<14} {:<18} {:>10}",
        style("BUNDLE").bold(),
        style("VERSION").bold(),
        style("MODIFIED").bold(),
        style("SIZE").bold()
    );
    println!("{}", "-".repeat(69));

    for row in rows {
        let modified = row
            .modified
            .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        let size = row
            .size
            .map(format_size)
            .unwrap_or_else(|| style("missing").red().to_string());

        println!(
            "{:<24} {:<14} {:<18} {:>10}",
            row.bundle_id, row.version, modified, size
        );
    }

    println!();
    println!("{} bundle(s)", rows.len());
}

fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
