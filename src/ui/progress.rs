//! Download progress with CI fallback

use super::context::UiContext;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicU8, Ordering};

/// Percent step between plain-text progress lines
const PLAIN_STEP: u8 = 25;

/// Progress bar for a bundle download.
///
/// Interactive terminals get an indicatif bar sized in bytes; otherwise a
/// line is printed every 25 percent.
pub struct FetchProgress {
    bar: Option<ProgressBar>,
    label: String,
    last_reported: AtomicU8,
}

impl FetchProgress {
    pub fn new(ctx: &UiContext, label: &str) -> Self {
        let bar = ctx.use_fancy_output().then(|| {
            let bar = ProgressBar::new(0);
            if let Ok(style) = ProgressStyle::default_bar().template(
                "  {spinner:.cyan} Fetching {prefix}  {bar:24.cyan/dim} {bytes}/{total_bytes}  {elapsed:.dim}",
            ) {
                bar.set_style(
                    style
                        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
                        .progress_chars("━╸─"),
                );
            }
            bar.set_prefix(label.to_string());
            bar.enable_steady_tick(std::time::Duration::from_millis(120));
            bar
        });

        Self {
            bar,
            label: label.to_string(),
            last_reported: AtomicU8::new(0),
        }
    }

    /// Apply a progress event: `percent` of `max` bytes
    pub fn update(&self, percent: f32, max: u64) {
        let percent = percent.clamp(0.0, 100.0);

        if let Some(ref bar) = self.bar {
            if max > 0 {
                bar.set_length(max);
                bar.set_position((max as f64 * f64::from(percent) / 100.0) as u64);
            }
            return;
        }

        let step = (percent as u8 / PLAIN_STEP) * PLAIN_STEP;
        if step > self.last_reported.fetch_max(step, Ordering::Relaxed) {
            println!("  Fetching {}: {}%", self.label, step);
        }
    }

    /// Finish and clear the bar
    pub fn finish(&self) {
        if let Some(ref bar) = self.bar {
            bar.disable_steady_tick();
            bar.finish_and_clear();
        }
    }
}
