//! Run command - keep the update service running in the foreground

use crate::cli::args::RunArgs;
use crate::config::Config;
use crate::error::BundleResult;
use crate::events::UpdateEvent;
use crate::service::UpdateService;
use crate::ui::{self, UiContext};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

/// Execute the run command
pub async fn execute(args: RunArgs, mut config: Config) -> BundleResult<()> {
    let ctx = UiContext::detect();

    if args.debug {
        config.update.debug_mode = true;
    }
    if let Some(secs) = args.poll_interval {
        config.update.poll_interval_secs = secs;
    }

    let service = UpdateService::from_config(&config);
    let mut events = service.subscribe();
    service.start().await?;

    ui::intro(&ctx, "bundlekeeper");
    ui::key_value(&ctx, "Storage", &service.storage_dir().display().to_string());
    ui::key_value(
        &ctx,
        "Poll interval",
        &format!("{}s", service.poll_interval().as_secs()),
    );
    ui::key_value(
        &ctx,
        "Cached bundles",
        &service.registry().present().len().to_string(),
    );
    let polling = service.gate().allows_background_poll();
    ui::key_value_status(
        &ctx,
        "Background polling",
        if polling { "allowed" } else { "waiting for preferred network" },
        polling,
    );
    if config.fetch.base_url.is_none() {
        ui::step_warn_hint(
            &ctx,
            "No bundle repository configured",
            "Run: bundlekeeper config set fetch.base_url <url>",
        );
    }
    ui::remark(&ctx, "Press Ctrl+C to stop");

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,

            event = events.recv() => match event {
                Ok(event) => report(&ctx, &event),
                Err(RecvError::Lagged(missed)) => warn!("Missed {} events", missed),
                Err(RecvError::Closed) => break,
            },
        }
    }

    service.shutdown().await;
    ui::outro_success(&ctx, "Stopped");
    Ok(())
}

fn report(ctx: &UiContext, event: &UpdateEvent) {
    match event {
        UpdateEvent::Progress {
            bundle_id, percent, ..
        } => debug!("{}: {:.0}%", bundle_id, percent),
        UpdateEvent::Completion {
            bundle_id,
            version_info,
            success: true,
            ..
        } => {
            let version = version_info
                .as_ref()
                .map(|info| info.version.as_str())
                .unwrap_or("unknown");
            ui::step_ok_detail(ctx, &format!("Checked {}", bundle_id), version);
        }
        UpdateEvent::Completion {
            bundle_id, error, ..
        } => {
            ui::step_error_detail(
                ctx,
                &format!("Update of {} failed", bundle_id),
                error.as_deref().unwrap_or("unknown error"),
            );
        }
    }
}
