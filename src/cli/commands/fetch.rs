//! Fetch command - request one bundle and wait for the outcome

use crate::bundle::InstallType;
use crate::cli::args::FetchArgs;
use crate::config::Config;
use crate::error::{BundleError, BundleResult};
use crate::events::UpdateEvent;
use crate::service::UpdateService;
use crate::ui::{self, FetchProgress, UiContext};
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;

/// Execute the fetch command
pub async fn execute(args: FetchArgs, config: &Config) -> BundleResult<()> {
    let ctx = UiContext::detect();
    let install_type = InstallType::from(args.install_type);

    let service = UpdateService::from_config(config);
    service.prepare().await?;

    // Subscribe before requesting so a cache hit is not missed
    let mut events = service.subscribe();
    let outcome = service.request(&args.bundle_id, install_type);
    let mut remaining = outcome.expected_completions();

    let progress = FetchProgress::new(&ctx, &args.bundle_id);
    let mut succeeded = false;
    let mut last_error = None;

    while remaining > 0 {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(missed)) => {
                warn!("Missed {} events", missed);
                continue;
            }
            Err(RecvError::Closed) => break,
        };
        if event.bundle_id() != args.bundle_id {
            continue;
        }

        match &event {
            UpdateEvent::Progress { percent, max, .. } => progress.update(*percent, *max),
            UpdateEvent::Completion {
                success, error, ..
            } => {
                remaining -= 1;
                if *success {
                    succeeded = true;
                } else {
                    last_error = error.clone();
                }
                if args.json {
                    println!("{}", serde_json::to_string(&event)?);
                } else {
                    progress.finish();
                    report(&ctx, &service, &event);
                }
            }
        }
    }

    progress.finish();
    service.shutdown().await;

    match (succeeded, last_error) {
        (true, _) => Ok(()),
        // The reason is already a rendered error
        (false, Some(reason)) => Err(BundleError::User(reason)),
        (false, None) => Err(BundleError::ServiceStopped),
    }
}

fn report(ctx: &UiContext, service: &UpdateService, event: &UpdateEvent) {
    let UpdateEvent::Completion {
        bundle_id,
        version_info,
        success,
        error,
        from_cache,
        ..
    } = event
    else {
        return;
    };

    if !success {
        ui::step_warn(
            ctx,
            &format!(
                "{}: {}",
                bundle_id,
                error.as_deref().unwrap_or("unknown error")
            ),
        );
        return;
    }

    let version = version_info
        .as_ref()
        .map(|info| info.version.clone())
        .unwrap_or_default();
    let source = if *from_cache { "cached" } else { "fetched" };
    let location = service
        .registry()
        .lookup(bundle_id)
        .map(|cached| cached.location.display().to_string())
        .unwrap_or_default();
    ui::step_ok_detail(
        ctx,
        &format!("{}@{} {}", bundle_id, version, source),
        &location,
    );
}
