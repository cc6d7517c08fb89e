mod args;
mod console;
mod error;
mod feed;
mod installer;
mod locator;
mod orchestrator;
mod product;
mod ui;
mod version;

use crate::args::UpdaterArgs;
use crate::console::ConsoleHost;
use crate::error::UpdaterError;
use crate::feed::ReleaseResolver;
use crate::installer::Installer;
use crate::locator::VersionLocator;
use crate::orchestrator::{CheckState, InstallBackend, Locate, ReleaseSource, UpdateOrchestrator};
use crate::product::ProductProfile;
use crate::ui::{CheckRequest, UiHandle};
use clap::Parser as _;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, Interval};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

fn main() {
    let indicatif_layer = tracing_indicatif::IndicatifLayer::new();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("QB_UPDATER_LOG")
                .from_env_lossy(),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(indicatif_layer.get_stdout_writer()))
        .with(indicatif_layer)
        .init();

    let args = UpdaterArgs::parse();

    let result = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build() {
        Ok(v) => {
            let result = v.block_on(async_main(args));

            // The stdin reader blocks on a background thread until the next line.
            v.shutdown_background();
            result
        }
        Err(err) => {
            tracing::error!("Failed to create tokio runtime: {:?}", err);
            std::process::exit(1);
        }
    };

    if let Err(err) = result {
        tracing::error!("Error: {:?}", err);
        std::process::exit(1);
    }
}

async fn async_main(args: UpdaterArgs) -> Result<(), UpdaterError> {
    tracing::trace!("args = {:#?}", args);

    let profile = ProductProfile::from_args(&args);
    let download_directory = match &args.download_directory {
        Some(v) => v.clone(),
        None => installer::default_download_directory()?,
    };

    let client = feed::http_client()?;
    let (ui, ui_events) = UiHandle::channel();

    let releases = ReleaseResolver::new(
        client.clone(),
        args.feed_url.clone(),
        &args.feed_platform,
        &profile,
        ui.clone(),
    )?;
    let installer = Installer::new(
        client,
        profile.clone(),
        download_directory,
        Duration::from_secs(args.exit_timeout_secs),
        ui.clone(),
    );
    tracing::debug!("Installers go to {}", installer.download_directory().display());

    let orchestrator = Arc::new(UpdateOrchestrator::new(
        profile.name.clone(),
        VersionLocator::for_host(profile),
        releases,
        installer,
        ui,
    ));

    let shutdown = CancellationToken::new();
    let (check_sender, mut check_requests) = tokio::sync::mpsc::unbounded_channel::<CheckRequest>();
    let console = ConsoleHost::new(ui_events, check_sender, shutdown.clone(), args.assume_yes);
    let console = tokio::spawn(console.run());

    if args.once {
        let outcome = orchestrator.run_check_cycle().await;
        tracing::debug!("Check finished: {:?}", outcome);
    } else {
        let tracker = TaskTracker::new();
        spawn_cycle(&tracker, &orchestrator);

        tracing::info!("Press Enter to check again, type 'quit' to exit.");

        let mut interval = args
            .interval_hours
            .map(|hours| {
                let period = Duration::from_secs(hours * 60 * 60);
                tokio::time::interval_at(Instant::now() + period, period)
            });

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interrupted() => {
                    tracing::info!("Interrupted, shutting down...");
                    break;
                }
                request = check_requests.recv() => match request {
                    Some(CheckRequest) if orchestrator.state() == CheckState::Checking => {
                        tracing::info!("A check is already in progress");
                    }
                    Some(CheckRequest) => spawn_cycle(&tracker, &orchestrator),
                    None => break,
                },
                _ = next_tick(&mut interval) => spawn_cycle(&tracker, &orchestrator),
            }
        }

        // Unanswered questions are declined once the console is gone.
        shutdown.cancel();
        if !wait_for_cycles(&tracker, interrupted()).await {
            tracing::warn!("Interrupted again, abandoning running checks");
        }
    }

    shutdown.cancel();
    drop(orchestrator);
    console.await?;

    tracing::info!("Done.");
    Ok(())
}

fn spawn_cycle<L, R, I>(tracker: &TaskTracker, orchestrator: &Arc<UpdateOrchestrator<L, R, I>>)
where
    L: Locate,
    R: ReleaseSource + 'static,
    I: InstallBackend + 'static,
{
    let orchestrator = orchestrator.clone();

    tracker.spawn(async move {
        let outcome = orchestrator.run_check_cycle().await;
        tracing::debug!("Check finished: {:?}", outcome);
    });
}

/// Close `tracker` and wait for its cycles, unless `interrupt` fires first.
/// Returns whether every cycle finished.
async fn wait_for_cycles(tracker: &TaskTracker, interrupt: impl Future<Output = ()>) -> bool {
    tracker.close();

    tokio::select! {
        _ = tracker.wait() => true,
        _ = interrupt => false,
    }
}

/// Resolves on Ctrl-C. Never resolves where the handler cannot be installed.
async fn interrupted() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!("Cannot listen for Ctrl-C: {}", err);
        std::future::pending::<()>().await;
    }
}

async fn next_tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
