//! BModLoader - headless entry point.
//!
//! # Overview
//!
//! Runs the loader without a GUI. It initializes:
//! - Configuration ([`ConfigManager`]: defaults, `bmodloader.yaml`, `BMODLOADER_*`)
//! - Logging infrastructure (file rotation + console output)
//! - The engine thread ([`EngineHost`] with the directory-listing [`CatalogBackend`])
//! - The consumer loop ([`Controller`]) on a tokio runtime
//!
//! View changes are written to the log instead of a window.
//!
//! # Execution Flow
//!
//! 1. Load configuration from the working directory
//! 2. Initialize logging -> logs/bmodloader.<date>
//! 3. Start the engine; a failure here is fatal
//! 4. Queue every command line argument as an import: `<scheme>:...`
//!    arguments are one-click links, anything else is a file path
//! 5. Send the startup command sequence and run until Ctrl-C
//! 6. Shut down the runtime, stop the engine and log metrics. An import
//!    still running at this point is abandoned rather than awaited

use anyhow::{Result, anyhow};
use bmodloader::services::import::error_chain;
use bmodloader::services::{CatalogBackend, EngineHost, HttpDownloader, LinkParser};
use bmodloader::ui::notification_channel;
use bmodloader::{APP_NAME, ConfigManager, Controller, ErrorReport, Metrics, VERSION, ViewChange};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;

fn main() -> Result<()> {
    let config_manager = ConfigManager::new(".")?;
    let config = config_manager.load()?;

    // Held until main returns so buffered log lines are flushed
    let _log_guard =
        bmodloader::logging::setup_logging(&config.log_dir, APP_NAME, config.debug_mode, true)?;

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(2)
        .thread_name("bmodloader-worker")
        .build()?;

    let metrics = Arc::new(Metrics::new());
    let (notify_tx, notify_rx) = notification_channel();

    let backend = CatalogBackend::new(config.mods_path.clone(), config.mod_extension.clone());
    let (host, engine) = match EngineHost::spawn(backend, notify_tx) {
        Ok(started) => started,
        Err(e) => {
            let report = ErrorReport::fatal("Fatal Error:", error_chain(&e));
            tracing::error!("{} {}", report.title, report.content);
            eprintln!("{}", report.clipboard_text());
            return Err(anyhow!(e).context("Engine failed to start"));
        }
    };
    tracing::info!("Engine started");

    let mut controller = Controller::new(
        config.clone(),
        Arc::new(engine),
        notify_rx,
        Box::new(HttpDownloader::new()),
        Arc::clone(&metrics),
    );

    let submitter = controller.submitter();
    let parser = LinkParser::new();
    for arg in std::env::args().skip(1) {
        if parser.has_scheme(&arg, &config.link_scheme) {
            tracing::info!("Queued link import {}", arg);
            submitter.submit_url(arg);
        } else {
            tracing::info!("Queued file import {}", arg);
            submitter.submit_file(arg);
        }
    }

    let mut changes = controller.subscribe();
    runtime.spawn(async move {
        loop {
            match changes.recv().await {
                Ok(change) => render(&change),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("View renderer lagged, skipped {} changes", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    controller.startup();

    runtime.block_on(controller.run(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
        }
    }));

    runtime.shutdown_timeout(Duration::from_secs(5));

    // A running link drain keeps an engine client alive until its download ends
    if submitter.is_busy() {
        tracing::warn!("Import still in progress, exiting without waiting for the engine thread");
    } else {
        host.join();
    }

    metrics.log_summary();
    tracing::info!("Application shutdown complete");
    Ok(())
}

/// Write one view change to the log
fn render(change: &ViewChange) {
    match change {
        ViewChange::ScreenChanged { screen } => tracing::info!("Screen: {:?}", screen),
        ViewChange::LoadingTextChanged { text } => tracing::info!("{}", text),
        ViewChange::ModsChanged { count } => tracing::info!("Mod list: {} mods", count),
        ViewChange::ModUpdated { mod_hash, installed } => {
            tracing::info!("Mod {} installed={}", mod_hash, installed)
        }
        ViewChange::ProgressUpdated {
            visible,
            title,
            content,
            value,
            maximum,
        } => {
            if *visible {
                tracing::info!("{} {} [{}/{}]", title, content, value, maximum);
            }
        }
        ViewChange::ConflictPrompted { mod_hash, content } => {
            tracing::warn!("Conflict for {}: {}", mod_hash, content.replace('\n', " "))
        }
        ViewChange::ConflictResolved => tracing::info!("Conflict prompt closed"),
        ViewChange::ErrorReported {
            title,
            content,
            terminate,
        } => {
            tracing::error!("{} {} (terminate={})", title, content.trim_end(), terminate)
        }
        ViewChange::ErrorDismissed => tracing::debug!("Error dialog dismissed"),
    }
}
