//! calARieScan - Simulated scan-and-detect engine
//!
//! Headless entry point: runs one scan on a chosen screen and prints each
//! rendered view to the terminal.
//!
//! # Usage
//!
//! ```text
//! calariescan [SCREEN]        # food_scanner (default), barcode_scanner, portion_calibration
//! calariescan --help
//! calariescan --version
//! ```
//!
//! # Execution Flow
//!
//! 1. Load `Scanner Settings.yaml` and `Result Catalog.yaml` from `calARieScan Data/`
//!    (defaults when missing, `CALARIESCAN__*` environment overrides)
//! 2. Initialize logging -> `<log_dir>/calariescan.YYYY-MM-DD`
//! 3. Create a tokio runtime for the progress clock
//! 4. Build the scan controller and its screen controller
//! 5. Start a scan; Ctrl-C cancels it
//! 6. Wait for the scan to finish, log metrics and shut down

use anyhow::{Context, Result, bail};
use calariescan::models::ScreenKind;
use calariescan::services::FixtureCatalog;
use calariescan::ui::{ScanView, ScreenController, ViewBridge};
use calariescan::{APP_NAME, ConfigManager, DATA_DIR, Metrics, ScanSessionController, StateChange, VERSION};
use clap::Parser;
use std::sync::Arc;
use std::sync::mpsc as std_mpsc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;

#[derive(Parser, Debug)]
#[command(
    name = "calariescan",
    version,
    about = "Run one simulated scan and print every rendered view"
)]
struct Cli {
    /// Scanner screen to run
    #[arg(value_enum, default_value_t = ScreenKind::FoodScanner)]
    screen: ScreenKind,
}

fn main() -> Result<()> {
    let Cli { screen } = Cli::parse();

    let config_manager = ConfigManager::new(DATA_DIR)?;
    let settings = config_manager.load_settings()?;
    let catalog_config = config_manager.load_catalog()?;

    // Held until main returns so buffered log lines are flushed
    let _log_guard = calariescan::logging::setup_from_settings(&settings, true)?;

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(2)
        .thread_name("calariescan-worker")
        .build()
        .context("Failed to create tokio runtime")?;

    let metrics = Arc::new(Metrics::new());
    let catalog = FixtureCatalog::from_config(&catalog_config).context("Invalid result catalog")?;
    let profile = settings.profile_for(screen);

    tracing::info!(
        "{}: {} ticks of {}% every {:?} (~{:.1}s)",
        screen,
        profile.ticks_to_complete(),
        profile.progress_step(),
        profile.tick_interval(),
        profile.expected_duration().as_secs_f32()
    );

    let scanner = ScanSessionController::builder(screen, Arc::new(catalog))
        .profile(profile)
        .metrics(Arc::clone(&metrics))
        .runtime(runtime.handle().clone())
        .build();

    let (finished_tx, finished_rx) = std_mpsc::channel();
    let bridge = ViewBridge::with_metrics(
        move |view: ScanView| {
            print_view(&view);
            if view.state.is_terminal() {
                let _ = finished_tx.send(());
            }
        },
        runtime.handle().clone(),
        Arc::clone(&metrics),
    );

    let screen_controller = ScreenController::new(scanner, bridge);

    let outcome = runtime.block_on(drive_scan(&screen_controller));

    // Let the renderer draw the terminal frame before tearing down
    if finished_rx.recv_timeout(Duration::from_secs(1)).is_err() {
        tracing::debug!("Renderer did not draw a terminal frame before shutdown");
    }

    drop(screen_controller);
    runtime.shutdown_timeout(Duration::from_secs(5));

    metrics.log_summary();
    tracing::info!("Shutdown complete");

    outcome
}

/// Start a scan and wait until it leaves `Scanning`, cancelling on Ctrl-C
async fn drive_scan(screen: &ScreenController) -> Result<()> {
    let mut rx = screen.scanner().subscribe();
    screen.on_start_requested().context("Failed to start scan")?;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            signal = &mut ctrl_c => {
                signal.context("Failed to listen for Ctrl-C")?;
                tracing::warn!("Interrupted - cancelling scan");
                screen.on_cancel_requested();
                return Ok(());
            }
            change = rx.recv() => match change {
                Ok(StateChange::ScanCompleted { result, .. }) => {
                    tracing::info!("Detected {}", result.summary());
                    return Ok(());
                }
                Ok(StateChange::ScanFailed { reason, .. }) => {
                    bail!("Scan failed: {}", reason);
                }
                Ok(StateChange::ScanCancelled { .. }) => return Ok(()),
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Missed {} state changes", skipped);
                    if !screen.scanner().is_scanning() {
                        return Ok(());
                    }
                }
                Err(RecvError::Closed) => bail!("Scan controller stopped unexpectedly"),
            }
        }
    }
}

fn print_view(view: &ScanView) {
    let mut line = format!("[{}] {}", view.title, view.status_text);
    if let Some(progress) = &view.progress_label {
        line.push_str(&format!(" | {}", progress));
    }
    if let Some(banner) = &view.error_banner {
        line.push_str(&format!(" | error: {}", banner));
    }
    println!("{}", line);

    if let Some(card) = &view.result_card {
        println!("  {} ({})", card.title, card.match_label);
        println!("  {} kcal, {}", card.calories, card.weight_label);
        println!(
            "  carbs {} | protein {} | fat {} | fiber {}",
            card.carbs_label, card.protein_label, card.fat_label, card.fiber_label
        );
        if let Some(health) = &card.health_label {
            println!("  health: {}", health);
        }
        if let Some(portion) = view.portion {
            println!("  portion: {} ({})", portion.label(), portion.serving_type());
        }
    }
}
