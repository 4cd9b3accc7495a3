// Scan metrics module
//
// Provides lightweight counters for monitoring scan controllers

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Scan engine metrics
///
/// Uses atomic operations for thread-safe tracking without locks. One
/// instance may be shared by several controllers; counters are logged on
/// shutdown for a quick health check.
#[derive(Debug)]
pub struct Metrics {
    pub scans_started: AtomicU64,
    pub scans_completed: AtomicU64,
    pub scans_cancelled: AtomicU64,
    pub scans_failed: AtomicU64,

    /// `start()` calls rejected because a scan was already running
    pub start_rejections: AtomicU64,

    /// Progress ticks applied to an active scan
    pub ticks: AtomicU64,

    /// Ticks or catalog responses dropped because their scan was no longer active
    pub stale_ticks: AtomicU64,

    /// Total time spent in completed scans, in milliseconds
    pub total_scan_time_ms: AtomicU64,

    /// Number of state broadcasts sent
    pub state_broadcasts: AtomicU64,

    /// Number of broadcasts with no receiver listening
    pub state_broadcasts_unheard: AtomicU64,

    /// Number of views pushed to the presentation layer
    pub view_updates: AtomicU64,

    /// Number of views dropped because the view channel was full
    pub view_channel_full: AtomicU64,

    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            scans_started: AtomicU64::new(0),
            scans_completed: AtomicU64::new(0),
            scans_cancelled: AtomicU64::new(0),
            scans_failed: AtomicU64::new(0),
            start_rejections: AtomicU64::new(0),
            ticks: AtomicU64::new(0),
            stale_ticks: AtomicU64::new(0),
            total_scan_time_ms: AtomicU64::new(0),
            state_broadcasts: AtomicU64::new(0),
            state_broadcasts_unheard: AtomicU64::new(0),
            view_updates: AtomicU64::new(0),
            view_channel_full: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_scan_started(&self) {
        self.scans_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_scan_completed(&self, duration: Duration) {
        self.scans_completed.fetch_add(1, Ordering::Relaxed);
        self.total_scan_time_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn record_scan_cancelled(&self) {
        self.scans_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_scan_failed(&self) {
        self.scans_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_start_rejected(&self) {
        self.start_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stale_tick(&self) {
        self.stale_ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_state_broadcast(&self) {
        self.state_broadcasts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_state_broadcast_unheard(&self) {
        self.state_broadcasts_unheard.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_view_update(&self) {
        self.view_updates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_view_channel_full(&self) {
        self.view_channel_full.fetch_add(1, Ordering::Relaxed);
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Average length of a completed scan in milliseconds
    pub fn avg_scan_time_ms(&self) -> f64 {
        let total = self.total_scan_time_ms.load(Ordering::Relaxed);
        let count = self.scans_completed.load(Ordering::Relaxed);
        if count > 0 {
            total as f64 / count as f64
        } else {
            0.0
        }
    }

    pub fn log_summary(&self) {
        tracing::info!("=== Scan Metrics Summary ===");
        tracing::info!("Uptime: {:.2}s", self.uptime().as_secs_f64());
        tracing::info!(
            "Scans: {} started, {} completed, {} cancelled, {} failed, {} rejected starts",
            self.scans_started.load(Ordering::Relaxed),
            self.scans_completed.load(Ordering::Relaxed),
            self.scans_cancelled.load(Ordering::Relaxed),
            self.scans_failed.load(Ordering::Relaxed),
            self.start_rejections.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Ticks: {} applied, {} stale (avg scan {:.2}ms)",
            self.ticks.load(Ordering::Relaxed),
            self.stale_ticks.load(Ordering::Relaxed),
            self.avg_scan_time_ms()
        );
        tracing::info!(
            "State broadcasts: {}, unheard: {}",
            self.state_broadcasts.load(Ordering::Relaxed),
            self.state_broadcasts_unheard.load(Ordering::Relaxed)
        );
        tracing::info!(
            "View updates: {}, channel full errors: {}",
            self.view_updates.load(Ordering::Relaxed),
            self.view_channel_full.load(Ordering::Relaxed)
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
