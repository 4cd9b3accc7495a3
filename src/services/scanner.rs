use crate::metrics::Metrics;
use crate::models::{DetectionResult, PROGRESS_COMPLETE, ScanProfile, ScanSession, ScanState, ScreenKind};
use crate::services::catalog::{ResultCatalog, ScanContext};
use crate::state::{StateChange, StateManager};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Instant;
use thiserror::Error;
use tokio::sync::{broadcast, watch};
use tokio::time::MissedTickBehavior;

/// Errors surfaced by the scan controller
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    #[error("A scan is already in progress")]
    AlreadyScanning,

    #[error("Detection failed: {0}")]
    CatalogUnavailable(String),

    #[error("Cannot {operation} while {from}")]
    InvalidTransition {
        from: &'static str,
        operation: &'static str,
    },

    #[error("No async runtime available to drive the progress clock")]
    ClockUnavailable,
}

/// What a single tick did to the session
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Nothing to advance; the controller is not scanning
    NotScanning,

    /// Progress moved but the scan is still running
    Advanced { progress: u8 },

    /// Progress is already at 100 and a catalog lookup is in flight
    AwaitingResult,

    Completed(DetectionResult),

    Failed { reason: String },

    /// The catalog answered after the scan was cancelled or replaced
    Discarded,
}

/// Who advances progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockMode {
    /// A tokio task ticks at the profile's interval
    Automatic,

    /// Nothing ticks unless [`ScanSessionController::tick`] is called
    Manual,
}

#[derive(Default)]
struct ClockSlot {
    /// Dropping or signalling this stops the running clock task
    cancel_tx: Option<watch::Sender<bool>>,
    started_at: Option<Instant>,
}

struct Inner {
    screen: ScreenKind,
    profile: ScanProfile,
    state: StateManager,
    catalog: Arc<dyn ResultCatalog>,
    metrics: Arc<Metrics>,
    clock_mode: ClockMode,
    runtime: Option<tokio::runtime::Handle>,
    clock: Mutex<ClockSlot>,
}

/// Drives one scan at a time from request to result or cancellation.
///
/// One controller is created per screen. It owns its own
/// [`StateManager`], so controllers never observe each other's sessions.
///
/// # State machine
///
/// ```text
/// Idle -> Scanning -> {Completed, Cancelled, Failed} -> Idle
/// ```
///
/// - [`start()`](Self::start) fails with [`ScanError::AlreadyScanning`] while a
///   scan runs and leaves that scan alone
/// - [`tick()`](Self::tick) adds `progress_step` (capped at 100); at 100 it asks
///   the [`ResultCatalog`] for a payload and completes, or fails on a catalog
///   error without retrying
/// - [`cancel()`](Self::cancel) is a no-op unless scanning
/// - [`reset()`](Self::reset) dismisses a terminal session
///
/// # Cancellation
///
/// Every tick and every catalog answer is applied inside
/// [`StateManager::update`] only if its `session_id` is still the active
/// scan. `cancel()` flips the state under the same lock before it signals
/// the clock task, so nothing from the cancelled scan can land afterwards,
/// even a tick that was already waiting on the catalog.
///
/// Cloning is cheap and yields a handle to the same controller. Dropping the
/// last handle stops the clock.
#[derive(Clone)]
pub struct ScanSessionController {
    inner: Arc<Inner>,
}

impl ScanSessionController {
    /// Controller with an automatic clock, using the caller's tokio runtime
    pub fn new(screen: ScreenKind, profile: ScanProfile, catalog: Arc<dyn ResultCatalog>) -> Self {
        Self::builder(screen, catalog).profile(profile).build()
    }

    pub fn builder(screen: ScreenKind, catalog: Arc<dyn ResultCatalog>) -> ScanSessionControllerBuilder {
        ScanSessionControllerBuilder {
            screen,
            profile: screen.default_profile(),
            catalog,
            metrics: None,
            clock_mode: ClockMode::Automatic,
            runtime: None,
        }
    }

    pub fn screen(&self) -> ScreenKind {
        self.inner.screen
    }

    pub fn profile(&self) -> ScanProfile {
        self.inner.profile
    }

    pub fn clock_mode(&self) -> ClockMode {
        self.inner.clock_mode
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.inner.metrics
    }

    pub fn state_manager(&self) -> &StateManager {
        &self.inner.state
    }

    pub fn snapshot(&self) -> ScanSession {
        self.inner.state.snapshot()
    }

    pub fn state(&self) -> ScanState {
        self.inner.state.read(|s| s.state().clone())
    }

    pub fn progress(&self) -> u8 {
        self.inner.state.read(|s| s.progress())
    }

    pub fn result(&self) -> Option<DetectionResult> {
        self.inner.state.read(|s| s.result().cloned())
    }

    pub fn is_scanning(&self) -> bool {
        self.inner.state.read(|s| s.is_scanning())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.inner.state.subscribe()
    }

    /// Begin a new scan.
    ///
    /// Valid from any state except `Scanning`. Clears a previous result,
    /// resets progress to 0 and starts the clock.
    ///
    /// # Returns
    /// The new session id
    pub fn start(&self) -> Result<u64, ScanError> {
        let runtime = match self.inner.clock_mode {
            ClockMode::Automatic => Some(self.clock_runtime()?),
            ClockMode::Manual => None,
        };

        let (begun, _) = self
            .inner
            .state
            .update(|s| s.begin().then(|| s.session_id()));

        let Some(session_id) = begun else {
            self.inner.metrics.record_start_rejected();
            tracing::warn!("{}: start ignored, a scan is already in progress", self.inner.screen);
            return Err(ScanError::AlreadyScanning);
        };

        self.inner.metrics.record_scan_started();
        tracing::info!(
            "{}: scan {} started (step {}, every {:?})",
            self.inner.screen,
            session_id,
            self.inner.profile.progress_step(),
            self.inner.profile.tick_interval()
        );

        let mut slot = self.inner.clock_slot();
        slot.started_at = Some(Instant::now());
        // Replacing the sender ends any clock task left over from an earlier scan
        slot.cancel_tx = None;

        if let Some(runtime) = runtime {
            let (cancel_tx, cancel_rx) = watch::channel(false);
            slot.cancel_tx = Some(cancel_tx);
            runtime.spawn(run_clock(
                Arc::downgrade(&self.inner),
                session_id,
                cancel_rx,
            ));
        }

        Ok(session_id)
    }

    /// Advance the active scan by one step.
    ///
    /// Called by the clock task. Manual-clock drivers call it directly.
    pub async fn tick(&self) -> TickOutcome {
        let session_id = self.inner.state.read(|s| s.session_id());
        self.inner.tick_session(session_id).await
    }

    /// Stop the running scan and discard its progress.
    ///
    /// # Returns
    /// `false` (and no change) when nothing was scanning
    pub fn cancel(&self) -> bool {
        let (cancelled, _) = self.inner.state.update(|s| {
            let session_id = s.session_id();
            s.cancel().then_some(session_id)
        });

        let Some(session_id) = cancelled else {
            tracing::debug!("{}: cancel ignored, not scanning", self.inner.screen);
            return false;
        };

        {
            let mut slot = self.inner.clock_slot();
            if let Some(cancel_tx) = slot.cancel_tx.take() {
                let _ = cancel_tx.send(true);
            }
            slot.started_at = None;
        }

        self.inner.metrics.record_scan_cancelled();
        tracing::info!("{}: scan {} cancelled", self.inner.screen, session_id);
        true
    }

    /// Dismiss a completed, cancelled or failed scan and return to `Idle`.
    pub fn reset(&self) -> Result<(), ScanError> {
        let (was_reset, _) = self.inner.state.update(|s| s.reset());

        if was_reset {
            tracing::debug!("{}: session reset", self.inner.screen);
            Ok(())
        } else {
            Err(ScanError::InvalidTransition {
                from: ScanState::Scanning.name(),
                operation: "reset",
            })
        }
    }

    fn clock_runtime(&self) -> Result<tokio::runtime::Handle, ScanError> {
        match &self.inner.runtime {
            Some(handle) => Ok(handle.clone()),
            None => tokio::runtime::Handle::try_current().map_err(|_| ScanError::ClockUnavailable),
        }
    }
}

impl std::fmt::Debug for ScanSessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanSessionController")
            .field("screen", &self.inner.screen)
            .field("profile", &self.inner.profile)
            .field("clock_mode", &self.inner.clock_mode)
            .field("state", &self.inner.state)
            .finish()
    }
}

impl Inner {
    fn clock_slot(&self) -> MutexGuard<'_, ClockSlot> {
        self.clock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn tick_session(&self, session_id: u64) -> TickOutcome {
        let step = self.profile.progress_step();

        let (advanced, _) = self.state.update(|s| {
            if !s.is_active(session_id) {
                None
            } else if s.progress() >= PROGRESS_COMPLETE {
                Some(None)
            } else {
                s.advance(session_id, step);
                Some(Some(s.progress()))
            }
        });

        let progress = match advanced {
            None => return TickOutcome::NotScanning,
            Some(None) => return TickOutcome::AwaitingResult,
            Some(Some(progress)) => progress,
        };

        self.metrics.record_tick();
        tracing::trace!("{}: scan {} at {}%", self.screen, session_id, progress);

        if progress < PROGRESS_COMPLETE {
            return TickOutcome::Advanced { progress };
        }

        self.finish(session_id).await
    }

    async fn finish(&self, session_id: u64) -> TickOutcome {
        let context = ScanContext {
            session_id,
            screen: self.screen,
        };

        match self.catalog.fetch_result(&context).await {
            Ok(result) => {
                let (committed, _) = self
                    .state
                    .update(|s| s.complete(session_id, result.clone()));

                if !committed {
                    return self.discard(session_id);
                }

                let elapsed = self
                    .clock_slot()
                    .started_at
                    .take()
                    .map(|started| started.elapsed())
                    .unwrap_or_default();
                self.metrics.record_scan_completed(elapsed);
                tracing::info!(
                    "{}: scan {} completed in {:.2}s - {}",
                    self.screen,
                    session_id,
                    elapsed.as_secs_f32(),
                    result.summary()
                );
                TickOutcome::Completed(result)
            }
            Err(e) => {
                let reason = ScanError::CatalogUnavailable(e.to_string()).to_string();
                let (committed, _) = self.state.update(|s| s.fail(session_id, reason.clone()));

                if !committed {
                    return self.discard(session_id);
                }

                self.clock_slot().started_at = None;
                self.metrics.record_scan_failed();
                tracing::warn!("{}: scan {} failed: {}", self.screen, session_id, reason);
                TickOutcome::Failed { reason }
            }
        }
    }

    fn discard(&self, session_id: u64) -> TickOutcome {
        self.metrics.record_stale_tick();
        tracing::debug!(
            "{}: dropping catalog answer for scan {}, no longer active",
            self.screen,
            session_id
        );
        TickOutcome::Discarded
    }
}

/// Progress clock for one scan.
///
/// Ends when the scan leaves `Scanning`, when `cancel_rx` fires or its
/// sender is dropped, or when the controller itself is gone.
async fn run_clock(inner: Weak<Inner>, session_id: u64, mut cancel_rx: watch::Receiver<bool>) {
    let Some(period) = inner.upgrade().map(|inner| inner.profile.tick_interval()) else {
        return;
    };

    // First tick lands one period after start, like a browser interval
    let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel_rx.changed() => break,
            _ = interval.tick() => {}
        }

        let Some(controller) = inner.upgrade() else {
            break;
        };

        // Race the tick (and any catalog lookup inside it) against cancellation
        let outcome = tokio::select! {
            biased;
            _ = cancel_rx.changed() => break,
            outcome = controller.tick_session(session_id) => outcome,
        };

        match outcome {
            TickOutcome::Advanced { .. } => continue,
            TickOutcome::AwaitingResult => continue,
            _ => break,
        }
    }

    tracing::trace!("Progress clock for scan {} stopped", session_id);
}

/// Builder for [`ScanSessionController`]
pub struct ScanSessionControllerBuilder {
    screen: ScreenKind,
    profile: ScanProfile,
    catalog: Arc<dyn ResultCatalog>,
    metrics: Option<Arc<Metrics>>,
    clock_mode: ClockMode,
    runtime: Option<tokio::runtime::Handle>,
}

impl ScanSessionControllerBuilder {
    pub fn profile(mut self, profile: ScanProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Share a metrics sink between controllers
    pub fn metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Spawn the clock on this runtime instead of the caller's
    pub fn runtime(mut self, handle: tokio::runtime::Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    pub fn manual_clock(mut self) -> Self {
        self.clock_mode = ClockMode::Manual;
        self
    }

    pub fn build(self) -> ScanSessionController {
        let metrics = self.metrics.unwrap_or_default();

        ScanSessionController {
            inner: Arc::new(Inner {
                screen: self.screen,
                profile: self.profile,
                state: StateManager::with_metrics(Arc::clone(&metrics)),
                catalog: self.catalog,
                metrics,
                clock_mode: self.clock_mode,
                runtime: self.runtime,
                clock: Mutex::new(ClockSlot::default()),
            }),
        }
    }
}
