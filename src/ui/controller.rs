// Screen Controller - Connects one scanner screen to its ScanSessionController
//
// A screen raises three intents (start, cancel, dismiss). The controller
// turns them into scan commands and keeps the screen's ScanView current by
// listening to the scanner's StateChange broadcast and pushing each new view
// through the ViewBridge.

use crate::models::{PortionSize, ScanSession, ScreenKind};
use crate::services::{ScanError, ScanSessionController};
use crate::state::StateManager;
use crate::ui::bridge::ViewBridge;
use crate::ui::view::ScanView;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

/// View inputs that live outside the scan session
#[derive(Default)]
struct ScreenLocal {
    /// Message from the last refused command, cleared on the next state change
    rejection: Option<String>,
    portion: PortionSize,
    /// Last frame queued on the bridge
    last_view: Option<ScanView>,
}

struct Shared {
    screen: ScreenKind,
    state: StateManager,
    bridge: ViewBridge,
    local: Mutex<ScreenLocal>,
}

/// Presentation adapter for one scanner screen
///
/// # Example
/// ```ignore
/// let scanner = ScanSessionController::builder(ScreenKind::FoodScanner, catalog).build();
/// let bridge = ViewBridge::new(|view| println!("{}", view.status_text), handle);
/// let screen = ScreenController::new(scanner, bridge);
///
/// screen.on_start_requested()?;   // scan trigger tapped
/// screen.on_cancel_requested();   // back button
/// ```
///
/// Dropping the controller (leaving the screen) cancels a running scan.
pub struct ScreenController {
    scanner: ScanSessionController,
    shared: Arc<Shared>,
    subscription: JoinHandle<()>,
}

impl ScreenController {
    /// Wire `scanner` to `bridge` and draw the initial view.
    ///
    /// The state subscription runs on the bridge's tokio runtime.
    pub fn new(scanner: ScanSessionController, bridge: ViewBridge) -> Self {
        let shared = Arc::new(Shared {
            screen: scanner.screen(),
            state: scanner.state_manager().clone(),
            bridge,
            local: Mutex::new(ScreenLocal::default()),
        });

        // Subscribe before the first render so no change slips between them
        let rx = scanner.subscribe();
        shared.refresh(|_| {});

        let subscription = shared
            .bridge
            .tokio_handle()
            .spawn(run_subscription(Arc::clone(&shared), rx));

        tracing::info!("{}: screen controller initialized", shared.screen);

        Self {
            scanner,
            shared,
            subscription,
        }
    }

    pub fn screen(&self) -> ScreenKind {
        self.shared.screen
    }

    pub fn scanner(&self) -> &ScanSessionController {
        &self.scanner
    }

    /// The view as it would be drawn now
    pub fn current_view(&self) -> ScanView {
        let local = self.shared.local();
        self.shared.render(&local, &self.scanner.snapshot())
    }

    /// Scan trigger tapped.
    ///
    /// A refused start (already scanning, no runtime) is shown on the
    /// error banner and returned; the running scan is not disturbed.
    pub fn on_start_requested(&self) -> Result<u64, ScanError> {
        tracing::debug!("{}: start requested", self.shared.screen);

        self.scanner.start().inspect_err(|e| {
            tracing::warn!("{}: start refused: {}", self.shared.screen, e);
            self.shared.reject(e);
        })
    }

    /// Back or stop tapped. No effect unless scanning.
    pub fn on_cancel_requested(&self) -> bool {
        tracing::debug!("{}: cancel requested", self.shared.screen);
        self.scanner.cancel()
    }

    /// Result card or error banner dismissed
    pub fn on_dismiss_result(&self) -> Result<(), ScanError> {
        tracing::debug!("{}: dismiss requested", self.shared.screen);

        self.scanner.reset().inspect_err(|e| {
            tracing::warn!("{}: dismiss refused: {}", self.shared.screen, e);
            self.shared.reject(e);
        })
    }

    /// Portion picker changed. Only the portion screen scales its result.
    pub fn on_portion_selected(&self, portion: PortionSize) {
        if self.shared.screen != ScreenKind::PortionCalibration {
            tracing::debug!("{}: portion selection ignored", self.shared.screen);
            return;
        }

        tracing::debug!("{}: portion set to {}", self.shared.screen, portion.label());
        self.shared.refresh(|local| local.portion = portion);
    }
}

impl Drop for ScreenController {
    fn drop(&mut self) {
        if self.scanner.cancel() {
            tracing::info!("{}: left screen mid-scan, scan cancelled", self.shared.screen);
        }
        self.subscription.abort();
    }
}

impl Shared {
    fn local(&self) -> MutexGuard<'_, ScreenLocal> {
        self.local.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn render(&self, local: &ScreenLocal, session: &ScanSession) -> ScanView {
        let view = ScanView::render(self.screen, session, local.rejection.clone());

        if self.screen == ScreenKind::PortionCalibration {
            view.with_portion(local.portion, session.result())
        } else {
            view
        }
    }

    fn reject(&self, error: &ScanError) {
        let message = error.to_string();
        self.refresh(|local| local.rejection = Some(message));
    }

    /// Apply `edit`, then render the latest session and push it unless it
    /// matches the last frame.
    ///
    /// The whole step runs under the `local` lock. Frames therefore reach
    /// the bridge in snapshot order, and whoever renders last pushes the
    /// newest session. `push_view` never blocks.
    fn refresh(&self, edit: impl FnOnce(&mut ScreenLocal)) {
        let mut local = self.local();
        edit(&mut *local);

        let view = self.render(&local, &self.state.snapshot());
        if local.last_view.as_ref() == Some(&view) {
            return;
        }

        // A dropped frame is not remembered, so the next refresh retries it
        if self.bridge.push_view(view.clone()) {
            local.last_view = Some(view);
        }
    }
}

async fn run_subscription(
    shared: Arc<Shared>,
    mut rx: tokio::sync::broadcast::Receiver<crate::state::StateChange>,
) {
    tracing::debug!("{}: state subscription started", shared.screen);

    loop {
        match rx.recv().await {
            Ok(change) => {
                tracing::trace!("{}: state change received: {:?}", shared.screen, change);
                shared.refresh(|local| local.rejection = None);
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(
                    "{}: state subscription lagged - {} events were skipped",
                    shared.screen,
                    skipped
                );
                // Views are rendered from snapshots, so catching up is one render
                shared.refresh(|_| {});
            }
            Err(RecvError::Closed) => {
                tracing::info!("{}: state broadcast channel closed", shared.screen);
                break;
            }
        }
    }

    tracing::debug!("{}: state subscription terminated", shared.screen);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ScanProfile, ScanState};
    use crate::services::{FixtureCatalog, TickOutcome};
    use std::sync::mpsc as std_mpsc;
    use std::time::{Duration, Instant};

    fn manual_screen(screen: ScreenKind) -> (ScreenController, std_mpsc::Receiver<ScanView>) {
        let scanner = ScanSessionController::builder(screen, Arc::new(FixtureCatalog::with_defaults()))
            .manual_clock()
            .build();
        let (view_tx, view_rx) = std_mpsc::channel();
        let bridge = ViewBridge::new(
            move |view: ScanView| {
                let _ = view_tx.send(view);
            },
            tokio::runtime::Handle::current(),
        );
        (ScreenController::new(scanner, bridge), view_rx)
    }

    fn wait_for(
        rx: &std_mpsc::Receiver<ScanView>,
        predicate: impl Fn(&ScanView) -> bool,
    ) -> ScanView {
        loop {
            let view = rx
                .recv_timeout(Duration::from_secs(2))
                .expect("expected view was never rendered");
            if predicate(&view) {
                return view;
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_initial_view_is_idle() {
        let (_screen, views) = manual_screen(ScreenKind::FoodScanner);

        let view = wait_for(&views, |_| true);
        assert_eq!(view.state, ScanState::Idle);
        assert!(view.can_start);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_rejected_start_shows_banner() {
        let (screen, views) = manual_screen(ScreenKind::FoodScanner);

        screen.on_start_requested().unwrap();
        screen.scanner().tick().await;
        assert_eq!(screen.on_start_requested(), Err(ScanError::AlreadyScanning));

        let view = wait_for(&views, |v| v.error_banner.is_some());
        assert_eq!(view.error_banner.as_deref(), Some("A scan is already in progress"));
        assert_eq!(view.progress, 5);
        assert_eq!(view.state, ScanState::Scanning);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_completed_scan_renders_result() {
        let (screen, views) = manual_screen(ScreenKind::BarcodeScanner);

        screen.on_start_requested().unwrap();
        let outcome = screen.scanner().tick().await;
        assert!(matches!(outcome, TickOutcome::Completed(_)));

        let view = wait_for(&views, |v| v.state == ScanState::Completed);
        let card = view.result_card.expect("result card");
        assert_eq!(card.title, "Instant Noodles");
        assert_eq!(card.calories, 294);

        screen.on_dismiss_result().unwrap();
        let view = wait_for(&views, |v| v.state == ScanState::Idle);
        assert!(view.result_card.is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_portion_selection_rescales_card() {
        let (screen, views) = manual_screen(ScreenKind::PortionCalibration);

        screen.on_start_requested().unwrap();
        for _ in 0..3 {
            screen.scanner().tick().await;
        }
        wait_for(&views, |v| v.state == ScanState::Completed);

        screen.on_portion_selected(PortionSize::Small);
        let view = wait_for(&views, |v| v.portion == Some(PortionSize::Small));
        assert_eq!(view.result_card.map(|c| c.calories), Some(78));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_portion_ignored_on_other_screens() {
        let (screen, _views) = manual_screen(ScreenKind::FoodScanner);

        screen.on_portion_selected(PortionSize::ExtraLarge);
        assert_eq!(screen.current_view().portion, None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_drop_cancels_running_scan() {
        let (screen, _views) = manual_screen(ScreenKind::FoodScanner);
        let scanner = screen.scanner().clone();

        screen.on_start_requested().unwrap();
        drop(screen);

        assert_eq!(scanner.state(), ScanState::Cancelled);
    }

    #[test]
    fn test_last_frame_matches_state_while_portion_changes() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .unwrap();

        for trial in 0..20 {
            let scanner = ScanSessionController::builder(
                ScreenKind::PortionCalibration,
                Arc::new(FixtureCatalog::with_defaults()),
            )
            .profile(ScanProfile::new(Duration::from_millis(1), 1))
            .runtime(runtime.handle().clone())
            .build();
            let (view_tx, views) = std_mpsc::channel();
            let bridge = ViewBridge::new(
                move |view: ScanView| {
                    let _ = view_tx.send(view);
                },
                runtime.handle().clone(),
            );
            let screen = ScreenController::new(scanner, bridge);

            screen.on_start_requested().unwrap();
            std::thread::scope(|scope| {
                scope.spawn(|| {
                    let mut small = true;
                    while screen.scanner().is_scanning() {
                        let portion = if small { PortionSize::Small } else { PortionSize::Medium };
                        screen.on_portion_selected(portion);
                        small = !small;
                        std::thread::sleep(Duration::from_micros(200));
                    }
                });
            });

            let deadline = Instant::now() + Duration::from_secs(5);
            while screen.scanner().state() != ScanState::Completed {
                assert!(Instant::now() < deadline, "scan never completed");
                std::thread::sleep(Duration::from_millis(1));
            }
            std::thread::sleep(Duration::from_millis(50));

            let last = views.try_iter().last().expect("no frame rendered");
            assert_eq!(last.state, screen.scanner().state(), "trial {}", trial);
            assert_eq!(last.progress, screen.scanner().progress(), "trial {}", trial);
            assert!(last.result_card.is_some(), "trial {}", trial);
        }
    }
}
