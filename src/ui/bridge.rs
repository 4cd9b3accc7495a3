// ViewBridge - Hands rendered ScanViews from tokio tasks to the presentation thread
//
// The scan clock and state subscription live on the tokio runtime. Whatever
// draws the screen (a terminal printer, a test probe, a native view) runs on
// its own thread and must never block the clock. The bridge sits between
// the two:
// - Views are queued on a bounded channel and drawn in order
// - A full queue drops the frame with a warning instead of applying backpressure
// - The runtime handle travels with the bridge so screens can run their
//   state subscription on it

use crate::metrics::Metrics;
use crate::ui::view::ScanView;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Frames queued before new ones are dropped
pub const VIEW_CHANNEL_CAPACITY: usize = 100;

/// Coordinates between the tokio runtime and the thread that draws views
///
/// Cloning yields another handle on the same channel and renderer thread.
/// The renderer thread ends once every handle is dropped.
///
/// # Example
/// ```ignore
/// let runtime = tokio::runtime::Runtime::new()?;
/// let bridge = ViewBridge::new(
///     |view: ScanView| println!("{}: {}", view.title, view.status_text),
///     runtime.handle().clone(),
/// );
///
/// bridge.push_view(view);
/// ```
#[derive(Clone)]
pub struct ViewBridge {
    tokio_handle: tokio::runtime::Handle,

    /// Bounded so a stalled renderer cannot grow memory without limit
    view_tx: mpsc::Sender<ScanView>,

    metrics: Option<Arc<Metrics>>,
}

impl ViewBridge {
    /// Create a bridge and start the renderer thread.
    ///
    /// # Arguments
    /// * `renderer` - Called once per view, in order, on a dedicated thread
    /// * `tokio_handle` - Runtime the screen's state subscription runs on
    pub fn new<R>(renderer: R, tokio_handle: tokio::runtime::Handle) -> Self
    where
        R: FnMut(ScanView) + Send + 'static,
    {
        Self::build(renderer, tokio_handle, None)
    }

    /// Same as [`new`](Self::new), counting delivered and dropped frames
    pub fn with_metrics<R>(
        renderer: R,
        tokio_handle: tokio::runtime::Handle,
        metrics: Arc<Metrics>,
    ) -> Self
    where
        R: FnMut(ScanView) + Send + 'static,
    {
        Self::build(renderer, tokio_handle, Some(metrics))
    }

    fn build<R>(
        mut renderer: R,
        tokio_handle: tokio::runtime::Handle,
        metrics: Option<Arc<Metrics>>,
    ) -> Self
    where
        R: FnMut(ScanView) + Send + 'static,
    {
        let (view_tx, mut view_rx) = mpsc::channel::<ScanView>(VIEW_CHANNEL_CAPACITY);

        std::thread::spawn(move || {
            tracing::debug!("ViewBridge renderer thread started");

            while let Some(view) = view_rx.blocking_recv() {
                renderer(view);
            }

            tracing::debug!("ViewBridge renderer thread terminated");
        });

        Self {
            tokio_handle,
            view_tx,
            metrics,
        }
    }

    /// Queue a view for drawing from any thread.
    ///
    /// Never blocks. Drops the view if the renderer has fallen
    /// [`VIEW_CHANNEL_CAPACITY`] frames behind. Returns whether the view
    /// was queued.
    pub fn push_view(&self, view: ScanView) -> bool {
        match self.view_tx.try_send(view) {
            Ok(_) => {
                if let Some(metrics) = &self.metrics {
                    metrics.record_view_update();
                }
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                if let Some(metrics) = &self.metrics {
                    metrics.record_view_channel_full();
                }
                tracing::warn!("View channel full - skipping frame to prevent backpressure");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::warn!("Failed to send view - renderer thread has stopped");
                false
            }
        }
    }

    pub fn tokio_handle(&self) -> &tokio::runtime::Handle {
        &self.tokio_handle
    }
}
