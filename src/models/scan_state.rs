use crate::models::DetectionResult;
use std::fmt;

/// Progress value at which a scan is complete.
pub const PROGRESS_COMPLETE: u8 = 100;

/// Lifecycle state of a scan session.
///
/// The only legal transitions are:
///
/// ```text
/// Idle -> Scanning -> {Completed, Cancelled, Failed} -> Idle
/// ```
///
/// A terminal state may also go straight back to `Scanning` when a new scan
/// is started without dismissing the previous result first.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ScanState {
    #[default]
    Idle,
    Scanning,
    Completed,
    Cancelled,
    /// The Result Catalog could not produce a payload at 100% progress.
    Failed {
        reason: String,
    },
}

impl ScanState {
    /// True for `Completed`, `Cancelled` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ScanState::Completed | ScanState::Cancelled | ScanState::Failed { .. }
        )
    }

    /// Short lowercase name used in logs and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            ScanState::Idle => "idle",
            ScanState::Scanning => "scanning",
            ScanState::Completed => "completed",
            ScanState::Cancelled => "cancelled",
            ScanState::Failed { .. } => "failed",
        }
    }
}

impl fmt::Display for ScanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanState::Failed { reason } => write!(f, "failed ({})", reason),
            other => f.write_str(other.name()),
        }
    }
}

/// One run of the simulated detection workflow.
///
/// Fields are private so the session can only move through the state machine
/// via its transition methods. Those methods are what
/// [`StateManager`](crate::state::StateManager) closures call; each one
/// returns `false` and leaves the session untouched when the transition is
/// not legal from the current state.
///
/// # Invariants
///
/// - `progress` never decreases while `Scanning`
/// - `result` is `Some` only in `Completed`
/// - `session_id` increases by one on every [`begin`](Self::begin)
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScanSession {
    state: ScanState,
    progress: u8,
    result: Option<DetectionResult>,
    session_id: u64,
}

impl ScanSession {
    pub fn state(&self) -> &ScanState {
        &self.state
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn result(&self) -> Option<&DetectionResult> {
        self.result.as_ref()
    }

    /// Generation number of the most recently started scan (0 before the first).
    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    pub fn is_scanning(&self) -> bool {
        self.state == ScanState::Scanning
    }

    /// True when `session_id` names the scan currently in `Scanning`.
    pub fn is_active(&self, session_id: u64) -> bool {
        self.is_scanning() && self.session_id == session_id
    }

    /// Start a new scan: progress to 0, result cleared, new generation.
    pub fn begin(&mut self) -> bool {
        if self.is_scanning() {
            return false;
        }
        self.session_id += 1;
        self.state = ScanState::Scanning;
        self.progress = 0;
        self.result = None;
        true
    }

    /// Advance progress by `step`, capped at [`PROGRESS_COMPLETE`].
    ///
    /// Only applies to the scan identified by `session_id`.
    pub fn advance(&mut self, session_id: u64, step: u8) -> bool {
        if !self.is_active(session_id) {
            return false;
        }
        self.progress = self.progress.saturating_add(step).min(PROGRESS_COMPLETE);
        true
    }

    /// Attach the detection result and move to `Completed`.
    ///
    /// Requires the scan to still be active and at full progress.
    pub fn complete(&mut self, session_id: u64, result: DetectionResult) -> bool {
        if !self.is_active(session_id) || self.progress < PROGRESS_COMPLETE {
            return false;
        }
        self.state = ScanState::Completed;
        self.result = Some(result);
        true
    }

    /// Move an active scan to `Failed` with the given reason.
    pub fn fail(&mut self, session_id: u64, reason: impl Into<String>) -> bool {
        if !self.is_active(session_id) {
            return false;
        }
        self.state = ScanState::Failed {
            reason: reason.into(),
        };
        self.result = None;
        true
    }

    /// Stop the running scan and discard its progress.
    pub fn cancel(&mut self) -> bool {
        if !self.is_scanning() {
            return false;
        }
        self.state = ScanState::Cancelled;
        self.progress = 0;
        self.result = None;
        true
    }

    /// Return a terminal session to `Idle`.
    ///
    /// `Idle` stays `Idle`. Rejected while scanning.
    pub fn reset(&mut self) -> bool {
        match self.state {
            ScanState::Scanning => false,
            ScanState::Idle => true,
            _ => {
                self.state = ScanState::Idle;
                self.progress = 0;
                self.result = None;
                true
            }
        }
    }
}
