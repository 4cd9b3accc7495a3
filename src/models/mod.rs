//! Data models for the scan engine.
//!
//! - [`ScanSession`] / [`ScanState`]: the scan state machine and its observable fields
//! - [`DetectionResult`]: simulated nutrition payload attached on completion
//! - [`ScreenKind`] / [`ScanProfile`]: which screen a controller serves and how fast its clock runs
//! - [`ScannerSettings`] / [`CatalogConfig`]: YAML-backed configuration
//!
//! Sessions are held by [`StateManager`](crate::state::StateManager) and only
//! change through its `update()` method.

pub mod config;
pub mod detection;
pub mod scan_state;
pub mod screen;

pub use config::{CatalogConfig, FixtureEntry, ProfileSettings, ScannerSettings, ScreenProfiles, WeightSpec};
pub use detection::{DetectionResult, HealthRating, Macronutrients, PortionSize};
pub use scan_state::{PROGRESS_COMPLETE, ScanSession, ScanState};
pub use screen::{ScanProfile, ScreenKind};
