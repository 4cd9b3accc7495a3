// calARieScan - Simulated scan-and-detect engine for a nutrition tracker
//
// This is the library crate containing the scan state machine, its result
// catalog and the presentation adapter used by the scanner screens.
// The binary crate (main.rs) drives a scan headlessly from the terminal.

pub mod config;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod services;
pub mod state;
pub mod ui;

// Re-export commonly used types for convenience
pub use config::ConfigManager;
pub use metrics::Metrics;
pub use models::{DetectionResult, ScanSession, ScanState, ScannerSettings, ScreenKind};
pub use services::{FixtureCatalog, ResultCatalog, ScanError, ScanSessionController};
pub use state::{StateChange, StateManager};
pub use ui::{ScanView, ScreenController, ViewBridge};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");

/// Default data directory holding the settings and catalog files
pub const DATA_DIR: &str = "calARieScan Data";
