//! Services module - the scan engine proper.
//!
//! Nothing in here knows about screens beyond a [`ScreenKind`](crate::models::ScreenKind)
//! tag, so the same controller backs the camera scan, barcode scan and
//! portion calibration screens.
//!
//! # Components
//!
//! - [`ScanSessionController`]: owns the scan state machine and its progress
//!   clock. Handles:
//!   - Starting scans and rejecting overlapping ones ([`ScanError::AlreadyScanning`])
//!   - Ticking progress at the profile's cadence on a tokio task
//!   - Cancelling at any tick boundary, including mid catalog lookup
//!   - Turning catalog failures into the terminal `Failed` state
//!
//! - [`ResultCatalog`]: the collaborator that supplies a [`DetectionResult`](crate::models::DetectionResult)
//!   at 100% progress. [`FixtureCatalog`] serves the configured sample payloads.
//!
//! # Usage Example
//!
//! ```ignore
//! use calariescan::models::ScreenKind;
//! use calariescan::services::{FixtureCatalog, ScanSessionController};
//! use std::sync::Arc;
//!
//! let controller = ScanSessionController::builder(
//!     ScreenKind::FoodScanner,
//!     Arc::new(FixtureCatalog::with_defaults()),
//! )
//! .build();
//!
//! let mut events = controller.subscribe();
//! controller.start()?;
//! // ... StateChange::ProgressUpdated x20, then StateChange::ScanCompleted
//! ```

pub mod catalog;
pub mod scanner;

pub use catalog::{CatalogError, FixtureCatalog, ResultCatalog, ScanContext};
pub use scanner::{ClockMode, ScanError, ScanSessionController, ScanSessionControllerBuilder, TickOutcome};
