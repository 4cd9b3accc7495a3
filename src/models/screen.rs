use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Scanner-style screens that each own one scan controller.
///
/// Command-line values use the same snake_case keys as the config files.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ScreenKind {
    /// Camera AR food scan
    #[value(name = "food_scanner")]
    FoodScanner,
    /// Grocery barcode scan
    #[value(name = "barcode_scanner")]
    BarcodeScanner,
    /// AR portion calibration on the portion estimator
    #[value(name = "portion_calibration")]
    PortionCalibration,
}

impl ScreenKind {
    pub const ALL: [ScreenKind; 3] = [
        ScreenKind::FoodScanner,
        ScreenKind::BarcodeScanner,
        ScreenKind::PortionCalibration,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            ScreenKind::FoodScanner => "food_scanner",
            ScreenKind::BarcodeScanner => "barcode_scanner",
            ScreenKind::PortionCalibration => "portion_calibration",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            ScreenKind::FoodScanner => "AR Food Scanner",
            ScreenKind::BarcodeScanner => "AR Grocery Scanner",
            ScreenKind::PortionCalibration => "AR Portion Estimator",
        }
    }

    /// Cadence the original screen animated its progress at.
    pub fn default_profile(&self) -> ScanProfile {
        match self {
            ScreenKind::FoodScanner => ScanProfile::new(Duration::from_millis(100), 5),
            ScreenKind::BarcodeScanner => ScanProfile::new(Duration::from_millis(2000), 100),
            ScreenKind::PortionCalibration => ScanProfile::new(Duration::from_millis(1500), 34),
        }
    }
}

impl fmt::Display for ScreenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Cadence of the progress clock.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScanProfile {
    tick_interval: Duration,
    progress_step: u8,
}

impl ScanProfile {
    /// Step is clamped to `1..=100` and the interval to at least 1ms.
    pub fn new(tick_interval: Duration, progress_step: u8) -> Self {
        Self {
            tick_interval: tick_interval.max(Duration::from_millis(1)),
            progress_step: progress_step.clamp(1, 100),
        }
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    pub fn progress_step(&self) -> u8 {
        self.progress_step
    }

    /// `ceil(100 / step)`
    pub fn ticks_to_complete(&self) -> u32 {
        100u32.div_ceil(u32::from(self.progress_step))
    }

    /// Nominal wall-clock length of a full scan.
    pub fn expected_duration(&self) -> Duration {
        self.tick_interval * self.ticks_to_complete()
    }
}

impl Default for ScanProfile {
    fn default() -> Self {
        ScreenKind::FoodScanner.default_profile()
    }
}
