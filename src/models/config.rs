use crate::models::{ScanProfile, ScreenKind};
use anyhow::{Result, bail};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Scanner settings from `Scanner Settings.yaml`
///
/// Every field may also be overridden from the environment, see
/// [`ConfigManager::load_settings`](crate::config::ConfigManager::load_settings).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScannerSettings {
    #[serde(default)]
    pub debug_mode: bool,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default)]
    pub screens: ScreenProfiles,
}

impl Default for ScannerSettings {
    fn default() -> Self {
        Self {
            debug_mode: false,
            log_dir: default_log_dir(),
            screens: ScreenProfiles::default(),
        }
    }
}

impl ScannerSettings {
    /// Reject profiles the progress clock cannot run.
    pub fn validate(&self) -> Result<()> {
        for screen in ScreenKind::ALL {
            let profile = self.screens.get(screen);
            if profile.tick_interval_ms == 0 {
                bail!("{}: tick_interval_ms must be greater than 0", screen);
            }
            if profile.progress_step == 0 || profile.progress_step > 100 {
                bail!(
                    "{}: progress_step must be between 1 and 100, got {}",
                    screen,
                    profile.progress_step
                );
            }
        }
        Ok(())
    }

    /// Clock profile for a screen.
    pub fn profile_for(&self, screen: ScreenKind) -> ScanProfile {
        self.screens.get(screen).to_profile()
    }
}

/// Per-screen clock settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenProfiles {
    #[serde(default = "ProfileSettings::food_scanner")]
    pub food_scanner: ProfileSettings,

    #[serde(default = "ProfileSettings::barcode_scanner")]
    pub barcode_scanner: ProfileSettings,

    #[serde(default = "ProfileSettings::portion_calibration")]
    pub portion_calibration: ProfileSettings,
}

impl ScreenProfiles {
    pub fn get(&self, screen: ScreenKind) -> &ProfileSettings {
        match screen {
            ScreenKind::FoodScanner => &self.food_scanner,
            ScreenKind::BarcodeScanner => &self.barcode_scanner,
            ScreenKind::PortionCalibration => &self.portion_calibration,
        }
    }
}

impl Default for ScreenProfiles {
    fn default() -> Self {
        Self {
            food_scanner: ProfileSettings::food_scanner(),
            barcode_scanner: ProfileSettings::barcode_scanner(),
            portion_calibration: ProfileSettings::portion_calibration(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileSettings {
    pub tick_interval_ms: u64,
    pub progress_step: u8,
}

impl ProfileSettings {
    fn from_profile(profile: ScanProfile) -> Self {
        Self {
            tick_interval_ms: profile.tick_interval().as_millis() as u64,
            progress_step: profile.progress_step(),
        }
    }

    fn food_scanner() -> Self {
        Self::from_profile(ScreenKind::FoodScanner.default_profile())
    }

    fn barcode_scanner() -> Self {
        Self::from_profile(ScreenKind::BarcodeScanner.default_profile())
    }

    fn portion_calibration() -> Self {
        Self::from_profile(ScreenKind::PortionCalibration.default_profile())
    }

    pub fn to_profile(&self) -> ScanProfile {
        ScanProfile::new(
            Duration::from_millis(self.tick_interval_ms),
            self.progress_step,
        )
    }
}

fn default_log_dir() -> String {
    "logs".to_string()
}

/// Fixture payloads from `Result Catalog.yaml`
///
/// Keyed by screen, in file order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(default)]
    pub fixtures: IndexMap<ScreenKind, FixtureEntry>,
}

/// One simulated detection payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureEntry {
    pub label: String,

    #[serde(default = "default_confidence")]
    pub confidence: u8,

    pub calories: u32,

    /// Grams, either as a number or as text such as `"120g"` or `"1 pack (75g)"`
    pub weight: WeightSpec,

    #[serde(default)]
    pub carbs: u32,

    #[serde(default)]
    pub protein: u32,

    #[serde(default)]
    pub fat: u32,

    #[serde(default)]
    pub fiber: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_score: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WeightSpec {
    Grams(u32),
    Text(String),
}

fn default_confidence() -> u8 {
    100
}

impl Default for CatalogConfig {
    fn default() -> Self {
        let idli = FixtureEntry {
            label: "South Indian Idli (2 pieces)".to_string(),
            confidence: 94,
            calories: 156,
            weight: WeightSpec::Text("120g".to_string()),
            carbs: 32,
            protein: 4,
            fat: 1,
            fiber: 2,
            health_score: None,
        };

        let noodles = FixtureEntry {
            label: "Instant Noodles".to_string(),
            confidence: 100,
            calories: 294,
            weight: WeightSpec::Text("1 pack (75g)".to_string()),
            carbs: 45,
            protein: 8,
            fat: 12,
            fiber: 2,
            health_score: Some(35),
        };

        let mut fixtures = IndexMap::new();
        fixtures.insert(ScreenKind::FoodScanner, idli.clone());
        fixtures.insert(ScreenKind::BarcodeScanner, noodles);
        fixtures.insert(ScreenKind::PortionCalibration, idli);

        Self { fixtures }
    }
}
