use crate::models::{CatalogConfig, DetectionResult, FixtureEntry, Macronutrients, ScreenKind, WeightSpec};
use async_trait::async_trait;
use indexmap::IndexMap;
use regex::Regex;
use thiserror::Error;

/// What the catalog is told about the scan it is answering for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanContext {
    pub session_id: u64,
    pub screen: ScreenKind,
}

/// Errors a Result Catalog can report
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("No fixture configured for screen {0}")]
    NoFixture(ScreenKind),

    #[error("Fixture for {screen} has an unreadable weight: {weight:?}")]
    InvalidWeight { screen: ScreenKind, weight: String },

    #[error("Result catalog unavailable: {0}")]
    Unavailable(String),
}

/// Supplies the detection payload once a scan reaches 100%.
///
/// Implementations may be static fixtures, an on-device model, or a
/// request/response lookup. The controller calls this once per completed
/// scan and never retries on error.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ResultCatalog: Send + Sync {
    async fn fetch_result(&self, context: &ScanContext) -> Result<DetectionResult, CatalogError>;
}

/// Read-only catalog serving one configured payload per screen.
///
/// Fixture weights are parsed once at construction, so a bad
/// `Result Catalog.yaml` is reported when the catalog is built rather than
/// at the end of a scan.
#[derive(Debug, Clone)]
pub struct FixtureCatalog {
    results: IndexMap<ScreenKind, DetectionResult>,
}

impl FixtureCatalog {
    /// Build the catalog from fixture configuration.
    pub fn from_config(config: &CatalogConfig) -> Result<Self, CatalogError> {
        // Matches "120g", "120 g", "1 pack (75g)", "200 grams"
        let grams_pattern = Regex::new(r"(\d+)\s*(?:g|grams?)\b").expect("Invalid weight regex");

        let mut results = IndexMap::new();
        for (screen, entry) in &config.fixtures {
            let grams = parse_weight(&grams_pattern, *screen, &entry.weight)?;
            results.insert(*screen, to_detection_result(entry, grams));
        }

        tracing::debug!("Fixture catalog built with {} entries", results.len());
        Ok(Self { results })
    }

    /// Catalog with the sample payloads of the original screens.
    pub fn with_defaults() -> Self {
        Self::from_config(&CatalogConfig::default())
            .expect("default catalog fixtures must parse")
    }

    pub fn get(&self, screen: ScreenKind) -> Option<&DetectionResult> {
        self.results.get(&screen)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

#[async_trait]
impl ResultCatalog for FixtureCatalog {
    async fn fetch_result(&self, context: &ScanContext) -> Result<DetectionResult, CatalogError> {
        self.get(context.screen)
            .cloned()
            .ok_or(CatalogError::NoFixture(context.screen))
    }
}

fn parse_weight(pattern: &Regex, screen: ScreenKind, weight: &WeightSpec) -> Result<u32, CatalogError> {
    match weight {
        WeightSpec::Grams(grams) => Ok(*grams),
        WeightSpec::Text(text) => pattern
            .captures(text)
            .and_then(|caps| caps.get(1))
            .and_then(|grams| grams.as_str().parse().ok())
            .ok_or_else(|| CatalogError::InvalidWeight {
                screen,
                weight: text.clone(),
            }),
    }
}

fn to_detection_result(entry: &FixtureEntry, grams: u32) -> DetectionResult {
    DetectionResult {
        label: entry.label.clone(),
        confidence_score: entry.confidence.min(100),
        estimated_calories: entry.calories,
        estimated_weight_grams: grams,
        macronutrients: Macronutrients {
            carbs_grams: entry.carbs,
            protein_grams: entry.protein,
            fat_grams: entry.fat,
            fiber_grams: entry.fiber,
        },
        health_score: entry.health_score.map(|score| score.min(100)),
    }
}
