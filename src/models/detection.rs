use serde::{Deserialize, Serialize};
use std::fmt;

/// Macronutrient breakdown of a detected item, in grams.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Macronutrients {
    pub carbs_grams: u32,
    pub protein_grams: u32,
    pub fat_grams: u32,
    pub fiber_grams: u32,
}

/// Simulated nutritional analysis produced when a scan completes.
///
/// Immutable once produced. Values describe a medium serving; use
/// [`scaled_to`](Self::scaled_to) for other portion sizes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub label: String,
    pub confidence_score: u8,
    pub estimated_calories: u32,
    pub estimated_weight_grams: u32,
    pub macronutrients: Macronutrients,
    /// 0-100 product health score (barcode scans only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_score: Option<u8>,
}

impl DetectionResult {
    /// Rating derived from the health score, if any.
    pub fn health_rating(&self) -> Option<HealthRating> {
        self.health_score.map(HealthRating::from_score)
    }

    /// Rescale calories, weight and macros from a medium serving to `portion`.
    pub fn scaled_to(&self, portion: PortionSize) -> DetectionResult {
        let factor = portion.multiplier();
        let scale = |value: u32| (f64::from(value) * factor).round() as u32;

        DetectionResult {
            label: self.label.clone(),
            confidence_score: self.confidence_score,
            estimated_calories: scale(self.estimated_calories),
            estimated_weight_grams: scale(self.estimated_weight_grams),
            macronutrients: Macronutrients {
                carbs_grams: scale(self.macronutrients.carbs_grams),
                protein_grams: scale(self.macronutrients.protein_grams),
                fat_grams: scale(self.macronutrients.fat_grams),
                fiber_grams: scale(self.macronutrients.fiber_grams),
            },
            health_score: self.health_score,
        }
    }

    /// One-line summary, e.g. `"Apple: 95 kcal, 180g (88% match)"`.
    pub fn summary(&self) -> String {
        format!(
            "{}: {} kcal, {}g ({}% match)",
            self.label, self.estimated_calories, self.estimated_weight_grams, self.confidence_score
        )
    }
}

/// Bucketed product health score shown next to barcode scan results.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HealthRating {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl HealthRating {
    pub fn from_score(score: u8) -> Self {
        match score {
            80.. => HealthRating::Excellent,
            60..=79 => HealthRating::Good,
            40..=59 => HealthRating::Fair,
            _ => HealthRating::Poor,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            HealthRating::Excellent => "Excellent",
            HealthRating::Good => "Good",
            HealthRating::Fair => "Fair",
            HealthRating::Poor => "Poor",
        }
    }
}

impl fmt::Display for HealthRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Serving size picked on the portion estimator screen.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortionSize {
    Small,
    #[default]
    Medium,
    Large,
    ExtraLarge,
}

impl PortionSize {
    pub const ALL: [PortionSize; 4] = [
        PortionSize::Small,
        PortionSize::Medium,
        PortionSize::Large,
        PortionSize::ExtraLarge,
    ];

    /// Factor relative to a medium serving.
    pub fn multiplier(&self) -> f64 {
        match self {
            PortionSize::Small => 0.5,
            PortionSize::Medium => 1.0,
            PortionSize::Large => 1.5,
            PortionSize::ExtraLarge => 2.0,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PortionSize::Small => "Small",
            PortionSize::Medium => "Medium",
            PortionSize::Large => "Large",
            PortionSize::ExtraLarge => "Extra Large",
        }
    }

    pub fn serving_type(&self) -> &'static str {
        match self {
            PortionSize::Small => "1 piece",
            PortionSize::Medium => "2 pieces",
            PortionSize::Large => "3 pieces",
            PortionSize::ExtraLarge => "4 pieces",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idli() -> DetectionResult {
        DetectionResult {
            label: "South Indian Idli (2 pieces)".to_string(),
            confidence_score: 94,
            estimated_calories: 156,
            estimated_weight_grams: 120,
            macronutrients: Macronutrients {
                carbs_grams: 32,
                protein_grams: 4,
                fat_grams: 1,
                fiber_grams: 2,
            },
            health_score: None,
        }
    }

    #[test]
    fn test_portion_table_matches_estimator() {
        let expected = [(78, 60), (156, 120), (234, 180), (312, 240)];

        for (portion, (calories, weight)) in PortionSize::ALL.iter().zip(expected) {
            let scaled = idli().scaled_to(*portion);
            assert_eq!(scaled.estimated_calories, calories, "{}", portion.label());
            assert_eq!(scaled.estimated_weight_grams, weight, "{}", portion.label());
        }
    }

    #[test]
    fn test_scaling_keeps_label_and_confidence() {
        let scaled = idli().scaled_to(PortionSize::Large);
        assert_eq!(scaled.label, "South Indian Idli (2 pieces)");
        assert_eq!(scaled.confidence_score, 94);
        assert_eq!(scaled.macronutrients.carbs_grams, 48);
        assert_eq!(scaled.macronutrients.protein_grams, 6);
    }

    #[test]
    fn test_health_rating_buckets() {
        assert_eq!(HealthRating::from_score(95), HealthRating::Excellent);
        assert_eq!(HealthRating::from_score(80), HealthRating::Excellent);
        assert_eq!(HealthRating::from_score(72), HealthRating::Good);
        assert_eq!(HealthRating::from_score(40), HealthRating::Fair);
        assert_eq!(HealthRating::from_score(35), HealthRating::Poor);
        assert_eq!(HealthRating::from_score(35).to_string(), "Poor");
    }

    #[test]
    fn test_summary() {
        assert_eq!(
            idli().summary(),
            "South Indian Idli (2 pieces): 156 kcal, 120g (94% match)"
        );
    }
}
