// Screen view model
//
// Everything a scanner screen needs to draw one frame, derived from a
// ScanSession snapshot. Pure data: no channels, no locks.

use crate::models::{DetectionResult, PortionSize, ScanSession, ScanState, ScreenKind};

/// Calibration runs in three visible steps
pub const CALIBRATION_STEPS: u8 = 3;

/// Rendered state of one scanner screen
#[derive(Clone, Debug, PartialEq)]
pub struct ScanView {
    pub screen: ScreenKind,
    pub title: &'static str,
    pub state: ScanState,
    pub progress: u8,

    /// Instruction line under the viewfinder
    pub status_text: String,

    /// Overlay shown while scanning, e.g. "Analyzing... 45%"
    pub progress_label: Option<String>,

    pub result_card: Option<ResultCard>,

    /// Selected serving on the portion screen; the result card is scaled to it
    pub portion: Option<PortionSize>,

    /// Set when the last command was rejected or the scan failed
    pub error_banner: Option<String>,

    /// The scan trigger is disabled while scanning
    pub can_start: bool,
    pub can_cancel: bool,
    pub can_dismiss: bool,
}

/// Result panel contents
#[derive(Clone, Debug, PartialEq)]
pub struct ResultCard {
    pub title: String,
    pub match_label: String,
    pub calories: u32,
    pub weight_label: String,
    pub carbs_label: String,
    pub protein_label: String,
    pub fat_label: String,
    pub fiber_label: String,
    /// e.g. "Poor (35/100)" for barcode scans
    pub health_label: Option<String>,
}

impl ResultCard {
    pub fn from_result(result: &DetectionResult) -> Self {
        let macros = &result.macronutrients;
        Self {
            title: result.label.clone(),
            match_label: format!("{}% match", result.confidence_score),
            calories: result.estimated_calories,
            weight_label: format!("{}g", result.estimated_weight_grams),
            carbs_label: format!("{}g", macros.carbs_grams),
            protein_label: format!("{}g", macros.protein_grams),
            fat_label: format!("{}g", macros.fat_grams),
            fiber_label: format!("{}g", macros.fiber_grams),
            health_label: result
                .health_score
                .zip(result.health_rating())
                .map(|(score, rating)| format!("{} ({}/100)", rating, score)),
        }
    }
}

impl ScanView {
    /// Build the view for `session` on `screen`.
    ///
    /// `rejection` is the message from a command the controller refused
    /// (for example starting while already scanning); a failed scan's
    /// reason is used when there is none.
    pub fn render(screen: ScreenKind, session: &ScanSession, rejection: Option<String>) -> Self {
        let state = session.state().clone();
        let progress = session.progress();

        let error_banner = rejection.or_else(|| match &state {
            ScanState::Failed { reason } => Some(reason.clone()),
            _ => None,
        });

        let overlay = session
            .is_scanning()
            .then(|| progress_label(screen, progress));

        Self {
            screen,
            title: screen.title(),
            status_text: status_text(screen, &state, progress).to_string(),
            progress_label: overlay,
            result_card: session.result().map(ResultCard::from_result),
            portion: None,
            error_banner,
            can_start: !session.is_scanning(),
            can_cancel: session.is_scanning(),
            can_dismiss: state.is_terminal(),
            state,
            progress,
        }
    }

    /// Rescale the result card to `portion`
    pub fn with_portion(mut self, portion: PortionSize, result: Option<&DetectionResult>) -> Self {
        self.portion = Some(portion);
        self.result_card = result.map(|r| ResultCard::from_result(&r.scaled_to(portion)));
        self
    }
}

/// 1-based calibration step for a progress value
pub fn calibration_step(progress: u8) -> u8 {
    (progress / 34 + 1).min(CALIBRATION_STEPS)
}

fn progress_label(screen: ScreenKind, progress: u8) -> String {
    match screen {
        ScreenKind::FoodScanner => format!("Analyzing... {}%", progress),
        ScreenKind::BarcodeScanner => "Scanning product...".to_string(),
        ScreenKind::PortionCalibration => {
            format!(
                "Calibration step {} of {}",
                calibration_step(progress),
                CALIBRATION_STEPS
            )
        }
    }
}

fn status_text(screen: ScreenKind, state: &ScanState, progress: u8) -> &'static str {
    match (screen, state) {
        (ScreenKind::FoodScanner, ScanState::Idle) => "Position food within the frame and tap scan",
        (ScreenKind::FoodScanner, ScanState::Scanning) => "Keep device steady while scanning...",
        (ScreenKind::FoodScanner, ScanState::Completed) => "Food detected! Tap to add to your log",

        (ScreenKind::BarcodeScanner, ScanState::Idle) => "Aim camera at product barcode or label",
        (ScreenKind::BarcodeScanner, ScanState::Scanning) => "Scanning product...",
        (ScreenKind::BarcodeScanner, ScanState::Completed) => "Product found",

        (ScreenKind::PortionCalibration, ScanState::Idle) => "Tap calibrate to measure your portion",
        (ScreenKind::PortionCalibration, ScanState::Scanning) => match calibration_step(progress) {
            1 => "Place reference object",
            2 => "Measuring dimensions",
            _ => "Calibrating complete",
        },
        (ScreenKind::PortionCalibration, ScanState::Completed) => "Portion calibrated",

        (_, ScanState::Cancelled) => "Scan cancelled. Tap scan to try again",
        (_, ScanState::Failed { .. }) => "Nothing detected. Tap scan to try again",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Macronutrients;
    use crate::services::FixtureCatalog;

    fn noodles() -> DetectionResult {
        DetectionResult {
            label: "Instant Noodles".to_string(),
            confidence_score: 100,
            estimated_calories: 294,
            estimated_weight_grams: 75,
            macronutrients: Macronutrients {
                carbs_grams: 45,
                protein_grams: 8,
                fat_grams: 12,
                fiber_grams: 2,
            },
            health_score: Some(35),
        }
    }

    #[test]
    fn test_idle_food_scanner_view() {
        let view = ScanView::render(ScreenKind::FoodScanner, &ScanSession::default(), None);

        assert_eq!(view.title, "AR Food Scanner");
        assert_eq!(view.status_text, "Position food within the frame and tap scan");
        assert!(view.progress_label.is_none());
        assert!(view.can_start);
        assert!(!view.can_cancel);
        assert!(!view.can_dismiss);
    }

    #[test]
    fn test_scanning_view_disables_trigger() {
        let mut session = ScanSession::default();
        session.begin();
        session.advance(1, 45);

        let view = ScanView::render(ScreenKind::FoodScanner, &session, None);

        assert_eq!(view.progress_label.as_deref(), Some("Analyzing... 45%"));
        assert_eq!(view.status_text, "Keep device steady while scanning...");
        assert!(!view.can_start);
        assert!(view.can_cancel);
    }

    #[test]
    fn test_calibration_steps_follow_progress() {
        assert_eq!(calibration_step(0), 1);
        assert_eq!(calibration_step(34), 2);
        assert_eq!(calibration_step(68), 3);
        assert_eq!(calibration_step(100), 3);

        let mut session = ScanSession::default();
        session.begin();
        session.advance(1, 34);
        let view = ScanView::render(ScreenKind::PortionCalibration, &session, None);

        assert_eq!(view.progress_label.as_deref(), Some("Calibration step 2 of 3"));
        assert_eq!(view.status_text, "Measuring dimensions");
    }

    #[test]
    fn test_completed_barcode_view_has_health_label() {
        let mut session = ScanSession::default();
        session.begin();
        session.advance(1, 100);
        session.complete(1, noodles());

        let view = ScanView::render(ScreenKind::BarcodeScanner, &session, None);
        let card = view.result_card.expect("result card");

        assert_eq!(card.title, "Instant Noodles");
        assert_eq!(card.weight_label, "75g");
        assert_eq!(card.health_label.as_deref(), Some("Poor (35/100)"));
        assert!(view.can_start);
        assert!(view.can_dismiss);
    }

    #[test]
    fn test_portion_scales_result_card() {
        let idli = FixtureCatalog::with_defaults()
            .get(ScreenKind::PortionCalibration)
            .cloned()
            .expect("portion fixture");

        let mut session = ScanSession::default();
        session.begin();
        session.advance(1, 100);
        session.complete(1, idli.clone());

        let view = ScanView::render(ScreenKind::PortionCalibration, &session, None)
            .with_portion(PortionSize::Large, session.result());
        let card = view.result_card.expect("result card");

        assert_eq!(view.portion, Some(PortionSize::Large));
        assert_eq!(card.calories, 234);
        assert_eq!(card.weight_label, "180g");
    }

    #[test]
    fn test_failed_view_shows_reason() {
        let mut session = ScanSession::default();
        session.begin();
        session.fail(1, "Detection failed: offline");

        let view = ScanView::render(ScreenKind::FoodScanner, &session, None);

        assert_eq!(view.error_banner.as_deref(), Some("Detection failed: offline"));
        assert!(view.result_card.is_none());
    }

    #[test]
    fn test_rejection_overrides_banner() {
        let mut session = ScanSession::default();
        session.begin();

        let view = ScanView::render(
            ScreenKind::FoodScanner,
            &session,
            Some("A scan is already in progress".to_string()),
        );

        assert_eq!(view.error_banner.as_deref(), Some("A scan is already in progress"));
    }
}
