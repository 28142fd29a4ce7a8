//! Command-line options shared by the camera programs.

use clap::Args;

use crate::hand::HandOptions;

/// Hand detector thresholds.
#[derive(Debug, Clone, Copy, Args)]
pub struct DetectorArgs {
    /// Minimum palm detection confidence for a hand to be picked up
    #[arg(
        long = "min_detection_confidence",
        alias = "min-detection-confidence",
        default_value_t = 0.7,
        value_parser = parse_confidence
    )]
    pub min_detection_confidence: f32,

    /// Minimum landmark presence score for a hand to stay tracked
    #[arg(
        long = "min_tracking_confidence",
        alias = "min-tracking-confidence",
        default_value_t = 0.5,
        value_parser = parse_confidence
    )]
    pub min_tracking_confidence: f32,
}

impl DetectorArgs {
    /// Builds hand tracker options for tracking up to `max_hands` hands.
    pub fn hand_options(&self, max_hands: usize) -> HandOptions {
        HandOptions {
            max_hands,
            min_detection_confidence: self.min_detection_confidence,
            min_tracking_confidence: self.min_tracking_confidence,
        }
    }
}

fn parse_confidence(s: &str) -> Result<f32, String> {
    let value: f32 = s.parse().map_err(|e| format!("{e}"))?;
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("{value} is not in the range 0.0 to 1.0"))
    }
}
