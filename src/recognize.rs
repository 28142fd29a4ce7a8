//! Live gesture recognition.

use std::path::Path;

use anyhow::Context;

use crate::{
    gui::Preview,
    hand::HandDetector,
    image::{draw, Image},
    landmark::HandLandmarks,
    model::GestureModel,
    timer::FpsCounter,
    video::FrameSource,
};

/// Label shown while no hand is visible.
pub const NO_HAND_LABEL: &str = "...";

/// Title of the recognizer's preview window.
pub const WINDOW_TITLE: &str = "Gesture-to-Text - press q to quit";

pub struct Recognizer {
    model: GestureModel,
}

impl Recognizer {
    pub fn new(model: GestureModel) -> Self {
        Self { model }
    }

    /// Loads the model stored at `path`.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let model = GestureModel::load(path)
            .with_context(|| format!("failed to load model from '{}'", path.display()))?;
        log::info!(
            "loaded model for '{}' ({} trees, classes: {})",
            model.label(),
            model.forest().trees().len(),
            model.forest().classes().join(", "),
        );
        Ok(Self::new(model))
    }

    pub fn model(&self) -> &GestureModel {
        &self.model
    }

    /// Returns the label to display for the hands detected in one frame.
    ///
    /// With several hands, the last one wins.
    pub fn label_for(&self, hands: &[HandLandmarks]) -> String {
        match hands.last() {
            Some(hand) => self.model.predict_hand(hand).to_string(),
            None => NO_HAND_LABEL.to_string(),
        }
    }

    /// Draws `hands` and the recognized label onto `image`, and returns the label.
    pub fn annotate(&self, image: &mut Image, hands: &[HandLandmarks]) -> String {
        for hand in hands {
            hand.draw(image);
        }
        let label = self.label_for(hands);

        let text = format!("Recognized: {label}");
        draw::text(image, 10.0, 30.0, &text)
            .align_left()
            .align_bottom();
        label
    }
}

/// Runs the recognition loop until the user quits or the frame source fails.
pub fn run(
    source: &mut impl FrameSource,
    detector: &mut impl HandDetector,
    preview: &mut impl Preview,
    recognizer: &Recognizer,
) -> anyhow::Result<()> {
    let mut fps = FpsCounter::new("recognize");
    loop {
        let mut image = match source.read() {
            Ok(image) => image,
            Err(e) => {
                log::warn!("camera read failed, stopping: {e:#}");
                break;
            }
        };

        let hands = detector.detect(&image)?;
        let label = recognizer.annotate(&mut image, &hands);
        log::trace!("recognized '{label}'");

        preview.show(&image)?;
        fps.tick_with(detector.timers());

        if preview.quit_requested() {
            break;
        }
    }
    Ok(())
}
