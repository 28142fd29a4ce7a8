//! Hand detection and landmark tracking.
//!
//! [`HandTracker`] is a two-stage pipeline: a palm detector finds hands in the full frame, then a
//! landmark network estimates 21 landmarks inside a rotated region of interest (RoI) around each
//! hand. Once a hand's landmarks are known, the RoI for the next frame is derived from them, so the
//! expensive palm detection only runs while fewer than the requested number of hands are tracked.

pub mod detection;
pub mod landmark;

use nalgebra::{Rotation2, Vector2};

use crate::{
    config::Settings,
    image::{Image, RotatedRect},
    landmark::{HandLandmarks, LandmarkIdx},
    timer::Timer,
};

use self::{detection::PalmDetector, landmark::LandmarkEstimator};

/// Finds hands in camera frames.
///
/// Implemented by [`HandTracker`]; the capture loops only depend on this trait.
pub trait HandDetector {
    /// Detects the hands visible in `image`.
    ///
    /// Landmarks are normalized to the size of `image`.
    fn detect(&mut self, image: &Image) -> anyhow::Result<Vec<HandLandmarks>>;

    /// Returns profiling timers of the detector stages.
    fn timers(&self) -> Vec<&Timer> {
        Vec::new()
    }
}

/// Tuning parameters of a [`HandTracker`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HandOptions {
    /// Maximum number of hands to track at once.
    pub max_hands: usize,
    /// Minimum palm detection confidence for a hand to be picked up.
    pub min_detection_confidence: f32,
    /// Minimum landmark presence score for a hand to be reported and kept tracked.
    pub min_tracking_confidence: f32,
}

impl Default for HandOptions {
    fn default() -> Self {
        Self {
            max_hands: 2,
            min_detection_confidence: 0.5,
            min_tracking_confidence: 0.5,
        }
    }
}

/// Palm detection box to hand RoI: shift towards the fingers, by half the box height.
const PALM_SHIFT_Y: f32 = -0.5;
const PALM_SCALE: f32 = 2.6;
/// Landmark bounding box to next-frame RoI.
const LANDMARK_SHIFT_Y: f32 = -0.1;
const LANDMARK_SCALE: f32 = 2.0;

/// RoIs overlapping by at least this much are considered to contain the same hand.
const IOU_THRESH: f32 = 0.3;

/// Detects and tracks hands using the palm detection and hand landmark networks.
pub struct HandTracker {
    options: HandOptions,
    palm: PalmDetector,
    landmarker: LandmarkEstimator,
    /// RoIs of the hands tracked in the previous frame.
    tracked: Vec<RotatedRect>,
}

impl HandTracker {
    /// Loads the hand networks from the configured network directory.
    pub fn load(settings: &Settings, options: HandOptions) -> anyhow::Result<Self> {
        log::debug!("loading hand networks from '{}'", settings.network_dir.display());
        Ok(Self {
            options,
            palm: PalmDetector::load(settings, options.min_detection_confidence)?,
            landmarker: LandmarkEstimator::load(settings)?,
            tracked: Vec::new(),
        })
    }
}

impl HandDetector for HandTracker {
    fn detect(&mut self, image: &Image) -> anyhow::Result<Vec<HandLandmarks>> {
        if self.tracked.len() < self.options.max_hands {
            for det in self.palm.detect(image)? {
                if self.tracked.len() >= self.options.max_hands {
                    break;
                }

                let roi = adjust_roi(det.rotated_rect(), PALM_SHIFT_Y, PALM_SCALE);
                if !overlaps_any(&roi, &self.tracked) {
                    log::trace!("new hand at {:?}", roi);
                    self.tracked.push(roi);
                }
            }
        }

        let mut hands = Vec::with_capacity(self.tracked.len());
        let mut next_rois = Vec::with_capacity(self.tracked.len());
        for roi in std::mem::take(&mut self.tracked) {
            let hand = self.landmarker.estimate(image, &roi)?;
            if hand.presence() < self.options.min_tracking_confidence {
                log::trace!("lost hand (presence {:.2})", hand.presence());
                continue;
            }

            let Some(next) = roi_from_landmarks(&hand, image) else {
                continue;
            };
            // Two RoIs can converge onto the same hand; only keep the first.
            if overlaps_any(&next, &next_rois) {
                continue;
            }
            next_rois.push(next);
            hands.push(hand);
        }
        self.tracked = next_rois;

        Ok(hands)
    }

    fn timers(&self) -> Vec<&Timer> {
        self.palm
            .timers()
            .chain([self.landmarker.timer()])
            .collect()
    }
}

/// Computes the clockwise rotation of a hand compared to an upright position.
///
/// A rotation of 0 means that the fingers point up (from the wrist towards the middle finger).
pub(crate) fn hand_angle(wrist: (f32, f32), middle_finger: (f32, f32)) -> f32 {
    let rel = Vector2::new(wrist.0 - middle_finger.0, wrist.1 - middle_finger.1);
    Rotation2::rotation_between(&Vector2::y(), &rel).angle()
}

/// Shifts `roi` along its own (rotated) Y axis by `shift_y` times its height, squares it, and
/// scales it by `scale`.
fn adjust_roi(roi: RotatedRect, shift_y: f32, scale: f32) -> RotatedRect {
    let offset = Rotation2::new(roi.radians()) * Vector2::new(0.0, shift_y * roi.rect().height());
    roi.map(|rect| rect.move_by(offset.x, offset.y).square().scale(scale))
}

/// Derives the RoI for the next frame from the landmarks of a hand in `image`.
fn roi_from_landmarks(hand: &HandLandmarks, image: &Image) -> Option<RotatedRect> {
    let (w, h) = (image.width() as f32, image.height() as f32);
    let to_px = |[x, y, _]: [f32; 3]| (x * w, y * h);

    let angle = hand_angle(
        to_px(hand.position(LandmarkIdx::Wrist)),
        to_px(hand.position(LandmarkIdx::MiddleFingerMcp)),
    );
    let bounds = RotatedRect::bounding(angle, hand.positions().iter().copied().map(to_px))?;
    Some(adjust_roi(bounds, LANDMARK_SHIFT_Y, LANDMARK_SCALE))
}

fn overlaps_any(roi: &RotatedRect, others: &[RotatedRect]) -> bool {
    let rect = roi.bounding_rect();
    others
        .iter()
        .any(|other| other.bounding_rect().iou(&rect) >= IOU_THRESH)
}
