//! Non-Maximum Suppression and Averaging.
//!
//! SSD networks produce many overlapping detections for each object. Non-Maximum Suppression
//! filters these duplicates out, leaving a single detection per object.
//!
//! Two variants are available through [`SuppressionMode`]: classic suppression, which drops the
//! less confident detections ([`SuppressionMode::Remove`]), and Non-Maximum Averaging
//! ([`SuppressionMode::Average`]), which computes a confidence-weighted average of overlapping
//! detections. Averaging reduces jitter between frames and is the default.

use crate::{image::Rect, num::TotalF32};

use super::{Detection, Keypoint};

/// A non-maximum suppression algorithm.
pub struct NonMaxSuppression {
    seed_thresh: f32,
    iou_thresh: f32,
    avg_buf: Vec<Detection>,
    out_buf: Vec<Detection>,
    mode: SuppressionMode,
}

impl NonMaxSuppression {
    /// The default intersection-over-union threshold used to determine if two detections overlap.
    pub const DEFAULT_IOU_THRESH: f32 = 0.3;

    /// Creates a new non-maximum suppressor using [`SuppressionMode::Average`].
    ///
    /// `seed_thresh` is the confidence a detection needs to "seed" an NMS round.
    pub fn new(seed_thresh: f32) -> Self {
        Self {
            seed_thresh,
            iou_thresh: Self::DEFAULT_IOU_THRESH,
            avg_buf: Vec::new(),
            out_buf: Vec::new(),
            mode: SuppressionMode::Average,
        }
    }

    /// Sets the intersection-over-union threshold to consider two detections as overlapping.
    pub fn set_iou_thresh(&mut self, iou_thresh: f32) {
        self.iou_thresh = iou_thresh;
    }

    pub fn set_mode(&mut self, mode: SuppressionMode) {
        self.mode = mode;
    }

    /// Processes `detections`, draining it and yielding the remaining detections in order of
    /// descending confidence.
    pub fn process(
        &mut self,
        detections: &mut Vec<Detection>,
    ) -> impl Iterator<Item = Detection> + '_ {
        self.out_buf.clear();

        // Sort by ascending confidence, process highest confidence first by starting at the back.
        detections.sort_unstable_by_key(|det| TotalF32(det.confidence));

        while let Some(seed) = detections.pop() {
            if seed.confidence < self.seed_thresh {
                break;
            }

            let seed_rect = seed.bounding_rect();
            let iou_thresh = self.iou_thresh;
            match self.mode {
                SuppressionMode::Remove => {
                    detections.retain(|other| seed_rect.iou(&other.bounding_rect()) < iou_thresh);
                    self.out_buf.push(seed);
                }
                SuppressionMode::Average => {
                    self.avg_buf.clear();
                    let mut i = 0;
                    while i < detections.len() {
                        if seed_rect.iou(&detections[i].bounding_rect()) >= iou_thresh {
                            self.avg_buf.push(detections.swap_remove(i));
                        } else {
                            i += 1;
                        }
                    }
                    // `swap_remove` breaks the ordering.
                    detections.sort_unstable_by_key(|det| TotalF32(det.confidence));

                    let averaged = average(&seed, &self.avg_buf);
                    self.out_buf.push(averaged);
                }
            }
        }

        detections.clear();
        self.avg_buf.clear();
        self.out_buf.drain(..)
    }
}

/// Computes the confidence-weighted average of `seed` and `others`.
///
/// The result keeps the seed's confidence and angle.
fn average(seed: &Detection, others: &[Detection]) -> Detection {
    let num_keypoints = seed.keypoints().len();
    let (mut xc, mut yc, mut w, mut h) = (0.0, 0.0, 0.0, 0.0);
    let mut keypoints = vec![(0.0, 0.0); num_keypoints];
    let mut divisor = 0.0;

    for det in std::iter::once(seed).chain(others) {
        let factor = det.confidence();
        divisor += factor;

        let rect = det.bounding_rect();
        let (x, y) = rect.center();
        xc += x * factor;
        yc += y * factor;
        w += rect.width() * factor;
        h += rect.height() * factor;

        // Detections of the same network always carry the same number of keypoints.
        for (acc, kp) in keypoints.iter_mut().zip(det.keypoints()) {
            acc.0 += kp.x() * factor;
            acc.1 += kp.y() * factor;
        }
    }

    let mut out = Detection::with_keypoints(
        seed.confidence(),
        Rect::from_center(xc / divisor, yc / divisor, w / divisor, h / divisor),
        keypoints
            .into_iter()
            .map(|(x, y)| Keypoint::new(x / divisor, y / divisor))
            .collect(),
    );
    out.set_angle(seed.angle());
    out
}

/// Describes how [`NonMaxSuppression`] should deal with overlapping detections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressionMode {
    /// Remove overlapping detections, only retain the detection with highest confidence score.
    Remove,

    /// Compute a confidence-weighted average of overlapping detections.
    Average,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nms_suppresses_non_maximum() {
        let mut nms = NonMaxSuppression::new(0.5);
        nms.set_mode(SuppressionMode::Remove);

        let rect = Rect::from_center(0.0, 0.0, 1.0, 1.0);
        let a = Detection::new(0.6, rect);
        let b = Detection::new(0.55, rect.scale(1.5));
        let detections = nms.process(&mut vec![a, b]).collect::<Vec<_>>();
        assert_eq!(detections.len(), 1);

        let d = &detections[0];
        assert_eq!(d.confidence(), 0.6);
        assert_eq!(d.bounding_rect(), rect);
    }

    #[test]
    fn nms_ignores_nonoverlapping() {
        let mut nms = NonMaxSuppression::new(0.5);
        nms.set_mode(SuppressionMode::Remove);

        let a = Detection::new(1.0, Rect::from_center(0.0, 0.0, 1.0, 1.0));
        let b = Detection::new(0.9, Rect::from_center(5.0, 0.0, 1.0, 1.0));

        let detections = nms.process(&mut vec![a, b]).collect::<Vec<_>>();
        assert_eq!(detections.len(), 2);
        assert_eq!(detections[0].confidence(), 1.0);
    }

    #[test]
    fn nms_stops_at_seed_threshold() {
        let mut nms = NonMaxSuppression::new(0.5);

        let a = Detection::new(0.4, Rect::from_center(0.0, 0.0, 1.0, 1.0));
        let detections = nms.process(&mut vec![a]).collect::<Vec<_>>();
        assert!(detections.is_empty());
    }

    #[test]
    fn nma_averages_detections() {
        let mut nms = NonMaxSuppression::new(0.75);
        nms.set_mode(SuppressionMode::Average);
        nms.set_iou_thresh(0.0);

        let rect = Rect::from_center(-1.0, 3.0, 1.0, 1.0);
        let a = Detection::with_keypoints(1.0, rect, vec![Keypoint::new(0.0, 0.0)]);
        let b = Detection::with_keypoints(0.5, rect.scale(4.0), vec![Keypoint::new(3.0, 0.0)]);
        let detections = nms.process(&mut vec![a, b]).collect::<Vec<_>>();
        assert_eq!(detections.len(), 1);

        let d = &detections[0];
        let rect = d.bounding_rect();
        assert_eq!(d.confidence(), 1.0);
        assert_eq!(rect.center(), (-1.0, 3.0));
        assert_eq!((rect.width(), rect.height()), (2.0, 2.0));
        assert_eq!(d.keypoints()[0], Keypoint::new(1.0, 0.0));
    }
}
