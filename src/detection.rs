//! Common functionality for object detection.
//!
//! [`nms`] and [`ssd`] hold the parts of a Single Shot MultiBox Detector that do not depend on a
//! specific network.

pub mod nms;
pub mod ssd;

use crate::image::{Rect, RotatedRect};

/// A detected object.
///
/// Consists of a bounding [`Rect`] enclosing the detected object, a confidence value, a rotation
/// angle, and a list of keypoints. Per convention, the confidence lies between 0.0 and 1.0; weighted
/// non-maximum suppression relies on that.
#[derive(Debug, Clone)]
pub struct Detection {
    confidence: f32,
    angle: f32,
    rect: Rect,
    keypoints: Vec<Keypoint>,
}

impl Detection {
    pub fn new(confidence: f32, rect: Rect) -> Self {
        Self::with_keypoints(confidence, rect, Vec::new())
    }

    pub fn with_keypoints(confidence: f32, rect: Rect, keypoints: Vec<Keypoint>) -> Self {
        Self {
            confidence,
            angle: 0.0,
            rect,
            keypoints,
        }
    }

    #[inline]
    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    /// Returns the clockwise rotation of the detected object, in radians.
    #[inline]
    pub fn angle(&self) -> f32 {
        self.angle
    }

    pub fn set_angle(&mut self, angle: f32) {
        self.angle = angle;
    }

    #[inline]
    pub fn bounding_rect(&self) -> Rect {
        self.rect
    }

    /// Returns the bounding rectangle, rotated by [`Detection::angle`].
    pub fn rotated_rect(&self) -> RotatedRect {
        RotatedRect::new(self.rect, self.angle)
    }

    #[inline]
    pub fn keypoints(&self) -> &[Keypoint] {
        &self.keypoints
    }

    /// Maps the rectangle and keypoints of `self` through `f`.
    ///
    /// Used to move a detection from network input coordinates into image coordinates.
    pub fn map_positions(&mut self, f: impl Fn(f32, f32) -> (f32, f32), scale: f32) {
        let (xc, yc) = self.rect.center();
        let (xc, yc) = f(xc, yc);
        self.rect = Rect::from_center(
            xc,
            yc,
            self.rect.width() * scale,
            self.rect.height() * scale,
        );
        for kp in &mut self.keypoints {
            (kp.x, kp.y) = f(kp.x, kp.y);
        }
    }
}

/// A 2D keypoint produced as part of a [`Detection`].
///
/// The meaning of a keypoint depends on the detector and on its index in the keypoint list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    x: f32,
    y: f32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    #[inline]
    pub fn x(&self) -> f32 {
        self.x
    }

    #[inline]
    pub fn y(&self) -> f32 {
        self.y
    }
}
