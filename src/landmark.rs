//! Hand landmark data shared by all programs.
//!
//! A hand is described by 21 landmarks in the MediaPipe hand topology. Each landmark has a
//! normalized `(x, y, z)` position, see the [crate documentation](crate#coordinates).

use crate::image::{draw, Color, Image};

/// The number of landmarks describing a hand.
pub const NUM_LANDMARKS: usize = 21;

/// The length of the feature vector of a hand (`x`, `y` and `z` of every landmark).
pub const FEATURE_LEN: usize = NUM_LANDMARKS * 3;

/// The landmarks of a single detected hand.
#[derive(Debug, Clone, PartialEq)]
pub struct HandLandmarks {
    positions: [[f32; 3]; NUM_LANDMARKS],
    presence: f32,
    handedness: Handedness,
}

impl HandLandmarks {
    /// Creates a landmark set from normalized positions.
    pub fn new(
        positions: [[f32; 3]; NUM_LANDMARKS],
        presence: f32,
        handedness: Handedness,
    ) -> Self {
        Self {
            positions,
            presence,
            handedness,
        }
    }

    /// Reconstructs landmarks from a feature vector.
    ///
    /// Presence is set to 1.0 since the vector carries no detector state.
    pub fn from_features(features: &[f32; FEATURE_LEN]) -> Self {
        let mut positions = [[0.0; 3]; NUM_LANDMARKS];
        for (pos, chunk) in positions.iter_mut().zip(features.chunks_exact(3)) {
            pos.copy_from_slice(chunk);
        }
        Self::new(positions, 1.0, Handedness::Right)
    }

    /// Returns the normalized position of every landmark, indexed by [`LandmarkIdx`].
    #[inline]
    pub fn positions(&self) -> &[[f32; 3]; NUM_LANDMARKS] {
        &self.positions
    }

    #[inline]
    pub fn position(&self, idx: LandmarkIdx) -> [f32; 3] {
        self.positions[idx as usize]
    }

    /// The landmark network's confidence that a hand is present.
    #[inline]
    pub fn presence(&self) -> f32 {
        self.presence
    }

    #[inline]
    pub fn handedness(&self) -> Handedness {
        self.handedness
    }

    /// Flattens the landmarks into the 63-float vector stored in datasets and fed to models.
    ///
    /// The order is `x0, y0, z0, x1, y1, z1, ..., x20, y20, z20`.
    pub fn feature_vector(&self) -> [f32; FEATURE_LEN] {
        let mut out = [0.0; FEATURE_LEN];
        for (chunk, pos) in out.chunks_exact_mut(3).zip(&self.positions) {
            chunk.copy_from_slice(pos);
        }
        out
    }

    /// Draws the hand skeleton onto `image`.
    ///
    /// `image` should be the frame the landmarks were computed from (or have the same size).
    pub fn draw(&self, image: &mut Image) {
        let (w, h) = (image.width() as f32, image.height() as f32);
        let to_px = |idx: LandmarkIdx| {
            let [x, y, _] = self.position(idx);
            (x * w, y * h)
        };

        for &(a, b) in CONNECTIVITY {
            draw::line(image, to_px(a), to_px(b)).color(Color::GREEN);
        }
        for &[x, y, _] in &self.positions {
            draw::marker(image, x * w, y * h);
        }

        let wrist = to_px(LandmarkIdx::Wrist);
        let label = match self.handedness {
            Handedness::Left => "L",
            Handedness::Right => "R",
        };
        draw::text(image, wrist.0, wrist.1 + 12.0, label).small();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handedness {
    Left,
    Right,
}

/// Names for the hand landmarks.
///
/// # Terminology
///
/// - **CMC**: [Carpometacarpal joint], the lowest joint of the thumb, located near the wrist.
/// - **MCP**: [Metacarpophalangeal joint], the lower joint forming the knuckles near the palm of
///   the hand.
/// - **PIP**: Proximal Interphalangeal joint, the joint between the MCP and DIP.
/// - **DIP**: Distal Interphalangeal joint, the highest joint of a finger.
/// - **Tip**: This landmark is just placed on the tip of the finger, above the DIP.
///
/// [Carpometacarpal joint]: https://en.wikipedia.org/wiki/Carpometacarpal_joint
/// [Metacarpophalangeal joint]: https://en.wikipedia.org/wiki/Metacarpophalangeal_joint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LandmarkIdx {
    Wrist,
    ThumbCmc,
    ThumbMcp,
    ThumbIp,
    ThumbTip,
    IndexFingerMcp,
    IndexFingerPip,
    IndexFingerDip,
    IndexFingerTip,
    MiddleFingerMcp,
    MiddleFingerPip,
    MiddleFingerDip,
    MiddleFingerTip,
    RingFingerMcp,
    RingFingerPip,
    RingFingerDip,
    RingFingerTip,
    PinkyMcp,
    PinkyPip,
    PinkyDip,
    PinkyTip,
}

/// Pairs of landmarks connected by a bone (or the outline of the palm).
pub const CONNECTIVITY: &[(LandmarkIdx, LandmarkIdx)] = {
    use LandmarkIdx::*;
    &[
        // Palm outline
        (Wrist, ThumbCmc),
        (ThumbCmc, IndexFingerMcp),
        (IndexFingerMcp, MiddleFingerMcp),
        (MiddleFingerMcp, RingFingerMcp),
        (RingFingerMcp, PinkyMcp),
        (PinkyMcp, Wrist),
        // Thumb
        (ThumbCmc, ThumbMcp),
        (ThumbMcp, ThumbIp),
        (ThumbIp, ThumbTip),
        // Index
        (IndexFingerMcp, IndexFingerPip),
        (IndexFingerPip, IndexFingerDip),
        (IndexFingerDip, IndexFingerTip),
        // Middle
        (MiddleFingerMcp, MiddleFingerPip),
        (MiddleFingerPip, MiddleFingerDip),
        (MiddleFingerDip, MiddleFingerTip),
        // Ring
        (RingFingerMcp, RingFingerPip),
        (RingFingerPip, RingFingerDip),
        (RingFingerDip, RingFingerTip),
        // Pinky
        (PinkyMcp, PinkyPip),
        (PinkyPip, PinkyDip),
        (PinkyDip, PinkyTip),
    ]
};

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> HandLandmarks {
        let mut positions = [[0.0; 3]; NUM_LANDMARKS];
        for (i, pos) in positions.iter_mut().enumerate() {
            *pos = [i as f32 * 0.01, 0.5 + i as f32 * 0.01, -(i as f32) * 0.001];
        }
        HandLandmarks::new(positions, 0.9, Handedness::Left)
    }

    #[test]
    fn feature_vector_order() {
        let hand = sample();
        let features = hand.feature_vector();
        assert_eq!(features.len(), 63);
        assert_eq!(&features[..3], &hand.positions()[0]);
        assert_eq!(features[3 * 20], hand.position(LandmarkIdx::PinkyTip)[0]);
        assert_eq!(features[3 * 20 + 2], hand.position(LandmarkIdx::PinkyTip)[2]);
        assert_eq!(HandLandmarks::from_features(&features).positions(), hand.positions());
    }

    #[test]
    fn draws_within_frame() {
        let mut image = Image::new(64, 48);
        sample().draw(&mut image);
        let [x, y, _] = sample().position(LandmarkIdx::Wrist);
        assert_eq!(image.get((x * 64.0) as u32, (y * 48.0) as u32), Color::RED);
    }

    #[test]
    fn connectivity_covers_all_landmarks() {
        let mut seen = [false; NUM_LANDMARKS];
        for &(a, b) in CONNECTIVITY {
            seen[a as usize] = true;
            seen[b as usize] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }
}
