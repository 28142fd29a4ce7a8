//! Hand landmark estimation.

use std::path::PathBuf;

use crate::{
    config::Settings,
    image::{Image, Resolution, RotatedRect},
    landmark::{Handedness, HandLandmarks, FEATURE_LEN, NUM_LANDMARKS},
    nn::{Cnn, Outputs},
    timer::Timer,
};

/// Returns the path of the hand landmark network of the configured variant.
pub fn network_path(settings: &Settings) -> PathBuf {
    let name = format!("hand_landmark_{}.onnx", settings.network_variant.suffix());
    settings.network_dir.join(name)
}

/// Raw landmark network result for one region of interest.
#[derive(Debug, Clone)]
pub struct LandmarkResult {
    /// Landmark positions in network input pixels.
    positions: [[f32; 3]; NUM_LANDMARKS],
    presence: f32,
    raw_handedness: f32,
}

impl LandmarkResult {
    fn extract(outputs: &Outputs) -> anyhow::Result<Self> {
        if outputs.len() < 3 {
            anyhow::bail!(
                "hand landmark network has {} outputs, expected at least 3",
                outputs.len()
            );
        }
        let screen_landmarks = outputs[0].expect_shape(&[1, FEATURE_LEN])?;
        let presence = outputs[1].expect_shape(&[1, 1])?;
        let handedness = outputs[2].expect_shape(&[1, 1])?;

        let mut positions = [[0.0; 3]; NUM_LANDMARKS];
        for (out, xyz) in positions
            .iter_mut()
            .zip(screen_landmarks.as_slice().chunks_exact(3))
        {
            out.copy_from_slice(xyz);
        }

        Ok(Self {
            positions,
            presence: presence.as_slice()[0],
            raw_handedness: handedness.as_slice()[0],
        })
    }

    /// Projects the landmarks from the crop `roi` back into a frame of size `frame`, normalizing
    /// them to the frame size.
    ///
    /// `input_res` is the resolution of the network input the crop was resampled to.
    pub fn project(
        &self,
        roi: &RotatedRect,
        input_res: Resolution,
        frame: Resolution,
    ) -> HandLandmarks {
        let sx = roi.rect().width() / input_res.width() as f32;
        let sy = roi.rect().height() / input_res.height() as f32;
        let (fw, fh) = (frame.width() as f32, frame.height() as f32);

        let mut positions = [[0.0; 3]; NUM_LANDMARKS];
        for (out, &[x, y, z]) in positions.iter_mut().zip(&self.positions) {
            let (px, py) = roi.transform_out(x * sx, y * sy);
            *out = [px / fw, py / fh, z * sx / fw];
        }

        let handedness = if self.raw_handedness > 0.5 {
            Handedness::Right
        } else {
            Handedness::Left
        };
        HandLandmarks::new(positions, self.presence, handedness)
    }
}

/// Estimates hand landmarks inside a region of interest.
pub struct LandmarkEstimator {
    cnn: Cnn,
    t_infer: Timer,
}

impl LandmarkEstimator {
    pub fn load(settings: &Settings) -> anyhow::Result<Self> {
        Ok(Self {
            cnn: Cnn::load(network_path(settings))?,
            t_infer: Timer::new("landmarks"),
        })
    }

    /// Runs the landmark network on the region `roi` of `image`.
    ///
    /// The returned landmarks are normalized to `image`'s size.
    pub fn estimate(&mut self, image: &Image, roi: &RotatedRect) -> anyhow::Result<HandLandmarks> {
        let outputs = self.t_infer.time(|| self.cnn.estimate(image, roi))?;
        let result = LandmarkResult::extract(&outputs)?;
        Ok(result.project(roi, self.cnn.input_resolution(), image.resolution()))
    }

    pub fn timer(&self) -> &Timer {
        &self.t_infer
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::PI;

    use approx::assert_abs_diff_eq;

    use crate::{image::Rect, landmark::LandmarkIdx};

    use super::*;

    fn result_with_wrist(x: f32, y: f32, z: f32) -> LandmarkResult {
        let mut positions = [[0.0; 3]; NUM_LANDMARKS];
        positions[0] = [x, y, z];
        LandmarkResult {
            positions,
            presence: 0.9,
            raw_handedness: 0.8,
        }
    }

    #[test]
    fn projects_into_frame() {
        // A 448x448 crop at the top-left of a 640x480 frame, sampled to a 224x224 input.
        let roi = RotatedRect::from(Rect::from_top_left(0.0, 0.0, 448.0, 448.0));
        let hand = result_with_wrist(112.0, 56.0, 10.0).project(
            &roi,
            Resolution::new(224, 224),
            Resolution::new(640, 480),
        );

        let [x, y, z] = hand.position(LandmarkIdx::Wrist);
        assert_abs_diff_eq!(x, 224.0 / 640.0, epsilon = 1e-6);
        assert_abs_diff_eq!(y, 112.0 / 480.0, epsilon = 1e-6);
        assert_abs_diff_eq!(z, 20.0 / 640.0, epsilon = 1e-6);
        assert_eq!(hand.handedness(), Handedness::Right);
        assert_eq!(hand.presence(), 0.9);
    }

    #[test]
    fn projects_rotated_crop() {
        // Upside-down crop: the top-left of the crop is the bottom-right of the region.
        let roi = RotatedRect::new(Rect::from_top_left(100.0, 100.0, 224.0, 224.0), PI);
        let hand = result_with_wrist(0.0, 0.0, 0.0).project(
            &roi,
            Resolution::new(224, 224),
            Resolution::new(1000, 1000),
        );

        let [x, y, _] = hand.position(LandmarkIdx::Wrist);
        assert_abs_diff_eq!(x, 0.324, epsilon = 1e-4);
        assert_abs_diff_eq!(y, 0.324, epsilon = 1e-4);
    }
}
