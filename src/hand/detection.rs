//! Palm detection.

use std::path::PathBuf;

use once_cell::sync::Lazy;

use crate::{
    config::Settings,
    detection::{
        nms::NonMaxSuppression,
        ssd::{Anchor, Anchors, LayerInfo},
        Detection, Keypoint,
    },
    image::{Image, Rect, RotatedRect},
    nn::{Cnn, Outputs},
    num::sigmoid,
    timer::Timer,
};

/// A keypoint of a palm [`Detection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PalmKeypoint {
    Wrist = 0,
    IndexFingerMcp = 1,
    MiddleFingerMcp = 2,
    RingFingerMcp = 3,
    PinkyMcp = 4,
    ThumbCmc = 5,
    ThumbMcp = 6,
}

const NUM_KEYPOINTS: usize = 7;
const BOX_PARAMS: usize = 4 + NUM_KEYPOINTS * 2;

static ANCHORS: Lazy<Anchors> =
    Lazy::new(|| Anchors::calculate(&[LayerInfo::new(2, 24, 24), LayerInfo::new(6, 12, 12)]));

/// Returns the path of the palm detection network of the configured variant.
pub fn network_path(settings: &Settings) -> PathBuf {
    let name = format!("palm_detection_{}.onnx", settings.network_variant.suffix());
    settings.network_dir.join(name)
}

/// Detects palms in full camera frames.
pub struct PalmDetector {
    cnn: Cnn,
    nms: NonMaxSuppression,
    thresh: f32,
    raw_detections: Vec<Detection>,
    detections: Vec<Detection>,
    t_infer: Timer,
    t_nms: Timer,
}

impl PalmDetector {
    /// Loads the palm detection network.
    ///
    /// Detections with a confidence below `min_confidence` are discarded.
    pub fn load(settings: &Settings, min_confidence: f32) -> anyhow::Result<Self> {
        let cnn = Cnn::load(network_path(settings))?;
        Ok(Self {
            cnn,
            nms: NonMaxSuppression::new(min_confidence),
            thresh: min_confidence,
            raw_detections: Vec::new(),
            detections: Vec::new(),
            t_infer: Timer::new("palm"),
            t_nms: Timer::new("NMS"),
        })
    }

    /// Runs palm detection on `image`.
    ///
    /// The returned detections are in image pixel coordinates, sorted by descending confidence, and
    /// have their angle set to the rotation of the hand (0 when the fingers point up).
    pub fn detect(&mut self, image: &Image) -> anyhow::Result<&[Detection]> {
        self.raw_detections.clear();
        self.detections.clear();

        // Letterbox the frame into a centered square, so that the network sees the undistorted
        // image.
        let (w, h) = (image.width() as f32, image.height() as f32);
        let side = w.max(h);
        let frame = RotatedRect::from(Rect::from_center(w * 0.5, h * 0.5, side, side));

        let outputs = self.t_infer.time(|| self.cnn.estimate(image, &frame))?;

        let input_res = self.cnn.input_resolution();
        let scale = side / input_res.width() as f32;
        self.t_nms.time(|| -> anyhow::Result<()> {
            extract_outputs(
                (input_res.width() as f32, input_res.height() as f32),
                &outputs,
                self.thresh,
                &mut self.raw_detections,
            )?;

            for mut det in self.nms.process(&mut self.raw_detections) {
                det.map_positions(|x, y| frame.transform_out(x * scale, y * scale), scale);
                let wrist = det.keypoints()[PalmKeypoint::Wrist as usize];
                let finger = det.keypoints()[PalmKeypoint::MiddleFingerMcp as usize];
                det.set_angle(super::hand_angle(
                    (wrist.x(), wrist.y()),
                    (finger.x(), finger.y()),
                ));
                self.detections.push(det);
            }
            Ok(())
        })?;

        Ok(&self.detections)
    }

    /// Returns profiling timers for inference and non-maximum suppression.
    pub fn timers(&self) -> impl Iterator<Item = &Timer> + '_ {
        [&self.t_infer, &self.t_nms].into_iter()
    }
}

fn extract_outputs(
    (input_w, input_h): (f32, f32),
    outputs: &Outputs,
    thresh: f32,
    detections: &mut Vec<Detection>,
) -> anyhow::Result<()> {
    let num_anchors = ANCHORS.anchor_count();
    let boxes = outputs[0].expect_shape(&[1, num_anchors, BOX_PARAMS])?;
    let confidences = outputs[1].expect_shape(&[1, num_anchors, 1])?;

    for (index, &raw) in confidences.as_slice().iter().enumerate() {
        let conf = sigmoid(raw);
        if conf < thresh {
            continue;
        }

        let box_params = &boxes.as_slice()[index * BOX_PARAMS..][..BOX_PARAMS];
        detections.push(extract_detection(
            &ANCHORS[index],
            (input_w, input_h),
            box_params,
            conf,
        ));
    }

    Ok(())
}

/// Decodes the box of a single anchor, in network input pixels.
fn extract_detection(
    anchor: &Anchor,
    (input_w, input_h): (f32, f32),
    box_params: &[f32],
    confidence: f32,
) -> Detection {
    let xc = box_params[0] + anchor.x_center() * input_w;
    let yc = box_params[1] + anchor.y_center() * input_h;
    let w = box_params[2];
    let h = box_params[3];
    let kp = |x, y| {
        Keypoint::new(
            x + anchor.x_center() * input_w,
            y + anchor.y_center() * input_h,
        )
    };

    Detection::with_keypoints(
        confidence,
        Rect::from_center(xc, yc, w, h),
        box_params[4..]
            .chunks_exact(2)
            .map(|xy| kp(xy[0], xy[1]))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use crate::config::NetworkVariant;

    use super::*;

    #[test]
    fn decodes_anchor_offsets() {
        let anchor = &ANCHORS[0];
        let mut params = [0.0; BOX_PARAMS];
        params[..4].copy_from_slice(&[2.0, -1.0, 30.0, 20.0]);
        params[4] = 1.0;

        let det = extract_detection(anchor, (192.0, 192.0), &params, 0.8);
        let (xc, yc) = det.bounding_rect().center();
        assert_eq!(xc, 2.0 + 4.0);
        assert_eq!(yc, -1.0 + 4.0);
        assert_eq!(det.bounding_rect().width(), 30.0);
        assert_eq!(det.keypoints().len(), NUM_KEYPOINTS);
        assert_eq!(det.keypoints()[0], Keypoint::new(5.0, 4.0));
        assert_eq!(det.confidence(), 0.8);
    }

    #[test]
    fn network_file_follows_variant() {
        let settings = Settings {
            network_variant: NetworkVariant::Lite,
            ..Settings::default()
        };
        assert!(network_path(&settings).ends_with("palm_detection_lite.onnx"));
    }
}
