//! Video input.

pub mod webcam;

use crate::image::Image;

/// A source of camera frames.
///
/// Implemented by [`webcam::Webcam`]. The capture loops only depend on this trait, so they can be
/// driven by scripted frames.
pub trait FrameSource {
    /// Reads the next frame, blocking until one is available.
    ///
    /// An error means that the source cannot deliver any more frames.
    fn read(&mut self) -> anyhow::Result<Image>;
}
