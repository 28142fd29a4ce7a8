//! Webcam hand gesture toolkit.
//!
//! The crate backs three programs that only communicate through files:
//!
//! * `collect_data` records labeled hand landmark samples into a CSV [`dataset`].
//! * `train_model` fits a random [`forest`] on one label of that dataset and writes a [`model`]
//!   file.
//! * `gesture_to_text` loads the model and overlays the recognized gesture on the live video feed.
//!
//! # Coordinates
//!
//! Landmarks stored in datasets and fed to models are normalized to the camera image: X and Y
//! range from 0.0 to 1.0 across the image width and height (Y pointing *down*), and Z uses roughly
//! the same scale as X, with smaller values being closer to the camera.
//!
//! # Environment Variables
//!
//! Some parts of the toolkit can be overridden by setting environment variables, see
//! [`config::Settings`]:
//!
//! * `HANDSIGN_WEBCAM_NAME`: Forces the device to use for the [`Webcam`]. If unset, the first
//!   device that supports a compatible image format will be used.
//! * `HANDSIGN_NETWORK_DIR`: Directory containing the ONNX hand networks (`3rdparty/onnx` by
//!   default).
//! * `HANDSIGN_HAND_NETWORK`: Selects the `lite` or `full` (default) hand networks.
//! * `HANDSIGN_JPEG_BACKEND`: Configures the JPEG decoder used for webcam frames. Allowed values
//!   are `zune-jpeg` (the default) and `jpeg-decoder`.
//!
//! [`Webcam`]: video::webcam::Webcam

use log::LevelFilter;

pub mod cli;
pub mod collect;
pub mod config;
pub mod dataset;
pub mod detection;
pub mod forest;
pub mod gui;
pub mod hand;
pub mod image;
pub mod landmark;
pub mod metrics;
pub mod model;
pub mod nn;
pub mod num;
pub mod recognize;
pub mod termination;
pub mod timer;
pub mod train;
pub mod video;

/// macro-use only, not part of public API.
#[doc(hidden)]
pub fn init_logger(calling_crate: &'static str) {
    let log_level = if cfg!(debug_assertions) {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter(Some(calling_crate), log_level)
        .filter(Some(env!("CARGO_CRATE_NAME")), log_level)
        .filter(Some("wgpu"), LevelFilter::Warn)
        .parse_default_env()
        .try_init()
        .ok();
}

/// Initializes logging to *stderr*.
///
/// If `cfg!(debug_assertions)` is enabled, the calling crate and this library will log at *debug*
/// level. Otherwise, they will log at *info* level. `wgpu` always logs at *warn* level.
///
/// The `RUST_LOG` environment variable can be used to override these defaults.
///
/// If a global logger is already registered, this macro will do nothing.
#[macro_export]
macro_rules! init_logger {
    () => {
        $crate::init_logger(env!("CARGO_CRATE_NAME"))
    };
}
