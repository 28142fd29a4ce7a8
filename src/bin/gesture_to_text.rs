//! Shows the recognized gesture on the live webcam feed.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use handsign::{
    cli::DetectorArgs,
    config::Settings,
    gui::{self, PreviewWindow},
    hand::HandTracker,
    recognize::{self, Recognizer},
    video::webcam::{Webcam, WebcamOptions},
};

/// Real-time gesture-to-text translator.
#[derive(Debug, Parser)]
#[command(about, version)]
struct Args {
    /// Path to the trained model
    #[arg(long, default_value = "data/gesture_model.json")]
    model: PathBuf,

    #[command(flatten)]
    detector: DetectorArgs,
}

fn main() {
    handsign::init_logger!();
    let args = Args::parse();
    gui::run(move || run(args))
}

fn run(args: Args) -> anyhow::Result<()> {
    let recognizer = Recognizer::load(&args.model)?;

    let settings = Settings::from_env()?;
    let mut webcam =
        Webcam::open(&settings, WebcamOptions::default()).context("could not open webcam")?;
    let mut tracker = HandTracker::load(&settings, args.detector.hand_options(1))?;
    let mut preview = PreviewWindow::new(recognize::WINDOW_TITLE);

    recognize::run(&mut webcam, &mut tracker, &mut preview, &recognizer)
}
