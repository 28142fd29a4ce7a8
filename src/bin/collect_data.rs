//! Records labeled hand landmark samples from the webcam.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use handsign::{
    cli::DetectorArgs,
    collect::{self, Collector},
    config::Settings,
    dataset::DatasetWriter,
    gui::{self, PreviewWindow},
    hand::HandTracker,
    video::webcam::{Webcam, WebcamOptions},
};

/// Collect hand landmark data for a gesture label.
#[derive(Debug, Parser)]
#[command(about, version)]
struct Args {
    /// Name of the gesture class (e.g. thumbs_up)
    #[arg(long)]
    label: String,

    /// Number of samples to capture
    #[arg(long, default_value_t = 200, value_parser = clap::value_parser!(u64).range(1..))]
    samples: u64,

    /// CSV output path
    #[arg(long, default_value = "data/gesture_data.csv")]
    outfile: PathBuf,

    #[command(flatten)]
    detector: DetectorArgs,
}

/// Hands tracked at once while collecting.
const MAX_HANDS: usize = 2;

fn main() {
    handsign::init_logger!();
    let args = Args::parse();
    gui::run(move || run(args))
}

fn run(args: Args) -> anyhow::Result<()> {
    let settings = Settings::from_env()?;
    let mut webcam =
        Webcam::open(&settings, WebcamOptions::default()).context("could not open webcam")?;
    let mut tracker = HandTracker::load(&settings, args.detector.hand_options(MAX_HANDS))?;

    let writer = DatasetWriter::open(&args.outfile)
        .with_context(|| format!("cannot write to '{}'", args.outfile.display()))?;
    let target = usize::try_from(args.samples).context("sample count too large")?;
    let mut collector = Collector::new(args.label, target, collect::DEFAULT_COOLDOWN, writer);
    let mut preview = PreviewWindow::new(collect::WINDOW_TITLE);

    collect::run(&mut webcam, &mut tracker, &mut preview, &mut collector)?;

    println!(
        "Finished. Collected {} samples for label '{}'.",
        collector.collected(),
        collector.label()
    );
    Ok(())
}
