//! Trains a gesture model on one label of a landmark dataset.

use std::path::PathBuf;

use clap::Parser;
use handsign::train::{self, TrainOptions};

/// Train a classifier on gesture landmark data.
#[derive(Debug, Parser)]
#[command(about, version)]
struct Args {
    /// CSV file with landmarks and label column
    #[arg(long, default_value = "data/gesture_data.csv")]
    data: PathBuf,

    /// Output path for the trained model
    #[arg(long, default_value = "data/gesture_model.json")]
    model: PathBuf,

    /// Gesture label to train on
    #[arg(long, default_value = "palm_open")]
    label: String,
}

fn main() -> anyhow::Result<()> {
    handsign::init_logger!();
    let args = Args::parse();

    let report = train::train(&TrainOptions::new(args.data, args.model, args.label))?;
    println!("{report}");
    Ok(())
}
