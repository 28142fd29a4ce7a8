//! Fitting a gesture model on a landmark dataset.

use std::{fmt, path::PathBuf};

use anyhow::Context;
use itertools::Itertools;

use crate::{
    dataset::{Dataset, Sample},
    forest::{ForestParams, RandomForest},
    metrics::ClassificationReport,
    model::GestureModel,
};

/// Fraction of the samples held out for testing.
pub const TEST_FRACTION: f64 = 0.2;
/// Seed of the train/test split.
pub const SPLIT_SEED: u64 = 42;

#[derive(Debug, Clone)]
pub struct TrainOptions {
    /// Dataset to train on.
    pub data: PathBuf,
    /// Path the fitted model is written to.
    pub model: PathBuf,
    /// Only samples with this label are used.
    pub label: String,
    pub test_fraction: f64,
    pub split_seed: u64,
    pub forest: ForestParams,
}

impl TrainOptions {
    pub fn new(data: impl Into<PathBuf>, model: impl Into<PathBuf>, label: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            model: model.into(),
            label: label.into(),
            test_fraction: TEST_FRACTION,
            split_seed: SPLIT_SEED,
            forest: ForestParams::default(),
        }
    }
}

/// Outcome of a successful [`train`] run.
///
/// [`Display`](fmt::Display) renders the accuracy line, the classification report, and the
/// saved-model line.
#[derive(Debug, Clone)]
pub struct TrainReport {
    pub label: String,
    pub train_samples: usize,
    pub test_samples: usize,
    pub report: ClassificationReport,
    pub model_path: PathBuf,
}

impl TrainReport {
    /// Accuracy on the test set.
    pub fn accuracy(&self) -> f64 {
        self.report.accuracy()
    }
}

impl fmt::Display for TrainReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Accuracy for '{}': {:.4}", self.label, self.accuracy())?;
        writeln!(f, "{}", self.report)?;
        write!(
            f,
            "Saved model for '{}' to {}",
            self.label,
            self.model_path.display()
        )
    }
}

/// Loads the dataset, fits a forest on the samples of one label, evaluates it on the held-out
/// samples, and saves the model.
///
/// Since only one label is used, the model can only ever predict that label.
pub fn train(options: &TrainOptions) -> anyhow::Result<TrainReport> {
    let dataset = Dataset::load(&options.data)
        .with_context(|| format!("failed to load dataset '{}'", options.data.display()))?;
    let dataset = dataset
        .filter_label(&options.label)
        .with_context(|| format!("cannot train on '{}'", options.data.display()))?;

    let (train_set, test_set) = dataset.split(options.test_fraction, options.split_seed)?;
    log::info!(
        "training on {} samples, testing on {}",
        train_set.len(),
        test_set.len()
    );

    let (rows, labels) = columns(&train_set);
    let forest = RandomForest::fit(&rows, &labels, &options.forest)?;
    let model = GestureModel::new(options.label.as_str(), forest)?;

    let y_true = test_set.samples().iter().map(|s| s.label.as_str()).collect_vec();
    let y_pred = test_set
        .samples()
        .iter()
        .map(|s| model.predict(&s.features))
        .collect_vec();
    let report = ClassificationReport::new(&y_true, &y_pred);

    model
        .save(&options.model)
        .with_context(|| format!("failed to save model to '{}'", options.model.display()))?;

    Ok(TrainReport {
        label: options.label.clone(),
        train_samples: train_set.len(),
        test_samples: test_set.len(),
        report,
        model_path: options.model.clone(),
    })
}

fn columns(dataset: &Dataset) -> (Vec<&[f32]>, Vec<&str>) {
    dataset
        .samples()
        .iter()
        .map(|Sample { features, label }| (&features[..], label.as_str()))
        .unzip()
}

#[cfg(test)]
mod tests {
    use crate::{
        dataset::{DatasetError, DatasetWriter},
        landmark::{HandLandmarks, Handedness, NUM_LANDMARKS},
    };

    use super::*;

    fn write_dataset(path: &std::path::Path, rows: &[(f32, &str)]) {
        let writer = DatasetWriter::open(path).unwrap();
        for &(v, label) in rows {
            let hand = HandLandmarks::new([[v, 0.5, 0.0]; NUM_LANDMARKS], 1.0, Handedness::Right);
            writer.append(&hand, label).unwrap();
        }
    }

    fn options(dir: &tempfile::TempDir, label: &str) -> TrainOptions {
        let mut options = TrainOptions::new(
            dir.path().join("data.csv"),
            dir.path().join("model.json"),
            label,
        );
        options.forest.num_trees = 10;
        options
    }

    #[test]
    fn trains_single_label() {
        let dir = tempfile::tempdir().unwrap();
        let rows = (0..12)
            .map(|i| (i as f32 * 0.01, if i % 3 == 0 { "fist" } else { "palm_open" }))
            .collect_vec();
        write_dataset(&dir.path().join("data.csv"), &rows);

        let report = train(&options(&dir, "palm_open")).unwrap();
        // 8 palm_open rows: 2 for testing, 6 for training.
        assert_eq!(report.train_samples, 6);
        assert_eq!(report.test_samples, 2);
        assert_eq!(report.accuracy(), 1.0);
        assert!(dir.path().join("model.json").exists());

        let text = report.to_string();
        assert!(text.starts_with("Accuracy for 'palm_open': 1.0000\n"));
        assert!(text.ends_with(&format!(
            "Saved model for 'palm_open' to {}",
            dir.path().join("model.json").display()
        )));
    }

    #[test]
    fn unknown_label_fails() {
        let dir = tempfile::tempdir().unwrap();
        write_dataset(&dir.path().join("data.csv"), &[(0.1, "fist"), (0.2, "fist")]);

        let err = train(&options(&dir, "palm_open")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DatasetError>(),
            Some(DatasetError::NoSamples { .. })
        ));
        assert!(!dir.path().join("model.json").exists());
    }
}
