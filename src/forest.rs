//! Random forest classifier.
//!
//! An ensemble of [`DecisionTree`]s, each grown on a bootstrap sample of the training set with a
//! random subset of features considered at every split. Predictions average the class
//! probabilities of all trees.

mod tree;

use itertools::Itertools;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use tree::{DecisionTree, Node, TreeParams};

use self::tree::TrainingSet;

#[derive(Debug, Error)]
pub enum ForestError {
    #[error("cannot fit a forest without training samples")]
    NoSamples,
    #[error("got {rows} feature rows but {labels} labels")]
    LabelCount { rows: usize, labels: usize },
    #[error("row {row} has {found} features, expected {expected}")]
    FeatureCount {
        row: usize,
        found: usize,
        expected: usize,
    },
    #[error("row {row} has a non-finite value in feature {feature}")]
    NonFiniteFeature { row: usize, feature: usize },
    #[error("malformed forest: {0}")]
    Malformed(String),
}

/// Hyperparameters of [`RandomForest::fit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForestParams {
    pub num_trees: usize,
    /// Seed of the random number generator that derives the seed of each tree.
    pub seed: u64,
    /// Features evaluated per split. `None` means `ceil(sqrt(num_features))`.
    pub max_features: Option<usize>,
    pub min_samples_split: usize,
    /// Whether each tree is grown on a bootstrap sample instead of the full training set.
    pub bootstrap: bool,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            num_trees: 200,
            seed: 42,
            max_features: None,
            min_samples_split: 2,
            bootstrap: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    /// Sorted class labels. Tree leaf probabilities use the same order.
    classes: Vec<String>,
    num_features: usize,
    trees: Vec<DecisionTree>,
}

impl RandomForest {
    /// Fits a forest mapping `rows` to `labels`.
    ///
    /// Trees are grown in parallel. Each one uses its own seed drawn from `params.seed`, so the
    /// result doesn't depend on the number of threads.
    pub fn fit<R, L>(rows: &[R], labels: &[L], params: &ForestParams) -> Result<Self, ForestError>
    where
        R: AsRef<[f32]>,
        L: AsRef<str>,
    {
        if rows.is_empty() {
            return Err(ForestError::NoSamples);
        }
        if rows.len() != labels.len() {
            return Err(ForestError::LabelCount {
                rows: rows.len(),
                labels: labels.len(),
            });
        }
        let rows = rows.iter().map(AsRef::as_ref).collect_vec();
        let num_features = rows[0].len();
        if let Some((row, r)) = rows.iter().find_position(|r| r.len() != num_features) {
            return Err(ForestError::FeatureCount {
                row,
                found: r.len(),
                expected: num_features,
            });
        }
        for (row, r) in rows.iter().enumerate() {
            if let Some(feature) = r.iter().position(|v| !v.is_finite()) {
                return Err(ForestError::NonFiniteFeature { row, feature });
            }
        }

        let classes = labels
            .iter()
            .map(AsRef::as_ref)
            .sorted()
            .dedup()
            .map(String::from)
            .collect_vec();
        let targets = labels
            .iter()
            .map(|l| classes.partition_point(|c| c.as_str() < l.as_ref()))
            .collect_vec();

        let tree_params = TreeParams {
            max_features: params
                .max_features
                .unwrap_or_else(|| (num_features as f64).sqrt().ceil() as usize)
                .clamp(1, num_features.max(1)),
            min_samples_split: params.min_samples_split,
        };
        let data = TrainingSet {
            rows: &rows,
            targets: &targets,
            num_features,
            num_classes: classes.len(),
        };

        log::debug!(
            "fitting {} trees on {} samples ({} classes, {} of {} features per split)",
            params.num_trees,
            rows.len(),
            classes.len(),
            tree_params.max_features,
            num_features,
        );

        let mut rng = fastrand::Rng::with_seed(params.seed);
        let seeds = (0..params.num_trees).map(|_| rng.u64(..)).collect_vec();
        let n = rows.len();
        let trees = seeds
            .into_par_iter()
            .map(|seed| {
                let mut rng = fastrand::Rng::with_seed(seed);
                let sample = if params.bootstrap {
                    (0..n).map(|_| rng.usize(..n)).collect()
                } else {
                    (0..n).collect()
                };
                DecisionTree::fit(&data, sample, tree_params, &mut rng)
            })
            .collect();

        Ok(Self {
            classes,
            num_features,
            trees,
        })
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn num_features(&self) -> usize {
        self.num_features
    }

    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    /// Returns the class probabilities for `features`, averaged over all trees.
    ///
    /// # Panics
    ///
    /// Panics if `features` doesn't have [`num_features`](Self::num_features) elements.
    pub fn predict_proba(&self, features: &[f32]) -> Vec<f32> {
        assert_eq!(features.len(), self.num_features);

        let mut proba = vec![0.0; self.classes.len()];
        for tree in &self.trees {
            for (sum, p) in proba.iter_mut().zip(tree.predict_proba(features)) {
                *sum += p;
            }
        }
        let n = self.trees.len().max(1) as f32;
        proba.iter_mut().for_each(|p| *p /= n);
        proba
    }

    /// Returns the most probable class for `features`.
    ///
    /// Ties go to the class that sorts first.
    ///
    /// # Panics
    ///
    /// Panics if `features` doesn't have [`num_features`](Self::num_features) elements.
    pub fn predict(&self, features: &[f32]) -> &str {
        let proba = self.predict_proba(features);
        let mut best = 0;
        for (i, &p) in proba.iter().enumerate() {
            if p > proba[best] {
                best = i;
            }
        }
        &self.classes[best]
    }

    /// Checks the structure of a deserialized forest.
    pub fn validate(&self) -> Result<(), ForestError> {
        if self.classes.is_empty() {
            return Err(ForestError::Malformed("no classes".into()));
        }
        if !self.classes.iter().tuple_windows().all(|(a, b)| a < b) {
            return Err(ForestError::Malformed("classes are not sorted".into()));
        }
        if self.trees.is_empty() {
            return Err(ForestError::Malformed("no trees".into()));
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate(self.num_features, self.classes.len())
                .map_err(|e| ForestError::Malformed(format!("tree {i}: {e}")))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two well separated clusters in 4 dimensions.
    fn clusters() -> (Vec<Vec<f32>>, Vec<&'static str>) {
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for i in 0..20 {
            let jitter = i as f32 * 0.01;
            rows.push(vec![0.1 + jitter, 0.2, 0.3 - jitter, 0.1]);
            labels.push("fist");
            rows.push(vec![0.8 - jitter, 0.7, 0.6 + jitter, 0.9]);
            labels.push("palm_open");
        }
        (rows, labels)
    }

    fn small_params() -> ForestParams {
        ForestParams {
            num_trees: 15,
            ..ForestParams::default()
        }
    }

    #[test]
    fn predicts_training_labels() {
        let (rows, labels) = clusters();
        let forest = RandomForest::fit(&rows, &labels, &small_params()).unwrap();
        assert_eq!(forest.classes(), ["fist", "palm_open"]);
        assert_eq!(forest.trees().len(), 15);
        for (row, label) in rows.iter().zip(&labels) {
            assert_eq!(forest.predict(row), *label);
        }
        let proba = forest.predict_proba(&rows[0]);
        assert!((proba.iter().sum::<f32>() - 1.0).abs() < 1e-5);
        assert!(forest.validate().is_ok());
    }

    #[test]
    fn fit_is_deterministic() {
        let (rows, labels) = clusters();
        let a = RandomForest::fit(&rows, &labels, &small_params()).unwrap();
        let b = rayon::ThreadPoolBuilder::new()
            .num_threads(1)
            .build()
            .unwrap()
            .install(|| RandomForest::fit(&rows, &labels, &small_params()).unwrap());
        assert_eq!(a, b);

        let other_seed = ForestParams {
            seed: 7,
            ..small_params()
        };
        let c = RandomForest::fit(&rows, &labels, &other_seed).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn single_class() {
        let rows = vec![[0.5f32, 0.5]; 8];
        let labels = vec!["palm_open"; 8];
        let forest = RandomForest::fit(&rows, &labels, &small_params()).unwrap();
        assert_eq!(forest.predict(&[0.0, 1.0]), "palm_open");
        assert_eq!(forest.predict_proba(&[0.0, 1.0]), [1.0]);
    }

    #[test]
    fn ties_go_to_first_class() {
        let rows = vec![[1.0f32], [1.0]];
        let labels = ["b", "a"];
        let params = ForestParams {
            num_trees: 3,
            bootstrap: false,
            ..ForestParams::default()
        };
        let forest = RandomForest::fit(&rows, &labels, &params).unwrap();
        assert_eq!(forest.predict_proba(&[1.0]), [0.5, 0.5]);
        assert_eq!(forest.predict(&[1.0]), "a");
    }

    #[test]
    fn input_errors() {
        let empty: [[f32; 2]; 0] = [];
        assert!(matches!(
            RandomForest::fit(&empty, &[] as &[&str], &small_params()),
            Err(ForestError::NoSamples)
        ));
        assert!(matches!(
            RandomForest::fit(&[[1.0f32]], &["a", "b"], &small_params()),
            Err(ForestError::LabelCount { rows: 1, labels: 2 })
        ));
        let ragged = vec![vec![1.0f32, 2.0], vec![1.0]];
        assert!(matches!(
            RandomForest::fit(&ragged, &["a", "b"], &small_params()),
            Err(ForestError::FeatureCount { row: 1, .. })
        ));
    }

    #[test]
    fn rejects_non_finite_features() {
        let params = ForestParams {
            num_trees: 1,
            bootstrap: false,
            ..ForestParams::default()
        };
        assert!(matches!(
            RandomForest::fit(&[[1.0f32], [2.0], [f32::NAN]], &["a", "a", "b"], &params),
            Err(ForestError::NonFiniteFeature { row: 2, feature: 0 })
        ));
        assert!(matches!(
            RandomForest::fit(&[[1.0f32, 0.0], [f32::INFINITY, 1.0]], &["a", "b"], &params),
            Err(ForestError::NonFiniteFeature { row: 1, feature: 0 })
        ));
    }

    #[test]
    fn serde_roundtrip_preserves_predictions() {
        let (rows, labels) = clusters();
        let forest = RandomForest::fit(&rows, &labels, &small_params()).unwrap();
        let json = serde_json::to_string(&forest).unwrap();
        let loaded: RandomForest = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded, forest);
    }
}
