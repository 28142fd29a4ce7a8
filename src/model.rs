//! The trained gesture model file.
//!
//! Models are JSON documents holding a format tag, the label they were trained for, the feature
//! column layout, and the fitted [`RandomForest`].

use std::{
    fs::{self, File},
    io::{self, BufReader, BufWriter, Write},
    path::Path,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    dataset,
    forest::{ForestError, RandomForest},
    landmark::{HandLandmarks, FEATURE_LEN},
};

/// Format tag stored in every model file.
pub const FORMAT: &str = "handsign-random-forest";
pub const VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("invalid model file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported model format '{0}'")]
    UnsupportedFormat(String),
    #[error("unsupported model version {0} (expected {VERSION})")]
    UnsupportedVersion(u32),
    #[error("model features do not match the hand landmark layout")]
    FeatureLayout,
    #[error(transparent)]
    Forest(#[from] ForestError),
}

/// A classifier mapping hand landmark feature vectors to gesture labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GestureModel {
    format: String,
    version: u32,
    label: String,
    features: Vec<String>,
    forest: RandomForest,
}

impl GestureModel {
    /// Wraps a forest fitted on landmark feature vectors.
    ///
    /// `label` is the label the training data was filtered to.
    pub fn new(label: impl Into<String>, forest: RandomForest) -> Result<Self, ModelError> {
        let model = Self {
            format: FORMAT.to_string(),
            version: VERSION,
            label: label.into(),
            features: dataset::feature_names(),
            forest,
        };
        model.validate()?;
        Ok(model)
    }

    /// Loads and validates a model file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let reader = BufReader::new(File::open(path)?);
        let model: Self = serde_json::from_reader(reader)?;
        model.validate()?;
        Ok(model)
    }

    /// Writes the model to `path`, creating missing parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ModelError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }

    fn validate(&self) -> Result<(), ModelError> {
        if self.format != FORMAT {
            return Err(ModelError::UnsupportedFormat(self.format.clone()));
        }
        if self.version != VERSION {
            return Err(ModelError::UnsupportedVersion(self.version));
        }
        if self.features != dataset::feature_names() || self.forest.num_features() != FEATURE_LEN {
            return Err(ModelError::FeatureLayout);
        }
        self.forest.validate()?;
        Ok(())
    }

    /// The label the training data was filtered to.
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn forest(&self) -> &RandomForest {
        &self.forest
    }

    pub fn predict(&self, features: &[f32; FEATURE_LEN]) -> &str {
        self.forest.predict(features)
    }

    /// Classifies a detected hand.
    pub fn predict_hand(&self, hand: &HandLandmarks) -> &str {
        self.predict(&hand.feature_vector())
    }
}

#[cfg(test)]
mod tests {
    use crate::forest::ForestParams;

    use super::*;

    fn model() -> GestureModel {
        let rows = (0..10)
            .map(|i| {
                let mut row = [0.2; FEATURE_LEN];
                row[0] = i as f32 * 0.01;
                row
            })
            .collect::<Vec<_>>();
        let labels = vec!["palm_open"; rows.len()];
        let params = ForestParams {
            num_trees: 5,
            ..ForestParams::default()
        };
        let forest = RandomForest::fit(&rows, &labels, &params).unwrap();
        GestureModel::new("palm_open", forest).unwrap()
    }

    #[test]
    fn save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("models").join("gesture_model.json");
        let model = model();
        model.save(&path).unwrap();

        let loaded = GestureModel::load(&path).unwrap();
        assert_eq!(loaded, model);
        assert_eq!(loaded.label(), "palm_open");
        assert_eq!(loaded.predict(&[0.2; FEATURE_LEN]), "palm_open");
    }

    #[test]
    fn rejects_bad_files() {
        let dir = tempfile::tempdir().unwrap();

        let missing = dir.path().join("missing.json");
        assert!(matches!(GestureModel::load(&missing), Err(ModelError::Io(_))));

        let garbage = dir.path().join("garbage.json");
        fs::write(&garbage, "not json").unwrap();
        assert!(matches!(GestureModel::load(&garbage), Err(ModelError::Json(_))));

        let mut value = serde_json::to_value(model()).unwrap();
        value["format"] = "pickle".into();
        let other_format = dir.path().join("other_format.json");
        fs::write(&other_format, value.to_string()).unwrap();
        assert!(matches!(
            GestureModel::load(&other_format),
            Err(ModelError::UnsupportedFormat(f)) if f == "pickle"
        ));

        let mut value = serde_json::to_value(model()).unwrap();
        value["features"] = serde_json::json!(["x0", "y0", "z0"]);
        let wrong_layout = dir.path().join("wrong_layout.json");
        fs::write(&wrong_layout, value.to_string()).unwrap();
        assert!(matches!(
            GestureModel::load(&wrong_layout),
            Err(ModelError::FeatureLayout)
        ));
    }

    #[test]
    fn rejects_forest_of_wrong_width() {
        let forest = RandomForest::fit(&[[0.0f32; 3]], &["a"], &ForestParams::default()).unwrap();
        assert!(matches!(
            GestureModel::new("a", forest),
            Err(ModelError::FeatureLayout)
        ));
    }
}
