//! The landmark CSV dataset.
//!
//! A dataset is a CSV file with a header of 63 feature columns (`x0,y0,z0,...,x20,y20,z20`)
//! followed by a `label` column. Rows are only ever appended, one per captured hand, so samples
//! for several labels accumulate in the same file across collection runs.

use std::{
    fs::{self, File, OpenOptions},
    io,
    path::{Path, PathBuf},
};

use itertools::Itertools;
use thiserror::Error;

use crate::landmark::{HandLandmarks, FEATURE_LEN, NUM_LANDMARKS};

/// Name of the column holding the gesture label.
pub const LABEL_COLUMN: &str = "label";

/// Returns the names of the 63 feature columns, in storage order.
pub fn feature_names() -> Vec<String> {
    (0..NUM_LANDMARKS)
        .flat_map(|i| [format!("x{i}"), format!("y{i}"), format!("z{i}")])
        .collect()
}

/// Returns the full dataset header: the feature columns followed by [`LABEL_COLUMN`].
pub fn column_names() -> Vec<String> {
    let mut names = feature_names();
    names.push(LABEL_COLUMN.to_string());
    names
}

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("dataset has no '{LABEL_COLUMN}' column")]
    MissingLabelColumn,
    #[error("dataset is missing feature columns: {}", .0.join(", "))]
    MissingFeatureColumns(Vec<String>),
    #[error("invalid value '{value}' in row {row}, column '{column}'")]
    InvalidValue {
        row: usize,
        column: String,
        value: String,
    },
    #[error("header of '{}' does not match the landmark layout", .path.display())]
    HeaderMismatch { path: PathBuf },
    #[error("dataset '{}' contains no samples", .path.display())]
    Empty { path: PathBuf },
    #[error("no samples found for label '{label}'")]
    NoSamples { label: String },
    #[error("{count} sample(s) are too few to split into training and test sets")]
    TooFewSamples { count: usize },
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
}

/// Appends labeled samples to a dataset file.
///
/// Every [`append`](Self::append) opens the file, writes one row, and closes it again, so an
/// interrupted run never leaves a partial row behind.
#[derive(Debug)]
pub struct DatasetWriter {
    path: PathBuf,
}

impl DatasetWriter {
    /// Prepares `path` for appending.
    ///
    /// Missing parent directories are created. If the file does not exist (or is empty), it is
    /// created with the dataset header. Otherwise its header is checked against the landmark layout.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, DatasetError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let is_empty = match fs::metadata(&path) {
            Ok(meta) => meta.len() == 0,
            Err(e) if e.kind() == io::ErrorKind::NotFound => true,
            Err(e) => return Err(e.into()),
        };

        if is_empty {
            log::debug!("creating dataset '{}'", path.display());
            let mut writer = csv::Writer::from_path(&path)?;
            writer.write_record(column_names())?;
            writer.flush()?;
        } else {
            let mut reader = csv::Reader::from_path(&path)?;
            if !reader.headers()?.iter().eq(column_names().iter().map(String::as_str)) {
                return Err(DatasetError::HeaderMismatch { path });
            }
            log::debug!("appending to existing dataset '{}'", path.display());
        }

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one row holding the feature vector of `hand` and `label`.
    pub fn append(&self, hand: &HandLandmarks, label: &str) -> Result<(), DatasetError> {
        let file = OpenOptions::new().append(true).open(&self.path)?;
        let mut writer = csv::Writer::from_writer(file);
        writer.write_record(
            hand.feature_vector()
                .iter()
                .map(|v| v.to_string())
                .chain([label.to_string()]),
        )?;
        writer.flush()?;
        Ok(())
    }
}

/// One labeled feature vector.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub features: [f32; FEATURE_LEN],
    pub label: String,
}

/// An in-memory dataset.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    samples: Vec<Sample>,
}

impl Dataset {
    /// Loads the dataset stored at `path`.
    ///
    /// Feature columns are located by name, so their order in the file doesn't matter. Extra
    /// columns are ignored.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DatasetError> {
        let path = path.as_ref();
        let mut reader = csv::Reader::from_reader(File::open(path)?);
        let headers = reader.headers()?.clone();

        let label_idx = headers
            .iter()
            .position(|h| h == LABEL_COLUMN)
            .ok_or(DatasetError::MissingLabelColumn)?;

        let names = feature_names();
        let (found, missing): (Vec<_>, Vec<_>) = names
            .iter()
            .map(|name| (name, headers.iter().position(|h| h == name.as_str())))
            .partition(|(_, idx)| idx.is_some());
        if !missing.is_empty() {
            return Err(DatasetError::MissingFeatureColumns(
                missing.into_iter().map(|(name, _)| name.clone()).collect(),
            ));
        }
        let feature_idx = found.into_iter().flat_map(|(_, idx)| idx).collect_vec();

        let mut samples = Vec::new();
        for (i, record) in reader.records().enumerate() {
            let record = record?;
            let row = i + 1;
            let mut features = [0.0; FEATURE_LEN];
            for ((out, &idx), name) in features.iter_mut().zip(&feature_idx).zip(&names) {
                let value = record.get(idx).unwrap_or_default();
                // `parse` accepts "NaN" and "inf", which no landmark coordinate can be.
                *out = value
                    .trim()
                    .parse::<f32>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| DatasetError::InvalidValue {
                        row,
                        column: name.clone(),
                        value: value.to_string(),
                    })?;
            }
            samples.push(Sample {
                features,
                label: record.get(label_idx).unwrap_or_default().to_string(),
            });
        }

        if samples.is_empty() {
            return Err(DatasetError::Empty {
                path: path.to_path_buf(),
            });
        }

        log::debug!("loaded {} samples from '{}'", samples.len(), path.display());
        Ok(Self { samples })
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Returns the sorted, deduplicated labels present in the dataset.
    pub fn labels(&self) -> Vec<&str> {
        self.samples
            .iter()
            .map(|s| s.label.as_str())
            .sorted()
            .dedup()
            .collect()
    }

    /// Keeps only the samples labeled `label`.
    ///
    /// Fails if no sample carries that label.
    pub fn filter_label(self, label: &str) -> Result<Self, DatasetError> {
        let samples = self
            .samples
            .into_iter()
            .filter(|s| s.label == label)
            .collect_vec();
        if samples.is_empty() {
            return Err(DatasetError::NoSamples {
                label: label.to_string(),
            });
        }
        Ok(Self { samples })
    }

    /// Splits the dataset into a training and a test set.
    ///
    /// See [`train_test_split`].
    pub fn split(&self, test_fraction: f64, seed: u64) -> Result<(Self, Self), DatasetError> {
        let (train, test) = train_test_split(self.len(), test_fraction, seed)?;
        let pick = |indices: Vec<usize>| Self {
            samples: indices
                .into_iter()
                .map(|i| self.samples[i].clone())
                .collect(),
        };
        Ok((pick(train), pick(test)))
    }
}

/// Shuffles the indices `0..n` with a seeded RNG and splits them into `(train, test)`.
///
/// The test set holds `ceil(test_fraction * n)` indices: the first ones of the shuffled sequence.
/// Fails if that leaves no indices for training.
pub fn train_test_split(
    n: usize,
    test_fraction: f64,
    seed: u64,
) -> Result<(Vec<usize>, Vec<usize>), DatasetError> {
    let n_test = (test_fraction * n as f64).ceil() as usize;
    if n_test >= n {
        return Err(DatasetError::TooFewSamples { count: n });
    }

    let mut indices = (0..n).collect_vec();
    fastrand::Rng::with_seed(seed).shuffle(&mut indices);
    let train = indices.split_off(n_test);
    Ok((train, indices))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use crate::landmark::Handedness;

    use super::*;

    fn hand(offset: f32) -> HandLandmarks {
        let mut positions = [[0.0; 3]; NUM_LANDMARKS];
        for (i, pos) in positions.iter_mut().enumerate() {
            *pos = [offset + i as f32 * 0.01, 0.5, -0.02];
        }
        HandLandmarks::new(positions, 0.9, Handedness::Right)
    }

    #[test]
    fn header_layout() {
        let names = column_names();
        assert_eq!(names.len(), 64);
        assert_eq!(&names[..4], &["x0", "y0", "z0", "x1"]);
        assert_eq!(names[62], "z20");
        assert_eq!(names[63], "label");
    }

    #[test]
    fn write_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("data.csv");

        let writer = DatasetWriter::open(&path).unwrap();
        writer.append(&hand(0.1), "fist").unwrap();
        writer.append(&hand(0.2), "palm_open").unwrap();
        // Reopening keeps existing rows and doesn't repeat the header.
        let writer = DatasetWriter::open(&path).unwrap();
        writer.append(&hand(0.3), "fist").unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 4);
        assert!(text.starts_with("x0,y0,z0,"));

        let dataset = Dataset::load(&path).unwrap();
        assert_eq!(dataset.len(), 3);
        assert_eq!(dataset.labels(), ["fist", "palm_open"]);
        assert_eq!(dataset.samples()[1].features, hand(0.2).feature_vector());

        let fists = dataset.filter_label("fist").unwrap();
        assert_eq!(fists.len(), 2);
        assert!(matches!(
            fists.filter_label("thumbs_up"),
            Err(DatasetError::NoSamples { .. })
        ));
    }

    #[test]
    fn empty_file_gets_header() {
        let file = tempfile::NamedTempFile::new().unwrap();
        DatasetWriter::open(file.path()).unwrap();
        let text = fs::read_to_string(file.path()).unwrap();
        assert_eq!(text.trim_end(), column_names().join(","));
    }

    #[test]
    fn rejects_foreign_header() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "a,b,label").unwrap();
        writeln!(file, "1,2,x").unwrap();
        assert!(matches!(
            DatasetWriter::open(file.path()),
            Err(DatasetError::HeaderMismatch { .. })
        ));
    }

    #[test]
    fn load_errors() {
        let mut no_label = tempfile::NamedTempFile::new().unwrap();
        writeln!(no_label, "x0,y0").unwrap();
        writeln!(no_label, "1,2").unwrap();
        assert!(matches!(
            Dataset::load(no_label.path()),
            Err(DatasetError::MissingLabelColumn)
        ));

        let mut few_columns = tempfile::NamedTempFile::new().unwrap();
        writeln!(few_columns, "x0,y0,z0,label").unwrap();
        writeln!(few_columns, "1,2,3,fist").unwrap();
        match Dataset::load(few_columns.path()) {
            Err(DatasetError::MissingFeatureColumns(missing)) => {
                assert_eq!(missing.len(), FEATURE_LEN - 3);
                assert_eq!(missing[0], "x1");
            }
            other => panic!("unexpected result: {other:?}"),
        }

        let header_only = tempfile::NamedTempFile::new().unwrap();
        DatasetWriter::open(header_only.path()).unwrap();
        assert!(matches!(
            Dataset::load(header_only.path()),
            Err(DatasetError::Empty { .. })
        ));

        let mut bad_value = tempfile::NamedTempFile::new().unwrap();
        let mut row = vec!["0.5".to_string(); FEATURE_LEN];
        row[4] = "oops".to_string();
        row.push("fist".to_string());
        writeln!(bad_value, "{}", column_names().join(",")).unwrap();
        writeln!(bad_value, "{}", row.join(",")).unwrap();
        match Dataset::load(bad_value.path()) {
            Err(DatasetError::InvalidValue { row, column, value }) => {
                assert_eq!(row, 1);
                assert_eq!(column, "y1");
                assert_eq!(value, "oops");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn rejects_non_finite_values() {
        for bad in ["NaN", "inf", "-infinity"] {
            let mut file = tempfile::NamedTempFile::new().unwrap();
            let mut row = vec!["0.5".to_string(); FEATURE_LEN];
            row[FEATURE_LEN - 1] = bad.to_string();
            row.push("fist".to_string());
            writeln!(file, "{}", column_names().join(",")).unwrap();
            writeln!(file, "{}", row.join(",")).unwrap();
            match Dataset::load(file.path()) {
                Err(DatasetError::InvalidValue { row, column, value }) => {
                    assert_eq!(row, 1);
                    assert_eq!(column, "z20");
                    assert_eq!(value, bad);
                }
                other => panic!("unexpected result for {bad}: {other:?}"),
            }
        }
    }

    #[test]
    fn split_sizes_and_determinism() {
        let (train, test) = train_test_split(10, 0.2, 42).unwrap();
        assert_eq!(train.len(), 8);
        assert_eq!(test.len(), 2);
        assert_eq!(train_test_split(10, 0.2, 42).unwrap(), (train.clone(), test.clone()));

        let mut all = train.into_iter().chain(test).collect_vec();
        all.sort_unstable();
        assert_eq!(all, (0..10).collect_vec());

        // ceil(0.2 * 11) = 3
        assert_eq!(train_test_split(11, 0.2, 0).unwrap().1.len(), 3);
        assert!(matches!(
            train_test_split(1, 0.2, 42),
            Err(DatasetError::TooFewSamples { count: 1 })
        ));
    }
}
