//! Classification metrics.

use std::fmt;

use itertools::Itertools;

/// Returns the fraction of predictions equal to the true label, or 0 if there are none.
pub fn accuracy<T: AsRef<str>, P: AsRef<str>>(y_true: &[T], y_pred: &[P]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let correct = y_true
        .iter()
        .zip(y_pred)
        .filter(|(t, p)| t.as_ref() == p.as_ref())
        .count();
    correct as f64 / y_true.len() as f64
}

/// Precision, recall and F1 score of one class.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassMetrics {
    pub label: String,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Per-class precision, recall and F1 score, plus accuracy and macro/weighted averages.
///
/// [`Display`](fmt::Display) renders the report as a table with two decimals. A metric whose
/// denominator is zero is reported as 0.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationReport {
    classes: Vec<ClassMetrics>,
    accuracy: f64,
    macro_avg: (f64, f64, f64),
    weighted_avg: (f64, f64, f64),
    support: usize,
}

impl ClassificationReport {
    /// Computes the report for the classes that occur in `y_true` or `y_pred`.
    pub fn new<T: AsRef<str>, P: AsRef<str>>(y_true: &[T], y_pred: &[P]) -> Self {
        let labels = y_true
            .iter()
            .map(AsRef::as_ref)
            .chain(y_pred.iter().map(AsRef::as_ref))
            .sorted()
            .dedup()
            .collect_vec();

        let classes = labels
            .iter()
            .map(|&label| {
                let mut true_positives = 0;
                let mut predicted = 0;
                let mut support = 0;
                for (t, p) in y_true.iter().zip(y_pred) {
                    let (t, p) = (t.as_ref() == label, p.as_ref() == label);
                    true_positives += usize::from(t && p);
                    predicted += usize::from(p);
                    support += usize::from(t);
                }
                let precision = ratio(true_positives, predicted);
                let recall = ratio(true_positives, support);
                let f1 = if precision + recall > 0.0 {
                    2.0 * precision * recall / (precision + recall)
                } else {
                    0.0
                };
                ClassMetrics {
                    label: label.to_string(),
                    precision,
                    recall,
                    f1,
                    support,
                }
            })
            .collect_vec();

        let support = classes.iter().map(|c| c.support).sum::<usize>();
        let n = classes.len().max(1) as f64;
        let macro_avg = (
            classes.iter().map(|c| c.precision).sum::<f64>() / n,
            classes.iter().map(|c| c.recall).sum::<f64>() / n,
            classes.iter().map(|c| c.f1).sum::<f64>() / n,
        );
        let weighted = |metric: fn(&ClassMetrics) -> f64| {
            if support == 0 {
                0.0
            } else {
                classes
                    .iter()
                    .map(|c| metric(c) * c.support as f64)
                    .sum::<f64>()
                    / support as f64
            }
        };
        let weighted_avg = (
            weighted(|c| c.precision),
            weighted(|c| c.recall),
            weighted(|c| c.f1),
        );

        Self {
            accuracy: accuracy(y_true, y_pred),
            classes,
            macro_avg,
            weighted_avg,
            support,
        }
    }

    pub fn classes(&self) -> &[ClassMetrics] {
        &self.classes
    }

    pub fn accuracy(&self) -> f64 {
        self.accuracy
    }

    /// Unweighted mean of the per-class `(precision, recall, f1)`.
    pub fn macro_avg(&self) -> (f64, f64, f64) {
        self.macro_avg
    }

    /// Support-weighted mean of the per-class `(precision, recall, f1)`.
    pub fn weighted_avg(&self) -> (f64, f64, f64) {
        self.weighted_avg
    }
}

fn ratio(num: usize, denom: usize) -> f64 {
    if denom == 0 {
        0.0
    } else {
        num as f64 / denom as f64
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const WEIGHTED: &str = "weighted avg";
        let width = self
            .classes
            .iter()
            .map(|c| c.label.len())
            .chain([WEIGHTED.len()])
            .max()
            .unwrap_or(WEIGHTED.len());

        let row = |f: &mut fmt::Formatter<'_>, name: &str, (p, r, f1): (f64, f64, f64)| {
            writeln!(
                f,
                "{name:>width$}  {p:>9.2} {r:>9.2} {f1:>9.2} {:>9}",
                self.support
            )
        };

        writeln!(
            f,
            "{:>width$}  {:>9} {:>9} {:>9} {:>9}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        writeln!(f)?;
        for c in &self.classes {
            writeln!(
                f,
                "{:>width$}  {:>9.2} {:>9.2} {:>9.2} {:>9}",
                c.label, c.precision, c.recall, c.f1, c.support
            )?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>width$}  {:>9} {:>9} {:>9.2} {:>9}",
            "accuracy", "", "", self.accuracy, self.support
        )?;
        row(f, "macro avg", self.macro_avg)?;
        row(f, WEIGHTED, self.weighted_avg)
    }
}
