//! CART decision trees.

use serde::{Deserialize, Serialize};

use crate::num::TotalF32;

/// A tree node, stored in a flat array.
///
/// Child indices always point past the node itself, so walking the tree terminates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    /// Samples with `features[feature] <= threshold` continue at `left`, all others at `right`.
    Split {
        feature: usize,
        threshold: f32,
        left: usize,
        right: usize,
    },
    /// Class probabilities, indexed like the forest's class list.
    Leaf { probabilities: Vec<f32> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeParams {
    /// Number of non-constant features evaluated at each split.
    pub max_features: usize,
    /// Nodes with fewer samples become leaves.
    pub min_samples_split: usize,
}

/// Training data shared by all trees of a forest.
pub(super) struct TrainingSet<'a> {
    pub rows: &'a [&'a [f32]],
    pub targets: &'a [usize],
    pub num_features: usize,
    pub num_classes: usize,
}

/// A binary classification tree, grown until its leaves are pure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
}

struct Split {
    feature: usize,
    threshold: f32,
    impurity: f64,
}

impl DecisionTree {
    /// Grows a tree on the rows of `data` selected by `sample`.
    ///
    /// `sample` may contain duplicate indices (bootstrap sampling).
    pub(super) fn fit(
        data: &TrainingSet<'_>,
        mut sample: Vec<usize>,
        params: TreeParams,
        rng: &mut fastrand::Rng,
    ) -> Self {
        let mut builder = Builder {
            data,
            params,
            rng,
            nodes: Vec::new(),
        };
        builder.grow(&mut sample);
        Self {
            nodes: builder.nodes,
        }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Returns the class probabilities of the leaf `features` ends up in.
    pub fn predict_proba(&self, features: &[f32]) -> &[f32] {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    index = if features[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
                Node::Leaf { probabilities } => return probabilities,
            }
        }
    }

    /// Checks the node structure of a deserialized tree.
    pub(super) fn validate(&self, num_features: usize, num_classes: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".into());
        }
        for (i, node) in self.nodes.iter().enumerate() {
            match node {
                Node::Split {
                    feature,
                    left,
                    right,
                    ..
                } => {
                    if *feature >= num_features {
                        return Err(format!("node {i} splits on unknown feature {feature}"));
                    }
                    for &child in [left, right] {
                        if child <= i || child >= self.nodes.len() {
                            return Err(format!("node {i} has invalid child index {child}"));
                        }
                    }
                }
                Node::Leaf { probabilities } => {
                    if probabilities.len() != num_classes {
                        return Err(format!(
                            "leaf {i} has {} probabilities, expected {num_classes}",
                            probabilities.len()
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}

struct Builder<'a, 'b> {
    data: &'a TrainingSet<'a>,
    params: TreeParams,
    rng: &'b mut fastrand::Rng,
    nodes: Vec<Node>,
}

impl Builder<'_, '_> {
    /// Grows the subtree for `sample` and returns the index of its root node.
    fn grow(&mut self, sample: &mut [usize]) -> usize {
        let index = self.nodes.len();
        let counts = self.class_counts(sample);
        let is_pure = counts.iter().filter(|&&c| c > 0).count() <= 1;

        let split = if is_pure || sample.len() < self.params.min_samples_split {
            None
        } else {
            self.best_split(sample, &counts)
        };
        let Some(split) = split else {
            self.nodes.push(leaf(&counts, sample.len()));
            return index;
        };

        // Placeholder, replaced once the children are known.
        self.nodes.push(Node::Leaf {
            probabilities: Vec::new(),
        });

        let mut mid = 0;
        for j in 0..sample.len() {
            if self.data.rows[sample[j]][split.feature] <= split.threshold {
                sample.swap(mid, j);
                mid += 1;
            }
        }
        let (left_sample, right_sample) = sample.split_at_mut(mid);
        let left = self.grow(left_sample);
        let right = self.grow(right_sample);
        self.nodes[index] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        index
    }

    fn class_counts(&self, sample: &[usize]) -> Vec<usize> {
        let mut counts = vec![0; self.data.num_classes];
        for &i in sample {
            counts[self.data.targets[i]] += 1;
        }
        counts
    }

    /// Finds the split with the lowest weighted Gini impurity among randomly drawn features.
    ///
    /// Features are drawn until `max_features` non-constant ones have been evaluated, or none are
    /// left. Returns `None` if every feature is constant over `sample`.
    fn best_split(&mut self, sample: &[usize], counts: &[usize]) -> Option<Split> {
        let mut features = (0..self.data.num_features).collect::<Vec<_>>();
        self.rng.shuffle(&mut features);

        let n = sample.len();
        let mut best: Option<Split> = None;
        let mut evaluated = 0;
        let mut column = Vec::with_capacity(n);
        for feature in features {
            if evaluated == self.params.max_features {
                break;
            }

            column.clear();
            column.extend(
                sample
                    .iter()
                    .map(|&i| (self.data.rows[i][feature], self.data.targets[i])),
            );
            column.sort_unstable_by_key(|&(value, _)| TotalF32(value));
            if column[0].0 >= column[n - 1].0 {
                continue;
            }
            evaluated += 1;

            let mut left = vec![0; counts.len()];
            for k in 1..n {
                left[column[k - 1].1] += 1;
                let (prev, next) = (column[k - 1].0, column[k].0);
                if prev >= next {
                    continue;
                }

                let right = counts.iter().zip(&left).map(|(total, l)| total - l);
                let impurity = (k as f64 * gini(left.iter().copied(), k)
                    + (n - k) as f64 * gini(right, n - k))
                    / n as f64;
                if best.as_ref().map_or(true, |b| impurity < b.impurity) {
                    let mut threshold = prev + (next - prev) * 0.5;
                    // Rounding can land the midpoint on `next`, which must go right.
                    if threshold >= next {
                        threshold = prev;
                    }
                    best = Some(Split {
                        feature,
                        threshold,
                        impurity,
                    });
                }
            }
        }
        best
    }
}

fn gini(counts: impl Iterator<Item = usize>, total: usize) -> f64 {
    let total = total as f64;
    1.0 - counts
        .map(|c| {
            let p = c as f64 / total;
            p * p
        })
        .sum::<f64>()
}

fn leaf(counts: &[usize], total: usize) -> Node {
    Node::Leaf {
        probabilities: counts
            .iter()
            .map(|&c| c as f32 / total as f32)
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    const PARAMS: TreeParams = TreeParams {
        max_features: 2,
        min_samples_split: 2,
    };

    fn fit(rows: &[&[f32]], targets: &[usize], num_classes: usize) -> DecisionTree {
        let data = TrainingSet {
            rows,
            targets,
            num_features: rows[0].len(),
            num_classes,
        };
        let mut rng = fastrand::Rng::with_seed(7);
        DecisionTree::fit(&data, (0..rows.len()).collect(), PARAMS, &mut rng)
    }

    #[test]
    fn gini_impurity() {
        assert_abs_diff_eq!(gini([4, 0].into_iter(), 4), 0.0);
        assert_abs_diff_eq!(gini([2, 2].into_iter(), 4), 0.5);
        assert_abs_diff_eq!(gini([1, 1, 1].into_iter(), 3), 2.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn splits_at_midpoint() {
        let rows: &[&[f32]] = &[&[1.0, 5.0], &[2.0, 5.0], &[3.0, 5.0], &[4.0, 5.0]];
        let tree = fit(rows, &[0, 0, 1, 1], 2);

        // Feature 1 is constant, so the only useful split is on feature 0.
        assert_eq!(
            tree.nodes()[0],
            Node::Split {
                feature: 0,
                threshold: 2.5,
                left: 1,
                right: 2,
            }
        );
        assert_eq!(tree.predict_proba(&[0.0, 0.0]), &[1.0, 0.0]);
        assert_eq!(tree.predict_proba(&[2.5, 0.0]), &[1.0, 0.0]);
        assert_eq!(tree.predict_proba(&[2.6, 0.0]), &[0.0, 1.0]);
        assert!(tree.validate(2, 2).is_ok());
    }

    #[test]
    fn pure_sample_is_a_leaf() {
        let rows: &[&[f32]] = &[&[1.0], &[2.0]];
        let tree = fit(rows, &[0, 0], 1);
        assert_eq!(
            tree.nodes(),
            &[Node::Leaf {
                probabilities: vec![1.0]
            }]
        );
    }

    #[test]
    fn inseparable_sample_keeps_class_mix() {
        let rows: &[&[f32]] = &[&[1.0], &[1.0], &[1.0]];
        let tree = fit(rows, &[0, 1, 1], 2);
        assert_eq!(tree.nodes().len(), 1);
        let proba = tree.predict_proba(&[1.0]);
        assert_abs_diff_eq!(proba[0], 1.0 / 3.0);
        assert_abs_diff_eq!(proba[1], 2.0 / 3.0);
    }

    #[test]
    fn validation_rejects_cycles() {
        let tree = DecisionTree {
            nodes: vec![Node::Split {
                feature: 0,
                threshold: 0.0,
                left: 0,
                right: 0,
            }],
        };
        assert!(tree.validate(1, 2).is_err());

        let tree = DecisionTree {
            nodes: vec![Node::Leaf {
                probabilities: vec![1.0],
            }],
        };
        assert!(tree.validate(1, 2).is_err());
    }
}
