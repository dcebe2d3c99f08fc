//! Weighted random-forest regressor.
//!
//! Each tree is a CART regressor grown on a bootstrap draw of the training rows.
//! A row's effective weight inside a tree is its bootstrap count times its sample
//! weight. Trees are seeded from the forest seed and their index, so a fit is
//! reproducible no matter how rayon schedules the work.

use anyhow::{Result, anyhow, bail};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

const MIN_GAIN: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_trees: usize,
    pub seed: u64,
    #[serde(default)]
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features considered per split; `None` means all of them.
    #[serde(default)]
    pub max_features: Option<usize>,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 300,
            seed: 42,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
    #[serde(default)]
    importances: Vec<f64>,
}

impl RegressionTree {
    pub fn predict_one(&self, row: &[f64]) -> f64 {
        let mut idx = 0usize;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let x = row.get(*feature).copied().unwrap_or(0.0);
                    idx = if x <= *threshold { *left } else { *right };
                }
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Children are always stored after their parent, so forward-only links
    /// also rule out cycles.
    fn check(&self, n_features: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            match node {
                Node::Leaf { value } if !value.is_finite() => {
                    return Err(format!("leaf {idx} holds a non-finite value"));
                }
                Node::Leaf { .. } => {}
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if *feature >= n_features {
                        return Err(format!(
                            "node {idx} splits on feature {feature}, model has {n_features}"
                        ));
                    }
                    if threshold.is_nan() {
                        return Err(format!("node {idx} has a NaN threshold"));
                    }
                    for child in [*left, *right] {
                        if child <= idx || child >= self.nodes.len() {
                            return Err(format!(
                                "node {idx} points at node {child} (tree has {})",
                                self.nodes.len()
                            ));
                        }
                    }
                }
            }
        }
        Ok(())
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match &nodes[idx] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        walk(&self.nodes, 0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForestRegressor {
    params: ForestParams,
    n_features: usize,
    trees: Vec<RegressionTree>,
}

impl RandomForestRegressor {
    pub fn fit<R>(params: ForestParams, features: &[R], target: &[f64], weights: &[f64]) -> Result<Self>
    where
        R: AsRef<[f64]> + Sync,
    {
        let n_features = validate(features, target, weights)?;
        if params.n_trees == 0 {
            bail!("forest needs at least one tree");
        }

        let w_total: f64 = weights.iter().sum();
        let fallback = target
            .iter()
            .zip(weights)
            .map(|(y, w)| y * w)
            .sum::<f64>()
            / w_total;

        let trees = (0..params.n_trees)
            .into_par_iter()
            .map(|tree_idx| {
                let mut rng = StdRng::seed_from_u64(tree_seed(params.seed, tree_idx));
                let mut samples = bootstrap(&mut rng, weights);
                let mut builder = TreeBuilder {
                    features,
                    target,
                    params: &params,
                    n_features,
                    nodes: Vec::new(),
                    importances: vec![0.0; n_features],
                    rng,
                };
                if samples.is_empty() {
                    builder.nodes.push(Node::Leaf { value: fallback });
                } else {
                    builder.grow(&mut samples, 0);
                }
                RegressionTree {
                    nodes: builder.nodes,
                    importances: builder.importances,
                }
            })
            .collect::<Vec<_>>();

        Ok(Self {
            params,
            n_features,
            trees,
        })
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn trees(&self) -> &[RegressionTree] {
        &self.trees
    }

    /// Rejects a deserialized forest whose trees could not be walked safely.
    pub fn check_structure(&self) -> Result<(), String> {
        if self.trees.is_empty() {
            return Err("forest has no trees".to_string());
        }
        for (idx, tree) in self.trees.iter().enumerate() {
            tree.check(self.n_features)
                .map_err(|reason| format!("tree {idx}: {reason}"))?;
        }
        Ok(())
    }

    pub fn predict_one(&self, row: &[f64]) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.trees.iter().map(|t| t.predict_one(row)).sum();
        sum / self.trees.len() as f64
    }

    pub fn predict<R: AsRef<[f64]>>(&self, features: &[R]) -> Result<Vec<f64>> {
        features
            .iter()
            .enumerate()
            .map(|(idx, row)| {
                let row = row.as_ref();
                if row.len() != self.n_features {
                    return Err(anyhow!(
                        "row {idx} has {} features, model expects {}",
                        row.len(),
                        self.n_features
                    ));
                }
                Ok(self.predict_one(row))
            })
            .collect()
    }

    /// Impurity decrease per feature, normalized to sum to 1 (all zero for a stump forest).
    pub fn feature_importances(&self) -> Vec<f64> {
        let mut total = vec![0.0; self.n_features];
        for tree in &self.trees {
            for (slot, v) in total.iter_mut().zip(&tree.importances) {
                *slot += v;
            }
        }
        let sum: f64 = total.iter().sum();
        if sum > 0.0 {
            for v in &mut total {
                *v /= sum;
            }
        }
        total
    }
}

fn validate<R: AsRef<[f64]>>(features: &[R], target: &[f64], weights: &[f64]) -> Result<usize> {
    if features.is_empty() {
        bail!("no training rows");
    }
    if features.len() != target.len() || features.len() != weights.len() {
        bail!(
            "length mismatch: {} rows, {} targets, {} weights",
            features.len(),
            target.len(),
            weights.len()
        );
    }
    let n_features = features[0].as_ref().len();
    if n_features == 0 {
        bail!("training rows have no features");
    }
    for (idx, row) in features.iter().enumerate() {
        let row = row.as_ref();
        if row.len() != n_features {
            bail!("row {idx} has {} features, expected {n_features}", row.len());
        }
        if row.iter().any(|v| !v.is_finite()) {
            bail!("row {idx} has a non-finite feature");
        }
    }
    if target.iter().any(|v| !v.is_finite()) {
        bail!("target has non-finite values");
    }
    if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
        bail!("sample weights must be finite and non-negative");
    }
    if weights.iter().sum::<f64>() <= 0.0 {
        bail!("sample weights sum to zero");
    }
    Ok(n_features)
}

fn tree_seed(seed: u64, tree_idx: usize) -> u64 {
    seed.wrapping_mul(0x9E37_79B9_7F4A_7C15)
        .wrapping_add(tree_idx as u64)
}

/// Draws n rows with replacement; returns (row, count * weight) for rows with positive weight.
fn bootstrap(rng: &mut StdRng, weights: &[f64]) -> Vec<(usize, f64)> {
    let n = weights.len();
    let mut counts = vec![0u32; n];
    for _ in 0..n {
        counts[rng.gen_range(0..n)] += 1;
    }
    counts
        .into_iter()
        .enumerate()
        .filter(|(idx, c)| *c > 0 && weights[*idx] > 0.0)
        .map(|(idx, c)| (idx, c as f64 * weights[idx]))
        .collect()
}

struct SplitChoice {
    feature: usize,
    threshold: f64,
    gain: f64,
}

struct TreeBuilder<'a, R> {
    features: &'a [R],
    target: &'a [f64],
    params: &'a ForestParams,
    n_features: usize,
    nodes: Vec<Node>,
    importances: Vec<f64>,
    rng: StdRng,
}

impl<R: AsRef<[f64]>> TreeBuilder<'_, R> {
    fn x(&self, row: usize, feature: usize) -> f64 {
        self.features[row].as_ref()[feature]
    }

    fn grow(&mut self, samples: &mut [(usize, f64)], depth: usize) -> usize {
        let (w_sum, wy_sum) = samples
            .iter()
            .fold((0.0, 0.0), |(w, wy), (idx, sw)| (w + sw, wy + sw * self.target[*idx]));
        let node_id = self.nodes.len();
        self.nodes.push(Node::Leaf {
            value: wy_sum / w_sum,
        });

        let depth_capped = self.params.max_depth.is_some_and(|max| depth >= max);
        if depth_capped || samples.len() < self.params.min_samples_split.max(2) {
            return node_id;
        }
        let Some(split) = self.best_split(samples, w_sum, wy_sum) else {
            return node_id;
        };

        let feature = split.feature;
        samples.sort_by(|a, b| self.x(a.0, feature).total_cmp(&self.x(b.0, feature)));
        let mid = samples
            .iter()
            .take_while(|(idx, _)| self.x(*idx, feature) <= split.threshold)
            .count();
        self.importances[feature] += split.gain;

        let (left, right) = samples.split_at_mut(mid);
        let left_id = self.grow(left, depth + 1);
        let right_id = self.grow(right, depth + 1);
        self.nodes[node_id] = Node::Split {
            feature,
            threshold: split.threshold,
            left: left_id,
            right: right_id,
        };
        node_id
    }

    fn candidate_features(&mut self) -> Vec<usize> {
        let mut all = (0..self.n_features).collect::<Vec<_>>();
        match self.params.max_features {
            Some(k) if k > 0 && k < self.n_features => {
                all.shuffle(&mut self.rng);
                all.truncate(k);
                all
            }
            _ => all,
        }
    }

    fn best_split(&mut self, samples: &[(usize, f64)], w_sum: f64, wy_sum: f64) -> Option<SplitChoice> {
        let min_leaf = self.params.min_samples_leaf.max(1);
        if samples.len() < 2 * min_leaf {
            return None;
        }
        let parent_score = wy_sum * wy_sum / w_sum;
        let mut best: Option<SplitChoice> = None;

        for feature in self.candidate_features() {
            let mut column = samples
                .iter()
                .map(|(idx, w)| (self.x(*idx, feature), *w, self.target[*idx]))
                .collect::<Vec<_>>();
            column.sort_by(|a, b| a.0.total_cmp(&b.0));

            let mut w_left = 0.0;
            let mut wy_left = 0.0;
            for i in 0..column.len() - 1 {
                let (x, w, y) = column[i];
                w_left += w;
                wy_left += w * y;

                let next_x = column[i + 1].0;
                if x >= next_x {
                    continue;
                }
                let left_count = i + 1;
                if left_count < min_leaf || column.len() - left_count < min_leaf {
                    continue;
                }
                let w_right = w_sum - w_left;
                if w_left <= 0.0 || w_right <= 0.0 {
                    continue;
                }
                let wy_right = wy_sum - wy_left;
                let gain = wy_left * wy_left / w_left + wy_right * wy_right / w_right - parent_score;
                if gain > best.as_ref().map_or(MIN_GAIN, |b| b.gain + MIN_GAIN) {
                    let mut threshold = x + (next_x - x) / 2.0;
                    if threshold >= next_x {
                        threshold = x;
                    }
                    best = Some(SplitChoice {
                        feature,
                        threshold,
                        gain,
                    });
                }
            }
        }
        best
    }
}
