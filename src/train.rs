use std::path::PathBuf;

use anyhow::{Result, anyhow, bail};

use crate::aggregate::aggregate_players;
use crate::columns::FEATURE_NAMES;
use crate::config::BotConfig;
use crate::forest::{ForestParams, RandomForestRegressor};
use crate::ingest::{IngestMode, WarEvent, load_events};
use crate::model::{MODEL_FORMAT_VERSION, ModelArtifact, ModelManifest, data_fingerprint};
use crate::store::WarStore;

/// How much a war counts in training, by recency.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecencyWeights {
    pub recent_wars: usize,
    pub recent_weight: f64,
    pub older_weight: f64,
}

impl Default for RecencyWeights {
    fn default() -> Self {
        Self {
            recent_wars: 5,
            recent_weight: 0.80,
            older_weight: 0.20,
        }
    }
}

impl RecencyWeights {
    pub fn from_config(config: &BotConfig) -> Self {
        Self {
            recent_wars: config.recent_wars,
            recent_weight: config.recent_weight,
            older_weight: config.older_weight,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeightedSample {
    pub war: usize,
    pub tag: String,
    pub features: [f64; 5],
    pub target: f64,
    pub weight: f64,
}

#[derive(Debug, Clone)]
pub struct TrainReport {
    pub wars: usize,
    pub samples: usize,
    pub recent_samples: usize,
    pub older_samples: usize,
    pub players: usize,
    pub model_path: PathBuf,
    pub fingerprint: String,
    pub importances: Vec<(String, f64)>,
}

/// Per-war rows, the last `recent_wars` files first at `recent_weight`, then the
/// earlier files at `older_weight`. Fewer wars than the window means all are recent.
pub fn weighted_samples(events: &[WarEvent], weights: RecencyWeights) -> Result<Vec<WeightedSample>> {
    let split = events.len().saturating_sub(weights.recent_wars);
    let (older, recent) = events.split_at(split);

    let mut out = Vec::new();
    for (offset, group, weight) in [
        (split, recent, weights.recent_weight),
        (0, older, weights.older_weight),
    ] {
        for (idx, event) in group.iter().enumerate() {
            for row in &event.rows {
                let target = row.true_stars.ok_or_else(|| {
                    anyhow!("{} has no TRUE STARS for {}", event.label(), row.tag)
                })?;
                out.push(WeightedSample {
                    war: offset + idx,
                    tag: row.tag.clone(),
                    features: row.features(),
                    target,
                    weight,
                });
            }
        }
    }
    Ok(out)
}

/// Retrains from every war file and replaces the stored model. Nothing is written
/// unless every file loads cleanly.
pub fn train(store: &WarStore, config: &BotConfig) -> Result<TrainReport> {
    let events = load_events(store, IngestMode::Training)?;
    let recency = RecencyWeights::from_config(config);
    let samples = weighted_samples(&events, recency)?;
    if samples.is_empty() {
        bail!("war files contain no tagged player rows");
    }

    let features = samples.iter().map(|s| s.features).collect::<Vec<_>>();
    let target = samples.iter().map(|s| s.target).collect::<Vec<_>>();
    let weights = samples.iter().map(|s| s.weight).collect::<Vec<_>>();
    let params = ForestParams {
        n_trees: config.forest_trees,
        seed: config.forest_seed,
        ..ForestParams::default()
    };
    let forest = RandomForestRegressor::fit(params, &features, &target, &weights)?;

    let recent_cut = events.len().saturating_sub(recency.recent_wars);
    let recent_samples = samples.iter().filter(|s| s.war >= recent_cut).count();
    let fingerprint = data_fingerprint(&events);
    let importances = FEATURE_NAMES
        .iter()
        .map(|s| s.to_string())
        .zip(forest.feature_importances())
        .collect::<Vec<_>>();

    let artifact = ModelArtifact {
        manifest: ModelManifest {
            version: MODEL_FORMAT_VERSION,
            trained_at: chrono::Utc::now().to_rfc3339(),
            feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            wars: events.iter().map(WarEvent::label).collect(),
            samples: samples.len(),
            recent_samples,
            older_samples: samples.len() - recent_samples,
            data_fingerprint: fingerprint.clone(),
        },
        forest,
    };
    store.write_model(&artifact)?;

    let report = TrainReport {
        wars: events.len(),
        samples: samples.len(),
        recent_samples,
        older_samples: samples.len() - recent_samples,
        players: aggregate_players(&events).len(),
        model_path: store.model_path().to_path_buf(),
        fingerprint,
        importances,
    };
    tracing::info!(
        wars = report.wars,
        samples = report.samples,
        recent = report.recent_samples,
        older = report.older_samples,
        path = %report.model_path.display(),
        "war model trained"
    );
    Ok(report)
}
