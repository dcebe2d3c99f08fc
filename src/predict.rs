use anyhow::Result;

use crate::aggregate::{PlayerAggregate, aggregate_players};
use crate::ingest::{IngestMode, load_events};
use crate::model::ModelArtifact;
use crate::reply::{COLOR_ORANGE, EMBED_FIELD_LIMIT, Embed, EmbedField};
use crate::store::WarStore;

#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub player: PlayerAggregate,
    pub predicted_stars: f64,
}

#[derive(Debug, Clone)]
pub struct PredictionTable {
    /// Best predicted attacker first.
    pub rows: Vec<Prediction>,
    pub trained_at: String,
    /// War files changed since the model was trained.
    pub stale: bool,
}

/// Scores players with the model and orders them by predicted stars, highest first.
pub fn predict_players(model: &ModelArtifact, players: Vec<PlayerAggregate>) -> Result<Vec<Prediction>> {
    let features = players.iter().map(PlayerAggregate::features).collect::<Vec<_>>();
    let scores = model.forest.predict(&features)?;
    let mut rows = players
        .into_iter()
        .zip(scores)
        .map(|(player, predicted_stars)| Prediction {
            player,
            predicted_stars,
        })
        .collect::<Vec<_>>();
    rows.sort_by(|a, b| b.predicted_stars.total_cmp(&a.predicted_stars));
    Ok(rows)
}

pub fn predict_table(store: &WarStore) -> Result<PredictionTable> {
    let model = ModelArtifact::load(store)?;
    let events = load_events(store, IngestMode::Prediction)?;
    let stale = model.is_stale_for(&events);
    if stale {
        tracing::warn!(
            trained_at = %model.manifest.trained_at,
            "war files changed since the model was trained"
        );
    }
    let rows = predict_players(&model, aggregate_players(&events))?;
    Ok(PredictionTable {
        rows,
        trained_at: model.manifest.trained_at.clone(),
        stale,
    })
}

pub fn render_ranked_text(table: &PredictionTable) -> String {
    let mut msg = String::from("⭐ **AI Next-War Predictions** ⭐\n\n");
    for row in &table.rows {
        msg.push_str(&format!(
            "**{}** → ⭐ **{:.2}**\n",
            row.player.name, row.predicted_stars
        ));
    }
    if table.stale {
        msg.push_str("\n_War files changed since the last training run; retrain to refresh._\n");
    }
    msg
}

/// `limit` is clamped to `1..=EMBED_FIELD_LIMIT`; the CLI rejects values outside it.
pub fn top_attackers_embed(rows: &[Prediction], limit: usize) -> Embed {
    let limit = limit.clamp(1, EMBED_FIELD_LIMIT);
    Embed {
        title: "Top Attackers (Predicted Next War)".to_string(),
        color: COLOR_ORANGE,
        fields: rows
            .iter()
            .take(limit)
            .map(|row| EmbedField {
                name: format!("{} ({})", row.player.name, row.player.tag),
                value: format!(
                    "⭐ **Predicted Stars:** {:.2}\n💥 TH: {}",
                    row.predicted_stars,
                    row.player.attacker_th.trunc() as i64
                ),
                inline: false,
            })
            .collect(),
    }
}
