use std::collections::HashMap;

use crate::ingest::WarEvent;

/// A participant's history folded across every war they appear in.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerAggregate {
    pub tag: String,
    pub name: String,
    pub attacker_th: f64,
    pub defender_th: f64,
    pub destruction: f64,
    pub defense_star: f64,
    pub defense_destruction: f64,
    /// Mean of per-war summed stars, over the wars that recorded them.
    pub avg_true_stars: Option<f64>,
    pub wars: usize,
}

impl PlayerAggregate {
    pub fn features(&self) -> [f64; 5] {
        [
            self.attacker_th,
            self.defender_th,
            self.destruction,
            self.defense_star,
            self.defense_destruction,
        ]
    }
}

#[derive(Default)]
struct Running {
    defender_th: f64,
    destruction: f64,
    defense_star: f64,
    defense_destruction: f64,
    true_stars: f64,
    true_star_wars: usize,
    wars: usize,
}

/// One row per TAG, first-appearance order. Identity fields come from the first
/// war a tag shows up in; performance fields are a flat mean across wars.
pub fn aggregate_players(events: &[WarEvent]) -> Vec<PlayerAggregate> {
    let mut out: Vec<PlayerAggregate> = Vec::new();
    let mut totals: Vec<Running> = Vec::new();
    let mut by_tag: HashMap<&str, usize> = HashMap::new();

    for row in events.iter().flat_map(|e| e.rows.iter()) {
        let slot = *by_tag.entry(row.tag.as_str()).or_insert_with(|| {
            out.push(PlayerAggregate {
                tag: row.tag.clone(),
                name: row.name.clone(),
                attacker_th: row.attacker_th,
                defender_th: 0.0,
                destruction: 0.0,
                defense_star: 0.0,
                defense_destruction: 0.0,
                avg_true_stars: None,
                wars: 0,
            });
            totals.push(Running::default());
            out.len() - 1
        });

        let acc = &mut totals[slot];
        acc.defender_th += row.defender_th;
        acc.destruction += row.destruction;
        acc.defense_star += row.defense_star;
        acc.defense_destruction += row.defense_destruction;
        if let Some(stars) = row.true_stars {
            acc.true_stars += stars;
            acc.true_star_wars += 1;
        }
        acc.wars += 1;
    }

    for (player, acc) in out.iter_mut().zip(totals) {
        let n = acc.wars.max(1) as f64;
        player.defender_th = acc.defender_th / n;
        player.destruction = acc.destruction / n;
        player.defense_star = acc.defense_star / n;
        player.defense_destruction = acc.defense_destruction / n;
        player.avg_true_stars =
            (acc.true_star_wars > 0).then(|| acc.true_stars / acc.true_star_wars as f64);
        player.wars = acc.wars;
    }
    out
}
