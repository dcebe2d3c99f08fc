use std::env;
use std::path::PathBuf;

pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_MODEL_PATH: &str = "models/war_model.json";
pub const DEFAULT_TOP_LIMIT: usize = 10;
pub const DEFAULT_RECENT_WARS: usize = 5;
pub const DEFAULT_RECENT_WEIGHT: f64 = 0.80;
pub const DEFAULT_OLDER_WEIGHT: f64 = 0.20;
pub const DEFAULT_FOREST_TREES: usize = 300;
pub const DEFAULT_FOREST_SEED: u64 = 42;

#[derive(Debug, Clone)]
pub struct BotConfig {
    pub data_dir: PathBuf,
    pub model_path: PathBuf,
    pub top_limit: usize,
    pub recent_wars: usize,
    pub recent_weight: f64,
    pub older_weight: f64,
    pub forest_trees: usize,
    pub forest_seed: u64,
    pub webhook_url: Option<String>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            top_limit: DEFAULT_TOP_LIMIT,
            recent_wars: DEFAULT_RECENT_WARS,
            recent_weight: DEFAULT_RECENT_WEIGHT,
            older_weight: DEFAULT_OLDER_WEIGHT,
            forest_trees: DEFAULT_FOREST_TREES,
            forest_seed: DEFAULT_FOREST_SEED,
            webhook_url: None,
        }
    }
}

impl BotConfig {
    /// Reads `.env` (if any) and then the process environment.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            data_dir: path_var(&lookup, "WAR_DATA_DIR").unwrap_or(defaults.data_dir),
            model_path: path_var(&lookup, "WAR_MODEL_PATH").unwrap_or(defaults.model_path),
            top_limit: parsed(&lookup, "WAR_TOP_LIMIT")
                .unwrap_or(defaults.top_limit)
                .clamp(1, 25),
            recent_wars: parsed(&lookup, "WAR_RECENT_WARS")
                .unwrap_or(defaults.recent_wars)
                .max(1),
            recent_weight: parsed(&lookup, "WAR_RECENT_WEIGHT")
                .filter(|w: &f64| w.is_finite() && *w > 0.0)
                .unwrap_or(defaults.recent_weight),
            older_weight: parsed(&lookup, "WAR_OLDER_WEIGHT")
                .filter(|w: &f64| w.is_finite() && *w >= 0.0)
                .unwrap_or(defaults.older_weight),
            forest_trees: parsed(&lookup, "WAR_FOREST_TREES")
                .unwrap_or(defaults.forest_trees)
                .clamp(1, 5000),
            forest_seed: parsed(&lookup, "WAR_FOREST_SEED").unwrap_or(defaults.forest_seed),
            webhook_url: lookup("DISCORD_WEBHOOK_URL")
                .map(|raw| raw.trim().to_string())
                .filter(|raw| !raw.is_empty()),
        }
    }
}

fn path_var(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<PathBuf> {
    lookup(key)
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
        .map(PathBuf::from)
}

fn parsed<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|raw| raw.trim().parse::<T>().ok())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_env_uses_defaults() {
        let cfg = BotConfig::from_lookup(|_| None);
        assert_eq!(cfg.data_dir, PathBuf::from("data"));
        assert_eq!(cfg.model_path, PathBuf::from("models/war_model.json"));
        assert_eq!(cfg.top_limit, 10);
        assert_eq!(cfg.recent_wars, 5);
        assert_eq!(cfg.forest_trees, 300);
        assert_eq!(cfg.forest_seed, 42);
        assert!(cfg.webhook_url.is_none());
    }

    #[test]
    fn env_values_are_parsed_and_clamped() {
        let cfg = BotConfig::from_lookup(lookup_from(&[
            ("WAR_DATA_DIR", " /srv/wars "),
            ("WAR_TOP_LIMIT", "100"),
            ("WAR_RECENT_WARS", "0"),
            ("WAR_RECENT_WEIGHT", "nope"),
            ("WAR_OLDER_WEIGHT", "0.1"),
            ("DISCORD_WEBHOOK_URL", "  "),
        ]));
        assert_eq!(cfg.data_dir, PathBuf::from("/srv/wars"));
        assert_eq!(cfg.top_limit, 25);
        assert_eq!(cfg.recent_wars, 1);
        assert_eq!(cfg.recent_weight, DEFAULT_RECENT_WEIGHT);
        assert_eq!(cfg.older_weight, 0.1);
        assert!(cfg.webhook_url.is_none());
    }
}
