//! Canonical war-sheet columns and header normalization.

use std::fmt;

/// Model inputs, in the order they are fed to the forest.
pub const FEATURE_NAMES: [&str; 5] = [
    "ATTACKER TH",
    "DEFENDER TH",
    "DESTRUCTION",
    "DEFENSE STAR",
    "DEFENSE DESTRUCTION",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Name,
    Tag,
    AttackerTh,
    DefenderTh,
    Destruction,
    DefenseStar,
    DefenseDestruction,
    TrueStars,
}

impl Column {
    pub const ALL: [Column; 8] = [
        Column::Name,
        Column::Tag,
        Column::AttackerTh,
        Column::DefenderTh,
        Column::Destruction,
        Column::DefenseStar,
        Column::DefenseDestruction,
        Column::TrueStars,
    ];

    pub const REQUIRED_FOR_TRAINING: [Column; 8] = Column::ALL;

    pub const REQUIRED_FOR_PREDICTION: [Column; 7] = [
        Column::Name,
        Column::Tag,
        Column::AttackerTh,
        Column::DefenderTh,
        Column::Destruction,
        Column::DefenseStar,
        Column::DefenseDestruction,
    ];

    pub fn canonical(self) -> &'static str {
        match self {
            Column::Name => "NAME",
            Column::Tag => "TAG",
            Column::AttackerTh => "ATTACKER TH",
            Column::DefenderTh => "DEFENDER TH",
            Column::Destruction => "DESTRUCTION",
            Column::DefenseStar => "DEFENSE STAR",
            Column::DefenseDestruction => "DEFENSE DESTRUCTION",
            Column::TrueStars => "TRUE STARS",
        }
    }

    /// Maps a raw sheet header onto a known column; unknown headers yield `None`.
    pub fn from_header(raw: &str) -> Option<Self> {
        let norm = normalize_header(raw);
        Column::ALL
            .into_iter()
            .find(|col| col.canonical() == norm)
    }

    pub fn is_numeric(self) -> bool {
        !matches!(self, Column::Name | Column::Tag)
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical())
    }
}

/// Trims, upper-cases, turns underscores into spaces and collapses whitespace runs.
pub fn normalize_header(raw: &str) -> String {
    let upper = raw.trim().to_uppercase().replace('_', " ");
    let mut out = String::with_capacity(upper.len());
    let mut prev_space = false;
    for ch in upper.chars() {
        if ch.is_whitespace() {
            if !prev_space && !out.is_empty() {
                out.push(' ');
            }
            prev_space = true;
        } else {
            out.push(ch);
            prev_space = false;
        }
    }
    while out.ends_with(' ') {
        out.pop();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_header_compacts() {
        assert_eq!(normalize_header("  attacker_th "), "ATTACKER TH");
        assert_eq!(normalize_header("Defense   Destruction"), "DEFENSE DESTRUCTION");
        assert_eq!(normalize_header("true__stars"), "TRUE STARS");
        assert_eq!(normalize_header("_tag_"), "TAG");
        assert_eq!(normalize_header(""), "");
    }

    #[test]
    fn normalized_headers_are_clean() {
        let samples = [
            " name",
            "Attacker  TH",
            "defender_th",
            "  DEFENSE _ STAR ",
            "defense\tdestruction",
            "True_ _Stars",
            "__",
            "a   b   c",
        ];
        for raw in samples {
            let norm = normalize_header(raw);
            assert_eq!(norm, norm.trim(), "{raw:?}");
            assert!(!norm.chars().any(|c| c.is_lowercase()), "{raw:?}");
            assert!(!norm.contains("  "), "{raw:?}");
            assert!(!norm.contains('_'), "{raw:?}");
        }
    }

    #[test]
    fn from_header_matches_variants() {
        assert_eq!(Column::from_header("attacker_th"), Some(Column::AttackerTh));
        assert_eq!(Column::from_header(" Tag "), Some(Column::Tag));
        assert_eq!(Column::from_header("TRUE  STARS"), Some(Column::TrueStars));
        assert_eq!(Column::from_header("Notes"), None);
    }

    #[test]
    fn feature_names_follow_columns() {
        let cols = [
            Column::AttackerTh,
            Column::DefenderTh,
            Column::Destruction,
            Column::DefenseStar,
            Column::DefenseDestruction,
        ];
        for (name, col) in FEATURE_NAMES.iter().zip(cols) {
            assert_eq!(*name, col.canonical());
        }
    }
}
