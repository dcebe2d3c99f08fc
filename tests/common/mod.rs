#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use rust_xlsxwriter::Workbook;

use war_stats_bot::{BotConfig, WarStore};

pub const HEADERS: [&str; 8] = [
    "Name",
    "Tag",
    "Attacker TH",
    "Defender TH",
    "Destruction",
    "Defense Star",
    "Defense Destruction",
    "True Stars",
];

/// Same columns, in the messy spellings real exports use.
pub const MESSY_HEADERS: [&str; 8] = [
    " name ",
    "TAG",
    "attacker_th",
    "Defender  TH",
    "destruction",
    "DEFENSE_STAR",
    "defense   destruction",
    "true_stars",
];

static NEXT_DIR: AtomicUsize = AtomicUsize::new(0);

pub struct Scratch {
    pub root: PathBuf,
}

impl Scratch {
    pub fn new(label: &str) -> Self {
        let n = NEXT_DIR.fetch_add(1, Ordering::SeqCst);
        let root = std::env::temp_dir().join(format!(
            "war_stats_bot_it_{label}_{}_{n}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&root);
        fs::create_dir_all(&root).expect("scratch dir should be creatable");
        Self { root }
    }

    pub fn data_dir(&self) -> PathBuf {
        self.root.join("data")
    }

    pub fn model_path(&self) -> PathBuf {
        self.root.join("models").join("war_model.json")
    }

    pub fn store(&self) -> WarStore {
        WarStore::new(self.data_dir(), self.model_path())
    }

    pub fn config(&self) -> BotConfig {
        BotConfig {
            data_dir: self.data_dir(),
            model_path: self.model_path(),
            forest_trees: 25,
            ..BotConfig::default()
        }
    }

    pub fn war_path(&self, file_name: &str) -> PathBuf {
        let dir = self.data_dir();
        fs::create_dir_all(&dir).expect("data dir should be creatable");
        dir.join(file_name)
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.root);
    }
}

#[derive(Debug, Clone)]
pub struct Attack {
    pub name: &'static str,
    pub tag: &'static str,
    pub attacker_th: f64,
    pub defender_th: f64,
    pub destruction: f64,
    pub defense_star: f64,
    pub defense_destruction: f64,
    pub true_stars: f64,
}

pub fn attack(name: &'static str, tag: &'static str, th: f64, destruction: f64, stars: f64) -> Attack {
    Attack {
        name,
        tag,
        attacker_th: th,
        defender_th: th,
        destruction,
        defense_star: 1.0,
        defense_destruction: 55.0,
        true_stars: stars,
    }
}

fn attack_values(a: &Attack) -> [f64; 6] {
    [
        a.attacker_th,
        a.defender_th,
        a.destruction,
        a.defense_star,
        a.defense_destruction,
        a.true_stars,
    ]
}

/// Writes a war sheet with the given headers. Columns are matched by position
/// against `HEADERS`; a header list shorter than 8 drops trailing columns.
pub fn write_war_with_headers(path: &Path, headers: &[&str], attacks: &[Attack]) {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    for (col, title) in headers.iter().enumerate() {
        sheet
            .write_string(0, col as u16, *title)
            .expect("header should write");
    }
    for (idx, a) in attacks.iter().enumerate() {
        let row = idx as u32 + 1;
        sheet.write_string(row, 0, a.name).expect("name should write");
        if headers.len() > 1 {
            sheet.write_string(row, 1, a.tag).expect("tag should write");
        }
        for (offset, value) in attack_values(a).into_iter().enumerate() {
            let col = offset + 2;
            if col >= headers.len() {
                break;
            }
            sheet
                .write_number(row, col as u16, value)
                .expect("number should write");
        }
    }
    workbook.save(path).expect("workbook should save");
}

pub fn write_war(path: &Path, attacks: &[Attack]) {
    write_war_with_headers(path, &HEADERS, attacks);
}

/// Two attacks each for A1 and A2, destruction varying by war index.
pub fn standard_war(idx: usize) -> Vec<Attack> {
    let bump = idx as f64;
    vec![
        attack("Alpha", "A1", 15.0, 90.0 + bump, 3.0),
        attack("Bravo", "A2", 13.0, 40.0 + bump, 1.0),
        attack("Alpha", "A1", 15.0, 70.0 + bump, 2.0),
        attack("Bravo", "A2", 13.0, 55.0 + bump, 2.0),
    ]
}
