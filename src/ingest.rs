use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use calamine::{Data, Reader, open_workbook_auto};

use crate::columns::Column;
use crate::error::WarDataError;
use crate::store::WarStore;

/// Which columns a sheet must carry before it is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestMode {
    /// Every column, including `TRUE STARS`.
    Training,
    /// Identity and feature columns; `TRUE STARS` is optional.
    Prediction,
}

impl IngestMode {
    fn required(self) -> &'static [Column] {
        match self {
            IngestMode::Training => &Column::REQUIRED_FOR_TRAINING,
            IngestMode::Prediction => &Column::REQUIRED_FOR_PREDICTION,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Number(f64),
    Text(String),
}

impl Cell {
    fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            Cell::Number(_) => false,
        }
    }
}

/// First worksheet of a war file: header row plus data rows.
#[derive(Debug, Clone, Default)]
pub struct RawSheet {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

/// One participant's results within a single war, both attacks folded together.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRow {
    pub tag: String,
    pub name: String,
    pub attacker_th: f64,
    pub defender_th: f64,
    pub destruction: f64,
    pub defense_star: f64,
    pub defense_destruction: f64,
    pub true_stars: Option<f64>,
    pub attacks: usize,
}

impl EventRow {
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

#[derive(Debug, Clone)]
pub struct WarEvent {
    pub source: PathBuf,
    pub rows: Vec<EventRow>,
}

impl WarEvent {
    pub fn label(&self) -> String {
        self.source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.source.display().to_string())
    }
}

/// Ingests every war file in the store, oldest first. Any bad file aborts the whole load.
pub fn load_events(store: &WarStore, mode: IngestMode) -> Result<Vec<WarEvent>> {
    let files = store.war_files()?;
    if files.is_empty() {
        return Err(WarDataError::NoSourceFiles {
            dir: store.data_dir().to_path_buf(),
        }
        .into());
    }
    let mut events = Vec::with_capacity(files.len());
    for path in files {
        let event = ingest_file(&path, mode)?;
        tracing::debug!(file = %path.display(), players = event.rows.len(), "war ingested");
        events.push(event);
    }
    Ok(events)
}

pub fn ingest_file(path: &Path, mode: IngestMode) -> Result<WarEvent> {
    let sheet = read_sheet(path)?;
    ingest_sheet(path, &sheet, mode)
}

pub fn read_sheet(path: &Path) -> Result<RawSheet> {
    let mut workbook =
        open_workbook_auto(path).with_context(|| format!("open workbook {}", path.display()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| anyhow!("{} has no worksheets", path.display()))?
        .with_context(|| format!("read first sheet of {}", path.display()))?;

    let mut rows = range.rows();
    let Some(header_row) = rows.next() else {
        return Ok(RawSheet::default());
    };
    let headers = header_row.iter().map(|d| cell_text(&to_cell(d))).collect();
    let rows = rows
        .map(|row| row.iter().map(to_cell).collect::<Vec<_>>())
        .collect();
    Ok(RawSheet { headers, rows })
}

pub fn ingest_sheet(source: &Path, sheet: &RawSheet, mode: IngestMode) -> Result<WarEvent> {
    let mut index: HashMap<Column, usize> = HashMap::new();
    for (idx, header) in sheet.headers.iter().enumerate() {
        if let Some(col) = Column::from_header(header) {
            index.entry(col).or_insert(idx);
        }
    }
    for col in mode.required() {
        if !index.contains_key(col) {
            return Err(WarDataError::MissingColumn {
                file: source.to_path_buf(),
                column: col.canonical().to_string(),
            }
            .into());
        }
    }

    let mut order: Vec<TagAccumulator> = Vec::new();
    let mut by_tag: HashMap<String, usize> = HashMap::new();
    let mut skipped_untagged = 0usize;

    for (row_idx, row) in sheet.rows.iter().enumerate() {
        if row.iter().all(Cell::is_empty) {
            continue;
        }
        // Spreadsheet row number: 1-based, plus the header row.
        let sheet_row = row_idx + 2;
        let get = |col: Column| index.get(&col).and_then(|idx| row.get(*idx));

        let tag = get(Column::Tag).map(cell_text).unwrap_or_default();
        if tag.is_empty() {
            skipped_untagged += 1;
            continue;
        }
        let numeric = |col: Column| -> Result<f64> {
            match get(col) {
                Some(cell) => numeric_value(cell).ok_or_else(|| {
                    WarDataError::MalformedCell {
                        file: source.to_path_buf(),
                        row: sheet_row,
                        column: col.canonical().to_string(),
                        value: cell_text(cell),
                    }
                    .into()
                }),
                None => Ok(0.0),
            }
        };

        let attack = Attack {
            name: get(Column::Name).map(cell_text).unwrap_or_default(),
            attacker_th: numeric(Column::AttackerTh)?,
            defender_th: numeric(Column::DefenderTh)?,
            destruction: numeric(Column::Destruction)?,
            defense_star: numeric(Column::DefenseStar)?,
            defense_destruction: numeric(Column::DefenseDestruction)?,
            true_stars: if index.contains_key(&Column::TrueStars) {
                Some(numeric(Column::TrueStars)?)
            } else {
                None
            },
        };

        match by_tag.get(&tag) {
            Some(&slot) => order[slot].push(&attack),
            None => {
                by_tag.insert(tag.clone(), order.len());
                order.push(TagAccumulator::start(tag, attack));
            }
        }
    }

    if skipped_untagged > 0 {
        tracing::warn!(
            file = %source.display(),
            rows = skipped_untagged,
            "skipped rows without a TAG"
        );
    }

    Ok(WarEvent {
        source: source.to_path_buf(),
        rows: order.into_iter().map(TagAccumulator::finish).collect(),
    })
}

struct Attack {
    name: String,
    attacker_th: f64,
    defender_th: f64,
    destruction: f64,
    defense_star: f64,
    defense_destruction: f64,
    true_stars: Option<f64>,
}

struct TagAccumulator {
    tag: String,
    name: String,
    attacker_th: f64,
    defender_th_sum: f64,
    destruction_sum: f64,
    defense_star_sum: f64,
    defense_destruction_sum: f64,
    true_stars_sum: Option<f64>,
    attacks: usize,
}

impl TagAccumulator {
    fn start(tag: String, first: Attack) -> Self {
        Self {
            tag,
            name: first.name,
            attacker_th: first.attacker_th,
            defender_th_sum: first.defender_th,
            destruction_sum: first.destruction,
            defense_star_sum: first.defense_star,
            defense_destruction_sum: first.defense_destruction,
            true_stars_sum: first.true_stars,
            attacks: 1,
        }
    }

    fn push(&mut self, attack: &Attack) {
        self.defender_th_sum += attack.defender_th;
        self.destruction_sum += attack.destruction;
        self.defense_star_sum += attack.defense_star;
        self.defense_destruction_sum += attack.defense_destruction;
        if let (Some(sum), Some(stars)) = (self.true_stars_sum.as_mut(), attack.true_stars) {
            *sum += stars;
        }
        self.attacks += 1;
    }

    fn finish(self) -> EventRow {
        let n = self.attacks as f64;
        EventRow {
            tag: self.tag,
            name: self.name,
            attacker_th: self.attacker_th,
            defender_th: self.defender_th_sum / n,
            destruction: self.destruction_sum / n,
            defense_star: self.defense_star_sum / n,
            defense_destruction: self.defense_destruction_sum / n,
            true_stars: self.true_stars_sum,
            attacks: self.attacks,
        }
    }
}

fn to_cell(data: &Data) -> Cell {
    match data {
        Data::Empty | Data::Error(_) => Cell::Empty,
        Data::Int(v) => Cell::Number(*v as f64),
        Data::Float(v) => Cell::Number(*v),
        Data::Bool(v) => Cell::Number(if *v { 1.0 } else { 0.0 }),
        Data::DateTime(v) => Cell::Number(v.as_f64()),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => {
            if s.trim().is_empty() {
                Cell::Empty
            } else {
                Cell::Text(s.clone())
            }
        }
    }
}

fn cell_text(cell: &Cell) -> String {
    match cell {
        Cell::Empty => String::new(),
        Cell::Text(s) => s.trim().to_string(),
        Cell::Number(v) if v.fract() == 0.0 && v.abs() < 1e15 => format!("{}", *v as i64),
        Cell::Number(v) => v.to_string(),
    }
}

/// Blank cells count as zero; text must parse as a number (a trailing `%` is allowed).
fn numeric_value(cell: &Cell) -> Option<f64> {
    match cell {
        Cell::Empty => Some(0.0),
        Cell::Number(v) => v.is_finite().then_some(*v),
        Cell::Text(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Some(0.0);
            }
            let trimmed = trimmed.strip_suffix('%').unwrap_or(trimmed).trim();
            trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
        }
    }
}
