use std::path::Path;

use anyhow::{Context, Result};
use rust_xlsxwriter::{Workbook, Worksheet};

use crate::predict::Prediction;

const HEADERS: [&str; 11] = [
    "Rank",
    "Tag",
    "Name",
    "Attacker TH",
    "Defender TH",
    "Destruction",
    "Defense Star",
    "Defense Destruction",
    "Avg True Stars",
    "Wars",
    "Predicted Stars",
];

/// Writes the ranked predictions to a single `Predictions` sheet.
pub fn export_predictions(path: &Path, rows: &[Prediction]) -> Result<usize> {
    if let Some(dir) = path.parent()
        && !dir.as_os_str().is_empty()
    {
        std::fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    }

    let mut workbook = Workbook::new();
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Predictions")?;
        write_header(sheet)?;
        for (idx, row) in rows.iter().enumerate() {
            write_prediction(sheet, idx as u32 + 1, row)?;
        }
    }
    workbook
        .save(path)
        .with_context(|| format!("failed writing workbook to {}", path.display()))?;
    Ok(rows.len())
}

fn write_header(sheet: &mut Worksheet) -> Result<()> {
    for (col, title) in HEADERS.iter().enumerate() {
        sheet.write_string(0, col as u16, *title)?;
    }
    Ok(())
}

fn write_prediction(sheet: &mut Worksheet, line: u32, row: &Prediction) -> Result<()> {
    let p = &row.player;
    sheet.write_number(line, 0, line as f64)?;
    sheet.write_string(line, 1, p.tag.as_str())?;
    sheet.write_string(line, 2, p.name.as_str())?;
    sheet.write_number(line, 3, p.attacker_th)?;
    sheet.write_number(line, 4, round2(p.defender_th))?;
    sheet.write_number(line, 5, round2(p.destruction))?;
    sheet.write_number(line, 6, round2(p.defense_star))?;
    sheet.write_number(line, 7, round2(p.defense_destruction))?;
    match p.avg_true_stars {
        Some(v) => sheet.write_number(line, 8, round2(v))?,
        None => sheet.write_string(line, 8, "")?,
    };
    sheet.write_number(line, 9, p.wars as f64)?;
    sheet.write_number(line, 10, round2(row.predicted_stars))?;
    Ok(())
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
