use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::config::BotConfig;
use crate::error::WarDataError;

const SHEET_EXTENSIONS: [&str; 4] = ["xlsx", "xlsm", "xls", "ods"];
const UPLOAD_EXTENSION: &str = "xlsx";

static MODEL_WRITES: AtomicU64 = AtomicU64::new(0);

/// Explicit handle on the war spreadsheets and the persisted model.
#[derive(Debug, Clone)]
pub struct WarStore {
    data_dir: PathBuf,
    model_path: PathBuf,
}

impl WarStore {
    pub fn new(data_dir: impl Into<PathBuf>, model_path: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            model_path: model_path.into(),
        }
    }

    pub fn from_config(config: &BotConfig) -> Self {
        Self::new(config.data_dir.clone(), config.model_path.clone())
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    /// War sheets sorted by file name, which doubles as war chronology.
    pub fn war_files(&self) -> Result<Vec<PathBuf>> {
        if !self.data_dir.exists() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&self.data_dir)
            .with_context(|| format!("read data dir {}", self.data_dir.display()))?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.with_context(|| format!("list {}", self.data_dir.display()))?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            // Office lock files and dotfiles share the extension but are not sheets.
            if name.starts_with("~$") || name.starts_with('.') {
                continue;
            }
            if has_extension(&path, &SHEET_EXTENSIONS) {
                files.push(path);
            }
        }
        files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Ok(files)
    }

    pub fn save_upload(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf> {
        let name = file_name.trim();
        if name.is_empty() {
            return Err(WarDataError::InvalidUpload {
                reason: "file name is empty".to_string(),
            }
            .into());
        }
        if name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(WarDataError::InvalidUpload {
                reason: format!("{name} is not a plain file name"),
            }
            .into());
        }
        if !has_extension(Path::new(name), &[UPLOAD_EXTENSION]) {
            return Err(WarDataError::InvalidUpload {
                reason: "please upload an Excel .xlsx file".to_string(),
            }
            .into());
        }

        fs::create_dir_all(&self.data_dir)
            .with_context(|| format!("create data dir {}", self.data_dir.display()))?;
        let dest = self.data_dir.join(name);
        fs::write(&dest, bytes).with_context(|| format!("write {}", dest.display()))?;
        tracing::info!(path = %dest.display(), bytes = bytes.len(), "war file stored");
        Ok(dest)
    }

    pub fn import_file(&self, source: &Path) -> Result<PathBuf> {
        let name = source
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| WarDataError::InvalidUpload {
                reason: format!("{} has no usable file name", source.display()),
            })?;
        if !has_extension(source, &[UPLOAD_EXTENSION]) {
            return Err(WarDataError::InvalidUpload {
                reason: "please upload an Excel .xlsx file".to_string(),
            }
            .into());
        }
        let bytes = fs::read(source).with_context(|| format!("read {}", source.display()))?;
        self.save_upload(name, &bytes)
    }

    pub fn has_model(&self) -> bool {
        self.model_path.is_file()
    }

    /// Replaces the model file through a temp file so readers never see a partial write.
    pub fn write_model<T: Serialize>(&self, artifact: &T) -> Result<()> {
        if let Some(dir) = self.model_path.parent()
            && !dir.as_os_str().is_empty()
        {
            fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
        }
        let json = serde_json::to_string(artifact).context("serialize model")?;
        // One temp file per write, so concurrent trainers never share one.
        let seq = MODEL_WRITES.fetch_add(1, Ordering::Relaxed);
        let tmp = self
            .model_path
            .with_extension(format!("json.{}.{seq}.tmp", std::process::id()));
        if let Err(err) = fs::write(&tmp, json) {
            let _ = fs::remove_file(&tmp);
            return Err(err).with_context(|| format!("write {}", tmp.display()));
        }
        if let Err(err) = fs::rename(&tmp, &self.model_path) {
            let _ = fs::remove_file(&tmp);
            return Err(err)
                .with_context(|| format!("swap model into {}", self.model_path.display()));
        }
        Ok(())
    }

    pub fn read_model<T: DeserializeOwned>(&self) -> Result<T> {
        if !self.model_path.exists() {
            return Err(WarDataError::ModelMissing {
                path: self.model_path.clone(),
            }
            .into());
        }
        let raw = fs::read_to_string(&self.model_path)
            .with_context(|| format!("read model {}", self.model_path.display()))?;
        let artifact = serde_json::from_str::<T>(&raw)
            .with_context(|| format!("parse model {}", self.model_path.display()))?;
        Ok(artifact)
    }
}

fn has_extension(path: &Path, allowed: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| allowed.iter().any(|a| a.eq_ignore_ascii_case(ext)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(label: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "war_stats_bot_store_{label}_{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn war_files_sorted_and_filtered() {
        let root = scratch_dir("list");
        let data = root.join("data");
        fs::create_dir_all(&data).unwrap();
        for name in ["war_03.xlsx", "war_01.xlsx", "~$war_01.xlsx", "notes.txt", "war_02.xlsx"] {
            fs::write(data.join(name), b"x").unwrap();
        }
        let store = WarStore::new(&data, root.join("models/m.json"));
        let names = store
            .war_files()
            .unwrap()
            .into_iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["war_01.xlsx", "war_02.xlsx", "war_03.xlsx"]);
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn missing_data_dir_has_no_files() {
        let root = scratch_dir("absent");
        let store = WarStore::new(root.join("nope"), root.join("m.json"));
        assert!(store.war_files().unwrap().is_empty());
    }

    #[test]
    fn upload_rejects_non_xlsx_and_paths() {
        let root = scratch_dir("upload");
        let store = WarStore::new(root.join("data"), root.join("m.json"));
        for bad in ["war.csv", "../war.xlsx", "sub/war.xlsx", "  "] {
            let err = store.save_upload(bad, b"x").unwrap_err();
            assert!(
                matches!(
                    err.downcast_ref::<WarDataError>(),
                    Some(WarDataError::InvalidUpload { .. })
                ),
                "{bad}"
            );
        }
        let saved = store.save_upload("War_07.XLSX", b"bytes").unwrap();
        assert_eq!(fs::read(saved).unwrap(), b"bytes");
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn read_model_without_file_is_model_missing() {
        let root = scratch_dir("model");
        let store = WarStore::new(root.join("data"), root.join("models/m.json"));
        let err = store.read_model::<serde_json::Value>().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<WarDataError>(),
            Some(WarDataError::ModelMissing { .. })
        ));

        store.write_model(&serde_json::json!({"v": 1})).unwrap();
        assert!(store.has_model());
        let back = store.read_model::<serde_json::Value>().unwrap();
        assert_eq!(back["v"], 1);
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn concurrent_model_writes_leave_one_whole_file() {
        let root = scratch_dir("model_race");
        let store = WarStore::new(root.join("data"), root.join("models/m.json"));
        std::thread::scope(|scope| {
            for writer in 0..8u32 {
                let store = &store;
                scope.spawn(move || {
                    let payload = vec![writer; 2000 + writer as usize * 500];
                    for _ in 0..10 {
                        store.write_model(&payload).unwrap();
                    }
                });
            }
        });

        let back = store.read_model::<Vec<u32>>().unwrap();
        let writer = back[0];
        assert_eq!(back.len(), 2000 + writer as usize * 500);
        assert!(back.iter().all(|v| *v == writer));
        let leftovers = fs::read_dir(root.join("models"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect::<Vec<_>>();
        assert_eq!(leftovers, vec!["m.json".to_string()]);
        let _ = fs::remove_dir_all(&root);
    }
}
