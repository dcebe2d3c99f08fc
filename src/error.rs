use std::path::PathBuf;

use thiserror::Error;

/// Failures the bot reports back to the user as-is.
///
/// These travel inside `anyhow::Error`; use `downcast_ref::<WarDataError>()`
/// when a caller needs to branch on the kind.
#[derive(Debug, Error)]
pub enum WarDataError {
    #[error("No war files found in {}", dir.display())]
    NoSourceFiles { dir: PathBuf },

    #[error("Missing column in {}: {column}", file.display())]
    MissingColumn { file: PathBuf, column: String },

    #[error("Bad value {value:?} in {} row {row}, column {column}", file.display())]
    MalformedCell {
        file: PathBuf,
        row: usize,
        column: String,
        value: String,
    },

    #[error("No trained model at {}; run train first", path.display())]
    ModelMissing { path: PathBuf },

    #[error("Model file is not usable: {reason}")]
    IncompatibleModel { reason: String },

    #[error("Upload rejected: {reason}")]
    InvalidUpload { reason: String },
}
