use std::path::PathBuf;
use thiserror::Error;

use crate::uploader::UploadError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Ledger format error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid root path {}: {reason}", .path.display())]
    InvalidRoot { path: PathBuf, reason: String },

    #[error("Upload limit must be at least 1, got {0}")]
    InvalidCap(usize),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("{counter}, {}, upload failed: {source}", .path.display())]
    Upload {
        counter: usize,
        path: PathBuf,
        #[source]
        source: UploadError,
    },
}
