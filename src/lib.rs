pub mod auth;
pub mod classifier;
pub mod config;
pub mod engine;
pub mod error;
pub mod ignored;
pub mod ledger;
pub mod progress;
pub mod uploader;
pub mod walker;

pub use crate::config::AppConfig;
pub use engine::{RunOutcome, RunResult, UploadEngine};
pub use error::Error;
pub use ledger::{IdentityKey, Ledger};
pub use progress::{ProgressReporter, SilentReporter};
pub use uploader::{DryRunUploader, MediaUploader, UploadError, UploadReceipt};
