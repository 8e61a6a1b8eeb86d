use std::path::Path;

use crate::engine::RunResult;

/// Trait for reporting upload progress.
///
/// The CLI implements it with an indicatif spinner; tests use the silent one.
/// All methods have default no-op implementations.
pub trait ProgressReporter {
    fn on_run_start(&self, _root: &Path) {}
    fn on_visit(&self, _path: &Path) {}
    fn on_uploaded(&self, _counter: usize, _path: &Path) {}
    fn on_run_complete(&self, _result: &RunResult) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}
