use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

use crate::classifier::FileClassifier;
use crate::config::AppConfig;
use crate::error::Error;
use crate::ignored::IgnoredLog;
use crate::ledger::{IdentityKey, Ledger};
use crate::progress::ProgressReporter;
use crate::uploader::MediaUploader;
use crate::walker::{WalkEntry, Walker};

/// How a run that did not fail came to an end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The whole tree was walked.
    Completed,
    /// The upload limit was hit; the rest of the tree waits for the next run.
    CapReached,
}

#[derive(Debug)]
pub struct RunResult {
    pub outcome: RunOutcome,
    pub uploaded: usize,
    pub duplicates: usize,
    pub ignored: usize,
    pub empty_files: usize,
    pub walk_errors: usize,
    pub skipped_symlinks: usize,
    pub duration: Duration,
}

pub struct UploadEngine {
    config: AppConfig,
}

/// Mutable state of one run, owned by the engine for its duration.
struct RunState {
    classifier: FileClassifier,
    ledger: Ledger,
    ignored: IgnoredLog,
    /// Keys "uploaded" by a dry run that does not touch the ledger.
    dry_run_seen: HashSet<IdentityKey>,
    record_to_ledger: bool,
    counter: usize,
    cap: usize,
    duplicates: usize,
    empty_files: usize,
}

enum Step {
    Continue,
    CapReached,
}

impl UploadEngine {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Walk the configured root and upload every eligible file the ledger
    /// has not seen, stopping after `upload_limit` successes or at the first
    /// failed upload.
    pub fn run(
        &self,
        uploader: &mut dyn MediaUploader,
        reporter: &dyn ProgressReporter,
    ) -> Result<RunResult, Error> {
        let start = Instant::now();
        let cap = self.config.upload_limit;
        if cap == 0 {
            return Err(Error::InvalidCap(cap));
        }

        let root = resolve_root(&self.config.root_path)?;
        info!("Scanning {} (limit {} uploads)", root.display(), cap);

        let mut state = RunState {
            classifier: FileClassifier::new(&self.config.allowed_extensions),
            ignored: IgnoredLog::create(&self.config.ignored_path)?,
            ledger: Ledger::load(&self.config.ledger_path)?,
            dry_run_seen: HashSet::new(),
            record_to_ledger: !uploader.is_dry_run() || self.config.record_dry_run,
            counter: 0,
            cap,
            duplicates: 0,
            empty_files: 0,
        };

        reporter.on_run_start(&root);

        let mut walker = Walker::new(&root)
            .follow_symlinks(self.config.follow_symlinks)
            .ignore_patterns(&self.config.ignore_patterns);

        let mut outcome = RunOutcome::Completed;
        for entry in walker.by_ref() {
            match state.visit(entry, uploader, reporter)? {
                Step::Continue => {}
                Step::CapReached => {
                    info!("Limit reached");
                    outcome = RunOutcome::CapReached;
                    break;
                }
            }
        }

        let result = RunResult {
            outcome,
            uploaded: state.counter,
            duplicates: state.duplicates,
            ignored: state.ignored.count(),
            empty_files: state.empty_files,
            walk_errors: walker.error_count(),
            skipped_symlinks: walker.symlink_count(),
            duration: start.elapsed(),
        };
        debug!("Run finished: {:?}", result);
        reporter.on_run_complete(&result);
        Ok(result)
    }
}

impl RunState {
    fn visit(
        &mut self,
        entry: WalkEntry,
        uploader: &mut dyn MediaUploader,
        reporter: &dyn ProgressReporter,
    ) -> Result<Step, Error> {
        if entry.is_dir {
            return Ok(Step::Continue);
        }
        reporter.on_visit(&entry.path);

        if entry.size == 0 {
            debug!("Skipping empty file {}", entry.path.display());
            self.empty_files += 1;
            return Ok(Step::Continue);
        }

        let Some(key) = IdentityKey::for_path(&entry.path, entry.size) else {
            return Ok(Step::Continue);
        };

        if !self.classifier.is_eligible(&key.file_name) {
            debug!("Ignoring {} (extension)", entry.path.display());
            self.ignored.record(&entry.path)?;
            return Ok(Step::Continue);
        }

        if self.ledger.contains(&key) || self.dry_run_seen.contains(&key) {
            debug!("Already uploaded: {} ({})", entry.path.display(), key);
            self.duplicates += 1;
            return Ok(Step::Continue);
        }

        match uploader.upload_to_library(&entry.path) {
            Ok(receipt) => {
                if self.record_to_ledger {
                    self.ledger.record(key, &entry.path)?;
                } else {
                    self.dry_run_seen.insert(key);
                }
                self.counter += 1;
                debug!(
                    "Uploaded {} as {:?}",
                    entry.path.display(),
                    receipt.media_item_id
                );
                reporter.on_uploaded(self.counter, &entry.path);

                if self.counter >= self.cap {
                    return Ok(Step::CapReached);
                }
                Ok(Step::Continue)
            }
            Err(source) => {
                error!(
                    "{}, {}, upload failed: {}",
                    self.counter,
                    entry.path.display(),
                    source
                );
                Err(Error::Upload {
                    counter: self.counter,
                    path: entry.path,
                    source,
                })
            }
        }
    }
}

fn resolve_root(root: &Path) -> Result<PathBuf, Error> {
    if root.as_os_str().is_empty() {
        return Err(Error::InvalidRoot {
            path: root.to_path_buf(),
            reason: "no directory given".into(),
        });
    }
    let absolute = fs::canonicalize(root).map_err(|e| Error::InvalidRoot {
        path: root.to_path_buf(),
        reason: e.to_string(),
    })?;
    if !absolute.is_dir() {
        return Err(Error::InvalidRoot {
            path: root.to_path_buf(),
            reason: "not a directory".into(),
        });
    }
    Ok(absolute)
}
