use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use photo_sync::{ProgressReporter, RunOutcome, RunResult};
use std::path::Path;
use std::time::Duration;

/// Spinner while scanning; one `counter path` line per upload.
pub struct CliReporter {
    bar: ProgressBar,
}

impl CliReporter {
    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            bar.set_style(style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"));
        }
        Self { bar }
    }
}

impl ProgressReporter for CliReporter {
    fn on_run_start(&self, root: &Path) {
        self.bar.set_message(format!("Scanning {}...", root.display()));
        self.bar.enable_steady_tick(Duration::from_millis(80));
    }

    fn on_visit(&self, path: &Path) {
        self.bar.set_message(compress_file_path(&path.to_string_lossy()));
    }

    // `ProgressBar::println` is dropped when stdout is not a terminal.
    fn on_uploaded(&self, counter: usize, path: &Path) {
        self.bar.suspend(|| println!("{} {}", counter, path.display()));
    }

    fn on_run_complete(&self, result: &RunResult) {
        self.bar.finish_and_clear();
        let outcome = match result.outcome {
            RunOutcome::Completed => "Scan complete".green(),
            RunOutcome::CapReached => "Limit reached".yellow(),
        };
        eprintln!(
            "  {}: {} uploaded, {} already uploaded, {} ignored, {} empty, {} unreadable in {:.2}s",
            outcome,
            format!("{}", result.uploaded).green(),
            result.duplicates,
            result.ignored,
            result.empty_files,
            format!("{}", result.walk_errors).red(),
            result.duration.as_secs_f64(),
        );
        if result.skipped_symlinks > 0 {
            eprintln!(
                "  {} symlinks skipped; set follow_symlinks = true to include them",
                format!("{}", result.skipped_symlinks).yellow(),
            );
        }
    }
}

fn compress_file_path(path: &str) -> String {
    let max_length = 100;
    let chars: Vec<char> = path.chars().collect();
    if chars.len() <= max_length {
        return path.to_string();
    }

    let start_len = (max_length - 3) / 2;
    let end_len = max_length - start_len - 3;
    let start: String = chars[..start_len].iter().collect();
    let end: String = chars[chars.len() - end_len..].iter().collect();
    format!("{}...{}", start, end)
}
