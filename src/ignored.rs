use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Per-run list of files skipped for their extension, one absolute path per line.
pub struct IgnoredLog {
    path: PathBuf,
    file: File,
    count: usize,
}

impl IgnoredLog {
    /// Open the log, discarding whatever a previous run left in it.
    pub fn create(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        debug!("Ignored log truncated at {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            file,
            count: 0,
        })
    }

    pub fn record(&mut self, ignored: &Path) -> io::Result<()> {
        writeln!(self.file, "{}", ignored.display())?;
        self.file.flush()?;
        self.count += 1;
        Ok(())
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
