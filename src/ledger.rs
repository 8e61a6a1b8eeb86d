use csv::{ReaderBuilder, StringRecord, Terminator, WriterBuilder};
use std::collections::HashMap;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::Error;

/// Separator used by the original plain-text ledger. Still read, never written.
const LEGACY_DELIMITER: &str = "#~^^^~#";

/// What makes two files "the same upload": base name plus byte size.
///
/// The directory is deliberately not part of the key, so `a/x.jpg` and
/// `b/x.jpg` of equal size collapse into one upload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdentityKey {
    pub file_name: String,
    pub size: u64,
}

impl IdentityKey {
    pub fn new(file_name: impl Into<String>, size: u64) -> Self {
        Self {
            file_name: file_name.into(),
            size,
        }
    }

    /// Key for `path`, or `None` when it has no final component.
    pub fn for_path(path: &Path, size: u64) -> Option<Self> {
        path.file_name()
            .map(|name| Self::new(name.to_string_lossy().into_owned(), size))
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.file_name, self.size)
    }
}

/// Durable record of uploaded files.
///
/// Backed by an append-only CSV log with one `file_name,size,path` record per
/// upload. The in-memory map is rebuilt by replaying the log on load; later
/// records win when a key repeats.
#[derive(Debug)]
pub struct Ledger {
    path: PathBuf,
    entries: HashMap<IdentityKey, PathBuf>,
}

impl Ledger {
    /// Replay the log at `path`. A missing file is an empty ledger.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let mut ledger = Ledger {
            path: path.to_path_buf(),
            entries: HashMap::new(),
        };

        let raw = match fs::read(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("No ledger at {}, starting empty", path.display());
                return Ok(ledger);
            }
            Err(err) => return Err(err.into()),
        };
        let text = String::from_utf8_lossy(&raw);

        // A CSV record spans several lines only while a quoted field is open.
        // Historic lines are taken whole before they can open one.
        let mut pending = String::new();
        let mut pending_line = 0usize;
        let mut skipped = 0usize;
        for (idx, line) in text.split_inclusive('\n').enumerate() {
            if pending.is_empty() {
                pending_line = idx + 1;
                if let Some((key, uploaded)) = parse_legacy_line(line) {
                    ledger.entries.insert(key, uploaded);
                    continue;
                }
            }

            pending.push_str(line);
            if pending.matches('"').count() % 2 == 1 {
                continue;
            }

            let record = std::mem::take(&mut pending);
            match parse_record(&record) {
                Some((key, uploaded)) => {
                    ledger.entries.insert(key, uploaded);
                }
                None if record.trim().is_empty() => {}
                None => {
                    warn!(
                        "Skipping malformed ledger line {} in {}",
                        pending_line,
                        path.display()
                    );
                    skipped += 1;
                }
            }
        }
        if !pending.is_empty() {
            warn!(
                "Skipping unterminated ledger record at line {} in {}",
                pending_line,
                path.display()
            );
            skipped += 1;
        }

        info!(
            "Loaded {} ledger entries from {} ({} skipped)",
            ledger.entries.len(),
            path.display(),
            skipped
        );
        Ok(ledger)
    }

    pub fn contains(&self, key: &IdentityKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &IdentityKey) -> Option<&Path> {
        self.entries.get(key).map(PathBuf::as_path)
    }

    /// Persist `key → uploaded` and then index it.
    ///
    /// The record is synced to disk before the in-memory map changes, so a
    /// failed write never leaves the file counted as uploaded.
    pub fn record(&mut self, key: IdentityKey, uploaded: &Path) -> Result<(), Error> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let mut writer = WriterBuilder::new()
            .has_headers(false)
            .terminator(Terminator::Any(b'\n'))
            .from_writer(file);

        let size = key.size.to_string();
        let uploaded_str = uploaded.to_string_lossy();
        writer.write_record([key.file_name.as_str(), size.as_str(), &*uploaded_str])?;

        let file = writer.into_inner().map_err(|err| err.into_error())?;
        file.sync_data()?;

        debug!("Ledger recorded {} -> {}", key, uploaded.display());
        self.entries.insert(key, uploaded.to_path_buf());
        Ok(())
    }

    /// Drop every entry, on disk and in memory.
    pub fn reset(&mut self) -> io::Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(err),
        }
        self.entries.clear();
        info!("Ledger {} cleared", self.path.display());
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// One `file_name,size,path` CSV record.
fn parse_record(text: &str) -> Option<(IdentityKey, PathBuf)> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());
    let mut record = StringRecord::new();
    if !reader.read_record(&mut record).ok()? || record.len() != 3 {
        return None;
    }
    let size = record[1].parse::<u64>().ok()?;
    Some((IdentityKey::new(&record[0], size), PathBuf::from(&record[2])))
}

/// `name,size#~^^^~#path`, as written by the original tool.
///
/// A line that also reads as a current record is left to `parse_record`.
fn parse_legacy_line(line: &str) -> Option<(IdentityKey, PathBuf)> {
    if !line.contains(LEGACY_DELIMITER) || parse_record(line).is_some() {
        return None;
    }
    let mut parts = line.split(LEGACY_DELIMITER);
    let (key, uploaded) = (parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }
    let (name, size) = key.rsplit_once(',')?;
    let size = size.parse::<u64>().ok()?;
    Some((IdentityKey::new(name, size), PathBuf::from(uploaded.trim_end())))
}
