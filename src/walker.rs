use glob::Pattern;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

/// One entry produced by the walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkEntry {
    pub path: PathBuf,
    pub is_dir: bool,
    /// Zero for directories.
    pub size: u64,
}

/// Pre-order, name-sorted traversal of everything below `root`.
///
/// Children of a directory are visited in byte order of their names and a
/// subdirectory is exhausted before its next sibling, so two walks over the
/// same tree yield the same sequence. The root itself is not yielded.
///
/// Unreadable entries are logged, counted and skipped; the walk carries on.
pub struct Walker {
    root: PathBuf,
    follow_symlinks: bool,
    ignore_patterns: Vec<Pattern>,
    errors: usize,
    symlinks: usize,
    iter: Option<walkdir::IntoIter>,
}

impl Walker {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            follow_symlinks: false,
            ignore_patterns: Vec::new(),
            errors: 0,
            symlinks: 0,
            iter: None,
        }
    }

    pub fn follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    /// Skip files and prune directories whose full path matches any glob.
    pub fn ignore_patterns(mut self, globs: &[String]) -> Self {
        self.ignore_patterns = globs
            .iter()
            .filter_map(|glob| match Pattern::new(glob) {
                Ok(p) => Some(p),
                Err(e) => {
                    error!("Invalid glob pattern '{}': {}", glob, e);
                    None
                }
            })
            .collect();
        self
    }

    /// Entries that could not be read so far.
    pub fn error_count(&self) -> usize {
        self.errors
    }

    /// Symlinks passed over because `follow_symlinks` is off.
    pub fn symlink_count(&self) -> usize {
        self.symlinks
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Iterator for Walker {
    type Item = WalkEntry;

    fn next(&mut self) -> Option<WalkEntry> {
        let (root, follow) = (&self.root, self.follow_symlinks);
        let iter = self.iter.get_or_insert_with(|| {
            WalkDir::new(root)
                .min_depth(1)
                .follow_links(follow)
                .sort_by_file_name()
                .into_iter()
        });

        loop {
            let entry = match iter.next()? {
                Ok(entry) => entry,
                Err(err) => {
                    let at = err
                        .path()
                        .map(|p| p.display().to_string())
                        .unwrap_or_default();
                    warn!("Skipping unreadable entry {}: {}", at, err);
                    self.errors += 1;
                    continue;
                }
            };

            let file_type = entry.file_type();

            if matches_any(&self.ignore_patterns, entry.path()) {
                debug!("Ignoring {} (pattern match)", entry.path().display());
                if file_type.is_dir() {
                    iter.skip_current_dir();
                }
                continue;
            }

            if file_type.is_symlink() {
                info!(
                    "Skipping symlink {} (enable follow_symlinks to upload through links)",
                    entry.path().display()
                );
                self.symlinks += 1;
                continue;
            }

            if file_type.is_dir() {
                return Some(WalkEntry {
                    path: entry.into_path(),
                    is_dir: true,
                    size: 0,
                });
            }

            if !file_type.is_file() {
                debug!("Skipping special file {}", entry.path().display());
                continue;
            }

            let size = match entry.metadata() {
                Ok(metadata) => metadata.len(),
                Err(err) => {
                    warn!("Error getting metadata for {}: {}", entry.path().display(), err);
                    self.errors += 1;
                    continue;
                }
            };

            return Some(WalkEntry {
                path: entry.into_path(),
                is_dir: false,
                size,
            });
        }
    }
}

fn matches_any(patterns: &[Pattern], path: &Path) -> bool {
    patterns.iter().any(|pattern| pattern.matches_path(path))
}
