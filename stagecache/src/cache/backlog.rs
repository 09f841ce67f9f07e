//! Ordered queue of source files waiting to be staged.

use std::collections::{HashSet, VecDeque};
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

/// Source paths not yet staged, earliest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Backlog {
    paths: VecDeque<PathBuf>,
}

/// Result of deduplicating a caller-supplied file list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deduplicated {
    pub backlog: Backlog,
    /// Paths dropped because an earlier path had the same base file name
    pub dropped: Vec<PathBuf>,
}

impl Backlog {
    /// Build a backlog keeping the first path for every base file name.
    ///
    /// Staged copies live side by side under their base name, so two sources
    /// sharing a name cannot both be resident; the later one is dropped.
    /// Paths without a file name are kept and rejected when staged.
    pub fn deduplicated<I, P>(paths: I) -> Deduplicated
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let mut seen: HashSet<OsString> = HashSet::new();
        let mut kept = VecDeque::new();
        let mut dropped = Vec::new();

        for path in paths {
            let path = path.into();
            let duplicate = path
                .file_name()
                .is_some_and(|name| !seen.insert(name.to_os_string()));
            if duplicate {
                dropped.push(path);
            } else {
                kept.push_back(path);
            }
        }

        Deduplicated {
            backlog: Backlog { paths: kept },
            dropped,
        }
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Next path in admission order.
    pub fn front(&self) -> Option<&Path> {
        self.paths.front().map(PathBuf::as_path)
    }

    pub(crate) fn pop_front(&mut self) -> Option<PathBuf> {
        self.paths.pop_front()
    }

    /// Drop every queued path whose base name is `name`. Order of the rest is kept.
    pub(crate) fn remove_named(&mut self, name: &OsStr) -> usize {
        let before = self.paths.len();
        self.paths.retain(|p| p.file_name() != Some(name));
        before - self.paths.len()
    }

    /// Drop every queued path. Returns how many there were.
    pub(crate) fn clear(&mut self) -> usize {
        let dropped = self.paths.len();
        self.paths.clear();
        dropped
    }

    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.paths.iter().map(PathBuf::as_path)
    }
}
