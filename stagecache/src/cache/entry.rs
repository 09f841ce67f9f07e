//! Resident cache entries.

use crate::cache::types::CacheError;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

/// Base file name of `path`, the key files are staged and matched under.
pub fn staged_name(path: &Path) -> Result<&OsStr, CacheError> {
    path.file_name()
        .ok_or_else(|| CacheError::InvalidPath(path.to_path_buf()))
}

/// A file currently copied into the staging root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    staged_path: PathBuf,
    size_bytes: u64,
    claimed: bool,
    done: bool,
}

impl CacheEntry {
    pub(crate) fn new(staged_path: PathBuf, size_bytes: u64) -> Self {
        Self {
            staged_path,
            size_bytes,
            claimed: false,
            done: false,
        }
    }

    /// Location of the copy inside the staging root.
    pub fn staged_path(&self) -> &Path {
        &self.staged_path
    }

    /// Bytes charged against the budget for this entry.
    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// True once handed to a consumer. Never reset.
    pub fn is_claimed(&self) -> bool {
        self.claimed
    }

    /// True once the consumer reported the file finished.
    pub fn is_done(&self) -> bool {
        self.done
    }

    pub(crate) fn claim(&mut self) {
        self.claimed = true;
    }

    pub(crate) fn mark_done(&mut self) {
        self.done = true;
    }

    pub(crate) fn has_name(&self, name: &OsStr) -> bool {
        self.staged_path.file_name() == Some(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_entry_is_unclaimed_and_pending() {
        let entry = CacheEntry::new(PathBuf::from("/dev/shm/stage/a.raw"), 300);
        assert!(!entry.is_claimed());
        assert!(!entry.is_done());
        assert_eq!(entry.size_bytes(), 300);
    }

    #[test]
    fn test_name_matching_ignores_directory() {
        let entry = CacheEntry::new(PathBuf::from("/dev/shm/stage/a.raw"), 1);
        assert!(entry.has_name(OsStr::new("a.raw")));
        assert!(!entry.has_name(OsStr::new("a.ra")));
        assert!(!entry.has_name(OsStr::new("stage")));
    }

    #[test]
    fn test_staged_name_rejects_root() {
        assert_eq!(
            staged_name(Path::new("/data/scan.raw")).unwrap(),
            OsStr::new("scan.raw")
        );
        assert!(matches!(
            staged_name(Path::new("/")),
            Err(CacheError::InvalidPath(_))
        ));
        assert!(matches!(
            staged_name(Path::new("/data/..")),
            Err(CacheError::InvalidPath(_))
        ));
    }
}
