//! Storage collaborators of the cache table.
//!
//! The table owns no I/O logic of its own. Everything it does to disk goes
//! through [`StagingStorage`] and the single budget reading comes from a
//! [`CapacityProbe`], so tests can substitute either.

use crate::cache::types::{CacheError, StorageOp};
use std::fs::{self, File};
use std::io;
use std::path::Path;

/// Reports free bytes on the filesystem holding a path.
pub trait CapacityProbe: Send + Sync {
    fn available_bytes(&self, path: &Path) -> Result<u64, CacheError>;
}

/// Filesystem primitives used by the cache table.
pub trait StagingStorage: Send + Sync {
    /// Remove `dir` and everything below it (if present), then create it empty.
    fn recreate_dir(&self, dir: &Path) -> Result<(), CacheError>;

    /// Remove `dir` and everything below it.
    fn remove_dir_all(&self, dir: &Path) -> Result<(), CacheError>;

    /// Size of a file in bytes.
    fn file_size(&self, path: &Path) -> Result<u64, CacheError>;

    /// Copy `src` to `dst`. The copy is durable once this returns `Ok`.
    fn copy_file(&self, src: &Path, dst: &Path) -> Result<(), CacheError>;

    fn remove_file(&self, path: &Path) -> Result<(), CacheError>;
}

/// Probe backed by `statvfs` (via `fs2`).
#[derive(Debug, Clone, Copy, Default)]
pub struct FsCapacityProbe;

impl CapacityProbe for FsCapacityProbe {
    fn available_bytes(&self, path: &Path) -> Result<u64, CacheError> {
        fs2::available_space(path).map_err(|e| CacheError::io(StorageOp::Probe, path, e))
    }
}

/// Probe that always reports the same number of bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedCapacity(pub u64);

impl CapacityProbe for FixedCapacity {
    fn available_bytes(&self, _path: &Path) -> Result<u64, CacheError> {
        Ok(self.0)
    }
}

/// [`StagingStorage`] on the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalStorage;

impl StagingStorage for LocalStorage {
    fn recreate_dir(&self, dir: &Path) -> Result<(), CacheError> {
        match fs::remove_dir_all(dir) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(CacheError::io(StorageOp::RemoveDir, dir, e)),
        }
        fs::create_dir_all(dir).map_err(|e| CacheError::io(StorageOp::CreateDir, dir, e))
    }

    fn remove_dir_all(&self, dir: &Path) -> Result<(), CacheError> {
        fs::remove_dir_all(dir).map_err(|e| CacheError::io(StorageOp::RemoveDir, dir, e))
    }

    fn file_size(&self, path: &Path) -> Result<u64, CacheError> {
        fs::metadata(path)
            .map(|m| m.len())
            .map_err(|e| CacheError::io(StorageOp::Stat, path, e))
    }

    fn copy_file(&self, src: &Path, dst: &Path) -> Result<(), CacheError> {
        let copy = || -> io::Result<()> {
            let mut input = File::open(src)?;
            let mut output = File::create(dst)?;
            io::copy(&mut input, &mut output)?;
            output.sync_all()
        };
        copy().map_err(|e| CacheError::io(StorageOp::Copy, src, e))
    }

    fn remove_file(&self, path: &Path) -> Result<(), CacheError> {
        fs::remove_file(path).map_err(|e| CacheError::io(StorageOp::RemoveFile, path, e))
    }
}
