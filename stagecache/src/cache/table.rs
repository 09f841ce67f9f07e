//! The cache table: budget accounting, populate/reclaim and the hand-out
//! protocol.
//!
//! # Concurrency
//!
//! All mutable state (resident entries, resident byte total, backlog and
//! statistics) lives behind one `Mutex`. Populate, reclaim, hand-out,
//! completion reports and the emptiness check each hold it for their whole
//! critical section, including the file copies and deletions done by
//! populate and reclaim.
//!
//! A `Condvar` paired with the mutex replaces busy polling: completion
//! reports wake the maintenance loop, and admissions or reclaims wake
//! consumers blocked in [`CacheTable::wait_for_next`].
//!
//! ```text
//!   producer ──files──▶ backlog ──populate──▶ resident ──acquire_next──▶ consumer
//!                                   ▲                                      │
//!                                   └──────── reclaim ◀── report_done ─────┘
//! ```

use crate::cache::backlog::{Backlog, Deduplicated};
use crate::cache::entry::{staged_name, CacheEntry};
use crate::cache::stats::CacheStats;
use crate::cache::storage::{CapacityProbe, FsCapacityProbe, LocalStorage, StagingStorage};
use crate::cache::types::{CacheError, CacheTableConfig};
use crate::log::{Logger, TracingLogger};
use crate::{log_debug, log_info, log_warn};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Shared state guarded by the table lock.
#[derive(Debug, Default)]
struct TableState {
    resident: Vec<CacheEntry>,
    resident_bytes: u64,
    backlog: Backlog,
    stats: CacheStats,
}

impl TableState {
    fn is_empty(&self) -> bool {
        self.resident.is_empty() && self.backlog.is_empty()
    }
}

/// What one reclaim + populate step did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleOutcome {
    pub reclaimed: usize,
    pub admitted: usize,
}

/// Bounded cache of files staged on fast storage.
///
/// Built with [`CacheTable::builder`]. Share it between the maintenance
/// thread and consumers with `Arc`; tear it down with
/// [`CacheTable::shutdown`] once nothing else holds it.
pub struct CacheTable {
    staging_root: PathBuf,
    capacity_bytes: u64,
    poll_interval: Duration,
    state: Mutex<TableState>,
    changed: Condvar,
    storage: Arc<dyn StagingStorage>,
    logger: Arc<dyn Logger>,
}

/// Collects the collaborators of a [`CacheTable`] before initialization.
pub struct CacheTableBuilder {
    config: CacheTableConfig,
    storage: Arc<dyn StagingStorage>,
    probe: Arc<dyn CapacityProbe>,
    logger: Arc<dyn Logger>,
}

impl CacheTableBuilder {
    pub fn with_storage(mut self, storage: Arc<dyn StagingStorage>) -> Self {
        self.storage = storage;
        self
    }

    pub fn with_probe(mut self, probe: Arc<dyn CapacityProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    /// Prepare the cache for `files` and stage the first batch.
    ///
    /// Deduplicates the backlog by base file name, recreates the staging
    /// root from scratch, sets the budget from a single capacity probe and
    /// runs one populate pass.
    ///
    /// # Errors
    ///
    /// [`CacheError::EmptyBacklog`] if no files remain after deduplication;
    /// any storage failure while preparing the root or staging files.
    pub fn initialize<I, P>(self, files: I) -> Result<CacheTable, CacheError>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let Deduplicated { backlog, dropped } = Backlog::deduplicated(files);
        for path in &dropped {
            log_warn!(
                self.logger,
                "Skipping {}: a file with the same name is already queued",
                path.display()
            );
        }
        if backlog.is_empty() {
            return Err(CacheError::EmptyBacklog);
        }

        let root = self.config.staging_root.clone();
        self.storage.recreate_dir(&root)?;

        let available = self.probe.available_bytes(&root)?;
        let capacity_bytes = self.config.budget_for(available);
        log_info!(
            self.logger,
            "Staging cache at {}: {} bytes available, budget {} bytes, {} files queued",
            root.display(),
            available,
            capacity_bytes,
            backlog.len()
        );

        let table = CacheTable {
            staging_root: root,
            capacity_bytes,
            poll_interval: self.config.poll_interval,
            state: Mutex::new(TableState {
                backlog,
                ..TableState::default()
            }),
            changed: Condvar::new(),
            storage: self.storage,
            logger: self.logger,
        };

        if let Err(e) = table.populate() {
            if let Err(cleanup) = table.storage.remove_dir_all(&table.staging_root) {
                log_warn!(table.logger, "Staging root cleanup failed: {}", cleanup);
            }
            return Err(e);
        }

        Ok(table)
    }
}

impl CacheTable {
    /// Start building a table with local storage, a `statvfs` probe and
    /// `tracing` output.
    pub fn builder(config: CacheTableConfig) -> CacheTableBuilder {
        CacheTableBuilder {
            config,
            storage: Arc::new(LocalStorage),
            probe: Arc::new(FsCapacityProbe),
            logger: Arc::new(TracingLogger),
        }
    }

    pub fn staging_root(&self) -> &Path {
        &self.staging_root
    }

    /// Byte budget fixed at initialization.
    pub fn capacity_bytes(&self) -> u64 {
        self.capacity_bytes
    }

    pub fn resident_bytes(&self) -> Result<u64, CacheError> {
        Ok(self.lock()?.resident_bytes)
    }

    pub fn resident_len(&self) -> Result<usize, CacheError> {
        Ok(self.lock()?.resident.len())
    }

    pub fn backlog_len(&self) -> Result<usize, CacheError> {
        Ok(self.lock()?.backlog.len())
    }

    /// Snapshot of the resident entries in admission order.
    pub fn resident_entries(&self) -> Result<Vec<CacheEntry>, CacheError> {
        Ok(self.lock()?.resident.clone())
    }

    /// Snapshot of the backlog in admission order.
    pub fn backlog_paths(&self) -> Result<Vec<PathBuf>, CacheError> {
        Ok(self.lock()?.backlog.iter().map(Path::to_path_buf).collect())
    }

    pub fn stats(&self) -> Result<CacheStats, CacheError> {
        Ok(self.lock()?.stats.clone())
    }

    /// True when nothing is queued and nothing is resident.
    pub fn is_empty(&self) -> Result<bool, CacheError> {
        Ok(self.lock()?.is_empty())
    }

    /// Stage backlog files from the front until the next one does not fit.
    ///
    /// Admission is strictly FIFO: a file that would overflow the budget
    /// blocks everything behind it, even smaller files that would fit.
    /// Returns the number of files admitted.
    ///
    /// # Errors
    ///
    /// Stat or copy failures. [`CacheError::FileExceedsBudget`] if the head
    /// of the backlog cannot fit even with nothing resident, since it would
    /// never be admitted.
    pub fn populate(&self) -> Result<usize, CacheError> {
        let mut state = self.lock()?;
        self.populate_locked(&mut state)
    }

    /// Delete every completed entry's staged file and release its bytes.
    ///
    /// Returns the number of entries reclaimed. A failed deletion aborts the
    /// pass and leaves that entry (and its bytes) accounted.
    pub fn collect_garbage(&self) -> Result<usize, CacheError> {
        let mut state = self.lock()?;
        self.collect_garbage_locked(&mut state)
    }

    /// One maintenance step: reclaim, then populate, under a single lock.
    pub fn run_cycle(&self) -> Result<CycleOutcome, CacheError> {
        let mut state = self.lock()?;
        self.cycle_locked(&mut state)
    }

    /// Drive the cache until the backlog and the resident set are both empty.
    ///
    /// Between cycles the loop sleeps on the table condvar, waking when a
    /// consumer reports a completion or after the poll interval. Blocks the
    /// calling thread; consumers must run concurrently or this never returns.
    pub fn run_maintenance(&self) -> Result<(), CacheError> {
        let mut state = self.lock()?;
        loop {
            if state.is_empty() {
                break;
            }
            let outcome = self.cycle_locked(&mut state)?;
            if outcome != CycleOutcome::default() {
                log_debug!(
                    self.logger,
                    "Maintenance cycle: reclaimed {}, admitted {}, {} / {} bytes in use",
                    outcome.reclaimed,
                    outcome.admitted,
                    state.resident_bytes,
                    self.capacity_bytes
                );
            }
            if state.is_empty() {
                break;
            }
            state = self.wait(state, self.poll_interval)?;
        }
        log_info!(self.logger, "Staging cache drained");
        Ok(())
    }

    /// Hand out the first resident entry nobody has claimed yet.
    ///
    /// Returns `None` when every resident entry is claimed or nothing is
    /// resident; that is not an error, the caller should wait and retry.
    pub fn acquire_next(&self) -> Result<Option<PathBuf>, CacheError> {
        let mut state = self.lock()?;
        Ok(Self::acquire_locked(&mut state))
    }

    /// Like [`acquire_next`](Self::acquire_next) but blocks up to `timeout`
    /// for an entry to become available.
    ///
    /// Returns `None` on timeout, or immediately once the table is empty.
    pub fn wait_for_next(&self, timeout: Duration) -> Result<Option<PathBuf>, CacheError> {
        // A timeout too large to represent as an instant means no deadline.
        let deadline = Instant::now().checked_add(timeout);
        let mut state = self.lock()?;
        loop {
            if let Some(path) = Self::acquire_locked(&mut state) {
                return Ok(Some(path));
            }
            if state.is_empty() {
                return Ok(None);
            }
            state = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Ok(None);
                    }
                    self.wait(state, deadline - now)?
                }
                None => self
                    .changed
                    .wait(state)
                    .map_err(|_| CacheError::LockPoisoned)?,
            };
        }
    }

    /// Mark every resident entry named like `path` as finished.
    ///
    /// Matching is by base file name. Unknown names and the empty path are
    /// accepted silently: the entry may already have been reclaimed. Space
    /// is only released by the next reclaim. Returns the number of entries
    /// marked.
    pub fn report_done(&self, path: impl AsRef<Path>) -> Result<usize, CacheError> {
        let path = path.as_ref();
        let Some(name) = path.file_name() else {
            return Ok(0);
        };

        let mut state = self.lock()?;
        let mut matched = 0;
        for entry in state.resident.iter_mut().filter(|e| e.has_name(name)) {
            entry.mark_done();
            matched += 1;
        }
        state.stats.record_completion(matched > 0);
        drop(state);

        if matched > 0 {
            self.changed.notify_all();
        } else {
            log_debug!(
                self.logger,
                "Completion for {} matched no resident entry",
                path.display()
            );
        }
        Ok(matched)
    }

    /// Give up on the remaining work so the maintenance loop can drain.
    ///
    /// Drops the backlog and marks every resident entry done, claimed or
    /// not; the next reclaim deletes them all. Only safe once no consumer is
    /// still reading a staged file. Returns the number of backlog paths
    /// dropped.
    pub fn abandon(&self) -> Result<usize, CacheError> {
        let mut state = self.lock()?;
        let dropped = state.backlog.clear();
        for entry in state.resident.iter_mut() {
            entry.mark_done();
        }
        drop(state);

        self.changed.notify_all();
        log_warn!(
            self.logger,
            "Abandoning staging cache: {} queued file(s) dropped",
            dropped
        );
        Ok(dropped)
    }

    /// Remove the staging root and everything in it.
    ///
    /// Consumes the table: no operation is valid afterwards.
    pub fn shutdown(self) -> Result<(), CacheError> {
        self.storage.remove_dir_all(&self.staging_root)?;
        log_info!(
            self.logger,
            "Removed staging root {}",
            self.staging_root.display()
        );
        Ok(())
    }

    /// Tear down a table shared through `Arc`.
    ///
    /// Fails with [`CacheError::StillShared`] while any other handle exists.
    pub fn shutdown_shared(table: Arc<CacheTable>) -> Result<(), CacheError> {
        Arc::try_unwrap(table)
            .map_err(|_| CacheError::StillShared)?
            .shutdown()
    }

    fn lock(&self) -> Result<MutexGuard<'_, TableState>, CacheError> {
        self.state.lock().map_err(|_| CacheError::LockPoisoned)
    }

    fn wait<'a>(
        &self,
        guard: MutexGuard<'a, TableState>,
        timeout: Duration,
    ) -> Result<MutexGuard<'a, TableState>, CacheError> {
        self.changed
            .wait_timeout(guard, timeout)
            .map(|(guard, _)| guard)
            .map_err(|_| CacheError::LockPoisoned)
    }

    fn cycle_locked(&self, state: &mut TableState) -> Result<CycleOutcome, CacheError> {
        let reclaimed = self.collect_garbage_locked(state)?;
        let admitted = self.populate_locked(state)?;
        Ok(CycleOutcome {
            reclaimed,
            admitted,
        })
    }

    fn populate_locked(&self, state: &mut TableState) -> Result<usize, CacheError> {
        let mut admitted = 0;

        while let Some(candidate) = state.backlog.front().map(Path::to_path_buf) {
            let size = self.storage.file_size(&candidate)?;
            let fits = state
                .resident_bytes
                .checked_add(size)
                .is_some_and(|total| total <= self.capacity_bytes);
            if !fits {
                if state.resident.is_empty() {
                    return Err(CacheError::FileExceedsBudget {
                        path: candidate,
                        size,
                        capacity: self.capacity_bytes,
                    });
                }
                break;
            }

            let name = staged_name(&candidate)?;
            let staged_path = self.staging_root.join(name);
            self.storage.copy_file(&candidate, &staged_path)?;

            state.resident_bytes += size;
            state.stats.record_staged(size, state.resident_bytes);
            state.resident.push(CacheEntry::new(staged_path, size));
            state.backlog.pop_front();
            admitted += 1;
            log_info!(self.logger, "Caching: {}", name.to_string_lossy());
        }

        if admitted > 0 {
            self.changed.notify_all();
        }
        Ok(admitted)
    }

    fn collect_garbage_locked(&self, state: &mut TableState) -> Result<usize, CacheError> {
        let mut reclaimed = 0;
        let mut index = 0;

        while index < state.resident.len() {
            if !state.resident[index].is_done() {
                index += 1;
                continue;
            }

            self.storage
                .remove_file(state.resident[index].staged_path())?;
            let entry = state.resident.remove(index);
            state.resident_bytes = state.resident_bytes.saturating_sub(entry.size_bytes());
            state.stats.record_reclaimed(entry.size_bytes());
            reclaimed += 1;

            let name = entry
                .staged_path()
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            log_info!(self.logger, "Removed: {} from cache", name);
        }

        if reclaimed > 0 {
            self.changed.notify_all();
        }
        Ok(reclaimed)
    }

    fn acquire_locked(state: &mut TableState) -> Option<PathBuf> {
        let entry = state.resident.iter_mut().find(|e| !e.is_claimed())?;
        entry.claim();
        let path = entry.staged_path().to_path_buf();

        if let Some(name) = path.file_name() {
            state.backlog.remove_named(name);
        }
        state.stats.record_claim();
        Some(path)
    }
}
