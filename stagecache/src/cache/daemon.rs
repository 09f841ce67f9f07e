//! Background thread running the cache table's maintenance loop.
//!
//! The daemon owns an `Arc` to the table and runs
//! [`CacheTable::run_maintenance`] until the backlog and resident set are
//! both empty. There is no early stop: the thread ends when the cache is
//! drained or the loop hits a fatal storage error.

use crate::cache::table::CacheTable;
use crate::cache::types::CacheError;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

const THREAD_NAME: &str = "stagecache-maintenance";

/// Handle to the maintenance thread.
pub struct MaintenanceDaemon {
    thread_handle: JoinHandle<Result<(), CacheError>>,
}

impl MaintenanceDaemon {
    /// Spawn the maintenance thread for `table`.
    ///
    /// ```ignore
    /// let table = Arc::new(CacheTable::builder(config).initialize(files)?);
    /// let daemon = MaintenanceDaemon::start(Arc::clone(&table))?;
    /// // ... consumers call table.acquire_next() / table.report_done() ...
    /// daemon.join()?;
    /// CacheTable::shutdown_shared(table)?;
    /// ```
    pub fn start(table: Arc<CacheTable>) -> Result<Self, CacheError> {
        let thread_handle = thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || table.run_maintenance())
            .map_err(CacheError::Spawn)?;

        Ok(Self { thread_handle })
    }

    /// True until the maintenance loop has returned.
    pub fn is_running(&self) -> bool {
        !self.thread_handle.is_finished()
    }

    /// Wait for the cache to drain and return the loop's result.
    ///
    /// A panic inside the loop is reported as [`CacheError::LockPoisoned`]:
    /// the table state it was mutating can no longer be trusted.
    pub fn join(self) -> Result<(), CacheError> {
        self.thread_handle
            .join()
            .map_err(|_| CacheError::LockPoisoned)?
    }
}

impl std::fmt::Debug for MaintenanceDaemon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MaintenanceDaemon")
            .field("running", &self.is_running())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::storage::FixedCapacity;
    use crate::cache::types::CacheTableConfig;
    use crate::log::NoOpLogger;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    fn table_with_files(temp: &TempDir, count: usize) -> Arc<CacheTable> {
        let files: Vec<_> = (0..count)
            .map(|i| {
                let path = temp.path().join(format!("src-{}.raw", i));
                fs::write(&path, vec![0u8; 100]).unwrap();
                path
            })
            .collect();
        let config = CacheTableConfig::new(temp.path().join("stage"))
            .with_poll_interval(Duration::from_millis(10));
        Arc::new(
            CacheTable::builder(config)
                .with_probe(Arc::new(FixedCapacity(400)))
                .with_logger(Arc::new(NoOpLogger))
                .initialize(files)
                .unwrap(),
        )
    }

    #[test]
    fn test_daemon_runs_until_drained() {
        let temp = TempDir::new().unwrap();
        let table = table_with_files(&temp, 5);
        let daemon = MaintenanceDaemon::start(Arc::clone(&table)).unwrap();
        assert!(daemon.is_running());

        let mut processed = 0;
        while !table.is_empty().unwrap() {
            if let Some(path) = table.wait_for_next(Duration::from_millis(20)).unwrap() {
                table.report_done(path).unwrap();
                processed += 1;
            }
        }

        daemon.join().unwrap();
        assert_eq!(processed, 5);
        CacheTable::shutdown_shared(table).unwrap();
        assert!(!temp.path().join("stage").exists());
    }

    #[test]
    fn test_daemon_keeps_running_while_work_pending() {
        let temp = TempDir::new().unwrap();
        let table = table_with_files(&temp, 5);
        let daemon = MaintenanceDaemon::start(Arc::clone(&table)).unwrap();

        thread::sleep(Duration::from_millis(100));
        assert!(daemon.is_running());
        assert_eq!(table.resident_len().unwrap(), 4);
        assert_eq!(table.backlog_len().unwrap(), 1);

        while let Some(path) = table.acquire_next().unwrap() {
            table.report_done(path).unwrap();
        }
        // The fifth file is admitted once the first four are reclaimed.
        while !table.is_empty().unwrap() {
            if let Some(path) = table.wait_for_next(Duration::from_millis(20)).unwrap() {
                table.report_done(path).unwrap();
            }
        }
        daemon.join().unwrap();
    }

    #[test]
    fn test_debug_shows_liveness() {
        let temp = TempDir::new().unwrap();
        let table = table_with_files(&temp, 1);
        let daemon = MaintenanceDaemon::start(Arc::clone(&table)).unwrap();
        assert!(format!("{:?}", daemon).starts_with("MaintenanceDaemon"));

        let path = table.wait_for_next(Duration::from_secs(1)).unwrap().unwrap();
        table.report_done(path).unwrap();
        daemon.join().unwrap();
    }
}
