//! Caching session driver.
//!
//! Runs one complete session over an initialized [`CacheTable`]: the
//! maintenance daemon refills the staging area while `consumers` worker
//! threads take staged files, hand them to a [`FileHandler`], and report
//! them done. When the cache drains every thread is joined and the staging
//! root is torn down.

use crate::cache::{CacheError, CacheStats, CacheTable, MaintenanceDaemon};
use crate::log::Logger;
use crate::{log_info, log_warn};
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Error returned by a [`FileHandler`].
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Processes one staged file.
pub trait FileHandler: Send + Sync {
    fn handle(&self, staged: &Path) -> Result<(), HandlerError>;
}

impl<F> FileHandler for F
where
    F: Fn(&Path) -> Result<(), HandlerError> + Send + Sync,
{
    fn handle(&self, staged: &Path) -> Result<(), HandlerError> {
        self(staged)
    }
}

/// Session tuning.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Number of consumer threads (at least one is always started)
    pub consumers: usize,
    /// How long a consumer waits for a staged file before re-checking
    pub consumer_wait: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            consumers: 1,
            consumer_wait: Duration::from_millis(250),
        }
    }
}

/// Outcome of a completed session.
#[derive(Debug, Clone)]
pub struct SessionReport {
    /// Files the handler accepted
    pub processed: u64,
    /// Files the handler failed on (still reclaimed)
    pub failed: u64,
    pub stats: CacheStats,
}

#[derive(Default)]
struct Counters {
    processed: AtomicU64,
    failed: AtomicU64,
}

/// Run `table` to completion with `handler`, then tear it down.
///
/// Handler failures (errors or panics) are logged and counted; the file is
/// reported done regardless. A fatal cache error from the maintenance loop
/// stops the consumers and is returned once every thread has exited. The
/// staging root is torn down in both cases.
pub fn run_session(
    table: CacheTable,
    options: SessionOptions,
    handler: Arc<dyn FileHandler>,
    logger: Arc<dyn Logger>,
) -> Result<SessionReport, CacheError> {
    let table = Arc::new(table);
    let counters = Arc::new(Counters::default());
    let consumers = options.consumers.max(1);

    log_info!(
        logger,
        "Starting session: {} consumer(s), budget {} bytes",
        consumers,
        table.capacity_bytes()
    );

    let daemon = MaintenanceDaemon::start(Arc::clone(&table))?;
    let stop = Arc::new(AtomicBool::new(false));

    let mut workers = Vec::with_capacity(consumers);
    let mut first_error = None;
    for id in 0..consumers {
        let table = Arc::clone(&table);
        let handler = Arc::clone(&handler);
        let counters = Arc::clone(&counters);
        let logger = Arc::clone(&logger);
        let stop = Arc::clone(&stop);
        let wait = options.consumer_wait;
        let spawned = thread::Builder::new()
            .name(format!("stagecache-consumer-{}", id))
            .spawn(move || {
                let worker = Consumer {
                    table: &table,
                    handler: handler.as_ref(),
                    counters: &counters,
                    logger: logger.as_ref(),
                    stop: &stop,
                };
                worker.run(wait)
            });
        match spawned {
            Ok(handle) => workers.push(handle),
            Err(e) => {
                first_error = Some(CacheError::Spawn(e));
                break;
            }
        }
    }

    if workers.is_empty() {
        // Nothing would ever be reported done, so drop the remaining work
        // and let the daemon reclaim what is staged before tearing down.
        let error = first_error.unwrap_or(CacheError::LockPoisoned);
        return Err(abort_without_consumers(table, daemon, error, logger.as_ref()));
    }

    // The daemon returns once the cache is drained or on a fatal error.
    // In the error case consumers would otherwise wait forever.
    if let Err(e) = daemon.join() {
        stop.store(true, Ordering::SeqCst);
        first_error.get_or_insert(e);
    }
    for worker in workers {
        let result = worker.join().unwrap_or(Err(CacheError::LockPoisoned));
        if let Err(e) = result {
            first_error.get_or_insert(e);
        }
    }

    let stats = table.stats();
    let teardown = CacheTable::shutdown_shared(table);

    if let Some(e) = first_error {
        if let Err(cleanup) = teardown {
            log_warn!(logger, "Teardown after failure also failed: {}", cleanup);
        }
        return Err(e);
    }
    teardown?;
    let stats = stats?;

    let report = SessionReport {
        processed: counters.processed.load(Ordering::Relaxed),
        failed: counters.failed.load(Ordering::Relaxed),
        stats,
    };
    log_info!(
        logger,
        "Session complete: {} processed, {} failed, {} bytes staged",
        report.processed,
        report.failed,
        report.stats.bytes_staged
    );
    Ok(report)
}

/// Drain and tear down a session that has no consumers. Returns `error`.
fn abort_without_consumers(
    table: Arc<CacheTable>,
    daemon: MaintenanceDaemon,
    error: CacheError,
    logger: &dyn Logger,
) -> CacheError {
    log_warn!(logger, "No consumer could be started: {}", error);
    if let Err(e) = table.abandon() {
        log_warn!(logger, "Abandoning staged work failed: {}", e);
        return error;
    }
    if let Err(e) = daemon.join() {
        log_warn!(logger, "Maintenance failed while draining: {}", e);
    }
    if let Err(e) = CacheTable::shutdown_shared(table) {
        log_warn!(logger, "Teardown after failure also failed: {}", e);
    }
    error
}

struct Consumer<'a> {
    table: &'a CacheTable,
    handler: &'a dyn FileHandler,
    counters: &'a Counters,
    logger: &'a dyn Logger,
    stop: &'a AtomicBool,
}

impl Consumer<'_> {
    fn run(&self, wait: Duration) -> Result<(), CacheError> {
        while !self.stop.load(Ordering::SeqCst) {
            match self.table.wait_for_next(wait)? {
                Some(staged) => {
                    self.process(&staged);
                    self.table.report_done(&staged)?;
                }
                None => {
                    if self.table.is_empty()? {
                        return Ok(());
                    }
                }
            }
        }
        Ok(())
    }

    fn process(&self, staged: &Path) {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.handler.handle(staged)));
        match outcome {
            Ok(Ok(())) => {
                self.counters.processed.fetch_add(1, Ordering::Relaxed);
            }
            Ok(Err(e)) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                log_warn!(self.logger, "Processing {} failed: {}", staged.display(), e);
            }
            Err(_) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                log_warn!(self.logger, "Handler panicked on {}", staged.display());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheTableConfig, FixedCapacity};
    use crate::log::NoOpLogger;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn build_table(temp: &TempDir, sizes: &[usize], available: u64) -> CacheTable {
        let files: Vec<_> = sizes
            .iter()
            .enumerate()
            .map(|(i, size)| {
                let path = temp.path().join(format!("part-{:02}.bin", i));
                fs::write(&path, vec![i as u8; *size]).unwrap();
                path
            })
            .collect();
        let config = CacheTableConfig::new(temp.path().join("stage"))
            .with_poll_interval(Duration::from_millis(10));
        CacheTable::builder(config)
            .with_probe(Arc::new(FixedCapacity(available)))
            .with_logger(Arc::new(NoOpLogger))
            .initialize(files)
            .unwrap()
    }

    fn fast_options(consumers: usize) -> SessionOptions {
        SessionOptions {
            consumers,
            consumer_wait: Duration::from_millis(10),
        }
    }

    #[test]
    fn test_session_processes_every_file_once() {
        let temp = TempDir::new().unwrap();
        let table = build_table(&temp, &[100; 10], 600);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let handler = {
            let seen = Arc::clone(&seen);
            move |staged: &Path| -> Result<(), HandlerError> {
                assert_eq!(fs::metadata(staged)?.len(), 100);
                seen.lock().unwrap().push(staged.to_path_buf());
                Ok(())
            }
        };

        let report = run_session(
            table,
            fast_options(3),
            Arc::new(handler),
            Arc::new(NoOpLogger),
        )
        .unwrap();

        assert_eq!(report.processed, 10);
        assert_eq!(report.failed, 0);
        assert_eq!(report.stats.files_staged, 10);
        assert_eq!(report.stats.files_reclaimed, 10);
        assert!(report.stats.peak_resident_bytes <= 300);

        let mut seen = seen.lock().unwrap().clone();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 10);
        assert!(!temp.path().join("stage").exists());
    }

    #[test]
    fn test_handler_failures_are_counted_and_reclaimed() {
        let temp = TempDir::new().unwrap();
        let table = build_table(&temp, &[10, 10, 10, 10], 1000);
        let handler = |staged: &Path| -> Result<(), HandlerError> {
            let name = staged.file_name().unwrap().to_string_lossy();
            if name.ends_with("01.bin") || name.ends_with("03.bin") {
                Err("consumer rejected file".into())
            } else {
                Ok(())
            }
        };

        let report = run_session(
            table,
            fast_options(1),
            Arc::new(handler),
            Arc::new(NoOpLogger),
        )
        .unwrap();

        assert_eq!(report.processed, 2);
        assert_eq!(report.failed, 2);
        assert_eq!(report.stats.files_reclaimed, 4);
    }

    #[test]
    fn test_handler_panic_counts_as_failure() {
        let temp = TempDir::new().unwrap();
        let table = build_table(&temp, &[10, 10], 1000);
        let handler = |staged: &Path| -> Result<(), HandlerError> {
            if staged.ends_with("part-00.bin") {
                panic!("decoder crashed");
            }
            Ok(())
        };

        let report = run_session(
            table,
            fast_options(1),
            Arc::new(handler),
            Arc::new(NoOpLogger),
        )
        .unwrap();

        assert_eq!(report.processed, 1);
        assert_eq!(report.failed, 1);
    }

    #[test]
    fn test_maintenance_failure_stops_consumers_and_tears_down() {
        let temp = TempDir::new().unwrap();
        let table = build_table(&temp, &[10, 10, 10], 1000);
        // Deleting the staged copy behind the cache's back makes reclaim fail.
        let handler = |staged: &Path| -> Result<(), HandlerError> {
            fs::remove_file(staged)?;
            Ok(())
        };

        let result = run_session(
            table,
            fast_options(2),
            Arc::new(handler),
            Arc::new(NoOpLogger),
        );

        assert!(matches!(
            result,
            Err(CacheError::Io {
                op: crate::cache::StorageOp::RemoveFile,
                ..
            })
        ));
        assert!(!temp.path().join("stage").exists());
    }

    #[test]
    fn test_abort_without_consumers_tears_down() {
        let temp = TempDir::new().unwrap();
        let table = Arc::new(build_table(&temp, &[200, 200, 200], 600));
        assert_eq!(table.backlog_len().unwrap(), 2);
        let daemon = MaintenanceDaemon::start(Arc::clone(&table)).unwrap();

        let error = abort_without_consumers(
            table,
            daemon,
            CacheError::Spawn(std::io::Error::new(
                std::io::ErrorKind::WouldBlock,
                "thread limit reached",
            )),
            &NoOpLogger,
        );

        assert!(matches!(error, CacheError::Spawn(_)));
        assert!(!temp.path().join("stage").exists());
    }

    #[test]
    fn test_zero_consumers_still_starts_one() {
        let temp = TempDir::new().unwrap();
        let table = build_table(&temp, &[5, 5], 1000);
        let handler = |_: &Path| -> Result<(), HandlerError> { Ok(()) };

        let report = run_session(
            table,
            fast_options(0),
            Arc::new(handler),
            Arc::new(NoOpLogger),
        )
        .unwrap();

        assert_eq!(report.processed, 2);
    }

    #[test]
    fn test_default_options() {
        let options = SessionOptions::default();
        assert_eq!(options.consumers, 1);
        assert_eq!(options.consumer_wait, Duration::from_millis(250));
    }
}
