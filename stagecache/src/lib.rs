//! stagecache - bounded staging of files onto fast storage
//!
//! Copies a backlog of source files into a staging directory (typically a
//! RAM disk) ahead of consumers, never exceeding a byte budget derived from
//! the free space there. Consumers claim staged copies, process them, and
//! report them done; finished copies are reclaimed to make room for more.
//!
//! # High-Level API
//!
//! ```no_run
//! use stagecache::cache::{CacheTable, CacheTableConfig};
//! use stagecache::log::TracingLogger;
//! use stagecache::session::{run_session, HandlerError, SessionOptions};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! let table = CacheTable::builder(CacheTableConfig::default())
//!     .initialize(vec!["/data/a.raw", "/data/b.raw"])?;
//!
//! let handler = |staged: &Path| -> Result<(), HandlerError> {
//!     println!("processing {}", staged.display());
//!     Ok(())
//! };
//!
//! let report = run_session(
//!     table,
//!     SessionOptions::default(),
//!     Arc::new(handler),
//!     Arc::new(TracingLogger),
//! )?;
//! println!("{} files processed", report.processed);
//! # Ok::<(), stagecache::cache::CacheError>(())
//! ```

pub mod cache;
pub mod config;
pub mod log;
pub mod logging;
pub mod session;

/// Version of the stagecache library and CLI.
///
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
