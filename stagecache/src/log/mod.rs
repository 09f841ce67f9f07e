//! Logging seam for the staging cache.
//!
//! The cache engine never talks to `tracing` directly. Every component that
//! emits diagnostics holds an `Arc<dyn Logger>`:
//!
//! - [`Logger`]: the trait the cache table, daemon and session log through
//! - [`TracingLogger`]: production adapter forwarding to `tracing`
//! - [`NoOpLogger`]: discards everything (tests, benchmarks)
//!
//! ```
//! use stagecache::log::{Logger, NoOpLogger};
//! use stagecache::log_info;
//! use std::sync::Arc;
//!
//! let logger: Arc<dyn Logger> = Arc::new(NoOpLogger);
//! log_info!(logger, "Caching: {}", "scan-0001.raw");
//! ```

mod noop;
mod tracing_adapter;
mod r#trait;

pub use noop::NoOpLogger;
pub use r#trait::{LogLevel, Logger};
pub use tracing_adapter::TracingLogger;
