//! CLI command implementations.
//!
//! - [`run`] - Stage a backlog and run a command on every staged file
//! - [`probe`] - Report free space and budget for a staging directory
//! - [`config`] - Configuration management (path, show, init)

pub mod config;
pub mod probe;
pub mod run;
