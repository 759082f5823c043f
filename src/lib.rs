//! jobwatch: completion monitoring and quarantine for batches of
//! externally launched computational jobs.
//!
//! Jobs are observed only through the log files they write. A job is done
//! once its log stops growing, its outcome is read from the log's last
//! lines, and failed dependent jobs are moved aside together with the
//! parent jobs they were derived from.

pub mod cli;
pub mod error;
pub mod monitor;
pub mod pipeline;
pub mod quarantine;

// Re-export commonly used error types
pub use error::{ConfigError, LaunchError, MonitorError, QuarantineError};
