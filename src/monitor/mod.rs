//! Job completion monitor.
//!
//! Observes the log files that externally launched jobs write, decides when
//! each has stopped producing output, and classifies the result. No process
//! handle is involved: completion is inferred from the filesystem alone.
//!
//! # Architecture
//!
//! ```text
//! JobRegistry → LogWatcher (exists? → size stable?) → OutcomeClassifier → MonitorReport
//! ```
//!
//! - A job whose directory is gone is skipped before any waiting.
//! - A log that never appears is waited on indefinitely.
//! - A log that keeps growing past the job's timeout is `Incomplete`.
//! - A stable log is classified from its last ten lines.
//!
//! # Example
//!
//! ```ignore
//! use jobwatch::monitor::{JobHandle, JobMonitor, JobRegistry, MonitorConfig};
//!
//! let mut registry = JobRegistry::new();
//! registry.push(JobHandle::in_dir("./batch/gradient_casscf", "tc.out"));
//!
//! let monitor = JobMonitor::new(&MonitorConfig::from_env()?)?;
//! let report = monitor.run(&registry).await;
//! println!("{} failed, {} errored", report.failed().len(), report.errored().len());
//! ```

pub mod batch;
pub mod classifier;
pub mod config;
pub mod logfile;
pub mod markers;
pub mod poll;
pub mod registry;
pub mod watcher;

pub use batch::{Disposition, JobMonitor, JobReport, MonitorReport, SkipReason};
pub use classifier::{classify_file, Outcome, OutcomeClassifier};
pub use config::{MonitorConfig, MonitorOverrides};
pub use markers::{LogMarkers, MarkerConfig, MarkerHits};
pub use poll::{Deadline, Poller};
pub use registry::{JobHandle, JobRegistry};
pub use watcher::{LogWatcher, Stabilization};
