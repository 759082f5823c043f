//! Outcome classification from the tail of a stabilized log.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::MonitorError;

use super::logfile::{self, TAIL_WINDOW};
use super::markers::{LogMarkers, MarkerHits};

/// Final state of a monitored job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Both success markers were found in the tail.
    Success,
    /// The error pattern was found and success was not.
    Error,
    /// Neither, or the log never stabilized.
    Incomplete,
}

impl Outcome {
    /// Decision table, evaluated in order: success wins over error, and
    /// anything else is incomplete.
    pub fn from_hits(hits: &MarkerHits) -> Self {
        if hits.is_success() {
            Outcome::Success
        } else if hits.error {
            Outcome::Error
        } else {
            Outcome::Incomplete
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Success => write!(f, "success"),
            Outcome::Error => write!(f, "error"),
            Outcome::Incomplete => write!(f, "incomplete"),
        }
    }
}

/// Classifies logs by scanning their trailing window.
#[derive(Debug, Clone, Default)]
pub struct OutcomeClassifier {
    markers: LogMarkers,
}

impl OutcomeClassifier {
    pub fn new(markers: LogMarkers) -> Self {
        Self { markers }
    }

    pub fn markers(&self) -> &LogMarkers {
        &self.markers
    }

    /// Reads the last lines of `path` and applies the decision table.
    ///
    /// Markers earlier in the file are ignored: a job that printed an error
    /// mid-run and then finished normally is a success.
    pub fn classify(&self, path: &Path) -> Result<Outcome, MonitorError> {
        let tail = logfile::tail_lines(path, TAIL_WINDOW)
            .map_err(|e| MonitorError::from_io(path, e))?;

        debug!(
            "Tail of {}:\n{}\n--- End of tail ---",
            path.display(),
            tail.join("\n")
        );

        let hits = self.markers.scan(tail.iter().map(String::as_str));
        debug!(
            "Markers in {}: processing_time={} job_finished={} error={}",
            path.display(),
            hits.processing_time,
            hits.job_finished,
            hits.error
        );

        let outcome = Outcome::from_hits(&hits);
        info!("{} classified as {}", path.display(), outcome);
        Ok(outcome)
    }
}

/// Classifies an already-finished log with the default markers.
pub fn classify_file(path: &Path) -> Result<Outcome, MonitorError> {
    OutcomeClassifier::default().classify(path)
}
