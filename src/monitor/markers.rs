//! Textual markers that decide a job's outcome.

use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::error::MonitorError;

/// Substring emitted once the job reports its wall time.
pub const PROCESSING_TIME_MARKER: &str = "Total processing time";

/// Substring emitted on the job's final line.
pub const JOB_FINISHED_MARKER: &str = "Job finished:";

/// Phrase matched case-insensitively to detect a crashed job.
pub const JOB_TERMINATED_PATTERN: &str = "Job terminated";

static DEFAULT_ERROR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    RegexBuilder::new(JOB_TERMINATED_PATTERN)
        .case_insensitive(true)
        .build()
        .expect("Invalid regex for job terminated pattern")
});

/// Raw marker settings as they appear in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerConfig {
    pub processing_time: String,
    pub job_finished: String,
    pub error_pattern: String,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            processing_time: PROCESSING_TIME_MARKER.to_string(),
            job_finished: JOB_FINISHED_MARKER.to_string(),
            error_pattern: JOB_TERMINATED_PATTERN.to_string(),
        }
    }
}

impl MarkerConfig {
    /// Compiles the configuration into matchable markers.
    pub fn compile(&self) -> Result<LogMarkers, MonitorError> {
        LogMarkers::new(&self.processing_time, &self.job_finished, &self.error_pattern)
    }
}

/// Compiled success markers and error pattern.
///
/// Success is conjunctive: both the processing time and the job finished
/// markers must be present.
#[derive(Debug, Clone)]
pub struct LogMarkers {
    processing_time: String,
    job_finished: String,
    error_pattern: Regex,
}

impl Default for LogMarkers {
    fn default() -> Self {
        Self {
            processing_time: PROCESSING_TIME_MARKER.to_string(),
            job_finished: JOB_FINISHED_MARKER.to_string(),
            error_pattern: DEFAULT_ERROR_PATTERN.clone(),
        }
    }
}

impl LogMarkers {
    /// Builds markers from custom literals. The error pattern is a regular
    /// expression and always matches case-insensitively.
    pub fn new(
        processing_time: &str,
        job_finished: &str,
        error_pattern: &str,
    ) -> Result<Self, MonitorError> {
        if processing_time.is_empty() {
            return Err(MonitorError::EmptyMarker("processing_time"));
        }
        if job_finished.is_empty() {
            return Err(MonitorError::EmptyMarker("job_finished"));
        }
        if error_pattern.is_empty() {
            return Err(MonitorError::EmptyMarker("error_pattern"));
        }

        let error_pattern = RegexBuilder::new(error_pattern)
            .case_insensitive(true)
            .build()
            .map_err(|source| MonitorError::InvalidPattern {
                pattern: error_pattern.to_string(),
                source,
            })?;

        Ok(Self {
            processing_time: processing_time.to_string(),
            job_finished: job_finished.to_string(),
            error_pattern,
        })
    }

    pub fn has_processing_time(&self, line: &str) -> bool {
        line.contains(&self.processing_time)
    }

    pub fn has_job_finished(&self, line: &str) -> bool {
        line.contains(&self.job_finished)
    }

    pub fn has_error(&self, line: &str) -> bool {
        self.error_pattern.is_match(line)
    }

    /// Whether a line carries a terminal banner (finished or terminated).
    ///
    /// Used by the watcher's full-file pre-scan.
    pub fn is_terminal(&self, line: &str) -> bool {
        self.has_job_finished(line) || self.has_error(line)
    }

    /// Scans a window of lines and reports which markers were seen.
    pub fn scan<'a, I>(&self, lines: I) -> MarkerHits
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut hits = MarkerHits::default();
        for line in lines {
            hits.processing_time |= self.has_processing_time(line);
            hits.job_finished |= self.has_job_finished(line);
            hits.error |= self.has_error(line);
        }
        hits
    }
}

/// Markers found in a window of log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerHits {
    pub processing_time: bool,
    pub job_finished: bool,
    pub error: bool,
}

impl MarkerHits {
    pub fn is_success(&self) -> bool {
        self.processing_time && self.job_finished
    }
}
