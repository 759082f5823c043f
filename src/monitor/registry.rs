//! Job handles and the ordered registry handed to the monitor.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

/// One monitored job: where its log is written and the directory it runs in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobHandle {
    pub log_path: PathBuf,
    pub job_dir: PathBuf,
    /// Prerequisite job directory, when the launcher recorded it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_dir: Option<PathBuf>,
}

impl JobHandle {
    pub fn new(log_path: impl Into<PathBuf>, job_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_path: log_path.into(),
            job_dir: job_dir.into(),
            parent_dir: None,
        }
    }

    /// Handle for a job whose log is `log_name` inside `job_dir`.
    pub fn in_dir(job_dir: impl Into<PathBuf>, log_name: &str) -> Self {
        let job_dir = job_dir.into();
        Self::new(job_dir.join(log_name), job_dir)
    }

    pub fn with_parent(mut self, parent_dir: impl Into<PathBuf>) -> Self {
        self.parent_dir = Some(parent_dir.into());
        self
    }

    /// Base name of the job directory.
    pub fn name(&self) -> String {
        self.job_dir
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| self.job_dir.display().to_string())
    }
}

/// Ordered list of jobs. Order is preserved through monitoring and
/// reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRegistry {
    jobs: Vec<JobHandle>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, handle: JobHandle) {
        self.jobs.push(handle);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, JobHandle> {
        self.jobs.iter()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Registers every immediate subdirectory of `batch_dir` whose name
    /// starts with `token`, sorted by name. Used to re-monitor a batch that
    /// was launched earlier.
    pub fn discover(batch_dir: &Path, token: &str, log_name: &str) -> std::io::Result<Self> {
        let mut dirs = Vec::new();
        for entry in WalkDir::new(batch_dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(std::io::Error::from)?;
            if !entry.file_type().is_dir() {
                continue;
            }
            if entry.file_name().to_string_lossy().starts_with(token) {
                dirs.push(entry.into_path());
            }
        }
        dirs.sort();

        Ok(dirs
            .into_iter()
            .map(|dir| JobHandle::in_dir(dir, log_name))
            .collect())
    }
}

impl FromIterator<JobHandle> for JobRegistry {
    fn from_iter<I: IntoIterator<Item = JobHandle>>(iter: I) -> Self {
        Self {
            jobs: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for JobRegistry {
    type Item = JobHandle;
    type IntoIter = std::vec::IntoIter<JobHandle>;

    fn into_iter(self) -> Self::IntoIter {
        self.jobs.into_iter()
    }
}

impl<'a> IntoIterator for &'a JobRegistry {
    type Item = &'a JobHandle;
    type IntoIter = std::slice::Iter<'a, JobHandle>;

    fn into_iter(self) -> Self::IntoIter {
        self.jobs.iter()
    }
}
