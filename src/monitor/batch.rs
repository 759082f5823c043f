//! Drives every registered job through stabilize → classify.

use std::path::Path;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{ConfigError, MonitorError};

use super::classifier::{Outcome, OutcomeClassifier};
use super::config::MonitorConfig;
use super::registry::{JobHandle, JobRegistry};
use super::watcher::{LogWatcher, Stabilization};

/// Why a job received no outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The job directory was gone before classification.
    MissingDirectory,
    /// The log disappeared after it had been seen.
    LogNotFound,
    /// The log exists but could not be read.
    LogUnreadable(String),
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::MissingDirectory => write!(f, "job directory missing"),
            SkipReason::LogNotFound => write!(f, "log not found, inspect manually"),
            SkipReason::LogUnreadable(e) => write!(f, "log unreadable ({e}), inspect manually"),
        }
    }
}

/// What happened to one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum Disposition {
    Classified { outcome: Outcome, timed_out: bool },
    Skipped { reason: SkipReason },
}

impl Disposition {
    pub fn outcome(&self) -> Option<Outcome> {
        match self {
            Disposition::Classified { outcome, .. } => Some(*outcome),
            Disposition::Skipped { .. } => None,
        }
    }
}

impl std::fmt::Display for Disposition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Disposition::Classified {
                outcome,
                timed_out: true,
            } => write!(f, "{outcome} (timed out)"),
            Disposition::Classified { outcome, .. } => write!(f, "{outcome}"),
            Disposition::Skipped { reason } => write!(f, "skipped: {reason}"),
        }
    }
}

/// Monitoring result for one job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobReport {
    pub handle: JobHandle,
    pub disposition: Disposition,
    /// Wall time spent on this job, including the wait for its log.
    pub waited_secs: f64,
}

/// Monitoring result for a whole registry, in registry order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub jobs: Vec<JobReport>,
}

impl MonitorReport {
    fn with_outcome(&self, wanted: Outcome) -> Vec<JobHandle> {
        self.jobs
            .iter()
            .filter(|r| r.disposition.outcome() == Some(wanted))
            .map(|r| r.handle.clone())
            .collect()
    }

    /// Jobs that never finished: no markers, or timed out.
    pub fn failed(&self) -> Vec<JobHandle> {
        self.with_outcome(Outcome::Incomplete)
    }

    /// Jobs whose log reports termination.
    pub fn errored(&self) -> Vec<JobHandle> {
        self.with_outcome(Outcome::Error)
    }

    pub fn succeeded(&self) -> Vec<JobHandle> {
        self.with_outcome(Outcome::Success)
    }

    pub fn skipped(&self) -> Vec<&JobReport> {
        self.jobs
            .iter()
            .filter(|r| matches!(r.disposition, Disposition::Skipped { .. }))
            .collect()
    }
}

/// Runs the watcher and classifier over a registry.
#[derive(Debug, Clone)]
pub struct JobMonitor {
    watcher: LogWatcher,
    classifier: OutcomeClassifier,
    parallel: usize,
}

impl JobMonitor {
    /// Builds a monitor from validated configuration.
    pub fn new(config: &MonitorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let markers = config.markers.compile()?;
        Ok(Self {
            watcher: LogWatcher::new(config.interval, config.timeout, markers.clone()),
            classifier: OutcomeClassifier::new(markers),
            parallel: config.parallel,
        })
    }

    pub fn classifier(&self) -> &OutcomeClassifier {
        &self.classifier
    }

    /// Monitors every job. With `parallel > 1` jobs are stabilized
    /// concurrently, each with its own deadline, but reports keep registry
    /// order.
    pub async fn run(&self, registry: &JobRegistry) -> MonitorReport {
        let run_id = format!("batch-{}", Uuid::new_v4());
        let started_at = Utc::now();

        info!(
            "Monitoring {} jobs ({}) with parallelism={}",
            registry.len(),
            run_id,
            self.parallel
        );

        let jobs = if self.parallel <= 1 {
            let mut jobs = Vec::with_capacity(registry.len());
            for handle in registry {
                jobs.push(self.check(handle).await);
            }
            jobs
        } else {
            stream::iter(registry.iter())
                .map(|handle| self.check(handle))
                .buffered(self.parallel)
                .collect()
                .await
        };

        let report = MonitorReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            jobs,
        };

        info!(
            "Final failed jobs: {:?}",
            report.failed().iter().map(|h| &h.job_dir).collect::<Vec<_>>()
        );
        info!(
            "Final errored jobs: {:?}",
            report.errored().iter().map(|h| &h.job_dir).collect::<Vec<_>>()
        );

        report
    }

    /// Waits for one job and decides its disposition.
    pub async fn check(&self, handle: &JobHandle) -> JobReport {
        let start = Instant::now();
        info!(
            "Checking log file: {}, folder: {}",
            handle.log_path.display(),
            handle.job_dir.display()
        );

        let disposition = self.dispose(handle).await;
        match &disposition {
            Disposition::Skipped { reason } => {
                warn!("{}: {}", handle.job_dir.display(), reason)
            }
            other => info!("{}: {}", handle.job_dir.display(), other),
        }

        JobReport {
            handle: handle.clone(),
            disposition,
            waited_secs: start.elapsed().as_secs_f64(),
        }
    }

    async fn dispose(&self, handle: &JobHandle) -> Disposition {
        if !handle.job_dir.exists() {
            return Disposition::Skipped {
                reason: SkipReason::MissingDirectory,
            };
        }

        match self.watcher.await_stable(&handle.log_path).await {
            Stabilization::TimedOut => Disposition::Classified {
                outcome: Outcome::Incomplete,
                timed_out: true,
            },
            Stabilization::Vanished => Disposition::Skipped {
                reason: SkipReason::LogNotFound,
            },
            Stabilization::Stable { .. } if !handle.job_dir.exists() => {
                info!(
                    "Job directory {} removed while waiting, not classifying",
                    handle.job_dir.display()
                );
                Disposition::Skipped {
                    reason: SkipReason::MissingDirectory,
                }
            }
            Stabilization::Stable { .. } => match self.classify_blocking(&handle.log_path).await {
                Ok(outcome) => Disposition::Classified {
                    outcome,
                    timed_out: false,
                },
                Err(MonitorError::LogNotFound { .. }) => Disposition::Skipped {
                    reason: SkipReason::LogNotFound,
                },
                Err(e) => Disposition::Skipped {
                    reason: SkipReason::LogUnreadable(e.to_string()),
                },
            },
        }
    }

    /// Classifies on the blocking pool; the tail read can be slow on large
    /// logs and must not hold up other jobs in parallel mode.
    async fn classify_blocking(&self, path: &Path) -> Result<Outcome, MonitorError> {
        let classifier = self.classifier.clone();
        let owned = path.to_path_buf();
        tokio::task::spawn_blocking(move || classifier.classify(&owned))
            .await
            .map_err(|e| MonitorError::ReadFailed {
                path: path.to_path_buf(),
                source: std::io::Error::other(e),
            })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, OpenOptions};
    use std::io::Write;
    use std::time::Duration;
    use tempfile::TempDir;

    fn test_monitor(parallel: usize) -> JobMonitor {
        let config = MonitorConfig::default()
            .with_interval(Duration::from_millis(20))
            .with_timeout(Duration::from_millis(500))
            .with_parallel(parallel);
        JobMonitor::new(&config).unwrap()
    }

    fn make_job(base: &Path, name: &str, log: Option<&str>) -> JobHandle {
        let dir = base.join(name);
        fs::create_dir_all(&dir).unwrap();
        if let Some(content) = log {
            fs::write(dir.join("tc.out"), content).unwrap();
        }
        JobHandle::in_dir(dir, "tc.out")
    }

    #[tokio::test]
    async fn test_partitions_by_outcome() {
        let temp = TempDir::new().unwrap();
        let registry: JobRegistry = vec![
            make_job(
                temp.path(),
                "gradient_ok",
                Some("Total processing time: 12s\nJob finished: normal\n"),
            ),
            make_job(temp.path(), "gradient_bad", Some("Job terminated due to SEGV\n")),
            make_job(temp.path(), "gradient_stuck", Some("SCF iteration 4\n")),
        ]
        .into_iter()
        .collect();

        let report = test_monitor(1).run(&registry).await;

        assert_eq!(report.jobs.len(), 3);
        assert_eq!(report.succeeded().len(), 1);
        assert_eq!(report.errored()[0].name(), "gradient_bad");
        assert_eq!(report.failed()[0].name(), "gradient_stuck");
        assert!(report.run_id.starts_with("batch-"));
    }

    #[tokio::test]
    async fn test_missing_directory_is_skipped() {
        let temp = TempDir::new().unwrap();
        let handle = JobHandle::in_dir(temp.path().join("gradient_gone"), "tc.out");
        let registry: JobRegistry = std::iter::once(handle).collect();

        let report = test_monitor(1).run(&registry).await;

        assert_eq!(
            report.jobs[0].disposition,
            Disposition::Skipped {
                reason: SkipReason::MissingDirectory
            }
        );
        assert!(report.failed().is_empty());
        assert!(report.errored().is_empty());
        assert_eq!(report.skipped().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_directory_removed_during_wait_is_not_classified() {
        let temp = TempDir::new().unwrap();
        let job_dir = temp.path().join("gradient_x");
        fs::create_dir_all(&job_dir).unwrap();
        let log = temp.path().join("gradient_x.out");
        fs::write(&log, "SCF iteration 1\n").unwrap();
        let handle = JobHandle::new(&log, &job_dir);

        let config = MonitorConfig::default()
            .with_interval(Duration::from_millis(100))
            .with_timeout(Duration::from_secs(5));
        let monitor = JobMonitor::new(&config).unwrap();

        let remover = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            fs::remove_dir_all(&job_dir).unwrap();
            let mut file = OpenOptions::new().append(true).open(&log).unwrap();
            writeln!(file, "Job terminated due to SEGV").unwrap();
        });

        let report = monitor.run(&std::iter::once(handle).collect()).await;
        remover.await.unwrap();

        assert_eq!(
            report.jobs[0].disposition,
            Disposition::Skipped {
                reason: SkipReason::MissingDirectory
            }
        );
        assert!(report.errored().is_empty());
        assert!(report.failed().is_empty());
    }

    #[tokio::test]
    async fn test_parallel_classifies_large_log_alongside_small_ones() {
        let temp = TempDir::new().unwrap();
        let mut big = String::new();
        for i in 0..20_000 {
            big.push_str(&format!("SCF iteration {i}: energy -76.02\n"));
        }
        big.push_str("Total processing time: 3600s\nJob finished: normal\n");

        let registry: JobRegistry = vec![
            make_job(temp.path(), "gradient_big", Some(&big)),
            make_job(temp.path(), "gradient_small", Some("Job terminated\n")),
        ]
        .into_iter()
        .collect();

        let report = test_monitor(2).run(&registry).await;

        assert_eq!(report.succeeded()[0].name(), "gradient_big");
        assert_eq!(report.errored()[0].name(), "gradient_small");
    }

    #[tokio::test]
    async fn test_parallel_mode_keeps_registry_order() {
        let temp = TempDir::new().unwrap();
        let names = ["gradient_c", "gradient_a", "gradient_b"];
        let registry: JobRegistry = names
            .iter()
            .map(|n| make_job(temp.path(), n, Some("Job terminated\n")))
            .collect();

        let report = test_monitor(3).run(&registry).await;

        let got: Vec<_> = report.jobs.iter().map(|r| r.handle.name()).collect();
        assert_eq!(got, names);
        assert_eq!(report.errored().len(), 3);
    }

    #[test]
    fn test_disposition_display() {
        let timed_out = Disposition::Classified {
            outcome: Outcome::Incomplete,
            timed_out: true,
        };
        assert_eq!(timed_out.to_string(), "incomplete (timed out)");

        let skipped = Disposition::Skipped {
            reason: SkipReason::LogNotFound,
        };
        assert_eq!(skipped.to_string(), "skipped: log not found, inspect manually");
    }

    #[test]
    fn test_report_serializes_dispositions() {
        let report = MonitorReport {
            run_id: "batch-1".to_string(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            jobs: vec![JobReport {
                handle: JobHandle::in_dir("/b/gradient_x", "tc.out"),
                disposition: Disposition::Classified {
                    outcome: Outcome::Error,
                    timed_out: false,
                },
                waited_secs: 1.5,
            }],
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["jobs"][0]["disposition"]["status"], "classified");
        assert_eq!(json["jobs"][0]["disposition"]["outcome"], "error");
    }
}
