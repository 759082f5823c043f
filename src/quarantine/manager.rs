//! Moves failed dependent jobs and their parent jobs into quarantine.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::error::QuarantineError;
use crate::monitor::JobHandle;

use super::layout::QuarantineLayout;
use super::mover::move_dir;

/// Which monitor partition a handle came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Partition {
    Failed,
    Errored,
}

impl std::fmt::Display for Partition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Partition::Failed => write!(f, "failed"),
            Partition::Errored => write!(f, "errored"),
        }
    }
}

/// Why a handle was left in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuarantineSkip {
    /// Already moved or deleted.
    MissingDirectory,
    /// Name does not carry the dependent-job token.
    NotDependent,
}

/// What happened to the parent of a moved job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum SiblingMove {
    Moved { from: PathBuf, to: PathBuf },
    NotFound { expected: PathBuf },
    Failed { from: PathBuf, error: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovedJob {
    pub partition: Partition,
    pub job_dir: PathBuf,
    pub destination: PathBuf,
    pub sibling: SiblingMove,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedJob {
    pub partition: Partition,
    pub job_dir: PathBuf,
    pub reason: QuarantineSkip,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedMove {
    pub partition: Partition,
    pub job_dir: PathBuf,
    pub error: String,
}

/// Everything the quarantine pass did, in processing order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuarantineReport {
    pub moved: Vec<MovedJob>,
    pub skipped: Vec<SkippedJob>,
    pub failures: Vec<FailedMove>,
}

impl QuarantineReport {
    /// Number of parent directories that were moved alongside.
    pub fn siblings_moved(&self) -> usize {
        self.moved
            .iter()
            .filter(|m| matches!(m.sibling, SiblingMove::Moved { .. }))
            .count()
    }
}

/// Relocates failed and errored dependent jobs.
///
/// Best effort: a failed move is logged and recorded, never rolled back, and
/// never stops the pass.
#[derive(Debug, Clone, Default)]
pub struct QuarantineManager {
    layout: QuarantineLayout,
}

impl QuarantineManager {
    pub fn new(layout: QuarantineLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &QuarantineLayout {
        &self.layout
    }

    /// Quarantines `failed` then `errored` under `base_dir`.
    ///
    /// Only failing to create the quarantine roots is fatal. Re-running with
    /// handles whose directories are already gone is a no-op.
    pub async fn quarantine(
        &self,
        failed: &[JobHandle],
        errored: &[JobHandle],
        base_dir: &Path,
    ) -> Result<QuarantineReport, QuarantineError> {
        let primary_root = self.layout.primary_root(base_dir);
        let secondary_root = self.layout.secondary_root(base_dir);
        for root in [&primary_root, &secondary_root] {
            tokio::fs::create_dir_all(root)
                .await
                .map_err(|source| QuarantineError::CreateDestination {
                    path: root.clone(),
                    source,
                })?;
        }

        let mut report = QuarantineReport::default();
        let batches = [(Partition::Failed, failed), (Partition::Errored, errored)];
        for (partition, handles) in batches {
            for handle in handles {
                self.quarantine_one(partition, handle, &primary_root, &secondary_root, &mut report)
                    .await;
            }
        }

        info!(
            "Quarantine complete: {} moved ({} parents), {} skipped, {} failed",
            report.moved.len(),
            report.siblings_moved(),
            report.skipped.len(),
            report.failures.len()
        );
        Ok(report)
    }

    async fn quarantine_one(
        &self,
        partition: Partition,
        handle: &JobHandle,
        primary_root: &Path,
        secondary_root: &Path,
        report: &mut QuarantineReport,
    ) {
        let job_dir = &handle.job_dir;
        let skip = |reason| SkippedJob {
            partition,
            job_dir: job_dir.clone(),
            reason,
        };

        if !job_dir.exists() {
            info!(
                "Directory not found for {} job: {}. It may have been moved or deleted.",
                partition,
                job_dir.display()
            );
            report.skipped.push(skip(QuarantineSkip::MissingDirectory));
            return;
        }

        let name = handle.name();
        if !self.layout.is_dependent(&name) {
            info!("Skipping non-dependent job in {} jobs: {}", partition, job_dir.display());
            report.skipped.push(skip(QuarantineSkip::NotDependent));
            return;
        }

        let destination = primary_root.join(&name);
        info!(
            "Moving {} job {} to {}",
            partition,
            job_dir.display(),
            destination.display()
        );
        if let Err(e) = move_dir(job_dir, &destination).await {
            error!("{}", e);
            report.failures.push(FailedMove {
                partition,
                job_dir: job_dir.clone(),
                error: e.to_string(),
            });
            return;
        }

        let sibling = self.move_sibling(handle, &name, secondary_root).await;
        report.moved.push(MovedJob {
            partition,
            job_dir: job_dir.clone(),
            destination,
            sibling,
        });
    }

    async fn move_sibling(&self, handle: &JobHandle, name: &str, secondary_root: &Path) -> SiblingMove {
        let sibling_name = self.layout.sibling_name(name);
        let parent = handle
            .job_dir
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let sibling = parent.join(&sibling_name);

        if let Some(recorded) = &handle.parent_dir {
            if recorded != &sibling {
                warn!(
                    "Recorded parent {} differs from naming convention {}; using the latter",
                    recorded.display(),
                    sibling.display()
                );
            }
        }

        if sibling_name.is_empty() || !sibling.is_dir() {
            info!("Associated parent directory not found: {}", sibling.display());
            return SiblingMove::NotFound { expected: sibling };
        }

        let destination = secondary_root.join(&sibling_name);
        info!(
            "Moving associated parent job {} to {}",
            sibling.display(),
            destination.display()
        );
        match move_dir(&sibling, &destination).await {
            Ok(()) => SiblingMove::Moved {
                from: sibling,
                to: destination,
            },
            Err(e) => {
                error!("{} (dependent job stays quarantined)", e);
                SiblingMove::Failed {
                    from: sibling,
                    error: e.to_string(),
                }
            }
        }
    }
}
