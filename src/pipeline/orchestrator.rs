//! Batch driver: plan, launch, monitor, quarantine.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::monitor::{JobHandle, JobMonitor, JobRegistry, MonitorConfig, MonitorReport};
use crate::quarantine::{QuarantineLayout, QuarantineManager, QuarantineReport};

use super::launcher::Launcher;
use super::plan::GradientPlanner;
use super::settings::BatchSettings;

/// A planned job that could not be started.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchFailure {
    pub method: String,
    pub job_dir: PathBuf,
    pub error: String,
}

/// Result of one pass over a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub launched: Vec<JobHandle>,
    pub launch_failures: Vec<LaunchFailure>,
    pub report: MonitorReport,
    /// `None` when quarantine was disabled.
    pub quarantine: Option<QuarantineReport>,
}

/// Plans dependent jobs, launches them, waits for all of them and
/// quarantines the ones that failed.
///
/// A job that fails to launch is logged and left out of monitoring; the
/// rest of the batch proceeds.
pub async fn run_batch(
    settings: &BatchSettings,
    config: MonitorConfig,
    launcher: &dyn Launcher,
) -> Result<BatchOutcome> {
    let monitor = JobMonitor::new(&config).context("Invalid monitor configuration")?;
    let layout = &settings.quarantine;

    let planned = GradientPlanner::new(settings, layout, monitor.classifier()).plan();

    let mut registry = JobRegistry::new();
    let mut launch_failures = Vec::new();
    for job in &planned {
        match launcher.launch(job).await {
            Ok(handle) => {
                info!("Adding gradient job log: {}", handle.log_path.display());
                registry.push(handle);
            }
            Err(e) => {
                error!("Failed to launch {}: {}", job.method, e);
                launch_failures.push(LaunchFailure {
                    method: job.method.clone(),
                    job_dir: job.job_dir.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    let launched: Vec<JobHandle> = registry.iter().cloned().collect();
    let (report, quarantine) =
        monitor_and_quarantine(&monitor, &registry, layout, &settings.batch_dir, true).await?;

    Ok(BatchOutcome {
        launched,
        launch_failures,
        report,
        quarantine,
    })
}

/// Re-monitors an existing batch, discovering dependent jobs by name.
pub async fn watch_batch(
    batch_dir: &Path,
    log_name: &str,
    layout: &QuarantineLayout,
    config: MonitorConfig,
    quarantine: bool,
) -> Result<BatchOutcome> {
    let monitor = JobMonitor::new(&config).context("Invalid monitor configuration")?;
    let registry = JobRegistry::discover(batch_dir, &layout.token, log_name)
        .with_context(|| format!("Failed to scan batch directory {}", batch_dir.display()))?;
    info!(
        "Discovered {} jobs in {}",
        registry.len(),
        batch_dir.display()
    );

    let (report, quarantine) =
        monitor_and_quarantine(&monitor, &registry, layout, batch_dir, quarantine).await?;

    Ok(BatchOutcome {
        launched: Vec::new(),
        launch_failures: Vec::new(),
        report,
        quarantine,
    })
}

/// Monitors every registered job, then optionally quarantines the failed
/// and errored ones under `base_dir`.
pub async fn monitor_and_quarantine(
    monitor: &JobMonitor,
    registry: &JobRegistry,
    layout: &QuarantineLayout,
    base_dir: &Path,
    quarantine: bool,
) -> Result<(MonitorReport, Option<QuarantineReport>)> {
    let report = monitor.run(registry).await;
    if !quarantine {
        info!("Quarantine disabled, leaving job directories in place");
        return Ok((report, None));
    }

    let moved = QuarantineManager::new(layout.clone())
        .quarantine(&report.failed(), &report.errored(), base_dir)
        .await
        .context("Quarantine aborted")?;
    Ok((report, Some(moved)))
}
