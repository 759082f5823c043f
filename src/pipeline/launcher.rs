//! Launching planned jobs.
//!
//! A launcher prepares the job directory and hands the job to whatever runs
//! it. Completion is never awaited here; the monitor infers it from the log.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use serde_yaml::Value;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::LaunchError;
use crate::monitor::JobHandle;

use super::plan::PlannedJob;
use super::settings::{JobSettings, LaunchSettings};

/// File in the job directory that receives the launch command's own output.
pub const LAUNCH_LOG: &str = "launch.log";

/// Starts a planned job and returns the handle to monitor.
#[async_trait]
pub trait Launcher: Send + Sync {
    async fn launch(&self, job: &PlannedJob) -> Result<JobHandle, LaunchError>;
}

/// Writes an input deck and optionally starts a shell command on it.
#[derive(Debug, Clone)]
pub struct InputDeckLauncher {
    input_name: String,
    log_name: String,
    command: Option<String>,
}

impl InputDeckLauncher {
    pub fn new(settings: &LaunchSettings) -> Self {
        Self {
            input_name: settings.input_name.clone(),
            log_name: settings.log_name.clone(),
            command: settings.command.clone(),
        }
    }

    /// Replaces the configured launch command.
    pub fn with_command(mut self, command: Option<String>) -> Self {
        self.command = command;
        self
    }

    pub fn command(&self) -> Option<&str> {
        self.command.as_deref()
    }

    async fn spawn(&self, command: &str, job_dir: &Path) -> Result<(), LaunchError> {
        let spawn_err = |source| LaunchError::Spawn {
            command: command.to_string(),
            source,
        };

        let log = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(job_dir.join(LAUNCH_LOG))
            .map_err(|source| LaunchError::Prepare {
                path: job_dir.to_path_buf(),
                source,
            })?;
        let stderr = log.try_clone().map_err(spawn_err)?;

        let child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(job_dir)
            .env("JOBWATCH_INPUT", &self.input_name)
            .env("JOBWATCH_LOG", &self.log_name)
            .stdin(Stdio::null())
            .stdout(log)
            .stderr(stderr)
            .spawn()
            .map_err(spawn_err)?;

        debug!("Started '{}' in {} (pid {:?})", command, job_dir.display(), child.id());
        Ok(())
    }
}

impl Default for InputDeckLauncher {
    fn default() -> Self {
        Self::new(&LaunchSettings::default())
    }
}

#[async_trait]
impl Launcher for InputDeckLauncher {
    async fn launch(&self, job: &PlannedJob) -> Result<JobHandle, LaunchError> {
        let job_dir = &job.job_dir;
        let prepare_err = |source| LaunchError::Prepare {
            path: job_dir.clone(),
            source,
        };

        if !job.geometry.is_file() {
            return Err(LaunchError::GeometryNotFound {
                path: job.geometry.clone(),
            });
        }

        tokio::fs::create_dir_all(job_dir).await.map_err(prepare_err)?;

        let mut settings = job.settings.clone();
        if let Some(file_name) = job.geometry.file_name() {
            tokio::fs::copy(&job.geometry, job_dir.join(file_name))
                .await
                .map_err(prepare_err)?;
            settings.insert(
                "coordinates".to_string(),
                Value::from(file_name.to_string_lossy().to_string()),
            );
        }

        let deck = render_deck(&settings);
        tokio::fs::write(job_dir.join(&self.input_name), deck)
            .await
            .map_err(prepare_err)?;

        match &self.command {
            Some(command) => {
                self.spawn(command, job_dir).await?;
                info!("Launched {} job in {}", job.method, job_dir.display());
            }
            None => info!(
                "Prepared {} job in {} (no launch command configured)",
                job.method,
                job_dir.display()
            ),
        }

        Ok(JobHandle::in_dir(job_dir.clone(), &self.log_name).with_parent(job.parent_dir.clone()))
    }
}

/// Renders settings as `key value` lines in key order with `coordinates`
/// last, followed by `end`.
pub fn render_deck(settings: &JobSettings) -> String {
    let mut deck = String::new();
    let mut coordinates = None;

    for (key, value) in settings {
        if key == "coordinates" {
            coordinates = render_value(key, value);
            continue;
        }
        if let Some(rendered) = render_value(key, value) {
            deck.push_str(&format!("{} {}\n", key, rendered));
        }
    }
    if let Some(coordinates) = coordinates {
        deck.push_str(&format!("coordinates {}\n", coordinates));
    }
    deck.push_str("end\n");
    deck
}

fn render_value(key: &str, value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Bool(b) => Some(if *b { "yes" } else { "no" }.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        Value::Sequence(items) => {
            let parts: Vec<String> = items.iter().filter_map(|v| render_value(key, v)).collect();
            Some(parts.join(" "))
        }
        Value::Tagged(tagged) => render_value(key, &tagged.value),
        Value::Mapping(_) => {
            warn!("Skipping nested setting '{}': mappings cannot be written to a deck", key);
            None
        }
    }
}
