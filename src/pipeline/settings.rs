//! Batch settings file.
//!
//! ```yaml
//! general:
//!   charge: 0
//!   coordinates: geom.xyz
//!   basis: 6-31gs          # forwarded to every job
//! candidates:
//!   casscf:
//!     closed: 10           # group-level settings
//!     jobs:
//!       - method: casscf_4_4
//!         family: casscf
//!         settings: { active: 4 }
//! monitor:
//!   interval_secs: 90
//! quarantine:
//!   primary: failed_gradient_jobs
//! launch:
//!   command: terachem $JOBWATCH_INPUT > $JOBWATCH_LOG 2>&1
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::monitor::MonitorOverrides;
use crate::quarantine::QuarantineLayout;

/// Key/value settings written into a job's input deck.
pub type JobSettings = BTreeMap<String, serde_yaml::Value>;

/// Method family of a candidate. Decides which orbital file of the parent
/// job can seed the dependent job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MethodFamily {
    Casscf,
    Casci,
    #[default]
    Other,
}

/// One candidate whose parent job has already been run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDescriptor {
    /// Full method identifier; also the parent job directory name.
    pub method: String,
    #[serde(default)]
    pub family: MethodFamily,
    #[serde(default)]
    pub settings: JobSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateGroup {
    #[serde(default)]
    pub jobs: Vec<JobDescriptor>,
    /// Settings shared by every job in the group.
    #[serde(flatten)]
    pub settings: JobSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneralSettings {
    #[serde(default)]
    pub charge: i64,
    /// Geometry file, relative to the batch directory.
    pub coordinates: String,
    #[serde(flatten)]
    pub extra: JobSettings,
}

impl GeneralSettings {
    /// Settings that override every job's own settings.
    pub fn overlay(&self) -> JobSettings {
        let mut overlay = self.extra.clone();
        overlay.insert("charge".to_string(), self.charge.into());
        overlay.insert("coordinates".to_string(), self.coordinates.clone().into());
        overlay
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaunchSettings {
    /// Shell command started in each job directory. When absent, only the
    /// input deck is written and an external scheduler starts the job.
    pub command: Option<String>,
    pub input_name: String,
    pub log_name: String,
}

impl Default for LaunchSettings {
    fn default() -> Self {
        Self {
            command: None,
            input_name: "tc.in".to_string(),
            log_name: "tc.out".to_string(),
        }
    }
}

/// Parsed batch settings file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSettings {
    pub general: GeneralSettings,
    #[serde(default)]
    pub candidates: BTreeMap<String, CandidateGroup>,
    #[serde(default)]
    pub monitor: MonitorOverrides,
    #[serde(default)]
    pub quarantine: QuarantineLayout,
    #[serde(default)]
    pub launch: LaunchSettings,
    /// Directory containing the settings file; all jobs live here.
    #[serde(skip)]
    pub batch_dir: PathBuf,
}

impl BatchSettings {
    /// Loads and parses a settings file. The batch directory is the file's
    /// absolute parent directory.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let read_err = |source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        };
        let content = std::fs::read_to_string(path).map_err(read_err)?;
        let mut settings = Self::from_yaml(&content)?;

        let absolute = std::fs::canonicalize(path).map_err(read_err)?;
        settings.batch_dir = absolute
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Ok(settings)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let settings: Self = serde_yaml::from_str(content)?;
        if settings.general.coordinates.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "general.coordinates cannot be empty".to_string(),
            ));
        }
        Ok(settings)
    }

    pub fn geometry_path(&self) -> PathBuf {
        self.batch_dir.join(&self.general.coordinates)
    }

    /// Number of candidate descriptors across all groups.
    pub fn candidate_count(&self) -> usize {
        self.candidates.values().map(|g| g.jobs.len()).sum()
    }
}
