//! Dependent-job pipeline for a batch of finished parent calculations.
//!
//! # Pipeline Flow
//!
//! 1. **Settings**: the batch YAML is loaded; its directory is the batch root
//! 2. **Planning**: each candidate whose parent log reports success gets a
//!    `gradient_<method>` job, seeded with the parent's orbitals when present
//! 3. **Launch**: a [`Launcher`] prepares each job directory and starts it
//! 4. **Monitoring**: every launched job is waited on and classified
//! 5. **Quarantine**: failed and errored jobs are moved out with their parents
//!
//! # Example
//!
//! ```rust,ignore
//! use jobwatch::monitor::MonitorConfig;
//! use jobwatch::pipeline::{run_batch, BatchSettings, InputDeckLauncher};
//!
//! let settings = BatchSettings::load("batch/batch.yaml".as_ref())?;
//! let config = MonitorConfig::from_env()?.merge(&settings.monitor);
//! let launcher = InputDeckLauncher::new(&settings.launch);
//!
//! let outcome = run_batch(&settings, config, &launcher).await?;
//! println!("{} jobs errored", outcome.report.errored().len());
//! ```

pub mod launcher;
pub mod orchestrator;
pub mod plan;
pub mod settings;

pub use launcher::{render_deck, InputDeckLauncher, Launcher, LAUNCH_LOG};
pub use orchestrator::{monitor_and_quarantine, run_batch, watch_batch, BatchOutcome, LaunchFailure};
pub use plan::{gradient_settings, orbital_guess, GradientPlanner, PlannedJob, OMITTED_KEYS};
pub use settings::{
    BatchSettings, CandidateGroup, GeneralSettings, JobDescriptor, JobSettings, LaunchSettings,
    MethodFamily,
};
