//! Quarantine of failed dependent jobs.
//!
//! A dependent job directory is named `<token><method>`; its parent job lives
//! next to it as `<method>`. Failed and errored dependent jobs are moved to
//! the primary quarantine tree and their parents to the secondary tree, both
//! rooted in the batch directory:
//!
//! ```text
//! batch/
//! ├── failed_gradient_jobs/      ← gradient_casscf/
//! └── SPEs_of_failed_gradients/  ← casscf/
//! ```

mod layout;
mod manager;
mod mover;

pub use layout::{sibling_name, QuarantineLayout, DEPENDENT_TOKEN, PRIMARY_DIR, SECONDARY_DIR};
pub use manager::{
    FailedMove, MovedJob, Partition, QuarantineManager, QuarantineReport, QuarantineSkip,
    SiblingMove, SkippedJob,
};
pub use mover::move_dir;
