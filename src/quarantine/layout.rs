//! Quarantine directory names and the dependent-job naming convention.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Prefix that marks a dependent (gradient) job directory.
pub const DEPENDENT_TOKEN: &str = "gradient_";

/// Quarantine tree for failed dependent jobs.
pub const PRIMARY_DIR: &str = "failed_gradient_jobs";

/// Quarantine tree for the parent jobs of failed dependent jobs.
pub const SECONDARY_DIR: &str = "SPEs_of_failed_gradients";

/// Where quarantined jobs go and how parents are linked by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuarantineLayout {
    pub primary: String,
    pub secondary: String,
    pub token: String,
}

impl Default for QuarantineLayout {
    fn default() -> Self {
        Self {
            primary: PRIMARY_DIR.to_string(),
            secondary: SECONDARY_DIR.to_string(),
            token: DEPENDENT_TOKEN.to_string(),
        }
    }
}

impl QuarantineLayout {
    pub fn primary_root(&self, base_dir: &Path) -> PathBuf {
        base_dir.join(&self.primary)
    }

    pub fn secondary_root(&self, base_dir: &Path) -> PathBuf {
        base_dir.join(&self.secondary)
    }

    /// Whether a directory name follows the dependent-job convention.
    pub fn is_dependent(&self, name: &str) -> bool {
        name.contains(&self.token)
    }

    /// Parent job name for a dependent job name.
    pub fn sibling_name(&self, name: &str) -> String {
        sibling_name(name, &self.token)
    }

    /// Directory name a dependent job gets for a given parent method.
    pub fn dependent_name(&self, parent: &str) -> String {
        format!("{}{}", self.token, parent)
    }
}

/// Removes every occurrence of `token` from `name`.
///
/// `sibling_name(token + x, token) == x` whenever `x` does not itself
/// contain `token`.
pub fn sibling_name(name: &str, token: &str) -> String {
    if token.is_empty() {
        return name.to_string();
    }
    name.replace(token, "")
}
