//! Planning of dependent gradient jobs from completed parent jobs.

use std::path::{Path, PathBuf};

use serde_yaml::Value;
use tracing::info;

use crate::monitor::{Outcome, OutcomeClassifier};
use crate::quarantine::QuarantineLayout;

use super::settings::{BatchSettings, CandidateGroup, JobDescriptor, JobSettings, MethodFamily};

/// Excited-state keys that only apply to the parent energy calculation.
pub const OMITTED_KEYS: [&str; 4] = ["cisnumstates", "cismax", "cismaxiter", "cisconvtol"];

/// A dependent job ready to be launched.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedJob {
    pub calc_type: String,
    pub method: String,
    pub family: MethodFamily,
    pub parent_dir: PathBuf,
    pub job_dir: PathBuf,
    pub geometry: PathBuf,
    pub settings: JobSettings,
}

/// Orbital file of the parent job that can seed the dependent job.
pub fn orbital_guess(family: MethodFamily, parent_dir: &Path, geom_stem: &str) -> Option<PathBuf> {
    let scratch = parent_dir.join(format!("scr.{geom_stem}"));
    let candidate = match family {
        MethodFamily::Casscf => scratch.join("c0.casscf"),
        MethodFamily::Casci => scratch.join("c0"),
        MethodFamily::Other => return None,
    };
    candidate.exists().then_some(candidate)
}

/// Builds the dependent job's settings.
///
/// Order: group settings, descriptor settings, gradient overrides and the
/// orbital guess, removal of [`OMITTED_KEYS`], then `general` on top.
pub fn gradient_settings(
    group: &CandidateGroup,
    descriptor: &JobDescriptor,
    general: &JobSettings,
    guess: Option<&Path>,
) -> JobSettings {
    let mut settings = group.settings.clone();
    settings.extend(descriptor.settings.clone());

    settings.insert("run".to_string(), Value::from("gradient"));
    settings.insert("hhtdasinglets".to_string(), Value::from(1));
    settings.insert("cassinglets".to_string(), Value::from(1));

    match guess {
        Some(path) => {
            let path = Value::from(path.display().to_string());
            if descriptor.family == MethodFamily::Casscf {
                settings.insert("casguess".to_string(), path.clone());
            }
            settings.insert("guess".to_string(), path);
        }
        None => {
            settings.insert("guess".to_string(), Value::from("generate"));
        }
    }

    for key in OMITTED_KEYS {
        settings.remove(key);
    }

    settings.extend(general.clone());
    settings
}

/// Plans dependent jobs for every candidate whose parent finished.
pub struct GradientPlanner<'a> {
    settings: &'a BatchSettings,
    layout: &'a QuarantineLayout,
    classifier: &'a OutcomeClassifier,
}

impl<'a> GradientPlanner<'a> {
    pub fn new(
        settings: &'a BatchSettings,
        layout: &'a QuarantineLayout,
        classifier: &'a OutcomeClassifier,
    ) -> Self {
        Self {
            settings,
            layout,
            classifier,
        }
    }

    /// Whether the parent's log classifies as a success.
    pub fn parent_completed(&self, parent_dir: &Path) -> bool {
        let log = parent_dir.join(&self.settings.launch.log_name);
        match self.classifier.classify(&log) {
            Ok(Outcome::Success) => true,
            Ok(outcome) => {
                info!("Parent {} is {}, no gradient planned", parent_dir.display(), outcome);
                false
            }
            Err(e) => {
                info!("Parent {} unusable: {}", parent_dir.display(), e);
                false
            }
        }
    }

    pub fn plan(&self) -> Vec<PlannedJob> {
        let batch_dir = &self.settings.batch_dir;
        let geometry = self.settings.geometry_path();
        let geom_stem = geometry
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let general = self.settings.general.overlay();

        let mut planned = Vec::new();
        for (calc_type, group) in &self.settings.candidates {
            for descriptor in &group.jobs {
                let parent_dir = batch_dir.join(&descriptor.method);
                if !self.parent_completed(&parent_dir) {
                    continue;
                }

                let guess = orbital_guess(descriptor.family, &parent_dir, &geom_stem);
                match &guess {
                    Some(path) => info!(
                        "Extracting orbitals from parent ({}): {}",
                        descriptor.method,
                        path.display()
                    ),
                    None => info!(
                        "No orbitals found for {}, optimizing orbitals, which may increase cost.",
                        descriptor.method
                    ),
                }

                planned.push(PlannedJob {
                    calc_type: calc_type.clone(),
                    method: descriptor.method.clone(),
                    family: descriptor.family,
                    job_dir: batch_dir.join(self.layout.dependent_name(&descriptor.method)),
                    parent_dir,
                    geometry: geometry.clone(),
                    settings: gradient_settings(group, descriptor, &general, guess.as_deref()),
                });
            }
        }

        info!(
            "Planned {} gradient jobs from {} candidates",
            planned.len(),
            self.settings.candidate_count()
        );
        planned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn descriptor(method: &str, family: MethodFamily) -> JobDescriptor {
        JobDescriptor {
            method: method.to_string(),
            family,
            settings: JobSettings::new(),
        }
    }

    #[test]
    fn test_orbital_guess_by_family() {
        let temp = TempDir::new().unwrap();
        let scratch = temp.path().join("scr.geom");
        fs::create_dir_all(&scratch).unwrap();
        fs::write(scratch.join("c0"), "").unwrap();
        fs::write(scratch.join("c0.casscf"), "").unwrap();

        assert_eq!(
            orbital_guess(MethodFamily::Casscf, temp.path(), "geom"),
            Some(scratch.join("c0.casscf"))
        );
        assert_eq!(
            orbital_guess(MethodFamily::Casci, temp.path(), "geom"),
            Some(scratch.join("c0"))
        );
        assert_eq!(orbital_guess(MethodFamily::Other, temp.path(), "geom"), None);
        assert_eq!(orbital_guess(MethodFamily::Casci, temp.path(), "other"), None);
    }

    #[test]
    fn test_gradient_settings_overrides() {
        let mut group = CandidateGroup::default();
        group.settings.insert("cisnumstates".into(), Value::from(5));
        group.settings.insert("run".into(), Value::from("energy"));
        group.settings.insert("charge".into(), Value::from(3));
        group.settings.insert("closed".into(), Value::from(10));

        let mut desc = descriptor("casscf_4_4", MethodFamily::Casscf);
        desc.settings.insert("closed".into(), Value::from(12));

        let mut general = JobSettings::new();
        general.insert("charge".into(), Value::from(0));

        let guess = PathBuf::from("/b/casscf_4_4/scr.geom/c0.casscf");
        let settings = gradient_settings(&group, &desc, &general, Some(guess.as_path()));

        assert_eq!(settings["run"], Value::from("gradient"));
        assert_eq!(settings["hhtdasinglets"], Value::from(1));
        assert_eq!(settings["cassinglets"], Value::from(1));
        assert_eq!(settings["closed"], Value::from(12));
        assert_eq!(settings["charge"], Value::from(0));
        assert_eq!(settings["guess"], Value::from("/b/casscf_4_4/scr.geom/c0.casscf"));
        assert_eq!(settings["casguess"], settings["guess"]);
        assert!(!settings.contains_key("cisnumstates"));
    }

    #[test]
    fn test_gradient_settings_without_guess() {
        let settings = gradient_settings(
            &CandidateGroup::default(),
            &descriptor("casci", MethodFamily::Casci),
            &JobSettings::new(),
            None,
        );
        assert_eq!(settings["guess"], Value::from("generate"));
        assert!(!settings.contains_key("casguess"));
    }

    #[test]
    fn test_plan_only_completed_parents() {
        let temp = TempDir::new().unwrap();
        let yaml = r#"
general:
  coordinates: geom.xyz
candidates:
  cas:
    jobs:
      - method: casci
        family: casci
      - method: casscf
        family: casscf
      - method: missing
"#;
        let mut settings = BatchSettings::from_yaml(yaml).unwrap();
        settings.batch_dir = temp.path().to_path_buf();

        fs::create_dir_all(temp.path().join("casci/scr.geom")).unwrap();
        fs::write(temp.path().join("casci/scr.geom/c0"), "").unwrap();
        fs::write(
            temp.path().join("casci/tc.out"),
            "Total processing time: 1s\nJob finished: ok\n",
        )
        .unwrap();
        fs::create_dir_all(temp.path().join("casscf")).unwrap();
        fs::write(temp.path().join("casscf/tc.out"), "Job terminated\n").unwrap();

        let layout = QuarantineLayout::default();
        let classifier = OutcomeClassifier::default();
        let planned = GradientPlanner::new(&settings, &layout, &classifier).plan();

        assert_eq!(planned.len(), 1);
        let job = &planned[0];
        assert_eq!(job.job_dir, temp.path().join("gradient_casci"));
        assert_eq!(job.parent_dir, temp.path().join("casci"));
        assert_eq!(job.calc_type, "cas");
        assert_eq!(
            job.settings["guess"],
            Value::from(temp.path().join("casci/scr.geom/c0").display().to_string())
        );
    }
}
