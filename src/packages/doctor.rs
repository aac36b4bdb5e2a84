// src/packages/doctor.rs

//! Consistency checks over enabled packages, the bin links and the journal
//!
//! `diagnose` only reads. `repair` applies the plan of a report, carrying on
//! past individual failures, and then diagnoses again.

use crate::error::Result;
use crate::filesystem::tree;
use crate::packages::lifecycle::PackageLifecycle;
use crate::packages::manifest::{self, BIN_DIR, Manifest};
use crate::packages::state::PackageState;
use std::fmt;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Issue {
    MissingMetadata { package: String },
    CorruptMetadata { package: String, reason: String },
    MissingDependency { package: String, dependency: String },
    MissingExternal { package: String, dependency: String },
    NotExecutable { package: String, path: PathBuf },
    /// Present in both enabled and disabled
    AmbiguousState { package: String },
    DanglingLink { link: String, target: PathBuf },
    /// Journal entry never finished
    InterruptedOperation { id: i64, description: String },
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Issue::MissingMetadata { package } => write!(f, "{}: metadata file missing", package),
            Issue::CorruptMetadata { package, reason } => write!(f, "{}: metadata unreadable ({})", package, reason),
            Issue::MissingDependency { package, dependency } => {
                write!(f, "{}: dependency {} is not enabled", package, dependency)
            }
            Issue::MissingExternal { package, dependency } => {
                write!(f, "{}: external dependency {} is missing", package, dependency)
            }
            Issue::NotExecutable { package, path } => {
                let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
                write!(f, "{}: bin/{} is not executable", package, name)
            }
            Issue::AmbiguousState { package } => {
                write!(f, "{}: present in both enabled and disabled; re-run enable or disable", package)
            }
            Issue::DanglingLink { link, target } => {
                write!(f, "bin/{}: target {} no longer exists", link, target.display())
            }
            Issue::InterruptedOperation { id, description } => {
                write!(f, "operation #{} ({}) was interrupted", id, description)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Repair {
    Install(String),
    Fetch(String),
    MakeExecutable(PathBuf),
    Unlink(String),
    AcknowledgeInterrupted,
}

impl fmt::Display for Repair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Repair::Install(name) => write!(f, "install {}", name),
            Repair::Fetch(name) => write!(f, "fetch external dependency {}", name),
            Repair::MakeExecutable(path) => write!(f, "chmod 755 {}", path.display()),
            Repair::Unlink(name) => write!(f, "remove link bin/{}", name),
            Repair::AcknowledgeInterrupted => write!(f, "mark interrupted operations failed"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DoctorReport {
    pub issues: Vec<Issue>,
    pub plan: Vec<Repair>,
}

impl DoctorReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    fn suggest(&mut self, repair: Repair) {
        if !self.plan.contains(&repair) {
            self.plan.push(repair);
        }
    }
}

#[derive(Debug, Default)]
pub struct RepairOutcome {
    pub applied: Vec<Repair>,
    pub failed: Vec<(Repair, String)>,
    /// Diagnosis after the repairs
    pub report: DoctorReport,
}

pub fn diagnose(lifecycle: &PackageLifecycle) -> Result<DoctorReport> {
    let mut report = DoctorReport::default();
    let locations = lifecycle.locations();

    for package in locations.enabled_names()? {
        let dir = locations.enabled(&package);

        let manifest = match manifest::read_manifest(&dir) {
            Ok(Some(found)) => found,
            Ok(None) => {
                report.issues.push(Issue::MissingMetadata { package: package.clone() });
                fallback_manifest(lifecycle, &package)
            }
            Err(e) => {
                report.issues.push(Issue::CorruptMetadata {
                    package: package.clone(),
                    reason: e.to_string(),
                });
                fallback_manifest(lifecycle, &package)
            }
        };

        for dependency in &manifest.dependencies {
            if locations.state(dependency) != PackageState::Enabled {
                report.issues.push(Issue::MissingDependency {
                    package: package.clone(),
                    dependency: dependency.clone(),
                });
                report.suggest(Repair::Install(dependency.clone()));
            }
        }

        let mut external = manifest.external_dependencies.clone();
        for dependency in manifest::read_external_deps(&dir)? {
            if !external.contains(&dependency) {
                external.push(dependency);
            }
        }
        for dependency in external {
            if !lifecycle.external().is_available(&dependency) {
                report.issues.push(Issue::MissingExternal {
                    package: package.clone(),
                    dependency: dependency.clone(),
                });
                report.suggest(Repair::Fetch(dependency));
            }
        }

        for file in tree::list_files(&dir.join(BIN_DIR))? {
            if !tree::is_executable(&file) {
                report.issues.push(Issue::NotExecutable {
                    package: package.clone(),
                    path: file.clone(),
                });
                report.suggest(Repair::MakeExecutable(file));
            }
        }

        if locations.presence(&package).is_ambiguous() {
            report.issues.push(Issue::AmbiguousState { package: package.clone() });
        }
    }

    for link in lifecycle.links().dangling()? {
        report.suggest(Repair::Unlink(link.name.clone()));
        report.issues.push(Issue::DanglingLink {
            link: link.name,
            target: link.target,
        });
    }

    let interrupted = lifecycle.interrupted()?;
    if !interrupted.is_empty() {
        for changeset in interrupted {
            report.issues.push(Issue::InterruptedOperation {
                id: changeset.id.unwrap_or_default(),
                description: changeset.description,
            });
        }
        report.suggest(Repair::AcknowledgeInterrupted);
    }

    Ok(report)
}

/// Apply `report.plan` in order, then diagnose again
pub fn repair(lifecycle: &mut PackageLifecycle, report: &DoctorReport) -> Result<RepairOutcome> {
    let mut outcome = RepairOutcome::default();

    for step in &report.plan {
        let result = match step {
            Repair::Install(name) => lifecycle.install(name).map(|_| ()),
            Repair::Fetch(name) => lifecycle.external().fetch(name),
            Repair::MakeExecutable(path) => tree::make_executable(path),
            Repair::Unlink(name) => lifecycle.links().unlink(name).map(|_| ()),
            Repair::AcknowledgeInterrupted => lifecycle.acknowledge_interrupted().map(|_| ()),
        };

        match result {
            Ok(()) => {
                info!("Repaired: {}", step);
                outcome.applied.push(step.clone());
            }
            Err(e) => {
                warn!("Repair '{}' failed: {}", step, e);
                outcome.failed.push((step.clone(), e.to_string()));
            }
        }
    }

    outcome.report = diagnose(lifecycle)?;
    Ok(outcome)
}

fn fallback_manifest(lifecycle: &PackageLifecycle, package: &str) -> Manifest {
    match lifecycle.repository().describe(package) {
        Ok(Some(descriptor)) => Manifest {
            description: descriptor.description,
            version: descriptor.version,
            author: descriptor.author,
            dependencies: descriptor.dependencies,
            external_dependencies: descriptor.external_dependencies,
        },
        _ => Manifest::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Layout;
    use crate::db::models::Changeset;
    use crate::packages::traits::ExternalResolver;
    use std::cell::RefCell;
    use std::collections::HashSet;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::rc::Rc;
    use tempfile::TempDir;

    #[derive(Default)]
    struct FakeResolver {
        available: RefCell<HashSet<String>>,
    }

    impl ExternalResolver for FakeResolver {
        fn is_available(&self, name: &str) -> bool {
            self.available.borrow().contains(name)
        }

        fn fetch(&self, name: &str) -> Result<()> {
            self.available.borrow_mut().insert(name.to_string());
            Ok(())
        }
    }

    fn setup() -> (TempDir, Layout, PackageLifecycle) {
        let temp = TempDir::new().unwrap();
        let layout = Layout::new(temp.path());
        layout.ensure_skeleton("mash").unwrap();
        let lifecycle = PackageLifecycle::open(&layout, Rc::new(FakeResolver::default())).unwrap();
        (temp, layout, lifecycle)
    }

    fn enabled_package(layout: &Layout, name: &str, manifest: &str) -> PathBuf {
        let dir = layout.enabled_dir().join(name);
        fs::create_dir_all(dir.join(BIN_DIR)).unwrap();
        fs::write(dir.join("info.json"), manifest).unwrap();
        dir
    }

    #[test]
    fn test_clean_root() {
        let (_temp, layout, lifecycle) = setup();
        enabled_package(&layout, "utils", "{}");

        let report = diagnose(&lifecycle).unwrap();
        assert!(report.is_clean(), "{:?}", report.issues);
        assert!(report.plan.is_empty());
    }

    #[test]
    fn test_reports_each_problem() {
        let (_temp, layout, lifecycle) = setup();
        let web = enabled_package(
            &layout,
            "web",
            r#"{"dependencies": ["utils", "db"], "external_dependencies": ["requests"]}"#,
        );
        fs::write(web.join("bin/serve"), "#!/bin/sh\n").unwrap();
        fs::set_permissions(web.join("bin/serve"), fs::Permissions::from_mode(0o644)).unwrap();

        let broken = layout.enabled_dir().join("broken");
        fs::create_dir_all(&broken).unwrap();
        fs::write(broken.join("info.json"), "{").unwrap();

        let report = diagnose(&lifecycle).unwrap();
        assert!(!report.is_clean());
        assert!(report.issues.contains(&Issue::MissingDependency {
            package: "web".into(),
            dependency: "utils".into()
        }));
        assert!(report.issues.contains(&Issue::MissingDependency {
            package: "web".into(),
            dependency: "db".into()
        }));
        assert!(report.issues.iter().any(|i| matches!(i, Issue::CorruptMetadata { package, .. } if package == "broken")));
        assert!(report.plan.contains(&Repair::Fetch("requests".into())));
        assert!(report.plan.contains(&Repair::MakeExecutable(web.join("bin/serve"))));
    }

    #[test]
    fn test_reports_ambiguous_and_dangling() {
        let (_temp, layout, lifecycle) = setup();
        enabled_package(&layout, "web", "{}");
        fs::create_dir_all(layout.disabled_dir().join("web")).unwrap();
        lifecycle
            .links()
            .link("gone", &layout.enabled_dir().join("web/bin/gone"))
            .unwrap();

        let report = diagnose(&lifecycle).unwrap();
        assert!(report.issues.contains(&Issue::AmbiguousState { package: "web".into() }));
        assert!(report.plan.contains(&Repair::Unlink("gone".into())));
    }

    #[test]
    fn test_repair_fixes_and_reports_again() {
        let (_temp, layout, mut lifecycle) = setup();
        let web = enabled_package(
            &layout,
            "web",
            r#"{"dependencies": ["utils"], "external_dependencies": ["requests"]}"#,
        );
        fs::write(web.join("bin/serve"), "#!/bin/sh\n").unwrap();
        fs::set_permissions(web.join("bin/serve"), fs::Permissions::from_mode(0o644)).unwrap();

        let utils = layout.packages_dir().join("utils");
        fs::create_dir_all(&utils).unwrap();
        fs::write(utils.join("info.json"), "{}").unwrap();

        let report = diagnose(&lifecycle).unwrap();
        let outcome = repair(&mut lifecycle, &report).unwrap();

        assert!(outcome.failed.is_empty(), "{:?}", outcome.failed);
        assert!(outcome.report.is_clean(), "{:?}", outcome.report.issues);
        assert!(tree::is_executable(&web.join("bin/serve")));
        assert_eq!(lifecycle.locations().state("utils"), PackageState::Enabled);
    }

    #[test]
    fn test_repair_continues_past_failures() {
        let (_temp, layout, mut lifecycle) = setup();
        enabled_package(&layout, "web", r#"{"dependencies": ["ghost"]}"#);

        let report = diagnose(&lifecycle).unwrap();
        let outcome = repair(&mut lifecycle, &report).unwrap();

        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.failed[0].0, Repair::Install("ghost".into()));
        assert!(!outcome.report.is_clean());
    }

    #[test]
    fn test_interrupted_operations_are_acknowledged() {
        let (_temp, layout, mut lifecycle) = setup();
        lifecycle.add("ghost").unwrap_err();
        assert!(diagnose(&lifecycle).unwrap().is_clean());

        // simulate a run that died before finishing its changeset
        let journal = crate::db::open(&layout.journal_file()).unwrap();
        Changeset::new("enable web".to_string()).insert(&journal).unwrap();

        let report = diagnose(&lifecycle).unwrap();
        assert!(report.plan.contains(&Repair::AcknowledgeInterrupted));

        let outcome = repair(&mut lifecycle, &report).unwrap();
        assert!(outcome.report.is_clean());
    }
}
