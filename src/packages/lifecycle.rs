// src/packages/lifecycle.rs

//! Package state transitions
//!
//! `add`, `install`, `enable`, `disable` and `remove` move a package between
//! the cached, enabled and disabled locations. Each runs as one journaled
//! changeset. A transition that fails halfway is not rolled back: the
//! changeset is marked failed and the directories stay as they are until the
//! operation is re-run or `doctor` repairs them.

use crate::config::Layout;
use crate::db::{
    self,
    models::{Changeset, ChangesetStatus},
};
use crate::error::{Error, Result};
use crate::filesystem::tree;
use crate::packages::hooks;
use crate::packages::links::{BinLinks, BinaryLink};
use crate::packages::manifest::{self, BIN_DIR, Manifest, Origin, PackageDescriptor};
use crate::packages::state::{Locations, PackageState, Presence};
use crate::packages::traits::ExternalResolver;
use crate::repository::PackageRepository;
use crate::resolver;
use rusqlite::Connection;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;
use tracing::{debug, info, warn};

/// What activating one package did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Activation {
    pub package: String,
    /// External dependencies that had to be fetched
    pub fetched: Vec<String>,
    /// Names linked into the shared bin directory
    pub linked: Vec<String>,
    pub hook_ran: bool,
}

/// One row of `packman list`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageStatus {
    pub name: String,
    pub state: PackageState,
    pub version: Option<String>,
}

/// Everything `packman info` shows
#[derive(Debug, Clone)]
pub struct PackageInfo {
    pub descriptor: PackageDescriptor,
    pub presence: Presence,
    pub links: Vec<BinaryLink>,
}

pub struct PackageLifecycle {
    layout: Layout,
    repository: PackageRepository,
    locations: Locations,
    links: BinLinks,
    external: Rc<dyn ExternalResolver>,
    conn: Connection,
}

impl PackageLifecycle {
    /// Load repositories and open the journal for `layout`
    pub fn open(layout: &Layout, external: Rc<dyn ExternalResolver>) -> Result<Self> {
        for dir in [
            layout.packages_dir(),
            layout.cached_dir(),
            layout.enabled_dir(),
            layout.disabled_dir(),
            layout.bin_dir(),
        ] {
            fs::create_dir_all(dir)?;
        }

        let journal = layout.journal_file();
        db::init(&journal)?;

        Ok(Self {
            layout: layout.clone(),
            repository: PackageRepository::load(layout)?,
            locations: Locations::new(layout),
            links: BinLinks::new(layout.bin_dir()),
            external,
            conn: db::open(&journal)?,
        })
    }

    pub fn repository(&self) -> &PackageRepository {
        &self.repository
    }

    pub fn locations(&self) -> &Locations {
        &self.locations
    }

    pub fn links(&self) -> &BinLinks {
        &self.links
    }

    pub fn external(&self) -> &dyn ExternalResolver {
        self.external.as_ref()
    }

    /// Add `name` and every dependency that is not enabled yet, dependencies
    /// first. Returns one activation per package, in the order they ran.
    pub fn add(&self, name: &str) -> Result<Vec<Activation>> {
        manifest::validate_package_name(name)?;

        self.journaled(format!("add {}", name), || {
            let order = resolver::install_order(
                name,
                |n| self.repository.describe(n),
                |n| self.locations.state(n) == PackageState::Enabled,
            )?;

            order.iter().map(|descriptor| self.add_one(descriptor)).collect()
        })
    }

    fn add_one(&self, descriptor: &PackageDescriptor) -> Result<Activation> {
        let name = descriptor.name.as_str();
        info!("Adding package {}", name);

        let source = self.repository.source_dir(name);
        if source.is_dir() {
            tree::merge_tree(&source, &self.locations.cached(name))?;
        }

        let presence = self.locations.presence(name);
        if !presence.enabled {
            if !presence.cached {
                return Err(Error::SourceMissing(name.to_string()));
            }
            tree::replace_subtree(&self.locations.cached(name), &self.locations.enabled(name))?;
            if presence.disabled {
                tree::remove_subtree(&self.locations.disabled(name))?;
            }
        }

        self.activate(name, &descriptor.external_dependencies)
    }

    /// Install `name` from its source tree, replacing any enabled copy.
    /// Dependencies are not touched.
    pub fn install(&self, name: &str) -> Result<Activation> {
        manifest::validate_package_name(name)?;

        self.journaled(format!("install {}", name), || {
            let source = self.repository.source_dir(name);
            if !source.is_dir() {
                return Err(Error::SourceMissing(name.to_string()));
            }
            info!("Installing package {}", name);

            tree::merge_tree(&source, &self.locations.cached(name))?;
            tree::replace_subtree(&source, &self.locations.enabled(name))?;
            tree::remove_subtree(&self.locations.disabled(name))?;

            let declared = self
                .repository
                .describe(name)?
                .map(|descriptor| descriptor.external_dependencies)
                .unwrap_or_default();
            self.activate(name, &declared)
        })
    }

    /// Move a disabled package back, or enable a fresh copy of its source
    /// tree. Returns the linked names.
    pub fn enable(&self, name: &str) -> Result<Vec<String>> {
        manifest::validate_package_name(name)?;

        self.journaled(format!("enable {}", name), || {
            let enabled = self.locations.enabled(name);

            if self.locations.presence(name).disabled {
                tree::move_subtree(&self.locations.disabled(name), &enabled)?;
            } else if self.repository.has_source(name) {
                tree::replace_subtree(&self.repository.source_dir(name), &enabled)?;
            } else {
                return Err(Error::NotInstalled(name.to_string()));
            }

            info!("Enabled package {}", name);
            self.link_binaries(name)
        })
    }

    /// Move an enabled package to the disabled location and drop its links.
    /// Returns the unlinked names.
    pub fn disable(&self, name: &str) -> Result<Vec<String>> {
        manifest::validate_package_name(name)?;

        self.journaled(format!("disable {}", name), || {
            if !self.locations.presence(name).enabled {
                return Err(Error::NotEnabled(name.to_string()));
            }

            tree::move_subtree(&self.locations.enabled(name), &self.locations.disabled(name))?;
            let unlinked = self.links.unlink_owned_by(&self.owned_bin_dirs(name))?;

            info!("Disabled package {}", name);
            Ok(unlinked)
        })
    }

    /// Delete every installed copy of `name` and its links. The source tree
    /// is kept. Returns the unlinked names.
    pub fn remove(&self, name: &str) -> Result<Vec<String>> {
        manifest::validate_package_name(name)?;

        self.journaled(format!("remove {}", name), || {
            let mut found = false;
            for dir in [
                self.locations.cached(name),
                self.locations.enabled(name),
                self.locations.disabled(name),
            ] {
                found |= tree::remove_subtree(&dir)?;
            }

            let unlinked = self.links.unlink_owned_by(&self.owned_bin_dirs(name))?;
            if !found {
                return Err(Error::PackageNotFound(name.to_string()));
            }

            info!("Removed package {}", name);
            Ok(unlinked)
        })
    }

    /// Every known or installed package with its state, sorted by name
    pub fn list(&self) -> Result<Vec<PackageStatus>> {
        let mut names = self.repository.list_all()?;
        names.extend(self.locations.installed_names()?);

        let mut statuses = Vec::with_capacity(names.len());
        for name in names {
            let version = match self.describe_any(&name) {
                Ok(descriptor) => descriptor.and_then(|d| d.version),
                Err(e) => {
                    warn!("Skipping metadata for {}: {}", name, e);
                    None
                }
            };
            statuses.push(PackageStatus {
                state: self.locations.state(&name),
                name,
                version,
            });
        }
        Ok(statuses)
    }

    pub fn info(&self, name: &str) -> Result<PackageInfo> {
        let presence = self.locations.presence(name);
        let descriptor = match self.describe_any(name)? {
            Some(descriptor) => descriptor,
            None if presence.any() => {
                PackageDescriptor::from_manifest(name, Manifest::default(), Origin::Installed)
            }
            None => return Err(Error::PackageNotFound(name.to_string())),
        };

        let owners = self.owned_bin_dirs(name);
        let links = self
            .links
            .list()?
            .into_iter()
            .filter(|link| owners.iter().any(|owner| link.target.starts_with(owner)))
            .collect();

        Ok(PackageInfo {
            descriptor,
            presence,
            links,
        })
    }

    /// Journal entries, newest first
    pub fn history(&self) -> Result<Vec<Changeset>> {
        Changeset::list_all(&self.conn)
    }

    /// Changesets left pending by an interrupted run
    pub fn interrupted(&self) -> Result<Vec<Changeset>> {
        Changeset::list_pending(&self.conn)
    }

    /// Mark every pending changeset failed. Returns how many were marked.
    pub fn acknowledge_interrupted(&mut self) -> Result<usize> {
        db::transaction(&mut self.conn, |tx| {
            let pending = Changeset::list_pending(tx)?;
            let count = pending.len();
            for mut changeset in pending {
                changeset.finish(tx, ChangesetStatus::Failed, Some("interrupted".to_string()))?;
            }
            Ok(count)
        })
    }

    /// Descriptor from the source tree or a repository, else from the
    /// manifest inside an installed copy
    pub fn describe_any(&self, name: &str) -> Result<Option<PackageDescriptor>> {
        if let Some(descriptor) = self.repository.describe(name)? {
            return Ok(Some(descriptor));
        }

        for dir in [
            self.locations.enabled(name),
            self.locations.disabled(name),
            self.locations.cached(name),
        ] {
            if let Some(found) = manifest::read_manifest(&dir)? {
                return Ok(Some(PackageDescriptor::from_manifest(name, found, Origin::Installed)));
            }
        }

        Ok(None)
    }

    /// Every `bin` directory a link target may point into for `name`
    pub fn owned_bin_dirs(&self, name: &str) -> Vec<PathBuf> {
        vec![
            self.repository.source_dir(name).join(BIN_DIR),
            self.locations.cached(name).join(BIN_DIR),
            self.locations.enabled(name).join(BIN_DIR),
            self.locations.disabled(name).join(BIN_DIR),
        ]
    }

    /// Fetch external dependencies, link binaries and run the install hook,
    /// in that order
    fn activate(&self, name: &str, declared_external: &[String]) -> Result<Activation> {
        let package_dir = self.active_dir(name);

        let mut external = declared_external.to_vec();
        for dependency in manifest::read_external_deps(&package_dir)? {
            if !external.contains(&dependency) {
                external.push(dependency);
            }
        }

        let mut fetched = Vec::new();
        for dependency in external {
            if self.external.is_available(&dependency) {
                debug!("External dependency {} already available", dependency);
                continue;
            }
            info!("Installing dependency: {}", dependency);
            self.external.fetch(&dependency)?;
            fetched.push(dependency);
        }

        let linked = self.link_binaries(name)?;
        let hook_ran = hooks::run_install_hook(name, &package_dir, self.layout.root())?;

        Ok(Activation {
            package: name.to_string(),
            fetched,
            linked,
            hook_ran,
        })
    }

    fn active_dir(&self, name: &str) -> PathBuf {
        let enabled = self.locations.enabled(name);
        if enabled.is_dir() {
            enabled
        } else {
            self.repository.source_dir(name)
        }
    }

    /// Link every file of the source and enabled `bin` directories. The
    /// enabled copy wins when both carry the same file name.
    fn link_binaries(&self, name: &str) -> Result<Vec<String>> {
        let mut targets = BTreeMap::new();
        for dir in [
            self.repository.source_dir(name).join(BIN_DIR),
            self.locations.enabled(name).join(BIN_DIR),
        ] {
            for file in tree::list_files(&dir)? {
                tree::make_executable(&file)?;
                if let Some(file_name) = file.file_name() {
                    targets.insert(file_name.to_string_lossy().to_string(), file);
                }
            }
        }

        let mut linked = Vec::new();
        for (link_name, target) in targets {
            match self.links.link(&link_name, &target) {
                Ok(()) => linked.push(link_name),
                Err(Error::AlreadyExists(path)) => warn!("Not linking {}: {} is in the way", link_name, path),
                Err(e) => return Err(e),
            }
        }
        Ok(linked)
    }

    fn journaled<T>(&self, description: String, op: impl FnOnce() -> Result<T>) -> Result<T> {
        let mut changeset = Changeset::new(description);
        changeset.insert(&self.conn)?;

        let result = op();
        let (status, error) = match &result {
            Ok(_) => (ChangesetStatus::Applied, None),
            Err(e) => (ChangesetStatus::Failed, Some(e.to_string())),
        };

        if let Err(e) = changeset.finish(&self.conn, status, error) {
            warn!("Could not record outcome of '{}': {}", changeset.description, e);
        }
        result
    }
}
