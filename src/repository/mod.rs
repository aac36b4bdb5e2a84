// src/repository/mod.rs

//! Package metadata from repository descriptors and local package trees
//!
//! Repository descriptors are `opt/packman/repos/*.json` (or `*.yml`,
//! `*.yaml`) documents with a `packages` map of name to manifest. Local packages are directories under
//! `opt/packman/packages`, optionally carrying their own `info.json`, which
//! shadows any repository entry of the same name.

use crate::config::Layout;
use crate::error::{Error, Result};
use crate::filesystem::tree;
use crate::packages::manifest::{self, Manifest, Origin, PackageDescriptor};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Repository descriptor document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepositoryMetadata {
    #[serde(default)]
    pub packages: BTreeMap<String, Manifest>,
}

/// A loaded repository, named after its descriptor file
#[derive(Debug, Clone)]
pub struct Repository {
    pub name: String,
    pub packages: BTreeMap<String, Manifest>,
}

pub struct PackageRepository {
    packages_dir: PathBuf,
    repositories: Vec<Repository>,
}

impl PackageRepository {
    /// Load every repository descriptor, in file-name order.
    ///
    /// A descriptor that fails to parse is skipped with a warning so one bad
    /// file cannot hide the others.
    pub fn load(layout: &Layout) -> Result<Self> {
        let mut files = Vec::new();
        if layout.repos_dir().is_dir() {
            for entry in fs::read_dir(layout.repos_dir())? {
                let path = entry?.path();
                if DescriptorFormat::of(&path).is_some() && path.is_file() {
                    files.push(path);
                }
            }
        }
        files.sort();

        let mut repositories = Vec::new();
        for path in files {
            match load_repository(&path) {
                Ok(repo) => {
                    debug!("Loaded repository {} ({} packages)", repo.name, repo.packages.len());
                    repositories.push(repo);
                }
                Err(e) => warn!("Skipping repository {}: {}", path.display(), e),
            }
        }

        info!("Loaded {} repositories", repositories.len());
        Ok(Self {
            packages_dir: layout.packages_dir(),
            repositories,
        })
    }

    pub fn repositories(&self) -> &[Repository] {
        &self.repositories
    }

    /// Source tree of a local package
    pub fn source_dir(&self, name: &str) -> PathBuf {
        self.packages_dir.join(name)
    }

    pub fn has_source(&self, name: &str) -> bool {
        self.source_dir(name).is_dir()
    }

    /// Descriptor for `name`: the local manifest if the source tree has one,
    /// else the first repository defining it. A source tree with neither is
    /// not describable.
    pub fn describe(&self, name: &str) -> Result<Option<PackageDescriptor>> {
        manifest::validate_package_name(name)?;

        if let Some(local) = manifest::read_manifest(&self.source_dir(name))? {
            return Ok(Some(PackageDescriptor::from_manifest(name, local, Origin::Local)));
        }

        for repo in &self.repositories {
            if let Some(entry) = repo.packages.get(name) {
                return Ok(Some(PackageDescriptor::from_manifest(
                    name,
                    entry.clone(),
                    Origin::Repository(repo.name.clone()),
                )));
            }
        }

        Ok(None)
    }

    /// Every name known to a repository or present as a local package tree
    pub fn list_all(&self) -> Result<BTreeSet<String>> {
        let mut names: BTreeSet<String> = self
            .repositories
            .iter()
            .flat_map(|repo| repo.packages.keys().cloned())
            .collect();
        names.extend(tree::list_dirs(&self.packages_dir)?);
        Ok(names)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DescriptorFormat {
    Json,
    Yaml,
}

impl DescriptorFormat {
    fn of(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "json" => Some(Self::Json),
            "yml" | "yaml" => Some(Self::Yaml),
            _ => None,
        }
    }
}

fn load_repository(path: &Path) -> Result<Repository> {
    let content = fs::read_to_string(path)?;
    let corrupt = |reason: String| Error::Corrupt {
        path: path.display().to_string(),
        reason,
    };
    let metadata: RepositoryMetadata = match DescriptorFormat::of(path) {
        Some(DescriptorFormat::Yaml) => serde_yaml::from_str(&content).map_err(|e| corrupt(e.to_string()))?,
        _ => serde_json::from_str(&content).map_err(|e| corrupt(e.to_string()))?,
    };

    let name = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_default();

    Ok(Repository {
        name,
        packages: metadata.packages,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Layout) {
        let temp = TempDir::new().unwrap();
        let layout = Layout::new(temp.path());
        layout.ensure_skeleton("mash").unwrap();
        (temp, layout)
    }

    #[test]
    fn test_describe_from_repository() {
        let (_temp, layout) = setup();
        fs::write(
            layout.repos_dir().join("main.json"),
            r#"{"packages": {"web": {"version": "2.0", "dependencies": ["utils"]}, "utils": {}}}"#,
        )
        .unwrap();

        let repo = PackageRepository::load(&layout).unwrap();
        let web = repo.describe("web").unwrap().unwrap();
        assert_eq!(web.version.as_deref(), Some("2.0"));
        assert_eq!(web.dependencies, vec!["utils"]);
        assert_eq!(web.origin, Origin::Repository("main".to_string()));

        assert!(repo.describe("ghost").unwrap().is_none());
    }

    #[test]
    fn test_local_manifest_shadows_repository() {
        let (_temp, layout) = setup();
        fs::write(
            layout.repos_dir().join("main.json"),
            r#"{"packages": {"web": {"version": "1.0"}}}"#,
        )
        .unwrap();
        let source = layout.packages_dir().join("web");
        fs::create_dir_all(&source).unwrap();
        fs::write(source.join("info.json"), r#"{"version": "local"}"#).unwrap();

        let repo = PackageRepository::load(&layout).unwrap();
        let web = repo.describe("web").unwrap().unwrap();
        assert_eq!(web.version.as_deref(), Some("local"));
        assert_eq!(web.origin, Origin::Local);
    }

    #[test]
    fn test_bare_source_tree_is_not_describable() {
        let (_temp, layout) = setup();
        fs::create_dir_all(layout.packages_dir().join("plain/bin")).unwrap();

        let repo = PackageRepository::load(&layout).unwrap();
        assert!(repo.has_source("plain"));
        assert!(repo.describe("plain").unwrap().is_none());
        // still listed so `list` and `info` can show it
        assert!(repo.list_all().unwrap().contains("plain"));
    }

    #[test]
    fn test_yaml_repository() {
        let (_temp, layout) = setup();
        fs::write(
            layout.repos_dir().join("extra.yml"),
            "packages:\n  tools:\n    version: \"0.3\"\n    dependencies:\n      - utils\n",
        )
        .unwrap();
        fs::write(layout.repos_dir().join("notes.txt"), "not a repository").unwrap();

        let repo = PackageRepository::load(&layout).unwrap();
        assert_eq!(repo.repositories().len(), 1);
        let tools = repo.describe("tools").unwrap().unwrap();
        assert_eq!(tools.version.as_deref(), Some("0.3"));
        assert_eq!(tools.dependencies, vec!["utils"]);
        assert_eq!(tools.origin, Origin::Repository("extra".to_string()));
    }

    #[test]
    fn test_first_repository_wins() {
        let (_temp, layout) = setup();
        fs::write(layout.repos_dir().join("a.json"), r#"{"packages": {"x": {"version": "a"}}}"#).unwrap();
        fs::write(layout.repos_dir().join("b.json"), r#"{"packages": {"x": {"version": "b"}}}"#).unwrap();

        let repo = PackageRepository::load(&layout).unwrap();
        assert_eq!(repo.describe("x").unwrap().unwrap().version.as_deref(), Some("a"));
    }

    #[test]
    fn test_corrupt_repository_is_skipped() {
        let (_temp, layout) = setup();
        fs::write(layout.repos_dir().join("bad.json"), "{{{").unwrap();
        fs::write(layout.repos_dir().join("good.json"), r#"{"packages": {"ok": {}}}"#).unwrap();

        let repo = PackageRepository::load(&layout).unwrap();
        assert_eq!(repo.repositories().len(), 1);
        assert!(repo.describe("ok").unwrap().is_some());
    }

    #[test]
    fn test_corrupt_local_manifest_is_reported() {
        let (_temp, layout) = setup();
        let source = layout.packages_dir().join("broken");
        fs::create_dir_all(&source).unwrap();
        fs::write(source.join("info.json"), "nope").unwrap();

        let repo = PackageRepository::load(&layout).unwrap();
        assert!(matches!(repo.describe("broken"), Err(Error::Corrupt { .. })));
    }

    #[test]
    fn test_list_all_unions_sources() {
        let (_temp, layout) = setup();
        fs::write(layout.repos_dir().join("main.json"), r#"{"packages": {"web": {}}}"#).unwrap();
        fs::create_dir_all(layout.packages_dir().join("local-only")).unwrap();

        let repo = PackageRepository::load(&layout).unwrap();
        let names: Vec<String> = repo.list_all().unwrap().into_iter().collect();
        assert_eq!(names, vec!["local-only", "web"]);
    }
}
