// src/packages/manifest.rs

//! Package manifests and the fixed file names inside a package tree

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;

/// Manifest file at the top of a package tree
pub const MANIFEST_FILE: &str = "info.json";

/// Executables to expose through the shared `bin` directory
pub const BIN_DIR: &str = "bin";

/// Script run after activation
pub const INSTALL_HOOK: &str = "install.sh";

/// External dependencies, one per line
pub const EXTERNAL_DEPS_FILE: &str = "pip_dependencies";

/// Manifest document, as found in `info.json` or a repository's `packages` map
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Manifest {
    pub description: Option<String>,
    pub version: Option<String>,
    pub author: Option<String>,
    pub dependencies: Vec<String>,
    pub external_dependencies: Vec<String>,
}

/// Where a descriptor came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    /// The package's own source tree
    Local,
    /// A repository descriptor, by repository name
    Repository(String),
    /// The manifest inside an enabled, disabled or cached copy
    Installed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageDescriptor {
    pub name: String,
    pub description: Option<String>,
    pub version: Option<String>,
    pub author: Option<String>,
    pub dependencies: Vec<String>,
    pub external_dependencies: Vec<String>,
    pub origin: Origin,
}

impl PackageDescriptor {
    pub fn from_manifest(name: &str, manifest: Manifest, origin: Origin) -> Self {
        Self {
            name: name.to_string(),
            description: manifest.description,
            version: manifest.version,
            author: manifest.author,
            dependencies: manifest.dependencies,
            external_dependencies: manifest.external_dependencies,
            origin,
        }
    }
}

/// Read `info.json` from a package tree. A missing file is `None`; one that
/// does not parse is `Corrupt`.
pub fn read_manifest(package_dir: &Path) -> Result<Option<Manifest>> {
    let path = package_dir.join(MANIFEST_FILE);
    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    serde_json::from_str(&content)
        .map(Some)
        .map_err(|e| Error::Corrupt {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
}

/// External dependency names listed in a package tree, skipping comments
pub fn read_external_deps(package_dir: &Path) -> Result<Vec<String>> {
    let path = package_dir.join(EXTERNAL_DEPS_FILE);
    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

/// Package names become directory names under every package location
pub fn validate_package_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && !name.starts_with('.')
        && !name.starts_with('-')
        && !name.contains(['/', '\\', '\0'])
        && !name.chars().any(char::is_whitespace);

    if valid {
        Ok(())
    } else {
        Err(Error::InvalidArgument(format!("invalid package name '{}'", name)))
    }
}
