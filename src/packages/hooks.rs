// src/packages/hooks.rs

//! Subprocesses run on behalf of a package: the install hook and the default
//! external dependency fetcher

use crate::error::{Error, Result};
use crate::packages::manifest::INSTALL_HOOK;
use crate::packages::traits::ExternalResolver;
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::{debug, info};

/// Run `install.sh` from `package_dir` with bash, if the package ships one.
///
/// The script runs inside the package directory with `MASHFS_ROOT` and
/// `MASHFS_PACKAGE` set. Returns whether a hook ran.
pub fn run_install_hook(package: &str, package_dir: &Path, root: &Path) -> Result<bool> {
    let script = package_dir.join(INSTALL_HOOK);
    if !script.is_file() {
        return Ok(false);
    }

    info!("Running install hook for {}", package);
    let status = Command::new("bash")
        .arg(&script)
        .current_dir(package_dir)
        .env("MASHFS_ROOT", root)
        .env("MASHFS_PACKAGE", package)
        .status()?;

    if !status.success() {
        return Err(Error::Hook {
            package: package.to_string(),
            status: status.to_string(),
        });
    }

    Ok(true)
}

/// Fetches external dependencies with `python3 -m pip`
#[derive(Debug, Clone)]
pub struct PipResolver {
    python: String,
}

impl PipResolver {
    pub fn new(python: impl Into<String>) -> Self {
        Self { python: python.into() }
    }
}

impl Default for PipResolver {
    fn default() -> Self {
        Self::new("python3")
    }
}

impl ExternalResolver for PipResolver {
    fn is_available(&self, name: &str) -> bool {
        let status = Command::new(&self.python)
            .args(["-m", "pip", "show", "--quiet", name])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match status {
            Ok(status) => status.success(),
            Err(e) => {
                debug!("Could not query {} for {}: {}", self.python, name, e);
                false
            }
        }
    }

    fn fetch(&self, name: &str) -> Result<()> {
        info!("Fetching external dependency {}", name);
        let status = Command::new(&self.python)
            .args(["-m", "pip", "install", name])
            .status()
            .map_err(|e| Error::ExternalDependency {
                name: name.to_string(),
                status: e.to_string(),
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(Error::ExternalDependency {
                name: name.to_string(),
                status: status.to_string(),
            })
        }
    }
}
