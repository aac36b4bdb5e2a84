// src/shell/external.rs

//! External commands from the shared `bin` directory

use crate::error::{Error, Result};
use crate::filesystem::PathResolver;
use crate::filesystem::tree;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// Locate `name` in `bin_dir`. The name may not contain a path separator and
/// the resolved program, after following links, must stay inside the root.
pub fn find(resolver: &PathResolver, bin_dir: &Path, name: &str) -> Result<PathBuf> {
    if name.is_empty() || name.contains('/') || name == "." || name == ".." {
        return Err(Error::CommandNotFound(name.to_string()));
    }

    let candidate = bin_dir.join(name);
    if fs::symlink_metadata(&candidate).is_err() {
        return Err(Error::CommandNotFound(name.to_string()));
    }

    let program = candidate
        .canonicalize()
        .map_err(|_| Error::CommandNotFound(name.to_string()))?;
    if !program.starts_with(resolver.root()) {
        return Err(Error::Confinement(name.to_string()));
    }
    if !program.is_file() {
        return Err(Error::CommandNotFound(name.to_string()));
    }
    if !tree::is_executable(&program) {
        return Err(Error::PermissionDenied(name.to_string()));
    }

    Ok(program)
}

/// Run `program` to completion and return its exit code
pub fn run(program: &Path, args: &[String], cwd: &Path, env: &[(&str, String)]) -> Result<i32> {
    debug!("Running {} {:?}", program.display(), args);

    let status = Command::new(program)
        .args(args)
        .current_dir(cwd)
        .envs(env.iter().map(|(key, value)| (*key, value.as_str())))
        .status()?;

    Ok(status.code().unwrap_or(1))
}

/// Executable names in `bin_dir`, sorted
pub fn list(bin_dir: &Path) -> Result<Vec<String>> {
    let entries = match fs::read_dir(bin_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry?;
        if tree::is_executable(&entry.path()) {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
    }
    names.sort();
    Ok(names)
}
