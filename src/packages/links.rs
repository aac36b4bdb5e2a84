// src/packages/links.rs

//! Symbolic links in the shared `bin` directory
//!
//! Links are absolute. A link belongs to a package when its stored target
//! lies under one of that package's `bin` directories; nothing else records
//! ownership.

use crate::error::{Error, Result};
use std::fs;
use std::io;
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryLink {
    pub name: String,
    pub target: PathBuf,
}

impl BinaryLink {
    /// Target no longer exists
    pub fn is_dangling(&self) -> bool {
        fs::metadata(&self.target).is_err()
    }
}

pub struct BinLinks {
    bin_dir: PathBuf,
}

impl BinLinks {
    pub fn new(bin_dir: impl Into<PathBuf>) -> Self {
        Self { bin_dir: bin_dir.into() }
    }

    pub fn bin_dir(&self) -> &Path {
        &self.bin_dir
    }

    /// Every symlink in the bin directory, sorted by name
    pub fn list(&self) -> Result<Vec<BinaryLink>> {
        let entries = match fs::read_dir(&self.bin_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut links = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_symlink() {
                continue;
            }
            links.push(BinaryLink {
                name: entry.file_name().to_string_lossy().to_string(),
                target: fs::read_link(entry.path())?,
            });
        }
        links.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(links)
    }

    /// Point `bin/<name>` at `target`, replacing an existing link or file.
    /// A directory of the same name is left alone and reported.
    pub fn link(&self, name: &str, target: &Path) -> Result<()> {
        let path = self.bin_dir.join(name);

        match fs::symlink_metadata(&path) {
            Ok(meta) if meta.is_dir() => {
                warn!("Not linking {}: {} is a directory", name, path.display());
                return Err(Error::AlreadyExists(path.display().to_string()));
            }
            Ok(_) => fs::remove_file(&path)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        fs::create_dir_all(&self.bin_dir)?;
        symlink(target, &path)?;
        info!("Linked binary: {} -> {}", name, target.display());
        Ok(())
    }

    /// Remove one link by name. Regular files are never touched.
    pub fn unlink(&self, name: &str) -> Result<bool> {
        let path = self.bin_dir.join(name);
        match fs::symlink_metadata(&path) {
            Ok(meta) if meta.file_type().is_symlink() => {
                fs::remove_file(&path)?;
                debug!("Removed link {}", name);
                Ok(true)
            }
            Ok(_) => Ok(false),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove every link whose target lies under one of `owners`.
    /// Returns the removed names.
    pub fn unlink_owned_by(&self, owners: &[PathBuf]) -> Result<Vec<String>> {
        let mut removed = Vec::new();
        for link in self.list()? {
            if owners.iter().any(|owner| link.target.starts_with(owner)) && self.unlink(&link.name)? {
                info!("Removed link: {}", link.name);
                removed.push(link.name);
            }
        }
        Ok(removed)
    }

    pub fn dangling(&self) -> Result<Vec<BinaryLink>> {
        Ok(self.list()?.into_iter().filter(BinaryLink::is_dangling).collect())
    }
}
