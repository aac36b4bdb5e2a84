// src/config.rs

//! Startup configuration and the on-disk layout beneath the root
//!
//! Everything MashFS touches lives at a fixed location relative to the root
//! directory. `Layout` is the single place those locations are spelled out.

use crate::error::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default root directory when neither `--root` nor `MASHFS_ROOT` is given
pub const DEFAULT_ROOT: &str = "filesfs";

/// Default starting directory, relative to the root
pub const DEFAULT_CWD: &str = "home/mash";

/// Default login user
pub const DEFAULT_USER: &str = "mash";

/// Default hostname when `etc/hostname` is absent
pub const DEFAULT_HOSTNAME: &str = "hardmash";

/// Shell recorded for every account
pub const LOGIN_SHELL: &str = "/bin/mash";

/// How newly written secrets are stored in the credential file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SecretStorage {
    /// `username:secret`
    #[default]
    Plain,
    /// `username:$sha256$<salt>$<digest>`
    Hashed,
}

/// Startup configuration for a shell instance
#[derive(Debug, Clone)]
pub struct ShellConfig {
    pub root: PathBuf,
    pub cwd: String,
    pub user: String,
    pub secret_storage: SecretStorage,
}

impl ShellConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cwd: DEFAULT_CWD.to_string(),
            user: DEFAULT_USER.to_string(),
            secret_storage: SecretStorage::Plain,
        }
    }

    /// Layout rooted at the absolute form of the configured root
    pub fn layout(&self) -> Result<Layout> {
        let root = if self.root.is_absolute() {
            self.root.clone()
        } else {
            std::env::current_dir()?.join(&self.root)
        };
        Ok(Layout::new(root))
    }
}

/// Host paths derived from the root
#[derive(Debug, Clone)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn etc_dir(&self) -> PathBuf {
        self.root.join("etc")
    }

    pub fn passwd_file(&self) -> PathBuf {
        self.etc_dir().join("passwd")
    }

    pub fn shadow_file(&self) -> PathBuf {
        self.etc_dir().join("shadow")
    }

    pub fn sudoers_file(&self) -> PathBuf {
        self.etc_dir().join("sudoers")
    }

    pub fn hostname_file(&self) -> PathBuf {
        self.etc_dir().join("hostname")
    }

    /// Shared directory holding external commands and package links
    pub fn bin_dir(&self) -> PathBuf {
        self.root.join("bin")
    }

    pub fn packman_dir(&self) -> PathBuf {
        self.root.join("opt").join("packman")
    }

    pub fn repos_dir(&self) -> PathBuf {
        self.packman_dir().join("repos")
    }

    /// Source trees of locally available packages
    pub fn packages_dir(&self) -> PathBuf {
        self.packman_dir().join("packages")
    }

    pub fn cached_dir(&self) -> PathBuf {
        self.packman_dir().join("cached")
    }

    pub fn enabled_dir(&self) -> PathBuf {
        self.packman_dir().join("enabled")
    }

    pub fn disabled_dir(&self) -> PathBuf {
        self.packman_dir().join("disabled")
    }

    pub fn journal_file(&self) -> PathBuf {
        self.packman_dir().join("packman.db")
    }

    /// Create the directory skeleton. Existing directories are left alone.
    pub fn ensure_skeleton(&self, user: &str) -> Result<()> {
        let dirs = [
            self.root.join("home").join(user),
            self.etc_dir(),
            self.bin_dir(),
            self.root.join("usr").join("bin"),
            self.root.join("usr").join("local").join("bin"),
            self.root.join("var").join("log"),
            self.repos_dir(),
            self.packages_dir(),
            self.cached_dir(),
            self.enabled_dir(),
            self.disabled_dir(),
        ];

        for dir in &dirs {
            fs::create_dir_all(dir)?;
        }

        debug!("Directory skeleton ready under {}", self.root.display());
        Ok(())
    }
}
