// src/packages/state.rs

//! Package state, derived from directory presence
//!
//! State is never stored. Every caller asks `Locations::presence`, which
//! looks at the cached, enabled and disabled directories.

use crate::config::Layout;
use crate::error::Result;
use crate::filesystem::tree;
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageState {
    Absent,
    Cached,
    Enabled,
    Disabled,
}

impl PackageState {
    pub fn as_str(&self) -> &str {
        match self {
            PackageState::Absent => "absent",
            PackageState::Cached => "cached",
            PackageState::Enabled => "enabled",
            PackageState::Disabled => "disabled",
        }
    }
}

impl fmt::Display for PackageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Which package locations hold a subtree for one name
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Presence {
    pub cached: bool,
    pub enabled: bool,
    pub disabled: bool,
}

impl Presence {
    /// Enabled and Disabled take precedence over the cache copy
    pub fn state(&self) -> PackageState {
        if self.enabled {
            PackageState::Enabled
        } else if self.disabled {
            PackageState::Disabled
        } else if self.cached {
            PackageState::Cached
        } else {
            PackageState::Absent
        }
    }

    pub fn any(&self) -> bool {
        self.cached || self.enabled || self.disabled
    }

    /// Both enabled and disabled, left behind by an interrupted transition
    pub fn is_ambiguous(&self) -> bool {
        self.enabled && self.disabled
    }
}

/// The three package location directories
#[derive(Debug, Clone)]
pub struct Locations {
    cached: PathBuf,
    enabled: PathBuf,
    disabled: PathBuf,
}

impl Locations {
    pub fn new(layout: &Layout) -> Self {
        Self {
            cached: layout.cached_dir(),
            enabled: layout.enabled_dir(),
            disabled: layout.disabled_dir(),
        }
    }

    pub fn cached(&self, name: &str) -> PathBuf {
        self.cached.join(name)
    }

    pub fn enabled(&self, name: &str) -> PathBuf {
        self.enabled.join(name)
    }

    pub fn disabled(&self, name: &str) -> PathBuf {
        self.disabled.join(name)
    }

    pub fn presence(&self, name: &str) -> Presence {
        Presence {
            cached: self.cached(name).is_dir(),
            enabled: self.enabled(name).is_dir(),
            disabled: self.disabled(name).is_dir(),
        }
    }

    pub fn state(&self, name: &str) -> PackageState {
        self.presence(name).state()
    }

    pub fn enabled_names(&self) -> Result<Vec<String>> {
        tree::list_dirs(&self.enabled)
    }

    /// Every name present in at least one location
    pub fn installed_names(&self) -> Result<BTreeSet<String>> {
        let mut names = BTreeSet::new();
        for dir in [&self.cached, &self.enabled, &self.disabled] {
            names.extend(tree::list_dirs(dir)?);
        }
        Ok(names)
    }
}
