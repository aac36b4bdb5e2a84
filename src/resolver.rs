// src/resolver.rs

//! Dependency resolution for `add`
//!
//! Walks the dependency graph depth-first from the requested package,
//! skipping dependencies that are already enabled. An enabled package ends
//! the walk even when it sits on a cycle. The walk keeps the current
//! chain to detect cycles and a visited set so shared dependencies are
//! resolved once.

use crate::error::{Error, Result};
use crate::packages::manifest::PackageDescriptor;
use std::collections::HashSet;
use tracing::debug;

/// Packages to activate for `root`, dependencies before their dependents and
/// `root` last. `root` is always included, even when already enabled.
///
/// Fails before anything is returned if the root is unknown, a dependency is
/// unknown, or the walk meets a cycle.
pub fn install_order<D, E>(root: &str, mut describe: D, is_enabled: E) -> Result<Vec<PackageDescriptor>>
where
    D: FnMut(&str) -> Result<Option<PackageDescriptor>>,
    E: Fn(&str) -> bool,
{
    let descriptor = describe(root)?.ok_or_else(|| Error::PackageNotFound(root.to_string()))?;

    let mut walk = Walk {
        chain: Vec::new(),
        visited: HashSet::new(),
        order: Vec::new(),
    };
    walk.visit(descriptor, &mut describe, &is_enabled)?;

    debug!(
        "Install order for {}: {}",
        root,
        walk.order.iter().map(|d| d.name.as_str()).collect::<Vec<_>>().join(", ")
    );
    Ok(walk.order)
}

struct Walk {
    chain: Vec<String>,
    visited: HashSet<String>,
    order: Vec<PackageDescriptor>,
}

impl Walk {
    fn visit<D, E>(&mut self, descriptor: PackageDescriptor, describe: &mut D, is_enabled: &E) -> Result<()>
    where
        D: FnMut(&str) -> Result<Option<PackageDescriptor>>,
        E: Fn(&str) -> bool,
    {
        self.chain.push(descriptor.name.clone());

        for dependency in &descriptor.dependencies {
            if self.visited.contains(dependency) || is_enabled(dependency) {
                continue;
            }
            if let Some(start) = self.chain.iter().position(|name| name == dependency) {
                let mut cycle = self.chain[start..].to_vec();
                cycle.push(dependency.clone());
                return Err(Error::DependencyCycle(cycle));
            }

            let next = describe(dependency)?.ok_or_else(|| Error::DependencyMissing {
                package: descriptor.name.clone(),
                dependency: dependency.clone(),
            })?;
            self.visit(next, describe, is_enabled)?;
        }

        self.chain.pop();
        self.visited.insert(descriptor.name.clone());
        self.order.push(descriptor);
        Ok(())
    }
}
