// src/shell/packman.rs

//! The `packman` command, shared by the shell built-in and `mashfs packman`

use crate::config::Layout;
use crate::error::Result;
use crate::packages::doctor;
use crate::packages::lifecycle::{Activation, PackageLifecycle};
use crate::packages::{ExternalResolver, PackageState};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::rc::Rc;

#[derive(Debug, Subcommand)]
pub enum PackmanCommand {
    /// Add a package, adding missing dependencies first
    Add { name: String },
    /// Install a package from its source tree, replacing any enabled copy
    Install { name: String },
    /// Remove every installed copy of a package
    Remove { name: String },
    /// Enable a disabled or available package
    Enable { name: String },
    /// Disable an enabled package
    Disable { name: String },
    /// List known and installed packages
    List,
    /// Show package metadata, state and links
    Info { name: String },
    /// Check enabled packages, links and the operation journal
    Doctor {
        /// Apply the repair plan and report again
        #[arg(long)]
        fix: bool,
    },
    /// Show the operation journal
    History,
}

/// Parser used by the shell built-in
#[derive(Debug, Parser)]
#[command(name = "packman", about = "MashFS package manager")]
pub struct PackmanArgs {
    #[command(subcommand)]
    pub command: PackmanCommand,
}

/// Run one packman command against `layout`. Returns the exit status.
pub fn run(
    command: &PackmanCommand,
    layout: &Layout,
    external: Rc<dyn ExternalResolver>,
    out: &mut dyn Write,
) -> Result<i32> {
    let mut lifecycle = PackageLifecycle::open(layout, external)?;

    match command {
        PackmanCommand::Add { name } => {
            for activation in lifecycle.add(name)? {
                print_activation(out, &activation)?;
                writeln!(out, "Package {} added and enabled successfully", activation.package)?;
            }
        }
        PackmanCommand::Install { name } => {
            let activation = lifecycle.install(name)?;
            print_activation(out, &activation)?;
            writeln!(out, "Package {} installed successfully", name)?;
        }
        PackmanCommand::Remove { name } => {
            for link in lifecycle.remove(name)? {
                writeln!(out, "Removed binary: {}", link)?;
            }
            writeln!(out, "Package {} removed successfully", name)?;
        }
        PackmanCommand::Enable { name } => {
            for link in lifecycle.enable(name)? {
                writeln!(out, "Linked binary: {}", link)?;
            }
            writeln!(out, "Package {} enabled", name)?;
        }
        PackmanCommand::Disable { name } => {
            for link in lifecycle.disable(name)? {
                writeln!(out, "Removed binary: {}", link)?;
            }
            writeln!(out, "Package {} disabled", name)?;
        }
        PackmanCommand::List => {
            let packages = lifecycle.list()?;
            if packages.is_empty() {
                writeln!(out, "No packages found.")?;
            }
            for package in &packages {
                write!(out, "  {:<20} {:<9}", package.name, package.state)?;
                if let Some(version) = &package.version {
                    write!(out, " {}", version)?;
                }
                writeln!(out)?;
            }
        }
        PackmanCommand::Info { name } => {
            let info = lifecycle.info(name)?;
            let descriptor = &info.descriptor;
            writeln!(out, "Package: {}", descriptor.name)?;
            writeln!(out, "State: {}", info.presence.state())?;
            if info.presence.cached && info.presence.state() != PackageState::Cached {
                writeln!(out, "Cached: yes")?;
            }
            if let Some(version) = &descriptor.version {
                writeln!(out, "Version: {}", version)?;
            }
            if let Some(author) = &descriptor.author {
                writeln!(out, "Author: {}", author)?;
            }
            if let Some(description) = &descriptor.description {
                writeln!(out, "Description: {}", description)?;
            }
            if !descriptor.dependencies.is_empty() {
                writeln!(out, "Dependencies: {}", descriptor.dependencies.join(", "))?;
            }
            if !descriptor.external_dependencies.is_empty() {
                writeln!(out, "External dependencies: {}", descriptor.external_dependencies.join(", "))?;
            }
            for link in &info.links {
                writeln!(out, "Binary: {} -> {}", link.name, link.target.display())?;
            }
        }
        PackmanCommand::Doctor { fix } => {
            let report = doctor::diagnose(&lifecycle)?;
            for issue in &report.issues {
                writeln!(out, "  {}", issue)?;
            }

            if report.is_clean() {
                writeln!(out, "No problems found")?;
                return Ok(0);
            }

            if !*fix {
                writeln!(out, "Repair plan:")?;
                for step in &report.plan {
                    writeln!(out, "  {}", step)?;
                }
                writeln!(out, "Run 'packman doctor --fix' to apply it")?;
                return Ok(1);
            }

            let outcome = doctor::repair(&mut lifecycle, &report)?;
            for step in &outcome.applied {
                writeln!(out, "Repaired: {}", step)?;
            }
            for (step, reason) in &outcome.failed {
                writeln!(out, "Failed: {} ({})", step, reason)?;
            }
            for issue in &outcome.report.issues {
                writeln!(out, "  still: {}", issue)?;
            }
            if !outcome.report.is_clean() {
                return Ok(1);
            }
            writeln!(out, "All problems repaired")?;
        }
        PackmanCommand::History => {
            let changesets = lifecycle.history()?;
            if changesets.is_empty() {
                writeln!(out, "No changeset history.")?;
            }
            for changeset in &changesets {
                let timestamp = changeset
                    .finished_at
                    .as_deref()
                    .or(changeset.created_at.as_deref())
                    .unwrap_or("-");
                write!(
                    out,
                    "  [{}] {} - {} ({})",
                    changeset.id.unwrap_or_default(),
                    timestamp,
                    changeset.description,
                    changeset.status
                )?;
                if let Some(error) = &changeset.error {
                    write!(out, ": {}", error)?;
                }
                writeln!(out)?;
            }
        }
    }

    Ok(0)
}

/// Parse built-in arguments. Help and usage errors are returned as text.
pub fn parse(args: &[String]) -> std::result::Result<PackmanArgs, clap::Error> {
    PackmanArgs::try_parse_from(std::iter::once("packman").chain(args.iter().map(String::as_str)))
}

fn print_activation(out: &mut dyn Write, activation: &Activation) -> Result<()> {
    for dependency in &activation.fetched {
        writeln!(out, "Installing dependency: {}", dependency)?;
    }
    for link in &activation.linked {
        writeln!(out, "Linked binary: {}", link)?;
    }
    if activation.hook_ran {
        writeln!(out, "Ran install script for {}", activation.package)?;
    }
    Ok(())
}
