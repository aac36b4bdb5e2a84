// src/lib.rs

//! MashFS
//!
//! A Unix-like shell confined to one host directory, with a local account
//! store and a directory-tree package manager.
//!
//! # Architecture
//!
//! - Confinement: every user path resolves inside the root, symlinks included
//! - Accounts: passwd/shadow/sudoers style record files under `etc/`
//! - Packages: state is where a copy of the tree lives (cached, enabled, disabled)
//! - Journal: every package operation is a changeset in SQLite

pub mod accounts;
pub mod config;
pub mod db;
mod error;
pub mod filesystem;
pub mod packages;
pub mod repository;
pub mod resolver;
pub mod session;
pub mod shell;

pub use error::{Error, Result};
