// src/filesystem/mod.rs

//! Filesystem access for MashFS
//!
//! - `resolver`: confinement of user-supplied paths to the root
//! - `tree`: whole-subtree copy, move and removal primitives

pub mod resolver;
pub mod tree;

pub use resolver::{LogicalPath, PathResolver};
