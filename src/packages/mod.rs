// src/packages/mod.rs

//! Package management for MashFS
//!
//! A package is a directory tree. Its state is wherever copies of that tree
//! live: the cache, the enabled location or the disabled location. Enabled
//! packages expose the files of their `bin` directory through links in the
//! shared `bin` directory.

pub mod doctor;
pub mod hooks;
pub mod lifecycle;
pub mod links;
pub mod manifest;
pub mod state;
pub mod traits;

pub use lifecycle::PackageLifecycle;
pub use state::PackageState;
pub use traits::ExternalResolver;
