// src/packages/traits.rs

//! Seams between package lifecycle and the outside world

use crate::error::Result;

/// Provider of dependencies that are not MashFS packages (Python modules by
/// default)
///
/// `add`, `install` and `doctor --fix` consult it for every name a package
/// lists as an external dependency.
pub trait ExternalResolver {
    /// Whether `name` is already available
    fn is_available(&self, name: &str) -> bool;

    /// Make `name` available, or fail with `Error::ExternalDependency`
    fn fetch(&self, name: &str) -> Result<()>;
}
