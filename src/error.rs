// src/error.rs

use thiserror::Error;

/// Core error types for MashFS
///
/// Path-bearing variants carry the string the user typed, never the resolved
/// host path.
#[derive(Error, Debug)]
pub enum Error {
    /// Resolved path would leave the configured root
    #[error("{0}: Access denied (cannot leave MashFS root)")]
    Confinement(String),

    #[error("{0}: No such file or directory")]
    NotFound(String),

    #[error("{0}: Not a directory")]
    NotADirectory(String),

    #[error("{0}: Permission denied")]
    PermissionDenied(String),

    #[error("{0} already exists")]
    AlreadyExists(String),

    #[error("Command not found: {0}")]
    CommandNotFound(String),

    #[error("Authentication failure")]
    AuthenticationFailure,

    #[error("user {0} does not exist")]
    UnknownUser(String),

    /// Package unknown to every repository and local package directory
    #[error("Package {0} not found in any repository")]
    PackageNotFound(String),

    #[error("Package {0} is not installed")]
    NotInstalled(String),

    #[error("Package {0} is not enabled")]
    NotEnabled(String),

    /// Neither a source tree nor a cached copy is available to activate
    #[error("Package {0} has no source tree")]
    SourceMissing(String),

    #[error("Package {package} depends on {dependency}, which is not enabled")]
    DependencyMissing { package: String, dependency: String },

    /// Dependency chain that loops back on itself, in walk order
    #[error("Dependency cycle: {}", .0.join(" -> "))]
    DependencyCycle(Vec<String>),

    /// Manifest or record file that fails to parse
    #[error("Corrupt {path}: {reason}")]
    Corrupt { path: String, reason: String },

    #[error("{0}")]
    Mismatch(String),

    #[error("{0}")]
    InvalidArgument(String),

    /// Install hook exited unsuccessfully
    #[error("Install hook for {package} failed ({status})")]
    Hook { package: String, status: String },

    /// External dependency the fetcher could not provide
    #[error("Failed to fetch external dependency {name} ({status})")]
    ExternalDependency { name: String, status: String },

    #[error("Prompt failed: {0}")]
    Prompt(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Journal database errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// Result type alias using MashFS's Error type
pub type Result<T> = std::result::Result<T, Error>;
