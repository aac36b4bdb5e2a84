// src/filesystem/resolver.rs

//! Logical path resolution confined to a single root directory
//!
//! User input is resolved purely lexically against the current directory:
//! empty and `.` segments are dropped, `..` pops a segment and clamps at the
//! root. The resulting host path is then canonicalised (following any
//! symlinks that exist) and must still sit under the canonical root.

use crate::error::{Error, Result};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::warn;

/// A path inside the virtual root, as a list of normal segments
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LogicalPath {
    segments: Vec<String>,
}

impl LogicalPath {
    /// The root itself
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a stored path such as `home/mash` or `/home/mash`.
    ///
    /// Both forms are taken relative to the root.
    pub fn parse(stored: &str) -> Self {
        let mut path = Self::root();
        path.walk(stored);
        path
    }

    fn walk(&mut self, input: &str) {
        for segment in input.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    self.segments.pop();
                }
                name => self.segments.push(name.to_string()),
            }
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    pub fn file_name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Lexically append `name`, treating `.` and `..` as resolution does
    pub fn join(&self, name: &str) -> Self {
        let mut path = self.clone();
        path.walk(name);
        path
    }

    /// Root-relative form without a leading slash, as exported in `MASHFS_CWD`
    pub fn to_relative_string(&self) -> String {
        self.segments.join("/")
    }
}

impl fmt::Display for LogicalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.segments.join("/"))
    }
}

/// Resolves user-supplied paths against a fixed root
#[derive(Debug, Clone)]
pub struct PathResolver {
    root: PathBuf,
}

impl PathResolver {
    /// Create a resolver for an existing root directory
    pub fn new(root: &Path) -> Result<Self> {
        let root = fs::canonicalize(root)?;
        Ok(Self { root })
    }

    /// Canonical host path of the root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `input` relative to `cwd`.
    ///
    /// A leading `/` starts from the root. The result is verified to stay
    /// inside the root after symlinks are followed; nothing is created or
    /// modified.
    pub fn resolve(&self, cwd: &LogicalPath, input: &str) -> Result<LogicalPath> {
        let mut path = if input.starts_with('/') {
            LogicalPath::root()
        } else {
            cwd.clone()
        };
        path.walk(input);

        self.confine(&path, input)?;
        Ok(path)
    }

    /// Host path for a logical path, without any confinement check
    pub fn host_path(&self, path: &LogicalPath) -> PathBuf {
        let mut host = self.root.clone();
        for segment in path.segments() {
            host.push(segment);
        }
        host
    }

    /// Verify the canonical form of `path` still has the root as prefix.
    ///
    /// Returns the host path on success. Components that do not exist yet
    /// are appended to the canonical form of their deepest existing ancestor.
    pub fn confine(&self, path: &LogicalPath, input: &str) -> Result<PathBuf> {
        let host = self.host_path(path);
        let canonical = canonicalize_existing(&host).map_err(|e| {
            warn!("Failed to canonicalize {}: {}", host.display(), e);
            Error::Confinement(input.to_string())
        })?;

        if !canonical.starts_with(&self.root) {
            warn!("Rejected path escaping root: {}", input);
            return Err(Error::Confinement(input.to_string()));
        }

        Ok(host)
    }

    /// Resolve `input` and require an existing, readable directory
    pub fn resolve_dir(&self, cwd: &LogicalPath, input: &str) -> Result<(LogicalPath, PathBuf)> {
        let path = self.resolve(cwd, input)?;
        let host = self.host_path(&path);

        if !host.exists() {
            return Err(Error::NotFound(input.to_string()));
        }
        if !host.is_dir() {
            return Err(Error::NotADirectory(input.to_string()));
        }
        check_readable(&host, input)?;

        Ok((path, host))
    }
}

/// Fail with `PermissionDenied` when the directory cannot be listed
pub fn check_readable(dir: &Path, input: &str) -> Result<()> {
    match fs::read_dir(dir) {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
            Err(Error::PermissionDenied(input.to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

fn canonicalize_existing(host: &Path) -> io::Result<PathBuf> {
    let mut existing = host;
    let mut missing = Vec::new();

    loop {
        match fs::canonicalize(existing) {
            Ok(mut canonical) => {
                for name in missing.iter().rev() {
                    canonical.push(name);
                }
                return Ok(canonical);
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                let (Some(parent), Some(name)) = (existing.parent(), existing.file_name()) else {
                    return Err(e);
                };
                missing.push(name.to_os_string());
                existing = parent;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, PathResolver) {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("home/mash/docs")).unwrap();
        fs::create_dir_all(temp.path().join("etc")).unwrap();
        fs::write(temp.path().join("etc/passwd"), "root:x:0:0::/:/bin/mash\n").unwrap();
        let resolver = PathResolver::new(temp.path()).unwrap();
        (temp, resolver)
    }

    #[test]
    fn test_relative_and_absolute_resolution() {
        let (_temp, resolver) = setup();
        let cwd = LogicalPath::parse("home/mash");

        let path = resolver.resolve(&cwd, "docs").unwrap();
        assert_eq!(path.to_string(), "/home/mash/docs");

        let path = resolver.resolve(&cwd, "/etc").unwrap();
        assert_eq!(path.to_string(), "/etc");

        let path = resolver.resolve(&cwd, "./docs/../../mash/./docs//").unwrap();
        assert_eq!(path.to_string(), "/home/mash/docs");
    }

    #[test]
    fn test_parent_clamps_at_root() {
        let (_temp, resolver) = setup();
        let cwd = LogicalPath::parse("home/mash/docs");

        for n in cwd.depth()..cwd.depth() + 4 {
            let input = vec![".."; n].join("/");
            let path = resolver.resolve(&cwd, &input).unwrap();
            assert!(path.is_root(), "{} should clamp at root", input);
        }

        let path = resolver.resolve(&cwd, "/../../../etc").unwrap();
        assert_eq!(path.to_string(), "/etc");
    }

    #[test]
    fn test_repeated_parent_from_any_depth_reaches_root() {
        let (_temp, resolver) = setup();
        let mut cwd = LogicalPath::parse("home/mash/docs");
        let depth = cwd.depth();

        for _ in 0..depth + 3 {
            cwd = resolver.resolve(&cwd, "..").unwrap();
        }
        assert!(cwd.is_root());
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let (_temp, resolver) = setup();
        let cwd = LogicalPath::parse("home/mash");

        for input in ["docs", "../..", "/etc/./passwd", "a/b/../c", "/"] {
            let once = resolver.resolve(&cwd, input).unwrap();
            let twice = resolver.resolve(&cwd, &once.to_string()).unwrap();
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_every_segment_combination_stays_inside_root() {
        let (_temp, resolver) = setup();
        let pieces = ["", ".", "..", "home", "mash", "x"];
        let cwds = [LogicalPath::root(), LogicalPath::parse("home/mash/docs")];

        for cwd in &cwds {
            for a in pieces {
                for b in pieces {
                    for c in pieces {
                        for lead in ["", "/"] {
                            let input = format!("{}{}/{}/{}", lead, a, b, c);
                            let path = resolver.resolve(cwd, &input).unwrap();
                            assert!(resolver.host_path(&path).starts_with(resolver.root()));
                        }
                    }
                }
            }
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_escaping_root_is_rejected() {
        let (temp, resolver) = setup();
        let outside = TempDir::new().unwrap();
        std::os::unix::fs::symlink(outside.path(), temp.path().join("home/mash/escape")).unwrap();

        let cwd = LogicalPath::parse("home/mash");
        let result = resolver.resolve(&cwd, "escape");
        assert!(matches!(result, Err(Error::Confinement(ref s)) if s == "escape"));

        let result = resolver.resolve(&cwd, "escape/nested/file");
        assert!(matches!(result, Err(Error::Confinement(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_inside_root_is_allowed() {
        let (temp, resolver) = setup();
        std::os::unix::fs::symlink(temp.path().join("etc"), temp.path().join("home/mash/cfg")).unwrap();

        let cwd = LogicalPath::parse("home/mash");
        let path = resolver.resolve(&cwd, "cfg").unwrap();
        assert_eq!(path.to_string(), "/home/mash/cfg");
    }

    #[test]
    fn test_resolve_dir_failures_carry_input() {
        let (_temp, resolver) = setup();
        let cwd = LogicalPath::parse("home/mash");

        let err = resolver.resolve_dir(&cwd, "missing").unwrap_err();
        assert!(matches!(err, Error::NotFound(ref s) if s == "missing"));

        let err = resolver.resolve_dir(&cwd, "/etc/passwd").unwrap_err();
        assert!(matches!(err, Error::NotADirectory(ref s) if s == "/etc/passwd"));

        let (path, host) = resolver.resolve_dir(&cwd, "docs").unwrap();
        assert_eq!(path.file_name(), Some("docs"));
        assert!(host.is_dir());
    }

    #[test]
    fn test_relative_string_form() {
        let path = LogicalPath::parse("/home//mash/");
        assert_eq!(path.to_relative_string(), "home/mash");
        assert_eq!(LogicalPath::root().to_string(), "/");
    }
}
