// src/filesystem/tree.rs

//! Directory tree primitives used by every package state transition
//!
//! `replace_subtree` and `move_subtree` always clear the destination first,
//! so files removed from a source never linger at the destination.
//! `merge_tree` is the only primitive that leaves unrelated destination files
//! in place.

use crate::error::Result;
use std::fs;
use std::io;
use std::os::unix::fs::{PermissionsExt, symlink};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Prefix of staging directories created next to a destination
pub const STAGING_PREFIX: &str = ".staging-";

/// Copy `src` into `dst`, overwriting files at the same relative path and
/// leaving everything else in `dst` untouched.
pub fn merge_tree(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst)?;

    for entry in WalkDir::new(src).follow_links(false).min_depth(1) {
        let entry = entry.map_err(io::Error::from)?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let target = dst.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            if target.is_symlink() || target.is_file() {
                fs::remove_file(&target)?;
            }
            fs::create_dir_all(&target)?;
        } else if file_type.is_symlink() {
            remove_subtree(&target)?;
            symlink(fs::read_link(entry.path())?, &target)?;
        } else {
            if target.is_symlink() || target.is_dir() {
                remove_subtree(&target)?;
            }
            fs::copy(entry.path(), &target)?;
        }
    }

    Ok(())
}

/// Replace `dst` with a fresh copy of `src`.
///
/// The copy is staged in a sibling directory and renamed into place, so a
/// failed copy leaves the previous `dst` intact.
pub fn replace_subtree(src: &Path, dst: &Path) -> Result<()> {
    let parent = parent_of(dst)?;
    fs::create_dir_all(&parent)?;

    let staging = tempfile::Builder::new()
        .prefix(STAGING_PREFIX)
        .tempdir_in(&parent)?;
    merge_tree(src, staging.path())?;

    remove_subtree(dst)?;
    fs::rename(staging.path(), dst)?;

    debug!("Replaced {} from {}", dst.display(), src.display());
    Ok(())
}

/// Move `src` to `dst`, clearing whatever `dst` held before
pub fn move_subtree(src: &Path, dst: &Path) -> Result<()> {
    remove_subtree(dst)?;
    fs::create_dir_all(parent_of(dst)?)?;

    if let Err(e) = fs::rename(src, dst) {
        debug!("Rename {} failed ({}), copying instead", src.display(), e);
        replace_subtree(src, dst)?;
        remove_subtree(src)?;
    }

    debug!("Moved {} to {}", src.display(), dst.display());
    Ok(())
}

/// Remove a file, symlink or directory tree. Returns whether anything existed.
pub fn remove_subtree(path: &Path) -> Result<bool> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e.into()),
    };

    if metadata.is_dir() {
        fs::remove_dir_all(path)?;
    } else {
        fs::remove_file(path)?;
    }
    Ok(true)
}

/// Regular files directly inside `dir`, sorted by name. Missing `dir` is empty.
pub fn list_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Names of visible subdirectories of `dir`, sorted. Missing `dir` is empty.
pub fn list_dirs(dir: &Path) -> Result<Vec<String>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if !name.starts_with('.') && entry.path().is_dir() {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

/// Add read/execute permission bits (0o755)
pub fn make_executable(path: &Path) -> Result<()> {
    let mut permissions = fs::metadata(path)?.permissions();
    permissions.set_mode(permissions.mode() | 0o755);
    fs::set_permissions(path, permissions)?;
    Ok(())
}

pub fn is_executable(path: &Path) -> bool {
    fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

fn parent_of(path: &Path) -> Result<PathBuf> {
    path.parent().map(Path::to_path_buf).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} has no parent directory", path.display()),
        )
        .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_merge_overwrites_and_keeps_others() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        let dst = temp.path().join("dst");
        write(&src.join("bin/tool"), "new");
        write(&dst.join("bin/tool"), "old");
        write(&dst.join("notes.txt"), "keep me");

        merge_tree(&src, &dst).unwrap();

        assert_eq!(fs::read_to_string(dst.join("bin/tool")).unwrap(), "new");
        assert_eq!(fs::read_to_string(dst.join("notes.txt")).unwrap(), "keep me");
    }

    #[test]
    fn test_replace_drops_stale_files() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        let dst = temp.path().join("dst");
        write(&src.join("a"), "a");
        write(&dst.join("a"), "old a");
        write(&dst.join("stale/b"), "b");

        replace_subtree(&src, &dst).unwrap();

        assert_eq!(fs::read_to_string(dst.join("a")).unwrap(), "a");
        assert!(!dst.join("stale").exists());
        // no staging directory left behind
        assert_eq!(list_dirs(temp.path()).unwrap(), vec!["dst", "src"]);
    }

    #[test]
    fn test_move_replaces_destination() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("disabled/pkg");
        let dst = temp.path().join("enabled/pkg");
        write(&src.join("file"), "fresh");
        write(&dst.join("leftover"), "stale");

        move_subtree(&src, &dst).unwrap();

        assert!(!src.exists());
        assert_eq!(fs::read_to_string(dst.join("file")).unwrap(), "fresh");
        assert!(!dst.join("leftover").exists());
    }

    #[test]
    fn test_remove_subtree_reports_presence() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("tree");
        write(&dir.join("x/y"), "z");

        assert!(remove_subtree(&dir).unwrap());
        assert!(!remove_subtree(&dir).unwrap());
    }

    #[test]
    fn test_remove_dangling_symlink() {
        let temp = TempDir::new().unwrap();
        let link = temp.path().join("link");
        symlink(temp.path().join("nowhere"), &link).unwrap();

        assert!(remove_subtree(&link).unwrap());
        assert!(fs::symlink_metadata(&link).is_err());
    }

    #[test]
    fn test_make_executable() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("tool");
        write(&file, "#!/bin/sh\n");
        fs::set_permissions(&file, fs::Permissions::from_mode(0o644)).unwrap();

        assert!(!is_executable(&file));
        make_executable(&file).unwrap();
        assert!(is_executable(&file));
    }

    #[test]
    fn test_list_helpers_skip_hidden_and_missing() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("pkg")).unwrap();
        fs::create_dir_all(temp.path().join(".staging-abc")).unwrap();
        write(&temp.path().join("file"), "");

        assert_eq!(list_dirs(temp.path()).unwrap(), vec!["pkg"]);
        assert_eq!(list_files(temp.path()).unwrap(), vec![temp.path().join("file")]);
        assert!(list_files(&temp.path().join("missing")).unwrap().is_empty());
    }
}
