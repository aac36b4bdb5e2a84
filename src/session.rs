// src/session.rs

//! Per-shell identity and working directory
//!
//! A `Session` is an explicit value handed to every command handler; there is
//! no process-wide current user or directory.

use crate::accounts::{Account, AccountStore};
use crate::filesystem::{LogicalPath, PathResolver};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    user: String,
    cwd: LogicalPath,
    previous: Option<LogicalPath>,
}

impl Session {
    pub fn new(user: impl Into<String>, cwd: LogicalPath) -> Self {
        Self {
            user: user.into(),
            cwd,
            previous: None,
        }
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn cwd(&self) -> &LogicalPath {
        &self.cwd
    }

    /// Directory `cd -` returns to
    pub fn previous_dir(&self) -> Option<&LogicalPath> {
        self.previous.as_ref()
    }

    pub fn change_dir(&mut self, dir: LogicalPath) {
        let previous = std::mem::replace(&mut self.cwd, dir);
        self.previous = Some(previous);
    }

    pub fn is_privileged(&self, store: &AccountStore) -> bool {
        store.is_privileged(&self.user)
    }

    /// Home directory of the current user, falling back to `/home/<user>`
    pub fn home_dir(&self, store: &AccountStore) -> LogicalPath {
        match store.account(&self.user) {
            Some(account) => LogicalPath::parse(&account.home),
            None => LogicalPath::parse(&format!("home/{}", self.user)),
        }
    }

    /// Become `account`. The working directory moves to its home when that
    /// home exists inside the root, and stays put otherwise.
    pub fn switch_user(&mut self, account: &Account, resolver: &PathResolver) {
        self.user = account.username.clone();

        let home = LogicalPath::parse(&account.home);
        if let Ok(host) = resolver.confine(&home, &account.home)
            && host.is_dir()
        {
            self.change_dir(home);
        }
    }

    /// A copy of this session acting as `user`, for one elevated command
    pub fn elevated(&self, user: &str) -> Session {
        Session {
            user: user.to_string(),
            ..self.clone()
        }
    }

    /// Environment handed to external commands
    pub fn environment(&self, resolver: &PathResolver) -> Vec<(&'static str, String)> {
        vec![
            ("MASHFS_ROOT", resolver.root().display().to_string()),
            ("MASHFS_CWD", self.cwd.to_relative_string()),
            ("USER", self.user.clone()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Layout, SecretStorage};
    use std::fs;
    use tempfile::TempDir;

    fn setup() -> (TempDir, PathResolver, AccountStore) {
        let temp = TempDir::new().unwrap();
        let layout = Layout::new(temp.path());
        let store = AccountStore::open(&layout, SecretStorage::Plain).unwrap();
        let resolver = PathResolver::new(temp.path()).unwrap();
        (temp, resolver, store)
    }

    #[test]
    fn test_change_dir_tracks_previous() {
        let mut session = Session::new("mash", LogicalPath::parse("home/mash"));
        assert!(session.previous_dir().is_none());

        session.change_dir(LogicalPath::parse("etc"));
        assert_eq!(session.cwd().to_string(), "/etc");
        assert_eq!(session.previous_dir().unwrap().to_string(), "/home/mash");
    }

    #[test]
    fn test_switch_user_moves_to_existing_home() {
        let (temp, resolver, store) = setup();
        fs::create_dir_all(temp.path().join("home/arbung")).unwrap();

        let mut session = Session::new("mash", LogicalPath::parse("etc"));
        session.switch_user(store.account("arbung").unwrap(), &resolver);

        assert_eq!(session.user(), "arbung");
        assert_eq!(session.cwd().to_string(), "/home/arbung");
    }

    #[test]
    fn test_switch_user_without_home_keeps_cwd() {
        let (_temp, resolver, store) = setup();

        let mut session = Session::new("mash", LogicalPath::parse("etc"));
        session.switch_user(store.account("root").unwrap(), &resolver);

        assert_eq!(session.user(), "root");
        assert_eq!(session.cwd().to_string(), "/etc");
    }

    #[test]
    fn test_elevated_copy_leaves_original() {
        let (_temp, _resolver, store) = setup();
        let session = Session::new("mash", LogicalPath::parse("home/mash"));

        let elevated = session.elevated("root");
        assert!(elevated.is_privileged(&store));
        assert!(!session.is_privileged(&store));
        assert_eq!(elevated.cwd(), session.cwd());
    }

    #[test]
    fn test_environment_exports_position() {
        let (_temp, resolver, _store) = setup();
        let session = Session::new("mash", LogicalPath::parse("home/mash"));

        let env = session.environment(&resolver);
        assert!(env.contains(&("MASHFS_CWD", "home/mash".to_string())));
        assert!(env.contains(&("USER", "mash".to_string())));
    }
}
