// src/accounts/mod.rs

//! Account and credential store
//!
//! Identity (`etc/passwd`) and secrets (`etc/shadow`) live in separate files
//! and are always rewritten together when a username changes. Membership of
//! the privileged set is kept in `etc/sudoers`; `root` is always a member.
//!
//! Every mutating operation takes the requesting username and applies the
//! same permission gate before touching anything.

pub mod records;
pub mod secret;

pub use records::Account;
pub use secret::{Credential, Secret};

use crate::config::{LOGIN_SHELL, Layout, SecretStorage};
use crate::error::{Error, Result};
use crate::filesystem::tree;
use crate::filesystem::{LogicalPath, PathResolver};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// Always privileged, never removable
pub const ROOT_USER: &str = "root";

/// The only group `usermod -aG` understands
pub const PRIVILEGED_GROUP: &str = "sudo";

const DEFAULT_ACCOUNTS: &[(&str, u32, &str, &str)] = &[
    ("root", 0, "Root", "toor"),
    ("mash", 1000, "Mash User", "mashka"),
    ("arbung", 1001, "ARBUNG", "kadzimoment"),
];

pub struct AccountStore {
    layout: Layout,
    storage: SecretStorage,
    accounts: Vec<Account>,
    credentials: Vec<Credential>,
    privileged: BTreeSet<String>,
}

impl AccountStore {
    /// Load the store, seeding default records when the files are missing
    pub fn open(layout: &Layout, storage: SecretStorage) -> Result<Self> {
        fs::create_dir_all(layout.etc_dir())?;
        seed_defaults(layout)?;

        let accounts = load_accounts(&layout.passwd_file())?;
        let credentials = load_credentials(&layout.shadow_file())?;
        let privileged = load_privileged(&layout.sudoers_file())?;

        debug!(
            "Loaded {} accounts, {} credentials, {} privileged users",
            accounts.len(),
            credentials.len(),
            privileged.len()
        );

        Ok(Self {
            layout: layout.clone(),
            storage,
            accounts,
            credentials,
            privileged,
        })
    }

    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    pub fn account(&self, username: &str) -> Option<&Account> {
        self.accounts.iter().find(|a| a.username == username)
    }

    pub fn exists(&self, username: &str) -> bool {
        self.account(username).is_some()
    }

    /// Plain check against the stored secret. Unknown users never match.
    pub fn authenticate(&self, username: &str, candidate: &str) -> bool {
        self.credential(username)
            .is_some_and(|c| c.secret.verify(candidate))
    }

    pub fn is_privileged(&self, username: &str) -> bool {
        self.privileged.contains(username)
    }

    pub fn privileged_users(&self) -> impl Iterator<Item = &str> {
        self.privileged.iter().map(String::as_str)
    }

    /// Create an account. `new_secret` is asked for only after the
    /// permission and uniqueness checks pass.
    pub fn create_account<F>(&mut self, username: &str, requested_by: &str, new_secret: F) -> Result<Account>
    where
        F: FnOnce() -> Result<String>,
    {
        self.require_privilege(requested_by, username)?;
        records::validate_username(username)?;
        if self.exists(username) {
            return Err(Error::AlreadyExists(format!("user {}", username)));
        }

        let secret = new_secret()?;
        secret::validate_secret(&secret)?;

        let account = Account::new(
            username,
            self.next_id()?,
            default_home(username),
            LOGIN_SHELL,
        );

        self.ensure_home(&account.home)?;

        let stored = self.store_secret(&secret)?;
        self.accounts.push(account.clone());
        self.credentials.retain(|c| c.username != username);
        self.credentials.push(Credential::new(username, stored));
        self.save_accounts()?;
        self.save_credentials()?;

        info!("Created account {} (uid {})", account.username, account.uid);
        Ok(account)
    }

    /// Rename an account, its credential and its privileged membership
    pub fn rename_account(&mut self, old: &str, new: &str, requested_by: &str) -> Result<()> {
        self.require_privilege(requested_by, old)?;
        if old == ROOT_USER {
            return Err(Error::PermissionDenied(old.to_string()));
        }
        self.require_account(old)?;
        records::validate_username(new)?;
        if self.exists(new) {
            return Err(Error::AlreadyExists(format!("user {}", new)));
        }

        for account in self.accounts.iter_mut().filter(|a| a.username == old) {
            account.username = new.to_string();
        }
        for credential in self.credentials.iter_mut().filter(|c| c.username == old) {
            credential.username = new.to_string();
        }
        let was_privileged = self.privileged.remove(old);
        if was_privileged {
            self.privileged.insert(new.to_string());
        }

        self.save_accounts()?;
        self.save_credentials()?;
        if was_privileged {
            self.save_privileged()?;
        }

        info!("Renamed account {} to {}", old, new);
        Ok(())
    }

    pub fn set_shell(&mut self, username: &str, shell: &str, requested_by: &str) -> Result<()> {
        self.require_privilege(requested_by, username)?;
        if shell.is_empty() || shell.contains([':', '\n']) {
            return Err(Error::InvalidArgument(format!("invalid shell '{}'", shell)));
        }

        self.account_mut(username)?.shell = shell.to_string();
        self.save_accounts()?;
        info!("Changed shell of {} to {}", username, shell);
        Ok(())
    }

    /// Point the account at a new home directory, creating it if needed
    pub fn set_home(&mut self, username: &str, home: &str, requested_by: &str) -> Result<()> {
        self.require_privilege(requested_by, username)?;
        if home.contains([':', '\n']) {
            return Err(Error::InvalidArgument(format!("invalid home '{}'", home)));
        }
        self.require_account(username)?;

        let home = LogicalPath::parse(home).to_string();
        self.ensure_home(&home)?;

        self.account_mut(username)?.home = home.clone();
        self.save_accounts()?;
        info!("Changed home of {} to {}", username, home);
        Ok(())
    }

    /// Delete the record, credential and privileged membership. The home
    /// tree goes too when it is the account's own `/home/<name>` directory
    /// and no other account lives there.
    pub fn delete_account(&mut self, username: &str, requested_by: &str) -> Result<()> {
        self.require_privilege(requested_by, username)?;
        if username == ROOT_USER {
            return Err(Error::PermissionDenied(username.to_string()));
        }
        let account = self.require_account(username)?.clone();

        self.accounts.retain(|a| a.username != username);
        self.credentials.retain(|c| c.username != username);
        let was_privileged = self.privileged.remove(username);

        self.save_accounts()?;
        self.save_credentials()?;
        if was_privileged {
            self.save_privileged()?;
        }

        let home = LogicalPath::parse(&account.home);
        let shared = self
            .accounts
            .iter()
            .any(|other| LogicalPath::parse(&other.home) == home);
        if home.to_string() == default_home(username) && !shared {
            let resolver = PathResolver::new(self.layout.root())?;
            let host = resolver.confine(&home, &account.home)?;
            tree::remove_subtree(&host)?;
        } else {
            warn!("Keeping home {} of deleted account {}", home, username);
        }

        info!("Deleted account {}", username);
        Ok(())
    }

    /// Change a secret. Users may change their own; privileged users may
    /// change anyone's without knowing the current one.
    pub fn change_secret(
        &mut self,
        target: &str,
        requested_by: &str,
        current: Option<&str>,
        new: &str,
    ) -> Result<()> {
        let privileged = self.is_privileged(requested_by);
        if target != requested_by && !privileged {
            return Err(Error::PermissionDenied(target.to_string()));
        }
        self.require_account(target)?;

        if !privileged && !current.is_some_and(|c| self.authenticate(target, c)) {
            return Err(Error::AuthenticationFailure);
        }
        secret::validate_secret(new)?;

        let stored = self.store_secret(new)?;
        match self.credentials.iter_mut().find(|c| c.username == target) {
            Some(credential) => credential.secret = stored,
            None => self.credentials.push(Credential::new(target, stored)),
        }
        self.save_credentials()?;

        info!("Changed secret for {}", target);
        Ok(())
    }

    pub fn add_to_privileged_set(&mut self, username: &str, group: &str, requested_by: &str) -> Result<()> {
        require_privileged_group(group)?;
        self.require_privilege(requested_by, username)?;
        self.require_account(username)?;

        if self.privileged.insert(username.to_string()) {
            self.save_privileged()?;
            info!("Granted {} to {}", PRIVILEGED_GROUP, username);
        }
        Ok(())
    }

    pub fn remove_from_privileged_set(&mut self, username: &str, group: &str, requested_by: &str) -> Result<()> {
        require_privileged_group(group)?;
        self.require_privilege(requested_by, username)?;
        if username == ROOT_USER {
            return Err(Error::PermissionDenied(username.to_string()));
        }

        if self.privileged.remove(username) {
            self.save_privileged()?;
            info!("Revoked {} from {}", PRIVILEGED_GROUP, username);
        }
        Ok(())
    }

    fn require_privilege(&self, requested_by: &str, target: &str) -> Result<()> {
        if self.is_privileged(requested_by) {
            Ok(())
        } else {
            Err(Error::PermissionDenied(target.to_string()))
        }
    }

    fn require_account(&self, username: &str) -> Result<&Account> {
        self.account(username)
            .ok_or_else(|| Error::UnknownUser(username.to_string()))
    }

    fn account_mut(&mut self, username: &str) -> Result<&mut Account> {
        self.accounts
            .iter_mut()
            .find(|a| a.username == username)
            .ok_or_else(|| Error::UnknownUser(username.to_string()))
    }

    fn credential(&self, username: &str) -> Option<&Credential> {
        self.credentials.iter().find(|c| c.username == username)
    }

    /// Never collides with an existing uid or gid
    fn next_id(&self) -> Result<u32> {
        match self.accounts.iter().map(|a| a.uid.max(a.gid)).max() {
            None => Ok(1000),
            Some(id) => id
                .checked_add(1)
                .ok_or_else(|| Error::InvalidArgument(format!("no free uid above {}", id))),
        }
    }

    fn store_secret(&self, secret: &str) -> Result<Secret> {
        match self.storage {
            SecretStorage::Plain => Ok(Secret::Plain(secret.to_string())),
            SecretStorage::Hashed => Secret::hashed(secret),
        }
    }

    fn ensure_home(&self, home: &str) -> Result<()> {
        let path = LogicalPath::parse(home);
        let resolver = PathResolver::new(self.layout.root())?;
        let host = resolver.confine(&path, home)?;
        fs::create_dir_all(host)?;
        Ok(())
    }

    fn save_accounts(&self) -> Result<()> {
        let lines = self.accounts.iter().map(ToString::to_string);
        write_records(&self.layout.passwd_file(), lines)
    }

    fn save_credentials(&self) -> Result<()> {
        let lines = self.credentials.iter().map(ToString::to_string);
        write_records(&self.layout.shadow_file(), lines)
    }

    fn save_privileged(&self) -> Result<()> {
        let lines = self.privileged.iter().cloned();
        write_records(&self.layout.sudoers_file(), lines)
    }
}

fn require_privileged_group(group: &str) -> Result<()> {
    if group == PRIVILEGED_GROUP {
        Ok(())
    } else {
        Err(Error::InvalidArgument(format!("group {} not supported", group)))
    }
}

fn default_home(username: &str) -> String {
    format!("/home/{}", username)
}

fn seed_defaults(layout: &Layout) -> Result<()> {
    let passwd = layout.passwd_file();
    if !passwd.exists() {
        let lines = DEFAULT_ACCOUNTS.iter().map(|(name, uid, display, _)| {
            Account {
                username: name.to_string(),
                uid: *uid,
                gid: *uid,
                display_name: display.to_string(),
                home: default_home(name),
                shell: LOGIN_SHELL.to_string(),
            }
            .to_string()
        });
        write_records(&passwd, lines)?;
        info!("Seeded default accounts in {}", passwd.display());
    }

    let shadow = layout.shadow_file();
    if !shadow.exists() {
        let lines = DEFAULT_ACCOUNTS
            .iter()
            .map(|(name, _, _, secret)| format!("{}:{}", name, secret));
        write_records(&shadow, lines)?;
        info!("Seeded default credentials in {}", shadow.display());
    }

    Ok(())
}

fn record_lines(content: &str) -> impl Iterator<Item = &str> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
}

fn load_accounts(path: &Path) -> Result<Vec<Account>> {
    let content = fs::read_to_string(path)?;
    let name = path.display().to_string();
    record_lines(&content)
        .map(|line| Account::parse_line(line, &name))
        .collect()
}

fn load_credentials(path: &Path) -> Result<Vec<Credential>> {
    let content = fs::read_to_string(path)?;
    Ok(record_lines(&content).filter_map(Credential::parse_line).collect())
}

fn load_privileged(path: &Path) -> Result<BTreeSet<String>> {
    let mut privileged = BTreeSet::new();
    if path.exists() {
        let content = fs::read_to_string(path)?;
        privileged.extend(record_lines(&content).map(str::to_string));
    }
    privileged.insert(ROOT_USER.to_string());
    Ok(privileged)
}

/// Write the whole file through a temporary sibling and rename it into place
fn write_records<I>(path: &Path, lines: I) -> Result<()>
where
    I: IntoIterator<Item = String>,
{
    let mut content = String::new();
    for line in lines {
        content.push_str(&line);
        content.push('\n');
    }

    let temp_path = path.with_extension("tmp");
    fs::write(&temp_path, content)?;
    fs::rename(&temp_path, path)?;
    Ok(())
}
