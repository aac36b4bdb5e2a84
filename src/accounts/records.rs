// src/accounts/records.rs

//! Account records in `etc/passwd` form
//!
//! `username:placeholder:uid:gid:displayname:home:shell`

use crate::error::{Error, Result};
use std::fmt;

/// Password placeholder written in the second field
pub const PLACEHOLDER: &str = "x";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub username: String,
    pub uid: u32,
    pub gid: u32,
    pub display_name: String,
    pub home: String,
    pub shell: String,
}

impl Account {
    pub fn new(username: &str, uid: u32, home: String, shell: &str) -> Self {
        Self {
            username: username.to_string(),
            uid,
            gid: uid,
            display_name: capitalize(username),
            home,
            shell: shell.to_string(),
        }
    }

    /// Parse one record line. `file` names the source for error messages.
    pub fn parse_line(line: &str, file: &str) -> Result<Self> {
        let fields: Vec<&str> = line.split(':').collect();
        if fields.len() < 7 {
            return Err(Error::Corrupt {
                path: file.to_string(),
                reason: format!("expected 7 fields, found {} in '{}'", fields.len(), line),
            });
        }

        let number = |index: usize, what: &str| {
            fields[index].parse::<u32>().map_err(|_| Error::Corrupt {
                path: file.to_string(),
                reason: format!("invalid {} '{}' for user '{}'", what, fields[index], fields[0]),
            })
        };

        Ok(Self {
            username: fields[0].to_string(),
            uid: number(2, "UID")?,
            gid: number(3, "GID")?,
            display_name: fields[4].to_string(),
            home: fields[5].to_string(),
            shell: fields[6].to_string(),
        })
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}:{}:{}:{}",
            self.username, PLACEHOLDER, self.uid, self.gid, self.display_name, self.home, self.shell
        )
    }
}

/// Usernames may not contain the record separator or whitespace
pub fn validate_username(username: &str) -> Result<()> {
    let valid = !username.is_empty()
        && !username.starts_with('-')
        && username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        && username != "."
        && username != "..";

    if valid {
        Ok(())
    } else {
        Err(Error::InvalidArgument(format!("invalid username '{}'", username)))
    }
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
