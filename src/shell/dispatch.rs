// src/shell/dispatch.rs

//! Command routing
//!
//! Built-in commands form a closed set. Any other name is looked up as an
//! external command in the shared `bin` directory.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Builtin {
    Cd,
    Clear,
    Exit,
    Help,
    Hostname,
    Id,
    Ls,
    Packman,
    Passwd,
    Pwd,
    Su,
    Sudo,
    Useradd,
    Userdel,
    Usermod,
    Whoami,
}

impl Builtin {
    /// Every built-in, sorted by name
    pub const ALL: [Builtin; 16] = [
        Builtin::Cd,
        Builtin::Clear,
        Builtin::Exit,
        Builtin::Help,
        Builtin::Hostname,
        Builtin::Id,
        Builtin::Ls,
        Builtin::Packman,
        Builtin::Passwd,
        Builtin::Pwd,
        Builtin::Su,
        Builtin::Sudo,
        Builtin::Useradd,
        Builtin::Userdel,
        Builtin::Usermod,
        Builtin::Whoami,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Builtin::Cd => "cd",
            Builtin::Clear => "clear",
            Builtin::Exit => "exit",
            Builtin::Help => "help",
            Builtin::Hostname => "hostname",
            Builtin::Id => "id",
            Builtin::Ls => "ls",
            Builtin::Packman => "packman",
            Builtin::Passwd => "passwd",
            Builtin::Pwd => "pwd",
            Builtin::Su => "su",
            Builtin::Sudo => "sudo",
            Builtin::Useradd => "useradd",
            Builtin::Userdel => "userdel",
            Builtin::Usermod => "usermod",
            Builtin::Whoami => "whoami",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|builtin| builtin.name() == name)
    }

    pub fn usage(&self) -> &'static str {
        match self {
            Builtin::Cd => "cd [path|-]",
            Builtin::Clear => "clear",
            Builtin::Exit => "exit",
            Builtin::Help => "help",
            Builtin::Hostname => "hostname [name]",
            Builtin::Id => "id [user]",
            Builtin::Ls => "ls [path]",
            Builtin::Packman => "packman <add|install|remove|enable|disable|list|info|doctor|history>",
            Builtin::Passwd => "passwd [user]",
            Builtin::Pwd => "pwd",
            Builtin::Su => "su [user]",
            Builtin::Sudo => "sudo [-u user] <command> [args...]",
            Builtin::Useradd => "useradd <user>",
            Builtin::Userdel => "userdel <user>",
            Builtin::Usermod => "usermod -aG|-rG sudo <user> | -s <shell> <user> | -d <home> <user> | -l <new> <old>",
            Builtin::Whoami => "whoami",
        }
    }
}

impl fmt::Display for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where a command name is handled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Builtin(Builtin),
    External(String),
}

pub fn route(name: &str) -> Target {
    match Builtin::from_name(name) {
        Some(builtin) => Target::Builtin(builtin),
        None => Target::External(name.to_string()),
    }
}

/// A command line split on whitespace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub name: String,
    pub args: Vec<String>,
}

impl CommandLine {
    /// `None` for a blank line
    pub fn parse(line: &str) -> Option<Self> {
        let mut words = line.split_whitespace().map(str::to_string);
        let name = words.next()?;
        Some(Self {
            name,
            args: words.collect(),
        })
    }

    pub fn from_words(words: &[String]) -> Option<Self> {
        let (name, args) = words.split_first()?;
        Some(Self {
            name: name.clone(),
            args: args.to_vec(),
        })
    }
}
