// src/shell/builtins.rs

//! Built-in command handlers
//!
//! Each handler returns the exit status on success. Errors bubble up to
//! `Shell::run_command`, which prints them with the command name.

use super::dispatch::{Builtin, CommandLine};
use super::{Outcome, Shell, external, packman};
use crate::accounts::ROOT_USER;
use crate::error::{Error, Result};
use crate::filesystem::resolver::check_readable;
use crate::filesystem::{LogicalPath, tree};
use clap::error::ErrorKind;
use std::fs;
use std::io::Write;
use tracing::info;

const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

impl Shell {
    pub(super) fn run_builtin(&mut self, builtin: Builtin, args: &[String], out: &mut dyn Write) -> Result<i32> {
        match builtin {
            Builtin::Cd => self.cd(args, out),
            Builtin::Clear => {
                write!(out, "{}", CLEAR_SCREEN)?;
                Ok(0)
            }
            Builtin::Help => self.help(out),
            Builtin::Hostname => self.hostname_cmd(args, out),
            Builtin::Id => self.id(args, out),
            Builtin::Ls => self.ls(args, out),
            Builtin::Packman => self.packman(args, out),
            Builtin::Passwd => self.passwd(args, out),
            Builtin::Pwd => {
                writeln!(out, "{}", self.session.cwd())?;
                Ok(0)
            }
            Builtin::Su => self.su(args, out),
            Builtin::Useradd => self.useradd(args, out),
            Builtin::Userdel => self.userdel(args, out),
            Builtin::Usermod => self.usermod(args, out),
            Builtin::Whoami => {
                writeln!(out, "{}", self.session.user())?;
                Ok(0)
            }
            // routed before reaching here
            Builtin::Exit | Builtin::Sudo => Ok(0),
        }
    }

    fn cd(&mut self, args: &[String], out: &mut dyn Write) -> Result<i32> {
        let target = match args.first().map(String::as_str) {
            None => {
                let home = self.session.home_dir(&self.store);
                match self.resolver.resolve_dir(&LogicalPath::root(), &home.to_string()) {
                    Ok((home, _)) => home,
                    Err(_) => return Ok(0),
                }
            }
            Some("-") => {
                let previous = self
                    .session
                    .previous_dir()
                    .map(LogicalPath::to_string)
                    .ok_or_else(|| Error::InvalidArgument("OLDPWD not set".to_string()))?;
                let (previous, _) = self.resolver.resolve_dir(&LogicalPath::root(), &previous)?;
                writeln!(out, "{}", previous)?;
                previous
            }
            Some(input) => self.resolver.resolve_dir(self.session.cwd(), input)?.0,
        };

        self.session.change_dir(target);
        Ok(0)
    }

    fn ls(&self, args: &[String], out: &mut dyn Write) -> Result<i32> {
        let input = args.first().map(String::as_str).unwrap_or(".");
        let path = self.resolver.resolve(self.session.cwd(), input)?;
        let host = self.resolver.host_path(&path);

        if !host.exists() {
            return Err(Error::NotFound(input.to_string()));
        }
        if !host.is_dir() {
            writeln!(out, "{}", path.file_name().unwrap_or(input))?;
            return Ok(0);
        }
        check_readable(&host, input)?;

        let mut entries = Vec::new();
        for entry in fs::read_dir(&host)? {
            let entry = entry?;
            entries.push((entry.file_name().to_string_lossy().to_string(), entry.path()));
        }
        entries.sort();

        for (name, entry) in entries {
            if entry.is_dir() {
                writeln!(out, "{}/", name)?;
            } else if tree::is_executable(&entry) {
                writeln!(out, "{}*", name)?;
            } else {
                writeln!(out, "{}", name)?;
            }
        }
        Ok(0)
    }

    fn help(&self, out: &mut dyn Write) -> Result<i32> {
        writeln!(out, "Available commands:")?;
        for builtin in Builtin::ALL {
            writeln!(out, "  {}", builtin.usage())?;
        }

        let commands = external::list(&self.layout.bin_dir())?;
        if !commands.is_empty() {
            writeln!(out, "\nExternal commands:")?;
            for command in commands {
                writeln!(out, "  {}", command)?;
            }
        }
        Ok(0)
    }

    fn hostname_cmd(&mut self, args: &[String], out: &mut dyn Write) -> Result<i32> {
        let Some(name) = args.first() else {
            writeln!(out, "{}", self.hostname)?;
            return Ok(0);
        };

        if !self.session.is_privileged(&self.store) {
            return Err(Error::PermissionDenied(name.clone()));
        }
        if name.contains(['/', ':']) || name.chars().any(char::is_whitespace) {
            return Err(Error::InvalidArgument(format!("invalid hostname '{}'", name)));
        }

        fs::write(self.layout.hostname_file(), format!("{}\n", name))?;
        info!("Hostname changed from {} to {}", self.hostname, name);
        self.hostname = name.clone();
        Ok(0)
    }

    fn id(&self, args: &[String], out: &mut dyn Write) -> Result<i32> {
        let username = args.first().map(String::as_str).unwrap_or(self.session.user());
        let account = self
            .store
            .account(username)
            .ok_or_else(|| Error::UnknownUser(username.to_string()))?;

        write!(
            out,
            "uid={}({}) gid={}({})",
            account.uid, account.username, account.gid, account.username
        )?;
        if self.store.is_privileged(&account.username) {
            write!(out, " groups=sudo")?;
        }
        writeln!(out)?;
        Ok(0)
    }

    fn packman(&mut self, args: &[String], out: &mut dyn Write) -> Result<i32> {
        let parsed = match packman::parse(args) {
            Ok(parsed) => parsed,
            Err(e) => {
                write!(out, "{}", e.render())?;
                let status = match e.kind() {
                    ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                    _ => 1,
                };
                return Ok(status);
            }
        };

        packman::run(&parsed.command, &self.layout, self.external.clone(), out)
    }

    fn passwd(&mut self, args: &[String], out: &mut dyn Write) -> Result<i32> {
        let requested_by = self.session.user().to_string();
        let target = args.first().cloned().unwrap_or_else(|| requested_by.clone());
        let privileged = self.store.is_privileged(&requested_by);

        if target != requested_by && !privileged {
            return Err(Error::PermissionDenied(target));
        }
        if !self.store.exists(&target) {
            return Err(Error::UnknownUser(target));
        }

        let current = if privileged {
            None
        } else {
            Some(self.prompter.secret("Current password: ")?)
        };
        let new = self.prompter.secret("New password: ")?;
        let confirm = self.prompter.secret("Confirm new password: ")?;
        if new != confirm {
            return Err(Error::Mismatch("Passwords do not match".to_string()));
        }

        self.store
            .change_secret(&target, &requested_by, current.as_deref(), &new)?;
        writeln!(out, "Password for {} changed successfully", target)?;
        Ok(0)
    }

    fn su(&mut self, args: &[String], _out: &mut dyn Write) -> Result<i32> {
        let username = args.first().map(String::as_str).unwrap_or(ROOT_USER);
        if !self.store.exists(username) {
            return Err(Error::UnknownUser(username.to_string()));
        }

        let secret = self.prompter.secret("Password: ")?;
        if !self.store.authenticate(username, &secret) {
            return Err(Error::AuthenticationFailure);
        }

        let account = self
            .store
            .account(username)
            .cloned()
            .ok_or_else(|| Error::UnknownUser(username.to_string()))?;
        info!("{} switched to {}", self.session.user(), account.username);
        self.session.switch_user(&account, &self.resolver);
        Ok(0)
    }

    /// Run one command as another user, root by default. Unprivileged
    /// invokers must know the target's secret. The session is restored
    /// afterwards, including the working directory.
    pub(super) fn sudo(&mut self, args: &[String], out: &mut dyn Write) -> Result<Outcome> {
        let (target, words) = match args {
            [flag, user, rest @ ..] if flag == "-u" => (user.as_str(), rest),
            _ => (ROOT_USER, args),
        };
        let command = CommandLine::from_words(words)
            .ok_or_else(|| Error::InvalidArgument(format!("usage: {}", Builtin::Sudo.usage())))?;
        if !self.store.exists(target) {
            return Err(Error::UnknownUser(target.to_string()));
        }

        if !self.session.is_privileged(&self.store) {
            let secret = self.prompter.secret(&format!("[sudo] password for {}: ", target))?;
            if !self.store.authenticate(target, &secret) {
                return Err(Error::AuthenticationFailure);
            }
        }

        info!("{} running '{}' as {}", self.session.user(), command.name, target);
        let elevated = self.session.elevated(target);
        let saved = std::mem::replace(&mut self.session, elevated);
        let outcome = self.run_command(&command, out);
        self.session = saved;
        outcome
    }

    fn useradd(&mut self, args: &[String], out: &mut dyn Write) -> Result<i32> {
        let [username] = args else {
            return Err(Error::InvalidArgument(format!("usage: {}", Builtin::Useradd.usage())));
        };

        let prompt = format!("New password for {}: ", username);
        let prompter = &mut self.prompter;
        self.store
            .create_account(username, self.session.user(), || prompter.secret(&prompt))?;
        writeln!(out, "User {} added successfully", username)?;
        Ok(0)
    }

    fn userdel(&mut self, args: &[String], out: &mut dyn Write) -> Result<i32> {
        let [username] = args else {
            return Err(Error::InvalidArgument(format!("usage: {}", Builtin::Userdel.usage())));
        };
        self.require_not_current(username)?;

        self.store.delete_account(username, self.session.user())?;
        writeln!(out, "User {} deleted successfully", username)?;
        Ok(0)
    }

    fn usermod(&mut self, args: &[String], out: &mut dyn Write) -> Result<i32> {
        let [flag, value, username] = args else {
            return Err(Error::InvalidArgument(format!("usage: {}", Builtin::Usermod.usage())));
        };
        let requested_by = self.session.user().to_string();

        match flag.as_str() {
            "-aG" | "-G" => {
                self.store.add_to_privileged_set(username, value, &requested_by)?;
                writeln!(out, "User {} added to {} group", username, value)?;
            }
            "-rG" => {
                self.store
                    .remove_from_privileged_set(username, value, &requested_by)?;
                writeln!(out, "User {} removed from {} group", username, value)?;
            }
            "-s" => {
                self.store.set_shell(username, value, &requested_by)?;
                writeln!(out, "Shell for {} changed to {}", username, value)?;
            }
            "-d" => {
                self.store.set_home(username, value, &requested_by)?;
                writeln!(out, "Home for {} changed to {}", username, value)?;
            }
            "-l" => {
                self.require_not_current(username)?;
                self.store.rename_account(username, value, &requested_by)?;
                writeln!(out, "User {} renamed to {}", username, value)?;
            }
            _ => {
                return Err(Error::InvalidArgument(format!("usage: {}", Builtin::Usermod.usage())));
            }
        }
        Ok(0)
    }

    fn require_not_current(&self, username: &str) -> Result<()> {
        if username == self.session.user() {
            return Err(Error::InvalidArgument(format!(
                "user {} is currently logged in",
                username
            )));
        }
        Ok(())
    }
}
