// src/shell/mod.rs

//! The MashFS shell
//!
//! A `Shell` owns the confined root, the account store and one session. Each
//! command line is routed to a built-in or to an executable in the shared
//! `bin` directory. Command failures are printed as `<cmd>: <message>` and
//! give status 1; they never end the session.

mod builtins;
pub mod dispatch;
pub mod external;
pub mod packman;
pub mod prompt;
pub mod signals;

pub use dispatch::{Builtin, CommandLine};
pub use prompt::{Prompter, ScriptedPrompter, TerminalPrompter};

use crate::accounts::AccountStore;
use crate::config::{DEFAULT_HOSTNAME, Layout, ShellConfig};
use crate::error::{Error, Result};
use crate::filesystem::{LogicalPath, PathResolver};
use crate::packages::ExternalResolver;
use crate::session::Session;
use dispatch::Target;
use std::fs;
use std::io::{self, BufRead, Write};
use std::rc::Rc;
use tracing::{info, warn};

/// Result of one command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Status(i32),
    Exit,
}

impl Outcome {
    pub fn status(&self) -> i32 {
        match self {
            Outcome::Status(code) => *code,
            Outcome::Exit => 0,
        }
    }
}

pub struct Shell {
    layout: Layout,
    resolver: PathResolver,
    store: AccountStore,
    session: Session,
    hostname: String,
    prompter: Box<dyn Prompter>,
    external: Rc<dyn ExternalResolver>,
}

impl Shell {
    /// Prepare the root and log in as the configured user.
    ///
    /// Fails when the account files cannot be read or the user is unknown.
    pub fn open(
        config: &ShellConfig,
        prompter: Box<dyn Prompter>,
        external: Rc<dyn ExternalResolver>,
    ) -> Result<Self> {
        let layout = config.layout()?;
        layout.ensure_skeleton(&config.user)?;

        let resolver = PathResolver::new(layout.root())?;
        let layout = Layout::new(resolver.root());
        let store = AccountStore::open(&layout, config.secret_storage)?;
        if !store.exists(&config.user) {
            return Err(Error::UnknownUser(config.user.clone()));
        }

        let cwd = match resolver.resolve_dir(&LogicalPath::root(), &config.cwd) {
            Ok((cwd, _)) => cwd,
            Err(e) => {
                warn!("Starting at / instead of {}: {}", config.cwd, e);
                LogicalPath::root()
            }
        };

        let hostname = read_hostname(&layout)?;
        info!("Session for {} at {} under {}", config.user, cwd, resolver.root().display());

        Ok(Self {
            session: Session::new(config.user.clone(), cwd),
            layout,
            resolver,
            store,
            hostname,
            prompter,
            external,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn store(&self) -> &AccountStore {
        &self.store
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// `user@host:~/dir$ `, with `#` for privileged users
    pub fn prompt(&self) -> String {
        let home = self.session.home_dir(&self.store);
        let cwd = self.session.cwd();

        let location = match cwd.segments().strip_prefix(home.segments()) {
            Some(rest) if !home.is_root() && rest.is_empty() => "~".to_string(),
            Some(rest) if !home.is_root() => format!("~/{}", rest.join("/")),
            _ => cwd.to_string(),
        };
        let marker = if self.session.is_privileged(&self.store) { '#' } else { '$' };

        format!("{}@{}:{}{} ", self.session.user(), self.hostname, location, marker)
    }

    /// Run one command line. Errors of the command itself are printed to
    /// `out`; only a failure to write to `out` is returned.
    pub fn execute(&mut self, line: &str, out: &mut dyn Write) -> Result<Outcome> {
        match CommandLine::parse(line) {
            Some(command) => self.run_command(&command, out),
            None => Ok(Outcome::Status(0)),
        }
    }

    fn run_command(&mut self, command: &CommandLine, out: &mut dyn Write) -> Result<Outcome> {
        let result = match dispatch::route(&command.name) {
            Target::Builtin(Builtin::Exit) => {
                writeln!(out, "Goodbye!")?;
                return Ok(Outcome::Exit);
            }
            Target::Builtin(Builtin::Sudo) => match self.sudo(&command.args, out) {
                Ok(outcome) => return Ok(outcome),
                Err(e) => Err(e),
            },
            Target::Builtin(builtin) => self.run_builtin(builtin, &command.args, out),
            Target::External(name) => self.run_external(&name, &command.args),
        };

        match result {
            Ok(status) => Ok(Outcome::Status(status)),
            Err(Error::CommandNotFound(name)) => {
                writeln!(out, "{}", Error::CommandNotFound(name))?;
                Ok(Outcome::Status(1))
            }
            Err(e) => {
                writeln!(out, "{}: {}", command.name, e)?;
                Ok(Outcome::Status(1))
            }
        }
    }

    fn run_external(&self, name: &str, args: &[String]) -> Result<i32> {
        let program = external::find(&self.resolver, &self.layout.bin_dir(), name)?;
        let cwd = self.session.cwd();
        let host_cwd = self.resolver.confine(cwd, &cwd.to_string())?;
        external::run(&program, args, &host_cwd, &self.session.environment(&self.resolver))
    }

    /// Read-eval loop on stdin until `exit` or end of input
    pub fn run(&mut self) -> Result<()> {
        signals::install()?;
        let stdin = io::stdin();
        let mut stdout = io::stdout();

        writeln!(stdout, "Welcome to MashFS Shell! (Logged in as {})", self.session.user())?;
        writeln!(stdout, "Type 'help' for available commands")?;
        writeln!(stdout, "Type 'exit' to quit")?;

        loop {
            write!(stdout, "{}", self.prompt())?;
            stdout.flush()?;

            let mut line = String::new();
            match stdin.lock().read_line(&mut line) {
                Ok(0) => {
                    writeln!(stdout)?;
                    return Ok(());
                }
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }

            if self.execute(&line, &mut stdout)? == Outcome::Exit {
                return Ok(());
            }
        }
    }
}

fn read_hostname(layout: &Layout) -> Result<String> {
    match fs::read_to_string(layout.hostname_file()) {
        Ok(content) if !content.trim().is_empty() => Ok(content.trim().to_string()),
        Ok(_) => Ok(DEFAULT_HOSTNAME.to_string()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(DEFAULT_HOSTNAME.to_string()),
        Err(e) => Err(e.into()),
    }
}
