// src/main.rs

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mashfs::accounts::AccountStore;
use mashfs::config::{DEFAULT_CWD, DEFAULT_ROOT, DEFAULT_USER, Layout, SecretStorage, ShellConfig};
use mashfs::packages::ExternalResolver;
use mashfs::packages::hooks::PipResolver;
use mashfs::shell::packman::{self, PackmanCommand};
use mashfs::shell::{Shell, TerminalPrompter};
use std::io::{self, Write};
use std::path::PathBuf;
use std::rc::Rc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mashfs")]
#[command(author, version, about = "Confined Unix-like shell with accounts and a package manager", long_about = None)]
struct Cli {
    /// Host directory presented as /
    #[arg(long, env = "MASHFS_ROOT", default_value = DEFAULT_ROOT, global = true)]
    root: PathBuf,

    /// Starting directory, relative to the root
    #[arg(long, env = "MASHFS_CWD", default_value = DEFAULT_CWD, global = true)]
    cwd: String,

    /// User the session starts as
    #[arg(short, long, env = "MASHFS_USER", default_value = DEFAULT_USER, global = true)]
    user: String,

    /// Store new secrets as salted digests instead of plain text
    #[arg(long, env = "MASHFS_HASH_SECRETS", global = true)]
    hash_secrets: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the directory skeleton and default account files
    Init,
    /// Run one shell command line and exit with its status
    Exec {
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        line: Vec<String>,
    },
    /// Run the package manager without starting the shell
    Packman {
        #[command(subcommand)]
        command: PackmanCommand,
    },
}

fn main() -> Result<()> {
    // Logs go to stderr so they never mix with command output
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = ShellConfig::new(cli.root);
    config.cwd = cli.cwd;
    config.user = cli.user;
    if cli.hash_secrets {
        config.secret_storage = SecretStorage::Hashed;
    }
    let external: Rc<dyn ExternalResolver> = Rc::new(PipResolver::default());

    match cli.command {
        None => {
            let mut shell = open_shell(&config, external)?;
            shell.run()?;
            Ok(())
        }
        Some(Commands::Init) => {
            let layout = config.layout()?;
            layout.ensure_skeleton(&config.user)?;
            let store = AccountStore::open(&layout, config.secret_storage)
                .with_context(|| format!("Failed to open account store under {}", layout.root().display()))?;
            info!("Root has {} accounts", store.accounts().len());
            println!("MashFS root initialized at {}", layout.root().display());
            Ok(())
        }
        Some(Commands::Exec { line }) => {
            let mut shell = open_shell(&config, external)?;
            let mut stdout = io::stdout();
            let outcome = shell.execute(&line.join(" "), &mut stdout)?;
            stdout.flush()?;
            std::process::exit(outcome.status());
        }
        Some(Commands::Packman { command }) => {
            let layout = config.layout()?;
            layout.ensure_skeleton(&config.user)?;
            let root = layout
                .root()
                .canonicalize()
                .with_context(|| format!("Failed to resolve root {}", layout.root().display()))?;

            let mut stdout = io::stdout();
            let status = packman::run(&command, &Layout::new(root), external, &mut stdout)?;
            stdout.flush()?;
            std::process::exit(status);
        }
    }
}

fn open_shell(config: &ShellConfig, external: Rc<dyn ExternalResolver>) -> Result<Shell> {
    Shell::open(config, Box::new(TerminalPrompter), external)
        .with_context(|| format!("Failed to start a session for {} under {}", config.user, config.root.display()))
}
