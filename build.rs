// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

fn name_arg() -> Arg {
    Arg::new("name").required(true).help("Package name")
}

fn build_cli() -> Command {
    Command::new("mashfs")
        .version(env!("CARGO_PKG_VERSION"))
        .author("MashFS Contributors")
        .about("Confined Unix-like shell with accounts and a package manager")
        .subcommand_required(false)
        .arg(
            Arg::new("root")
                .long("root")
                .value_name("DIR")
                .env("MASHFS_ROOT")
                .default_value("filesfs")
                .help("Host directory presented as /"),
        )
        .arg(
            Arg::new("cwd")
                .long("cwd")
                .value_name("PATH")
                .env("MASHFS_CWD")
                .default_value("home/mash")
                .help("Starting directory, relative to the root"),
        )
        .arg(
            Arg::new("user")
                .short('u')
                .long("user")
                .env("MASHFS_USER")
                .default_value("mash")
                .help("User the session starts as"),
        )
        .arg(
            Arg::new("hash_secrets")
                .long("hash-secrets")
                .env("MASHFS_HASH_SECRETS")
                .action(ArgAction::SetTrue)
                .help("Store new secrets as salted digests instead of plain text"),
        )
        .subcommand(Command::new("init").about("Create the directory skeleton and default account files"))
        .subcommand(
            Command::new("exec")
                .about("Run one shell command line and exit with its status")
                .arg(Arg::new("line").required(true).num_args(1..).help("Command line")),
        )
        .subcommand(
            Command::new("packman")
                .about("Run the package manager without starting the shell")
                .subcommand_required(true)
                .subcommand(Command::new("add").about("Add a package, adding missing dependencies first").arg(name_arg()))
                .subcommand(Command::new("install").about("Install a package from its source tree").arg(name_arg()))
                .subcommand(Command::new("remove").about("Remove every installed copy of a package").arg(name_arg()))
                .subcommand(Command::new("enable").about("Enable a disabled or available package").arg(name_arg()))
                .subcommand(Command::new("disable").about("Disable an enabled package").arg(name_arg()))
                .subcommand(Command::new("list").about("List known and installed packages"))
                .subcommand(Command::new("info").about("Show package metadata, state and links").arg(name_arg()))
                .subcommand(
                    Command::new("doctor")
                        .about("Check enabled packages, links and the operation journal")
                        .arg(
                            Arg::new("fix")
                                .long("fix")
                                .action(ArgAction::SetTrue)
                                .help("Apply the repair plan and report again"),
                        ),
                )
                .subcommand(Command::new("history").about("Show the operation journal")),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let out_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    let man_dir = out_dir.join("man");
    fs::create_dir_all(&man_dir).expect("Failed to create man directory");

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();
    man.render(&mut buffer).expect("Failed to render man page");

    let man_path = man_dir.join("mashfs.1");
    fs::write(&man_path, buffer).expect("Failed to write man page");
}
