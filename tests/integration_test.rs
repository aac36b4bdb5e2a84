// tests/integration_test.rs

//! Integration tests for MashFS
//!
//! These tests drive the public API end to end: a temporary root, the account
//! store, the package lifecycle and the shell.

use mashfs::accounts::AccountStore;
use mashfs::config::{Layout, SecretStorage, ShellConfig};
use mashfs::filesystem::{LogicalPath, PathResolver};
use mashfs::packages::{ExternalResolver, PackageLifecycle, PackageState};
use mashfs::shell::{ScriptedPrompter, Shell};
use mashfs::Error;
use std::collections::BTreeMap;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tempfile::TempDir;
use walkdir::WalkDir;

struct Offline;

impl ExternalResolver for Offline {
    fn is_available(&self, _name: &str) -> bool {
        true
    }

    fn fetch(&self, name: &str) -> mashfs::Result<()> {
        Err(Error::ExternalDependency {
            name: name.to_string(),
            status: "offline".to_string(),
        })
    }
}

fn setup_root() -> (TempDir, Layout) {
    let temp = TempDir::new().unwrap();
    let layout = Layout::new(temp.path().canonicalize().unwrap());
    layout.ensure_skeleton("mash").unwrap();
    (temp, layout)
}

fn write_source(layout: &Layout, name: &str, bins: &[&str]) -> PathBuf {
    let source = layout.packages_dir().join(name);
    fs::create_dir_all(source.join("bin")).unwrap();
    for bin in bins {
        let path = source.join("bin").join(bin);
        fs::write(&path, format!("#!/bin/sh\necho {} > \"$MASHFS_ROOT/{}.out\"\n", bin, bin)).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    }
    source
}

/// Source tree carrying its own empty manifest, unknown to any repository
fn local_package(layout: &Layout, name: &str, bins: &[&str]) -> PathBuf {
    let source = write_source(layout, name, bins);
    fs::write(source.join("info.json"), "{}").unwrap();
    source
}

/// Repository declaring web -> utils, with source trees for both
fn web_and_utils(layout: &Layout) {
    fs::write(
        layout.repos_dir().join("main.json"),
        r#"{"packages": {"web": {"dependencies": ["utils"]}, "utils": {}}}"#,
    )
    .unwrap();
    write_source(layout, "web", &["serve", "route"]);
    write_source(layout, "utils", &["fmt"]);
}

fn lifecycle(layout: &Layout) -> PackageLifecycle {
    PackageLifecycle::open(layout, Rc::new(Offline)).unwrap()
}

fn link_targets(layout: &Layout) -> BTreeMap<String, PathBuf> {
    let mut links = BTreeMap::new();
    for entry in fs::read_dir(layout.bin_dir()).unwrap() {
        let path = entry.unwrap().path();
        if let Ok(target) = fs::read_link(&path) {
            links.insert(path.file_name().unwrap().to_string_lossy().to_string(), target);
        }
    }
    links
}

fn snapshot(dir: &Path) -> BTreeMap<PathBuf, (Vec<u8>, u32)> {
    WalkDir::new(dir)
        .into_iter()
        .map(|entry| entry.unwrap())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| {
            let relative = entry.path().strip_prefix(dir).unwrap().to_path_buf();
            let mode = entry.metadata().unwrap().permissions().mode();
            (relative, (fs::read(entry.path()).unwrap(), mode))
        })
        .collect()
}

fn shell(temp: &TempDir, user: &str, answers: &[&str]) -> Shell {
    let mut config = ShellConfig::new(temp.path());
    config.user = user.to_string();
    Shell::open(
        &config,
        Box::new(ScriptedPrompter::new(answers.iter().copied())),
        Rc::new(Offline),
    )
    .unwrap()
}

fn run(shell: &mut Shell, line: &str) -> (i32, String) {
    let mut out = Vec::new();
    let outcome = shell.execute(line, &mut out).unwrap();
    (outcome.status(), String::from_utf8(out).unwrap())
}

#[test]
fn test_add_links_every_binary_of_package_and_dependency() {
    let (_temp, layout) = setup_root();
    web_and_utils(&layout);

    let packman = lifecycle(&layout);
    let activations = packman.add("web").unwrap();

    let order: Vec<&str> = activations.iter().map(|a| a.package.as_str()).collect();
    assert_eq!(order, vec!["utils", "web"]);
    assert!(layout.enabled_dir().join("web").is_dir());
    assert!(layout.enabled_dir().join("utils").is_dir());

    let links = link_targets(&layout);
    assert_eq!(links.keys().collect::<Vec<_>>(), vec!["fmt", "route", "serve"]);
    assert!(links["serve"].starts_with(layout.enabled_dir().join("web")));
    assert!(links["fmt"].starts_with(layout.enabled_dir().join("utils")));
}

#[test]
fn test_disable_keeps_dependency_links() {
    let (_temp, layout) = setup_root();
    web_and_utils(&layout);

    let packman = lifecycle(&layout);
    packman.add("web").unwrap();
    let unlinked = packman.disable("web").unwrap();
    assert_eq!(unlinked, vec!["route", "serve"]);

    let states: BTreeMap<String, PackageState> = packman
        .list()
        .unwrap()
        .into_iter()
        .map(|status| (status.name, status.state))
        .collect();
    assert_eq!(states["web"], PackageState::Disabled);
    assert_eq!(states["utils"], PackageState::Enabled);

    let links = link_targets(&layout);
    assert_eq!(links.keys().collect::<Vec<_>>(), vec!["fmt"]);
    assert!(links["fmt"].starts_with(layout.enabled_dir().join("utils")));
}

#[test]
fn test_remove_then_info_not_found() {
    let (_temp, layout) = setup_root();
    local_package(&layout, "web", &["serve"]);

    let packman = lifecycle(&layout);
    packman.add("web").unwrap();
    packman.disable("web").unwrap();
    packman.remove("web").unwrap();

    assert!(!layout.disabled_dir().join("web").exists());
    assert!(!layout.cached_dir().join("web").exists());
    assert!(link_targets(&layout).is_empty());

    fs::remove_dir_all(layout.packages_dir().join("web")).unwrap();
    let packman = lifecycle(&layout);
    assert!(matches!(packman.info("web"), Err(Error::PackageNotFound(_))));
    assert!(matches!(packman.remove("web"), Err(Error::PackageNotFound(_))));
}

#[test]
fn test_enable_after_disable_restores_files() {
    let (_temp, layout) = setup_root();
    let source = local_package(&layout, "web", &["serve", "route"]);
    fs::create_dir_all(source.join("share/web")).unwrap();
    fs::write(source.join("share/web/index.html"), "<h1>hi</h1>").unwrap();

    let packman = lifecycle(&layout);
    packman.add("web").unwrap();
    let enabled = layout.enabled_dir().join("web");
    let before = snapshot(&enabled);
    let links_before = link_targets(&layout);

    packman.disable("web").unwrap();
    assert!(!enabled.exists());
    packman.enable("web").unwrap();

    assert_eq!(snapshot(&enabled), before);
    assert_eq!(link_targets(&layout), links_before);
}

#[test]
fn test_dependency_enabled_before_install_hook_runs() {
    let (_temp, layout) = setup_root();
    let pkg_a = write_source(&layout, "pkga", &[]);
    let pkg_b = local_package(&layout, "pkgb", &[]);
    fs::write(pkg_a.join("info.json"), r#"{"dependencies": ["pkgb"]}"#).unwrap();
    fs::write(
        pkg_a.join("install.sh"),
        "test -d \"$MASHFS_ROOT/opt/packman/enabled/pkgb\" || exit 7\necho \"$MASHFS_PACKAGE\" >> \"$MASHFS_ROOT/hooks.log\"\n",
    )
    .unwrap();
    fs::write(
        pkg_b.join("install.sh"),
        "echo \"$MASHFS_PACKAGE\" >> \"$MASHFS_ROOT/hooks.log\"\n",
    )
    .unwrap();

    let packman = lifecycle(&layout);
    let activations = packman.add("pkga").unwrap();

    assert!(activations.iter().all(|a| a.hook_ran));
    assert_eq!(
        fs::read_to_string(layout.root().join("hooks.log")).unwrap(),
        "pkgb\npkga\n"
    );
    assert_eq!(packman.locations().state("pkga"), PackageState::Enabled);
    assert_eq!(packman.locations().state("pkgb"), PackageState::Enabled);
}

#[test]
fn test_dependency_cycle_terminates_with_error() {
    let (_temp, layout) = setup_root();
    fs::write(
        layout.repos_dir().join("loop.json"),
        r#"{"packages": {"a": {"dependencies": ["b"]}, "b": {"dependencies": ["a"]}}}"#,
    )
    .unwrap();
    write_source(&layout, "a", &["x"]);
    write_source(&layout, "b", &["y"]);

    let packman = lifecycle(&layout);
    match packman.add("a") {
        Err(Error::DependencyCycle(chain)) => assert_eq!(chain, vec!["a", "b", "a"]),
        other => panic!("expected a dependency cycle, got {:?}", other.map(|a| a.len())),
    }
    assert!(!layout.enabled_dir().join("a").exists());
    assert!(!layout.enabled_dir().join("b").exists());
    assert!(link_targets(&layout).is_empty());
}

#[test]
fn test_created_account_authenticates_only_with_its_secret() {
    let (_temp, layout) = setup_root();
    let mut store = AccountStore::open(&layout, SecretStorage::Hashed).unwrap();

    store
        .create_account("alice", "root", || Ok("wonderland".to_string()))
        .unwrap();

    assert!(store.authenticate("alice", "wonderland"));
    for wrong in ["", "Wonderland", "wonderland ", "toor"] {
        assert!(!store.authenticate("alice", wrong));
    }

    let reopened = AccountStore::open(&layout, SecretStorage::Plain).unwrap();
    assert!(reopened.authenticate("alice", "wonderland"));
}

#[test]
fn test_uids_stay_distinct_across_adds_and_deletes() {
    let (_temp, layout) = setup_root();
    let mut store = AccountStore::open(&layout, SecretStorage::Plain).unwrap();

    let steps: &[(&str, bool)] = &[
        ("u1", true),
        ("u2", true),
        ("u1", false),
        ("u3", true),
        ("u1", true),
        ("arbung", false),
        ("u4", true),
        ("u3", false),
        ("u5", true),
    ];
    for (name, add) in steps {
        if *add {
            store.create_account(name, "root", || Ok("pw".to_string())).unwrap();
        } else {
            store.delete_account(name, "root").unwrap();
        }

        let mut uids: Vec<u32> = store.accounts().iter().map(|a| a.uid).collect();
        let total = uids.len();
        uids.sort_unstable();
        uids.dedup();
        assert_eq!(uids.len(), total, "duplicate uid after {}", name);
    }
}

#[test]
fn test_parent_walk_clamps_at_root() {
    let temp = TempDir::new().unwrap();
    fs::create_dir_all(temp.path().join("a/b/c/d")).unwrap();
    let resolver = PathResolver::new(temp.path()).unwrap();

    let deep = LogicalPath::parse("a/b/c/d");
    for n in 4..10 {
        let input = vec![".."; n].join("/");
        assert!(resolver.resolve(&deep, &input).unwrap().is_root());
    }

    let segments = ["a", "b", ".", "..", "", "zz"];
    for first in segments {
        for second in segments {
            for third in segments {
                for lead in ["", "/"] {
                    let input = format!("{}{}/{}/{}", lead, first, second, third);
                    let path = resolver.resolve(&deep, &input).unwrap();
                    let host = resolver.host_path(&path);
                    assert!(host.starts_with(resolver.root()), "{} escaped", input);
                }
            }
        }
    }
}

#[test]
fn test_symlink_out_of_root_is_rejected() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("root");
    fs::create_dir_all(root.join("home")).unwrap();
    std::os::unix::fs::symlink(temp.path(), root.join("home/escape")).unwrap();
    let resolver = PathResolver::new(&root).unwrap();

    let result = resolver.resolve(&LogicalPath::root(), "home/escape");
    assert!(matches!(result, Err(Error::Confinement(ref input)) if input == "home/escape"));
}

#[test]
fn test_shell_session_cd_and_su() {
    let temp = TempDir::new().unwrap();
    let mut shell = shell(&temp, "mash", &["kadzimoment", "toor"]);

    run(&mut shell, "cd ../..");
    assert_eq!(run(&mut shell, "pwd").1, "/\n");
    run(&mut shell, "cd ..");
    assert_eq!(run(&mut shell, "pwd").1, "/\n");

    assert_eq!(run(&mut shell, "su arbung").0, 0);
    assert_eq!(run(&mut shell, "whoami").1, "arbung\n");
    assert_eq!(shell.prompt(), "arbung@hardmash:/$ ");

    assert_eq!(run(&mut shell, "su").0, 0);
    assert_eq!(run(&mut shell, "whoami").1, "root\n");
    assert!(shell.prompt().ends_with("# "));
}

#[test]
fn test_shell_runs_linked_package_binary() {
    let temp = TempDir::new().unwrap();
    let mut shell = shell(&temp, "mash", &[]);
    let layout = shell.layout().clone();
    web_and_utils(&layout);

    let (status, output) = run(&mut shell, "packman add web");
    assert_eq!(status, 0, "{}", output);
    assert!(output.contains("Linked binary: fmt"));
    assert!(output.ends_with("Package web added and enabled successfully\n"));

    assert_eq!(run(&mut shell, "serve").0, 0);
    assert_eq!(fs::read_to_string(layout.root().join("serve.out")).unwrap(), "serve\n");

    run(&mut shell, "packman disable web");
    assert_eq!(run(&mut shell, "serve").1, "Command not found: serve\n");

    let (_, output) = run(&mut shell, "packman history");
    assert!(output.contains("disable web (applied)"));
    assert!(output.contains("add web (applied)"));
}
