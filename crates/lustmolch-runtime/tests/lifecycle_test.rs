//! End-to-end lifecycle tests against a temporary host layout.
//!
//! Host programs are replaced by a recording runner, so these tests check
//! the files lustmolch writes and the commands it would issue:
//! 1. Create (files, command order, registry)
//! 2. Port and address allocation across several containers
//! 3. Removal, including of containers that never fully existed
//! 4. SSH key installation and user management

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::cell::RefCell;
use std::net::Ipv4Addr;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::rc::Rc;

use lustmolch_common::config::LustmolchConfig;
use lustmolch_common::error::{LustmolchError, Result};
use lustmolch_common::types::ContainerName;
use lustmolch_runtime::host::{CommandRunner, HostCommand};
use lustmolch_runtime::manager::Manager;
use lustmolch_runtime::ssh::KeySource;

/// Records commands and fails those run by `fail_on`.
///
/// Like the system runner, failures of unchecked commands are swallowed.
#[derive(Clone, Default)]
struct RecordingRunner {
    log: Rc<RefCell<Vec<HostCommand>>>,
    fail_on: Option<&'static str>,
}

impl RecordingRunner {
    fn failing_on(program: &'static str) -> Self {
        Self {
            fail_on: Some(program),
            ..Self::default()
        }
    }

    fn programs(&self) -> Vec<String> {
        self.log.borrow().iter().map(|c| c.program.clone()).collect()
    }

    fn commands(&self) -> Vec<String> {
        self.log.borrow().iter().map(ToString::to_string).collect()
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&self, command: &HostCommand) -> Result<()> {
        self.log.borrow_mut().push(command.clone());
        if command.check && self.fail_on == Some(command.program.as_str()) {
            return Err(LustmolchError::Command {
                program: command.program.clone(),
                message: "exit status: 1".into(),
            });
        }
        Ok(())
    }
}

fn config_in(dir: &Path) -> LustmolchConfig {
    let mut config = LustmolchConfig::with_defaults(dir.join("etc/lustmolch.json"));
    config.settings.machines_dir = dir.join("machines");
    config.settings.www_root = dir.join("www");
    config.settings.nginx_sites_dir = dir.join("nginx");
    config.settings.network_dir = dir.join("network");
    config.settings.nspawn_dir = dir.join("nspawn");
    config
}

fn manager(dir: &Path, runner: &RecordingRunner) -> Manager {
    Manager::new(config_in(dir), Box::new(runner.clone())).expect("manager")
}

fn name(s: &str) -> ContainerName {
    ContainerName::new(s).expect("name")
}

// ── Create ───────────────────────────────────────────────────────────

#[test]
fn create_writes_host_and_container_files() {
    let dir = tempfile::tempdir().expect("tempdir");
    let runner = RecordingRunner::default();
    let mut manager = manager(dir.path(), &runner);

    let record = manager.create_container(&name("foo")).expect("create");
    assert_eq!(record.ssh_port, 10022);
    assert_eq!(record.url, "foo.stusta.de");

    let d = dir.path();
    assert!(d.join("www/foo").is_dir());
    let nginx = std::fs::read_to_string(d.join("nginx/foo")).expect("nginx");
    assert!(nginx.contains("server_name foo.stusta.de;"));
    let veth = std::fs::read_to_string(d.join("network/80-container-ve-foo.network")).expect("ve");
    assert!(veth.contains("Name=ve-foo"));
    let nspawn = std::fs::read_to_string(d.join("nspawn/foo.nspawn")).expect("nspawn");
    assert!(nspawn.contains("Hostname=foo"));

    let root = d.join("machines/foo");
    let sshd = std::fs::read_to_string(root.join("etc/ssh/sshd_config")).expect("sshd");
    assert!(sshd.contains("Port 10022"));
    assert!(root
        .join("etc/systemd/network/80-container-host0.network")
        .is_file());

    let mode = std::fs::metadata(root.join("opt/bootstrap.sh"))
        .expect("script")
        .permissions()
        .mode();
    assert_eq!(mode & 0o777, 0o755);
}

#[test]
fn create_runs_host_commands_in_order() {
    let dir = tempfile::tempdir().expect("tempdir");
    let runner = RecordingRunner::default();
    let mut manager = manager(dir.path(), &runner);
    let _ = manager.create_container(&name("foo")).expect("create");

    let programs = runner.programs();
    assert_eq!(programs.first().map(String::as_str), Some("debootstrap"));
    assert_eq!(programs.get(1).map(String::as_str), Some("systemd-nspawn"));
    assert_eq!(programs.last().map(String::as_str), Some("machinectl"));
    // two ranges, two rules each, plus SNAT
    assert_eq!(programs.iter().filter(|p| *p == "iptables").count(), 5);

    let commands = runner.commands();
    let root = dir.path().join("machines/foo");
    assert_eq!(
        commands[0],
        format!(
            "debootstrap buster {} http://mirror.stusta.de/debian",
            root.display()
        )
    );
    assert_eq!(
        commands[1],
        format!("systemd-nspawn -D {} /opt/bootstrap.sh", root.display())
    );
    assert_eq!(commands.last().map(String::as_str), Some("machinectl start foo"));
}

#[test]
fn create_records_container_in_registry() {
    let dir = tempfile::tempdir().expect("tempdir");
    let runner = RecordingRunner::default();
    let mut manager = manager(dir.path(), &runner);
    let _ = manager.create_container(&name("foo")).expect("create");

    let saved = LustmolchConfig::load(&dir.path().join("etc/lustmolch.json")).expect("load");
    let record = saved.containers.get("foo").expect("registered");
    assert_eq!(record.ssh_port, 10022);
    assert_eq!(record.ip_address_host, Ipv4Addr::new(192, 168, 0, 1));
    assert_eq!(record.ip_address_container, Ipv4Addr::new(192, 168, 0, 2));
}

#[test]
fn create_refuses_existing_root() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::create_dir_all(dir.path().join("machines/foo")).expect("root");
    let runner = RecordingRunner::default();
    let mut manager = manager(dir.path(), &runner);

    assert!(matches!(
        manager.create_container(&name("foo")),
        Err(LustmolchError::AlreadyExists { .. })
    ));
    assert!(runner.programs().is_empty());
}

#[test]
fn failed_bootstrap_aborts_without_registering() {
    let dir = tempfile::tempdir().expect("tempdir");
    let runner = RecordingRunner::failing_on("debootstrap");
    let mut manager = manager(dir.path(), &runner);

    assert!(manager.create_container(&name("foo")).is_err());
    assert_eq!(runner.programs(), vec!["debootstrap"]);
    assert!(manager.config().containers.is_empty());
    assert!(!dir.path().join("etc/lustmolch.json").exists());
}

#[test]
fn create_survives_failing_iptables() {
    let dir = tempfile::tempdir().expect("tempdir");
    let runner = RecordingRunner::failing_on("iptables");
    let mut manager = manager(dir.path(), &runner);

    let record = manager.create_container(&name("foo")).expect("create");
    assert_eq!(runner.programs().last().map(String::as_str), Some("machinectl"));
    assert!(runner.commands().iter().any(|c| c == "machinectl start foo"));

    let saved = LustmolchConfig::load(&dir.path().join("etc/lustmolch.json")).expect("load");
    assert_eq!(saved.containers["foo"].ssh_port, record.ssh_port);
}

// ── Allocation ───────────────────────────────────────────────────────

#[test]
fn successive_containers_get_next_port_and_link() {
    let dir = tempfile::tempdir().expect("tempdir");
    let runner = RecordingRunner::default();
    let mut manager = manager(dir.path(), &runner);

    let a = manager.create_container(&name("a")).expect("a");
    let b = manager.create_container(&name("b")).expect("b");
    let c = manager.create_container(&name("c")).expect("c");

    assert_eq!((a.ssh_port, b.ssh_port, c.ssh_port), (10022, 11022, 12022));
    assert_eq!(c.ip_address_host, Ipv4Addr::new(192, 168, 0, 9));
    assert_eq!(c.ip_address_container, Ipv4Addr::new(192, 168, 0, 10));
}

#[test]
fn removed_container_frees_its_port() {
    let dir = tempfile::tempdir().expect("tempdir");
    let runner = RecordingRunner::default();
    let mut manager = manager(dir.path(), &runner);

    let _ = manager.create_container(&name("a")).expect("a");
    let _ = manager.create_container(&name("b")).expect("b");
    manager.remove_container(&name("a")).expect("remove");

    let again = manager.create_container(&name("d")).expect("d");
    assert_eq!(again.ssh_port, 10022);
}

// ── Removal ──────────────────────────────────────────────────────────

#[test]
fn remove_deletes_everything_create_wrote() {
    let dir = tempfile::tempdir().expect("tempdir");
    let runner = RecordingRunner::default();
    let mut manager = manager(dir.path(), &runner);
    let _ = manager.create_container(&name("foo")).expect("create");

    manager.remove_container(&name("foo")).expect("remove");

    let d = dir.path();
    for path in [
        "www/foo",
        "nginx/foo",
        "network/80-container-ve-foo.network",
        "nspawn/foo.nspawn",
        "machines/foo",
    ] {
        assert!(!d.join(path).exists(), "{path} survived removal");
    }
    assert_eq!(runner.commands().last().map(String::as_str), Some("machinectl stop foo"));

    let saved = LustmolchConfig::load(&d.join("etc/lustmolch.json")).expect("load");
    assert!(saved.containers.is_empty());
}

#[test]
fn removing_unknown_container_succeeds() {
    let dir = tempfile::tempdir().expect("tempdir");
    let runner = RecordingRunner::default();
    let mut manager = manager(dir.path(), &runner);

    manager.remove_container(&name("ghost")).expect("remove");
    assert_eq!(runner.commands(), vec!["machinectl stop ghost"]);
}

#[test]
fn removing_after_failed_create_matches_removing_unknown() {
    let dir = tempfile::tempdir().expect("tempdir");
    let failing = RecordingRunner::failing_on("systemd-nspawn");
    let mut manager = manager(dir.path(), &failing);
    assert!(manager.create_container(&name("foo")).is_err());
    assert!(dir.path().join("nginx/foo").exists());

    manager.remove_container(&name("foo")).expect("remove");
    assert!(!dir.path().join("nginx/foo").exists());
    assert!(!dir.path().join("www/foo").exists());
    assert!(!dir.path().join("machines/foo").exists());
}

#[test]
fn failing_stop_does_not_abort_removal() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::create_dir_all(dir.path().join("machines/foo/etc")).expect("root");
    let runner = RecordingRunner::failing_on("machinectl");
    let mut manager = manager(dir.path(), &runner);

    manager.remove_container(&name("foo")).expect("remove");
    assert!(!dir.path().join("machines/foo").exists());
}

// ── Keys and users ───────────────────────────────────────────────────

#[test]
fn install_key_twice_gives_two_entries() {
    let dir = tempfile::tempdir().expect("tempdir");
    let runner = RecordingRunner::default();
    let mut manager = manager(dir.path(), &runner);
    let _ = manager.create_container(&name("foo")).expect("create");

    let key = KeySource::from_arg("ssh-ed25519 AAAA alice", true);
    let path = manager.install_ssh_key(&name("foo"), &key).expect("first");
    let _ = manager.install_ssh_key(&name("foo"), &key).expect("second");

    let content = std::fs::read_to_string(path).expect("read");
    assert_eq!(content, "ssh-ed25519 AAAA alice\nssh-ed25519 AAAA alice\n");
}

#[test]
fn install_key_from_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::create_dir_all(dir.path().join("machines/foo")).expect("root");
    let key_file = dir.path().join("id.pub");
    std::fs::write(&key_file, "ssh-rsa AAAA bob\n").expect("key");

    let runner = RecordingRunner::default();
    let manager = manager(dir.path(), &runner);
    let source = KeySource::from_arg(key_file.display().to_string(), false);
    let path = manager.install_ssh_key(&name("foo"), &source).expect("install");

    assert_eq!(std::fs::read_to_string(path).expect("read"), "ssh-rsa AAAA bob\n");
}

#[test]
fn update_containers_writes_assigned_keys_only() {
    let dir = tempfile::tempdir().expect("tempdir");
    let runner = RecordingRunner::default();
    let mut manager = manager(dir.path(), &runner);
    let _ = manager.create_container(&name("foo")).expect("create");

    manager
        .add_user("alice", &KeySource::from_arg("ssh-ed25519 AAAA alice\n", true))
        .expect("alice");
    manager
        .add_user("bob", &KeySource::from_arg("ssh-ed25519 BBBB bob", true))
        .expect("bob");
    manager.assign_user("alice", &name("foo")).expect("assign");
    manager.assign_user("alice", &name("foo")).expect("assign twice");
    manager.update_containers().expect("update");

    let keys = dir.path().join("machines/foo/root/.ssh/authorized_keys");
    assert_eq!(std::fs::read_to_string(&keys).expect("read"), "ssh-ed25519 AAAA alice\n");

    manager.remove_user("alice").expect("remove");
    manager.update_containers().expect("update");
    assert_eq!(std::fs::read_to_string(&keys).expect("read"), "");

    let saved = LustmolchConfig::load(&dir.path().join("etc/lustmolch.json")).expect("load");
    assert!(saved.users.contains_key("bob"));
    assert!(!saved.users.contains_key("alice"));
    assert!(saved.containers["foo"].users.is_empty());
}

#[test]
fn assigning_unknown_user_or_container_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    let runner = RecordingRunner::default();
    let mut manager = manager(dir.path(), &runner);
    manager
        .add_user("alice", &KeySource::from_arg("ssh-ed25519 AAAA alice", true))
        .expect("alice");

    assert!(matches!(
        manager.assign_user("alice", &name("nope")),
        Err(LustmolchError::NotFound { kind: "container", .. })
    ));
    assert!(matches!(
        manager.assign_user("mallory", &name("nope")),
        Err(LustmolchError::NotFound { kind: "user", .. })
    ));
}

#[test]
fn removing_unknown_user_succeeds() {
    let dir = tempfile::tempdir().expect("tempdir");
    let runner = RecordingRunner::default();
    let mut manager = manager(dir.path(), &runner);
    let _ = manager.create_container(&name("foo")).expect("create");
    manager
        .add_user("alice", &KeySource::from_arg("ssh-ed25519 AAAA alice", true))
        .expect("alice");
    manager.assign_user("alice", &name("foo")).expect("assign");

    manager.remove_user("mallory").expect("unknown user");
    assert_eq!(manager.config().containers["foo"].users, vec!["alice"]);

    manager.remove_user("alice").expect("remove");
    manager.remove_user("alice").expect("remove again");
    assert!(manager.config().containers["foo"].users.is_empty());
}
