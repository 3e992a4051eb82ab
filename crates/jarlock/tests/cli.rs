//! End-to-end runs of the `jarlock` binary against a file-based repository.

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const MAGIC_SHA: &str = "de3a84a06968190ff02aa763f0ca6691ad0d5d880ae849fa1a44ed119f3d3df1";

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let workspace = Self {
            dir: TempDir::new().unwrap(),
        };
        workspace.publish("com/example/app/1.0.0/app-1.0.0", b"app", Some("com.example:lib:2.0.0"));
        workspace.publish("com/example/lib/2.0.0/lib-2.0.0", b"magic!", None);
        workspace.configure(&["com.example:app:1.0.0"]);
        workspace
    }

    fn path(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    fn repo_url(&self) -> String {
        url::Url::from_directory_path(self.path("repo"))
            .unwrap()
            .to_string()
    }

    fn write(path: &Path, bytes: &[u8]) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, bytes).unwrap();
    }

    fn publish(&self, base: &str, jar: &[u8], dependency: Option<&str>) {
        let segments: Vec<&str> = base.split('/').collect();
        let version = segments[segments.len() - 2];
        let artifact = segments[segments.len() - 3];
        let group = segments[..segments.len() - 3].join(".");
        let dependencies = dependency.map_or_else(String::new, |d| {
            let parts: Vec<&str> = d.split(':').collect();
            format!(
                "<dependencies><dependency><groupId>{}</groupId><artifactId>{}</artifactId><version>{}</version></dependency></dependencies>",
                parts[0], parts[1], parts[2]
            )
        });
        let pom = format!(
            "<project><modelVersion>4.0.0</modelVersion><groupId>{group}</groupId><artifactId>{artifact}</artifactId><version>{version}</version>{dependencies}</project>"
        );
        Self::write(&self.path(&format!("repo/{base}.jar")), jar);
        Self::write(&self.path(&format!("repo/{base}.pom")), pom.as_bytes());
    }

    fn configure(&self, artifacts: &[&str]) {
        let artifacts: Vec<String> = artifacts.iter().map(|a| format!("\"{a}\"")).collect();
        let config = format!(
            "repositories = [\"{}\"]\nartifacts = [{}]\ncache_dir = \"{}\"\n",
            self.repo_url(),
            artifacts.join(", "),
            self.path("cache").display()
        );
        Self::write(&self.path("jarlock.toml"), config.as_bytes());
    }

    fn jarlock(&self) -> Command {
        let mut cmd = Command::cargo_bin("jarlock").unwrap();
        cmd.current_dir(self.dir.path())
            .env("NETRC", self.path("no-netrc"))
            .env_remove("JARLOCK_MAX_THREADS")
            .env_remove("JARLOCK_CONFIG")
            .env_remove("RUST_LOG");
        cmd
    }

    fn lockfile(&self) -> String {
        std::fs::read_to_string(self.path("jarlock_install.json")).unwrap()
    }
}

#[test]
fn test_resolve_writes_lockfile() {
    let ws = Workspace::new();
    ws.jarlock()
        .args(["resolve", "--plain"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Locked 2 artifacts"));

    let lockfile = ws.lockfile();
    assert!(lockfile.contains(MAGIC_SHA));
    assert!(lockfile.contains("com.example:app"));
    assert!(lockfile.contains("com.example:lib"));
}

#[test]
fn test_resolve_is_reproducible() {
    let ws = Workspace::new();
    ws.jarlock().args(["resolve", "--plain"]).assert().success();
    let first = ws.lockfile();
    ws.jarlock()
        .args(["resolve", "--plain", "-j", "1"])
        .assert()
        .success();
    assert_eq!(ws.lockfile(), first);
}

#[test]
fn test_verify_detects_stale_lockfile() {
    let ws = Workspace::new();
    ws.jarlock().args(["resolve", "--plain"]).assert().success();
    ws.jarlock()
        .args(["verify", "--plain"])
        .assert()
        .success()
        .stdout(predicate::str::contains("up to date"));

    ws.configure(&["com.example:lib:2.0.0"]);
    ws.jarlock()
        .args(["verify", "--plain"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("out of date"));
}

#[test]
fn test_verify_without_lockfile() {
    let ws = Workspace::new();
    ws.jarlock()
        .args(["verify", "--plain"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Lockfile not found"));
}

#[test]
fn test_tampered_repository_fails_resolution() {
    let ws = Workspace::new();
    ws.jarlock().args(["resolve", "--plain"]).assert().success();
    let locked = ws.lockfile();

    std::fs::remove_dir_all(ws.path("cache")).unwrap();
    ws.publish("com/example/lib/2.0.0/lib-2.0.0", b"tampered", None);
    ws.jarlock()
        .args(["resolve", "--plain"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("com.example:lib"));
    assert_eq!(ws.lockfile(), locked);

    ws.jarlock()
        .args(["resolve", "--plain", "--repin"])
        .assert()
        .success();
    assert_ne!(ws.lockfile(), locked);
}

#[test]
fn test_print_path() {
    let ws = Workspace::new();
    ws.jarlock().args(["resolve", "--plain"]).assert().success();

    let output = ws
        .jarlock()
        .args(["print-path", "com.example:lib"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let path = PathBuf::from(String::from_utf8(output).unwrap().trim());
    assert!(path.starts_with(ws.path("cache")));
    assert_eq!(std::fs::read(path).unwrap(), b"magic!");

    ws.jarlock()
        .args(["print-path", "com.example:absent"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("not in the lockfile"));
}

#[test]
fn test_missing_config() {
    let dir = TempDir::new().unwrap();
    Command::cargo_bin("jarlock")
        .unwrap()
        .current_dir(dir.path())
        .env_remove("JARLOCK_CONFIG")
        .args(["resolve", "--plain"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Configuration file not found"));
}
