use std::fs;
use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

fn lampkit_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("lampkit"));
    cmd.env("HOME", home)
        .env("NO_COLOR", "1")
        .env("RUST_LOG", "warn")
        .env_remove("GITHUB_TOKEN");
    cmd
}

fn write_manifest(dir: &TempDir, contents: &str) -> String {
    let path = dir.path().join("repos.json");
    fs::write(&path, contents).expect("manifest");
    path.display().to_string()
}

#[test]
fn missing_manifest_exits_non_zero() {
    let home = TempDir::new().expect("home");
    let manifest = home.path().join("absent.json").display().to_string();

    lampkit_cmd(home.path())
        .args(["provision", "--skip-supervisor", "--manifest", &manifest])
        .assert()
        .failure()
        .stderr(contains("manifest"));
}

#[test]
fn malformed_manifest_exits_non_zero() {
    let home = TempDir::new().expect("home");
    let manifest = write_manifest(&home, r#"{"org": "acme"}"#);

    lampkit_cmd(home.path())
        .args(["provision", "--manifest", &manifest])
        .assert()
        .failure()
        .stderr(contains("must be a list"));
}

#[test]
fn empty_manifest_exits_zero() {
    let home = TempDir::new().expect("home");
    let manifest = write_manifest(&home, "[]");

    lampkit_cmd(home.path())
        .args(["provision", "--strict", "--manifest", &manifest])
        .assert()
        .success()
        .stdout(contains("nothing to set up"));
}

#[test]
fn empty_manifest_json_summary() {
    let home = TempDir::new().expect("home");
    let manifest = write_manifest(&home, "[]");

    let output = lampkit_cmd(home.path())
        .args(["provision", "--json", "--manifest", &manifest])
        .output()
        .expect("run lampkit");
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json stdout");
    assert_eq!(json["setup"].as_array().map(Vec::len), Some(0));
    assert_eq!(json["publish"].as_array().map(Vec::len), Some(0));
    assert_eq!(json["configured"], 0);
    assert_eq!(json["failed"], false);
    assert_eq!(json["supervisor"]["status"], "skipped");
}

#[test]
fn validate_reports_invalid_entries() {
    let home = TempDir::new().expect("home");
    let manifest = write_manifest(
        &home,
        r#"[{"org":"acme","repo":"api","target_dir":"/projects"},{"org":"acme","repo":"bad"}]"#,
    );

    lampkit_cmd(home.path())
        .args([
            "validate",
            "--manifest",
            &manifest,
            "--projects-root",
            "/srv/dev",
            "--web-root",
            "/srv/www",
        ])
        .assert()
        .failure()
        .stdout(contains("2 entries, 1 valid, 1 invalid"))
        .stdout(contains("/srv/dev/projects/api"))
        .stdout(contains("/srv/www/api"))
        .stdout(contains("target_dir"));
}

#[test]
fn config_file_supplies_manifest() {
    let home = TempDir::new().expect("home");
    let manifest = write_manifest(&home, r#"[{"org":"acme","repo":"api","target_dir":"/p"}]"#);
    let config = home.path().join("lampkit.yaml");
    fs::write(&config, format!("manifest: {manifest}\nweb_root: /srv/www\n")).expect("config");

    lampkit_cmd(home.path())
        .args(["validate", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(contains("1 valid"))
        .stdout(contains("/srv/www/api"));
}

#[test]
fn detect_prints_ecosystems() {
    let home = TempDir::new().expect("home");
    let repo = home.path().join("shop");
    fs::create_dir_all(&repo).expect("repo");
    fs::write(repo.join("composer.json"), "{}").expect("composer.json");
    fs::write(repo.join("package.json"), "{}").expect("package.json");
    fs::write(repo.join("yarn.lock"), "").expect("yarn.lock");

    lampkit_cmd(home.path())
        .arg("detect")
        .arg(&repo)
        .assert()
        .success()
        .stdout(contains("php + node:yarn"));
}

#[test]
fn detect_missing_directory_fails() {
    let home = TempDir::new().expect("home");
    lampkit_cmd(home.path())
        .args(["detect", "/definitely/not/here"])
        .assert()
        .failure()
        .stderr(contains("detection failed"));
}

#[test]
fn preflight_lists_tools_as_json() {
    let home = TempDir::new().expect("home");
    let output = lampkit_cmd(home.path())
        .args(["preflight", "--json"])
        .output()
        .expect("run lampkit");
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json stdout");
    let tools: Vec<&str> = json
        .as_array()
        .expect("array")
        .iter()
        .filter_map(|c| c["tool"].as_str())
        .collect();
    for tool in ["git", "composer", "npm", "yarn", "pnpm", "setfacl", "pm2"] {
        assert!(tools.contains(&tool), "missing {tool} in {tools:?}");
    }
}
