//! Integration tests: run the sitepack binary and check exit codes and output.

use std::path::Path;
use std::process::Command;

fn sitepack(home: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_sitepack"));
    cmd.env("SITEPACK_HOME", home)
        .env_remove("SITEPACK_LOG")
        .env_remove("PYTHONPATH")
        .env("NO_COLOR", "1");
    cmd
}

#[test]
fn test_help() {
    let home = tempfile::tempdir().unwrap();
    let out = sitepack(home.path()).arg("--help").output().unwrap();
    assert!(out.status.success(), "sitepack --help should succeed");
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("install"));
    assert!(stdout.contains("check"));
    assert!(stdout.contains("cache"));
}

#[test]
fn test_version() {
    let home = tempfile::tempdir().unwrap();
    let out = sitepack(home.path()).arg("--version").output().unwrap();
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_install_invalid_requirement_fails() {
    let home = tempfile::tempdir().unwrap();
    let out = sitepack(home.path())
        .args(["install", "numpy ^1.0", "--project", "demo"])
        .output()
        .unwrap();
    assert!(!out.status.success(), "malformed requirement should fail");
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("invalid requirement"), "{stderr}");
}

#[test]
fn test_install_unknown_source_rejected() {
    let home = tempfile::tempdir().unwrap();
    let out = sitepack(home.path())
        .args(["install", "six", "--source", "conda"])
        .output()
        .unwrap();
    assert!(!out.status.success());
}

#[test]
fn test_cache_list_empty() {
    let home = tempfile::tempdir().unwrap();
    let out = sitepack(home.path()).args(["cache", "list"]).output().unwrap();
    assert!(out.status.success(), "sitepack cache list should succeed");
    assert!(String::from_utf8_lossy(&out.stdout).contains("No cached packages."));
}

#[test]
fn test_site_creates_project_dir() {
    let home = tempfile::tempdir().unwrap();
    let out = sitepack(home.path()).args(["site", "-p", "demo"]).output().unwrap();
    assert!(out.status.success());
    let expected = home.path().join("projects").join("demo").join("site-packages");
    assert!(expected.is_dir());
    assert_eq!(String::from_utf8_lossy(&out.stdout).trim(), expected.display().to_string());
}

#[test]
fn test_env_prints_pythonpath() {
    let home = tempfile::tempdir().unwrap();
    let out = sitepack(home.path()).args(["env", "-p", "demo"]).output().unwrap();
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    let site = home.path().join("projects").join("demo").join("site-packages");
    assert_eq!(stdout.trim(), format!("PYTHONPATH={}", site.display()));
}

#[test]
fn test_config_set_then_show() {
    let home = tempfile::tempdir().unwrap();
    let out = sitepack(home.path())
        .args(["config", "set", "pypi_link_order", "last"])
        .output()
        .unwrap();
    assert!(out.status.success());
    assert!(home.path().join("config.json").is_file());

    let out = sitepack(home.path()).args(["config", "show"]).output().unwrap();
    assert!(out.status.success());
    let shown: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(shown["pypi_link_order"], "last");
    assert_eq!(shown["pypi_index_url"], "https://pypi.org/simple");

    let out = sitepack(home.path())
        .args(["config", "set", "pypi_link_order", "sideways"])
        .output()
        .unwrap();
    assert!(!out.status.success());
}

#[test]
fn test_check_missing_package_exits_nonzero() {
    let home = tempfile::tempdir().unwrap();
    let out = sitepack(home.path())
        .args(["check", "six==1.16.0", "-p", "demo"])
        .output()
        .unwrap();
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("not satisfied"));
}
