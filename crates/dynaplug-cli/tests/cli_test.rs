//! End-to-end tests for the `dynaplug` binary.

use assert_cmd::Command;
use dynaplug_testing::fixtures::{fixture_library, ABI_MISMATCH, DUMMY_PLUGINS};
use predicates::prelude::*;

fn dynaplug() -> Command {
    let mut cmd = Command::cargo_bin("dynaplug").unwrap();
    cmd.env_remove("DYNAPLUG_PRELOAD")
        .env_remove("DYNAPLUG_DUPLICATE_POLICY")
        .env_remove("DYNAPLUG_WARN_OUTDATED_ABI");
    cmd
}

#[test]
fn test_help() {
    dynaplug()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("inspect"))
        .stdout(predicate::str::contains("instantiate"));
}

#[test]
fn test_inspect_dummy_plugins() {
    dynaplug()
        .arg("inspect")
        .arg(fixture_library(DUMMY_PLUGINS))
        .assert()
        .success()
        .stdout(predicate::str::starts_with("PluginLoader State"))
        .stdout(predicate::str::contains("Known Interfaces: 4"))
        .stdout(predicate::str::contains("Known Plugins: 2"))
        .stdout(predicate::str::contains(
            "[::dynaplug_dummy_plugins::DummyMultiPlugin] which implements 4 interfaces:",
        ));
}

#[test]
fn test_inspect_reports_failures() {
    dynaplug()
        .arg("inspect")
        .arg(fixture_library(DUMMY_PLUGINS))
        .arg("/definitely/not/here/libplugin.so")
        .assert()
        .failure()
        .stdout(predicate::str::contains("Known Plugins: 2"))
        .stderr(predicate::str::contains("does not exist"))
        .stderr(predicate::str::contains("1 of 2 libraries failed to load"));
}

#[test]
fn test_inspect_abi_mismatch() {
    dynaplug()
        .arg("inspect")
        .arg(fixture_library(ABI_MISMATCH))
        .assert()
        .failure()
        .stdout(predicate::str::contains("Known Plugins: 0"))
        .stderr(predicate::str::contains("incompatible plugin API"));
}

#[test]
fn test_instantiate_plugin() {
    dynaplug()
        .arg("instantiate")
        .arg(fixture_library(DUMMY_PLUGINS))
        .arg("dynaplug_dummy_plugins::DummyMultiPlugin")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Instantiated [::dynaplug_dummy_plugins::DummyMultiPlugin]",
        ))
        .stdout(predicate::str::contains(
            "::dynaplug_testing::interfaces::SetterBase: resolved",
        ));
}

#[test]
fn test_instantiate_unknown_plugin() {
    dynaplug()
        .arg("instantiate")
        .arg(fixture_library(DUMMY_PLUGINS))
        .arg("::nowhere::Plugin")
        .assert()
        .failure()
        .stderr(predicate::str::contains("not provided"));
}

#[test]
fn test_implementing() {
    dynaplug()
        .arg("implementing")
        .arg("dynaplug_testing::interfaces::NameBase")
        .arg(fixture_library(DUMMY_PLUGINS))
        .assert()
        .success()
        .stdout(predicate::eq(
            "::dynaplug_dummy_plugins::DummyMultiPlugin\n::dynaplug_dummy_plugins::DummySinglePlugin\n",
        ));
}

#[test]
fn test_preload_from_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("dynaplug.toml");
    let library = fixture_library(DUMMY_PLUGINS);
    std::fs::write(
        &config,
        format!("preload = [{:?}]\n", library.to_str().unwrap()),
    )
    .unwrap();

    dynaplug()
        .arg("--config")
        .arg(&config)
        .arg("inspect")
        .assert()
        .success()
        .stdout(predicate::str::contains("Known Plugins: 2"));
}

#[test]
fn test_invalid_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("dynaplug.toml");
    std::fs::write(&config, "duplicate_policy = \"merge\"\n").unwrap();

    dynaplug()
        .arg("--config")
        .arg(&config)
        .arg("inspect")
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot read config"));
}

#[test]
fn test_invalid_env_override() {
    dynaplug()
        .env("DYNAPLUG_DUPLICATE_POLICY", "merge")
        .arg("inspect")
        .assert()
        .failure()
        .stderr(predicate::str::contains("DYNAPLUG_DUPLICATE_POLICY"));
}
