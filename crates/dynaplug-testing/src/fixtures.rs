//! Fixture plugin libraries.
//!
//! Fixtures are workspace members built as `cdylib`s. They are compiled on
//! first use into their own target directory, so a test running under
//! `cargo test` does not wait on the build lock held by its parent.

use std::collections::HashMap;
use std::env::consts::{DLL_PREFIX, DLL_SUFFIX};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;

use anyhow::{bail, Context, Result};
use parking_lot::Mutex;
use tracing::debug;

/// Current-ABI library with `DummySinglePlugin` and `DummyMultiPlugin`.
pub const DUMMY_PLUGINS: &str = "dynaplug-dummy-plugins";
/// API version 1: descriptor returned by value.
pub const LEGACY_V1: &str = "dynaplug-legacy-v1";
/// API version 2: descriptor filled through an out-parameter.
pub const LEGACY_V2: &str = "dynaplug-legacy-v2";
/// Declares the current API version with the wrong descriptor size.
pub const ABI_MISMATCH: &str = "dynaplug-abi-mismatch";
/// A shared library without any plugin symbols.
pub const NO_PLUGINS: &str = "dynaplug-no-plugins";

/// Environment variable overriding the fixture target directory.
pub const TARGET_DIR_ENV: &str = "DYNAPLUG_FIXTURE_TARGET_DIR";

fn built() -> &'static Mutex<HashMap<String, PathBuf>> {
    static BUILT: OnceLock<Mutex<HashMap<String, PathBuf>>> = OnceLock::new();
    BUILT.get_or_init(|| Mutex::new(HashMap::new()))
}

pub fn workspace_root() -> &'static Path {
    // crates/dynaplug-testing
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .ancestors()
        .nth(2)
        .unwrap_or_else(|| Path::new(env!("CARGO_MANIFEST_DIR")))
}

fn target_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(TARGET_DIR_ENV) {
        return PathBuf::from(dir);
    }
    match std::env::var_os("CARGO_TARGET_DIR") {
        Some(dir) => PathBuf::from(dir).join("fixtures"),
        None => workspace_root().join("target").join("fixtures"),
    }
}

/// File name of the library built for `package` on this platform.
pub fn library_file_name(package: &str) -> String {
    format!("{DLL_PREFIX}{}{DLL_SUFFIX}", package.replace('-', "_"))
}

/// Builds `package` (once per process) and returns the path of its library.
pub fn try_fixture_library(package: &str) -> Result<PathBuf> {
    let mut built = built().lock();
    if let Some(path) = built.get(package) {
        return Ok(path.clone());
    }

    let target_dir = target_dir();
    let cargo = std::env::var_os("CARGO").unwrap_or_else(|| "cargo".into());
    debug!("Building fixture {} into {}", package, target_dir.display());
    let status = Command::new(cargo)
        .arg("build")
        .arg("--quiet")
        .arg("--manifest-path")
        .arg(workspace_root().join("Cargo.toml"))
        .arg("--package")
        .arg(package)
        .arg("--target-dir")
        .arg(&target_dir)
        .status()
        .with_context(|| format!("failed to run cargo for fixture {package}"))?;
    if !status.success() {
        bail!("building fixture {package} failed with {status}");
    }

    let path = target_dir.join("debug").join(library_file_name(package));
    if !path.exists() {
        bail!("fixture {package} was built but {} is missing", path.display());
    }
    built.insert(package.to_owned(), path.clone());
    Ok(path)
}

/// [`try_fixture_library`], panicking on failure.
pub fn fixture_library(package: &str) -> PathBuf {
    match try_fixture_library(package) {
        Ok(path) => path,
        Err(err) => panic!("{err:#}"),
    }
}
