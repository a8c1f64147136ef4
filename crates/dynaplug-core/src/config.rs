//! Loader configuration.
//!
//! Read from a TOML file, then overridden from the environment:
//!
//! ```toml
//! duplicate_policy = "reject"
//! preload = ["/opt/plugins/libshapes.so"]
//! warn_outdated_abi = true
//! ```

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;

use crate::error::ConfigError;

/// Environment variable names.
pub mod env_vars {
    /// `overwrite` or `reject`.
    pub const DUPLICATE_POLICY: &str = "DYNAPLUG_DUPLICATE_POLICY";
    /// Libraries to load up front, as a platform path list.
    pub const PRELOAD: &str = "DYNAPLUG_PRELOAD";
    /// `true`/`false`, `1`/`0`, `yes`/`no`.
    pub const WARN_OUTDATED_ABI: &str = "DYNAPLUG_WARN_OUTDATED_ABI";
}

/// What to do when a library provides a plugin name that another library
/// already registered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// The newer descriptor replaces the index entry.
    #[default]
    Overwrite,
    /// The existing entry is kept and the newcomer is skipped.
    Reject,
}

impl FromStr for DuplicatePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "overwrite" => Ok(DuplicatePolicy::Overwrite),
            "reject" => Ok(DuplicatePolicy::Reject),
            _ => Err(ConfigError::InvalidValue {
                key: env_vars::DUPLICATE_POLICY.to_owned(),
                value: s.to_owned(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoaderConfig {
    pub duplicate_policy: DuplicatePolicy,
    /// Loaded by [`PluginLoader::load_configured`](crate::PluginLoader::load_configured).
    pub preload: Vec<PathBuf>,
    pub warn_outdated_abi: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            duplicate_policy: DuplicatePolicy::default(),
            preload: Vec::new(),
            warn_outdated_abi: true,
        }
    }
}

impl LoaderConfig {
    /// Parses a TOML document. Missing keys keep their defaults.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    /// Reads and parses a TOML config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    /// Defaults overridden from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_overrides()
    }

    /// Applies the variables in [`env_vars`] that are set on top of `self`.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(value) = lookup(env_vars::DUPLICATE_POLICY) {
            self.duplicate_policy = value.parse()?;
        }
        if let Some(value) = lookup(env_vars::PRELOAD) {
            self.preload = std::env::split_paths(&value)
                .filter(|path| !path.as_os_str().is_empty())
                .collect();
        }
        if let Some(value) = lookup(env_vars::WARN_OUTDATED_ABI) {
            self.warn_outdated_abi = parse_flag(env_vars::WARN_OUTDATED_ABI, &value)?;
        }
        Ok(self)
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_owned(),
            value: value.to_owned(),
        }),
    }
}
