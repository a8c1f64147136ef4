//! Error types for library loading, ABI negotiation and configuration.

use std::ffi::c_int;
use std::path::PathBuf;

/// Result type for loader operations.
pub type Result<T, E = LoadError> = std::result::Result<T, E>;

/// Why a library's exported symbols could not be turned into plugin descriptors.
#[derive(Debug, thiserror::Error)]
pub enum AbiError {
    #[error("library does not export the dynaplug plugin symbols")]
    MissingSymbols,

    #[error("unsupported plugin API version {version}")]
    UnsupportedVersion { version: c_int },

    #[error(
        "incompatible plugin API: version {version}, expected descriptor size [{expected}], got [{found}]"
    )]
    Incompatible {
        version: c_int,
        expected: usize,
        found: usize,
    },

    #[error("plugin API version {version} requires the `{symbol}` function")]
    MissingInfoFunction {
        version: c_int,
        symbol: &'static str,
    },

    #[error("plugin info function for API version {version} did not provide a descriptor")]
    LegacyInfoUnavailable { version: c_int },

    #[error("library exports no usable plugin descriptors")]
    NoDescriptors,
}

/// Failure of [`PluginLoader::try_load_library`](crate::PluginLoader::try_load_library).
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Library [{}] does not exist", .0.display())]
    NotFound(PathBuf),

    #[error("Library [{}] could not be opened: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },

    #[error("Failed to load plugins from library [{}]: {source}", .path.display())]
    Abi {
        path: PathBuf,
        #[source]
        source: AbiError,
    },
}

impl LoadError {
    /// The library the error is about.
    pub fn path(&self) -> &std::path::Path {
        match self {
            LoadError::NotFound(path) | LoadError::Open { path, .. } | LoadError::Abi { path, .. } => {
                path
            }
        }
    }
}

/// Invalid loader configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file [{}]: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {key}: [{value}]")]
    InvalidValue { key: String, value: String },
}
