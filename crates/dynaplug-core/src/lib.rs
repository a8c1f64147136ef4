//! Runtime plugin loading for Rust.
//!
//! A plugin library exports descriptors for one or more plugin types through
//! the C ABI defined in [`dynaplug_sdk`]. [`PluginLoader`] opens libraries,
//! negotiates the ABI version, indexes the plugins by name and creates
//! instances, returned as [`PluginHandle`]s. A handle hands out the
//! capabilities (interfaces) the instance implements, typed through
//! [`Interface`], and keeps the instance's library loaded until the last
//! handle is gone.
//!
//! ```ignore
//! use dynaplug_core::PluginLoader;
//!
//! let mut loader = PluginLoader::new();
//! let plugins = loader.load_library("target/debug/libshapes.so");
//! let handle = loader.instantiate("shapes::Square");
//! if let Some(shape) = handle.query_interface::<dyn Shape>() {
//!     println!("{} sides", shape.sides());
//! }
//! ```
//!
//! # Safety
//!
//! Loading a library runs arbitrary code, and trait object layouts are only
//! compatible when host and plugins are built by the same compiler against the
//! same interface crates. Plugin libraries are trusted.

pub mod capability;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod handle;
pub mod library;
pub mod loader;
mod negotiate;
pub mod specialized;

#[cfg(test)]
mod testing;

pub use capability::{RawCapability, SharedCapability};
pub use config::{DuplicatePolicy, LoaderConfig};
pub use descriptor::PluginInfo;
pub use error::{AbiError, ConfigError, LoadError, Result};
pub use handle::PluginHandle;
pub use library::LibraryRecord;
pub use loader::PluginLoader;
pub use specialized::{Candidate, InterfaceSet, SpecializedPluginHandle};

pub use dynaplug_sdk::{normalize_name, Interface};

/// Re-exports commonly used types.
pub mod prelude {
    pub use crate::candidates;
    pub use crate::config::{env_vars, DuplicatePolicy, LoaderConfig};
    pub use crate::error::{AbiError, LoadError};
    pub use crate::{Interface, PluginHandle, PluginLoader, SharedCapability, SpecializedPluginHandle};
}
