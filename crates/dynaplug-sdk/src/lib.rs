//! Dynaplug plugin SDK
//!
//! Shared by plugin libraries and the host: the `#[repr(C)]` descriptor shapes
//! and symbol names of the plugin ABI, the [`Interface`] trait that gives a
//! trait object a stable cross-library name, and the macros that export a
//! library's plugins.
//!
//! Host and plugin libraries must be built by the same compiler: trait object
//! layouts are not stable across toolchains.

pub mod abi;
pub mod export;
pub mod interface;
#[macro_use]
mod macros;

pub use abi::PLUGIN_API_VERSION;
pub use interface::{
    normalize_name, normalized, CapabilityRef, CapabilitySet, InstanceCell, Interface,
};
