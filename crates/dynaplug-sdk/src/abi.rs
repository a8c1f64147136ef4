//! The C ABI shared by plugin libraries and the host.
//!
//! A plugin library exports four unmangled symbols (see [`symbols`]). The host
//! reads the API version and descriptor size first and picks the matching
//! descriptor function. Everything that crosses the boundary is `#[repr(C)]`;
//! strings are NUL-terminated and must stay valid for as long as the library is
//! loaded, the host copies them out immediately.

use std::ffi::{c_char, c_int, c_void, CStr};
use std::ptr;

/// API version written by [`register_plugins!`](crate::register_plugins).
pub const PLUGIN_API_VERSION: c_int = 3;

/// Single legacy descriptor, filled through an out-parameter.
pub const LEGACY_FILL_API_VERSION: c_int = 2;

/// Single legacy descriptor, returned by value.
pub const LEGACY_RETURN_API_VERSION: c_int = 1;

/// Exported symbol names, NUL-terminated for symbol lookup.
pub mod symbols {
    /// `static DYNAPLUG_PLUGIN_API_VERSION: c_int`
    pub const API_VERSION: &[u8] = b"DYNAPLUG_PLUGIN_API_VERSION\0";
    /// `static DYNAPLUG_PLUGIN_INFO_SIZE: usize`
    pub const INFO_SIZE: &[u8] = b"DYNAPLUG_PLUGIN_INFO_SIZE\0";
    /// Legacy descriptor function, signature depends on the API version.
    pub const SINGLE_PLUGIN_INFO: &[u8] = b"dynaplug_single_plugin_info\0";
    /// [`MultiInfoFn`](super::MultiInfoFn)
    pub const MULTI_PLUGIN_INFO: &[u8] = b"dynaplug_multi_plugin_info\0";
}

/// Creates a plugin instance. Returns null on failure.
pub type FactoryFn = unsafe extern "C" fn() -> *mut c_void;

/// Destroys an instance created by the paired [`FactoryFn`].
pub type DeleterFn = unsafe extern "C" fn(*mut c_void);

/// Maps an instance to one of its capabilities, or null.
///
/// A non-null result points at a [`CapabilityRef`](crate::CapabilityRef) for the
/// interface the entry is named after, owned by the instance.
pub type CastFn = unsafe extern "C" fn(*mut c_void) -> *mut c_void;

/// Writes descriptor `index` into `out` and returns how many descriptors remain
/// counting the one just written. Returns 0 without writing once `index` is past
/// the end or when `size` is not the size of [`RawPluginInfo`].
pub type MultiInfoFn = unsafe extern "C" fn(out: *mut c_void, index: usize, size: usize) -> usize;

/// Version 2: fills a [`LegacyPluginInfo`] and returns the written size, or 0.
pub type SingleInfoFillFn = unsafe extern "C" fn(out: *mut c_void, size: usize) -> usize;

/// Version 1: returns the [`LegacyPluginInfo`] by value.
pub type SingleInfoReturnFn = unsafe extern "C" fn() -> LegacyPluginInfo;

/// One interface implemented by a plugin.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RawInterfaceEntry {
    pub name: *const c_char,
    pub cast: Option<CastFn>,
}

// SAFETY: the entry only carries pointers to immutable 'static data and code.
unsafe impl Send for RawInterfaceEntry {}
unsafe impl Sync for RawInterfaceEntry {}

impl RawInterfaceEntry {
    pub const fn new(name: &'static CStr, cast: CastFn) -> Self {
        Self {
            name: name.as_ptr(),
            cast: Some(cast),
        }
    }
}

/// Descriptor of one plugin type, current API version.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RawPluginInfo {
    pub name: *const c_char,
    pub interfaces: *const RawInterfaceEntry,
    pub interface_count: usize,
    pub factory: Option<FactoryFn>,
    pub deleter: Option<DeleterFn>,
}

// SAFETY: see RawInterfaceEntry.
unsafe impl Send for RawPluginInfo {}
unsafe impl Sync for RawPluginInfo {}

impl RawPluginInfo {
    /// A descriptor for a plugin implementing `interfaces`.
    pub const fn new(
        name: &'static CStr,
        interfaces: &'static [RawInterfaceEntry],
        factory: FactoryFn,
        deleter: DeleterFn,
    ) -> Self {
        Self {
            name: name.as_ptr(),
            interfaces: interfaces.as_ptr(),
            interface_count: interfaces.len(),
            factory: Some(factory),
            deleter: Some(deleter),
        }
    }

    /// An all-null descriptor, rejected by the host.
    pub const fn empty() -> Self {
        Self {
            name: ptr::null(),
            interfaces: ptr::null(),
            interface_count: 0,
            factory: None,
            deleter: None,
        }
    }
}

/// Descriptor used by API versions 1 and 2.
///
/// Exactly one interface, no deleter. The factory's return value doubles as the
/// capability for `interface`, so it must point at a `CapabilityRef`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct LegacyPluginInfo {
    pub name: *const c_char,
    pub interface: *const c_char,
    pub factory: Option<FactoryFn>,
}

// SAFETY: see RawInterfaceEntry.
unsafe impl Send for LegacyPluginInfo {}
unsafe impl Sync for LegacyPluginInfo {}

/// Builds a `&'static CStr` in const context, for names built with `concat!`.
///
/// Panics at compile time when `bytes` is not NUL-terminated or holds an
/// interior NUL.
pub const fn c_name(bytes: &'static [u8]) -> &'static CStr {
    match CStr::from_bytes_with_nul(bytes) {
        Ok(name) => name,
        Err(_) => panic!("plugin ABI names must end with a single NUL byte"),
    }
}
