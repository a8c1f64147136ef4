//! Functions instantiated by [`register_plugins!`](crate::register_plugins).
//!
//! They are generic over the plugin type, so every library gets its own copies
//! and all instance memory is allocated and freed by the library's own code.

use std::ffi::c_void;
use std::mem::size_of;
use std::ptr;

use crate::abi::RawPluginInfo;
use crate::interface::{CapabilityRef, InstanceCell, Interface};

/// Moves a freshly built cell to the heap and hands ownership to the host.
pub fn into_raw<P: 'static>(cell: InstanceCell<P>) -> *mut c_void {
    Box::into_raw(Box::new(cell)).cast()
}

/// Cast function for interface `I` of plugin `P`.
///
/// # Safety
///
/// `instance` must be null or a pointer returned by a factory for `P`.
pub unsafe extern "C" fn cast<P: 'static, I: ?Sized + Interface>(
    instance: *mut c_void,
) -> *mut c_void {
    if instance.is_null() {
        return ptr::null_mut();
    }
    // SAFETY: upheld by the caller.
    let cell = unsafe { &*instance.cast::<InstanceCell<P>>() };
    match cell.capabilities().find::<I>() {
        Some(capability) => ptr::from_ref::<CapabilityRef<I>>(capability).cast_mut().cast(),
        None => ptr::null_mut(),
    }
}

/// Deleter for plugin `P`.
///
/// # Safety
///
/// `instance` must be null or a pointer returned by a factory for `P` that has
/// not been destroyed yet.
pub unsafe extern "C" fn destroy<P: 'static>(instance: *mut c_void) {
    if !instance.is_null() {
        // SAFETY: upheld by the caller.
        drop(unsafe { Box::from_raw(instance.cast::<InstanceCell<P>>()) });
    }
}

/// Body of the exported `dynaplug_multi_plugin_info`.
///
/// # Safety
///
/// `out` must be null or valid for writing `size` bytes.
pub unsafe fn fill_plugin_info(
    plugins: &[RawPluginInfo],
    out: *mut c_void,
    index: usize,
    size: usize,
) -> usize {
    if out.is_null() || size != size_of::<RawPluginInfo>() || index >= plugins.len() {
        return 0;
    }
    // SAFETY: `out` holds `size` writable bytes and the size matches.
    unsafe { out.cast::<RawPluginInfo>().write_unaligned(plugins[index]) };
    plugins.len() - index
}
