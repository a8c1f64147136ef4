//! Declares the current API version but a descriptor size the host does not
//! use, as a library built against a different SDK would.

use std::ffi::{c_int, c_void};
use std::mem::size_of;

use dynaplug_sdk::abi::{RawPluginInfo, PLUGIN_API_VERSION};

#[no_mangle]
pub static DYNAPLUG_PLUGIN_API_VERSION: c_int = PLUGIN_API_VERSION;

#[no_mangle]
pub static DYNAPLUG_PLUGIN_INFO_SIZE: usize = size_of::<RawPluginInfo>() + size_of::<usize>();

/// # Safety
///
/// Never writes through `out`.
#[no_mangle]
pub unsafe extern "C" fn dynaplug_multi_plugin_info(_out: *mut c_void, _index: usize, _size: usize) -> usize {
    0
}
