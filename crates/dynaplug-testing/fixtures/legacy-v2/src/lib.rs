//! A plugin built against API version 2: one descriptor, filled through an
//! out-parameter.

use std::ffi::{c_int, c_void};
use std::mem::size_of;

use dynaplug_sdk::abi::{c_name, LegacyPluginInfo, LEGACY_FILL_API_VERSION};
use dynaplug_sdk::{CapabilityRef, Interface};
use dynaplug_testing::interfaces::NameBase;

struct LegacyV2Plugin;

impl NameBase for LegacyV2Plugin {
    fn my_name_is(&self) -> String {
        "LegacyV2Plugin".to_owned()
    }
}

#[no_mangle]
pub static DYNAPLUG_PLUGIN_API_VERSION: c_int = LEGACY_FILL_API_VERSION;

#[no_mangle]
pub static DYNAPLUG_PLUGIN_INFO_SIZE: usize = size_of::<LegacyPluginInfo>();

unsafe extern "C" fn factory() -> *mut c_void {
    let plugin: &'static LegacyV2Plugin = Box::leak(Box::new(LegacyV2Plugin));
    Box::into_raw(Box::new(CapabilityRef::<dyn NameBase>::new(plugin))).cast()
}

/// # Safety
///
/// `out` must be null or valid for writing `size` bytes.
#[no_mangle]
pub unsafe extern "C" fn dynaplug_single_plugin_info(out: *mut c_void, size: usize) -> usize {
    if out.is_null() || size != size_of::<LegacyPluginInfo>() {
        return 0;
    }
    let info = LegacyPluginInfo {
        name: c_name(b"legacy_v2::LegacyV2Plugin\0").as_ptr(),
        interface: <dyn NameBase as Interface>::C_NAME.as_ptr(),
        factory: Some(factory),
    };
    unsafe { out.cast::<LegacyPluginInfo>().write_unaligned(info) };
    size
}
