//! A plugin built against API version 1: one descriptor, returned by value.

use std::ffi::{c_int, c_void};
use std::mem::size_of;

use dynaplug_sdk::abi::{c_name, LegacyPluginInfo, LEGACY_RETURN_API_VERSION};
use dynaplug_sdk::{CapabilityRef, Interface};
use dynaplug_testing::interfaces::NameBase;

struct LegacyV1Plugin;

impl NameBase for LegacyV1Plugin {
    fn my_name_is(&self) -> String {
        "LegacyV1Plugin".to_owned()
    }
}

#[no_mangle]
pub static DYNAPLUG_PLUGIN_API_VERSION: c_int = LEGACY_RETURN_API_VERSION;

#[no_mangle]
pub static DYNAPLUG_PLUGIN_INFO_SIZE: usize = size_of::<LegacyPluginInfo>();

// Version 1 instances are their own capability and are never destroyed.
unsafe extern "C" fn factory() -> *mut c_void {
    let plugin: &'static LegacyV1Plugin = Box::leak(Box::new(LegacyV1Plugin));
    Box::into_raw(Box::new(CapabilityRef::<dyn NameBase>::new(plugin))).cast()
}

#[no_mangle]
pub extern "C" fn dynaplug_single_plugin_info() -> LegacyPluginInfo {
    LegacyPluginInfo {
        name: c_name(b"legacy_v1::LegacyV1Plugin\0").as_ptr(),
        interface: <dyn NameBase as Interface>::C_NAME.as_ptr(),
        factory: Some(factory),
    }
}
