//! Plugin metadata, translated from the descriptors a library exports.

use std::collections::BTreeMap;
use std::ffi::{c_char, c_void, CStr};
use std::fmt;

use dynaplug_sdk::abi::{DeleterFn, FactoryFn, LegacyPluginInfo, RawPluginInfo};
use dynaplug_sdk::{normalize_name, normalized};
use tracing::warn;

use crate::capability::Caster;

/// Everything the loader knows about one plugin type.
///
/// Strings are copied out of the library; the function pointers are only valid
/// while the library stays loaded.
#[derive(Debug, Clone)]
pub struct PluginInfo {
    name: String,
    interfaces: BTreeMap<String, Caster>,
    factory: FactoryFn,
    deleter: DeleterFn,
}

impl PluginInfo {
    /// Returns `None` for descriptors that cannot be used: no name, no factory
    /// or no deleter. Interface entries with a null name or cast are dropped.
    ///
    /// # Safety
    ///
    /// Every non-null pointer in `raw` must be valid as described in
    /// [`dynaplug_sdk::abi`].
    pub(crate) unsafe fn from_raw(raw: &RawPluginInfo) -> Option<Self> {
        // SAFETY: upheld by the caller.
        let name = unsafe { read_name(raw.name) }?;
        let (Some(factory), Some(deleter)) = (raw.factory, raw.deleter) else {
            warn!("Plugin [{}] is missing its factory or deleter", name);
            return None;
        };

        let mut interfaces = BTreeMap::new();
        if !raw.interfaces.is_null() {
            // SAFETY: `interfaces` points at `interface_count` entries.
            let entries = unsafe { std::slice::from_raw_parts(raw.interfaces, raw.interface_count) };
            for entry in entries {
                // SAFETY: upheld by the caller.
                match (unsafe { read_name(entry.name) }, entry.cast) {
                    (Some(interface), Some(cast)) => {
                        interfaces.insert(interface, Caster::new(cast));
                    }
                    _ => warn!("Plugin [{}] lists a malformed interface entry", name),
                }
            }
        }

        Some(Self {
            name,
            interfaces,
            factory,
            deleter,
        })
    }

    /// Legacy descriptors name one interface, reached by an identity cast.
    /// They carry no deleter, so their instances are never freed.
    ///
    /// # Safety
    ///
    /// As for [`from_raw`](Self::from_raw).
    pub(crate) unsafe fn from_legacy(raw: &LegacyPluginInfo) -> Option<Self> {
        // SAFETY: upheld by the caller.
        let name = unsafe { read_name(raw.name) }?;
        let Some(factory) = raw.factory else {
            warn!("Plugin [{}] is missing its factory", name);
            return None;
        };

        let mut interfaces = BTreeMap::new();
        // SAFETY: upheld by the caller.
        if let Some(interface) = unsafe { read_name(raw.interface) } {
            interfaces.insert(interface, Caster::identity());
        }

        Some(Self {
            name,
            interfaces,
            factory,
            deleter: leak_instance,
        })
    }

    /// Canonical spelling of the plugin name and every interface name.
    pub(crate) fn normalized(self) -> Self {
        Self {
            name: normalize_name(&self.name),
            interfaces: self
                .interfaces
                .into_iter()
                .map(|(name, caster)| (normalize_name(&name), caster))
                .collect(),
            ..self
        }
    }

    /// Plugin name, normalized once registered with a loader.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Names of the implemented interfaces, in sorted order.
    pub fn interfaces(&self) -> impl Iterator<Item = &str> {
        self.interfaces.keys().map(String::as_str)
    }

    pub fn interface_count(&self) -> usize {
        self.interfaces.len()
    }

    /// Whether `interface`, in any spelling, is listed by the plugin.
    pub fn implements(&self, interface: &str) -> bool {
        self.caster(interface).is_some()
    }

    pub(crate) fn caster(&self, interface: &str) -> Option<Caster> {
        self.interfaces.get(normalized(interface).as_ref()).copied()
    }

    pub(crate) fn factory(&self) -> FactoryFn {
        self.factory
    }

    pub(crate) fn deleter(&self) -> DeleterFn {
        self.deleter
    }
}

impl fmt::Display for PluginInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.interfaces.len();
        write!(
            f,
            "[{}] which implements {} {}",
            self.name,
            count,
            if count == 1 { "interface" } else { "interfaces" }
        )
    }
}

unsafe fn read_name(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    // SAFETY: non-null names are NUL-terminated.
    let name = unsafe { CStr::from_ptr(ptr) }.to_string_lossy();
    (!name.is_empty()).then(|| name.into_owned())
}

unsafe extern "C" fn leak_instance(_: *mut c_void) {}

#[cfg(test)]
mod tests {
    use std::ptr;

    use dynaplug_sdk::abi::{c_name, RawInterfaceEntry};

    use super::*;

    unsafe extern "C" fn factory() -> *mut c_void {
        ptr::null_mut()
    }
    unsafe extern "C" fn deleter(_: *mut c_void) {}
    unsafe extern "C" fn cast(instance: *mut c_void) -> *mut c_void {
        instance
    }

    static ENTRIES: &[RawInterfaceEntry] = &[
        RawInterfaceEntry::new(c_name(b"shapes :: Polygon\0"), cast),
        RawInterfaceEntry::new(c_name(b"::shapes::Named\0"), cast),
    ];

    fn raw(name: &'static [u8]) -> RawPluginInfo {
        RawPluginInfo::new(c_name(name), ENTRIES, factory, deleter)
    }

    #[test]
    fn test_from_raw_copies_names() {
        let info = unsafe { PluginInfo::from_raw(&raw(b"shapes::Square\0")) }
            .unwrap()
            .normalized();
        assert_eq!(info.name(), "::shapes::Square");
        assert_eq!(
            info.interfaces().collect::<Vec<_>>(),
            vec!["::shapes::Named", "::shapes::Polygon"]
        );
        assert!(info.implements("shapes::Polygon"));
        assert!(info.implements(" :: shapes :: Named"));
        assert!(!info.implements("::shapes::Circle"));
    }

    #[test]
    fn test_unusable_descriptors_are_skipped() {
        assert!(unsafe { PluginInfo::from_raw(&raw(b"\0")) }.is_none());
        assert!(unsafe { PluginInfo::from_raw(&RawPluginInfo::empty()) }.is_none());

        let mut no_deleter = raw(b"shapes::Square\0");
        no_deleter.deleter = None;
        assert!(unsafe { PluginInfo::from_raw(&no_deleter) }.is_none());
    }

    #[test]
    fn test_malformed_interface_entries_are_dropped() {
        static MIXED: &[RawInterfaceEntry] = &[
            RawInterfaceEntry::new(c_name(b"::shapes::Named\0"), cast),
            RawInterfaceEntry {
                name: ptr::null(),
                cast: Some(cast),
            },
            RawInterfaceEntry {
                name: c_name(b"::shapes::Broken\0").as_ptr(),
                cast: None,
            },
        ];
        let raw = RawPluginInfo::new(c_name(b"::shapes::Square\0"), MIXED, factory, deleter);
        let info = unsafe { PluginInfo::from_raw(&raw) }.unwrap();
        assert_eq!(info.interface_count(), 1);
    }

    #[test]
    fn test_from_legacy() {
        let legacy = LegacyPluginInfo {
            name: c_name(b"old::Plugin\0").as_ptr(),
            interface: c_name(b"old::Named\0").as_ptr(),
            factory: Some(factory),
        };
        let info = unsafe { PluginInfo::from_legacy(&legacy) }.unwrap().normalized();
        assert_eq!(info.name(), "::old::Plugin");
        assert!(info.implements("::old::Named"));

        let instance = ptr::NonNull::<u8>::dangling().cast::<c_void>();
        let capability = unsafe { info.caster("::old::Named").unwrap().cast(instance) }.unwrap();
        assert_eq!(capability.as_ptr(), instance);
    }

    #[test]
    fn test_display() {
        let info = unsafe { PluginInfo::from_raw(&raw(b"::shapes::Square\0")) }.unwrap();
        assert_eq!(info.to_string(), "[::shapes::Square] which implements 2 interfaces");

        let legacy = LegacyPluginInfo {
            name: c_name(b"::old::Plugin\0").as_ptr(),
            interface: c_name(b"::old::Named\0").as_ptr(),
            factory: Some(factory),
        };
        let info = unsafe { PluginInfo::from_legacy(&legacy) }.unwrap();
        assert_eq!(info.to_string(), "[::old::Plugin] which implements 1 interface");
    }
}
