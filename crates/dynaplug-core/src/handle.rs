//! Type-erased handles to plugin instances.

use std::cmp::Ordering;
use std::ffi::c_void;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ptr::NonNull;
use std::sync::Arc;

use dynaplug_sdk::Interface;
use tracing::{debug, error};

use crate::capability::{RawCapability, SharedCapability};
use crate::descriptor::PluginInfo;
use crate::library::LibraryRecord;

/// One instance created by a plugin factory.
///
/// Destroyed through the plugin's own deleter when the last handle or shared
/// capability goes away. Holds its library, so the deleter's code is still
/// mapped at that point.
pub(crate) struct LiveInstance {
    raw: NonNull<c_void>,
    info: Arc<PluginInfo>,
    library: Arc<LibraryRecord>,
}

// SAFETY: the instance is only reached through its capabilities, and every
// interface is `Send + Sync`. The deleter runs exactly once, from Drop.
unsafe impl Send for LiveInstance {}
unsafe impl Sync for LiveInstance {}

impl LiveInstance {
    pub(crate) fn info(&self) -> &PluginInfo {
        &self.info
    }

    fn capability(&self, interface: &str) -> Option<RawCapability> {
        let caster = self.info.caster(interface)?;
        // SAFETY: `raw` came from the factory published alongside `caster`.
        unsafe { caster.cast(self.raw) }
    }
}

impl Drop for LiveInstance {
    fn drop(&mut self) {
        // SAFETY: `raw` came from this plugin's factory and is released once.
        unsafe { (self.info.deleter())(self.raw.as_ptr()) };
        self.library.release_instance();
        debug!("Destroyed an instance of plugin [{}]", self.info.name());
    }
}

/// Owning handle to a plugin instance, or empty.
///
/// Cloning shares the instance; it is destroyed when the last clone (and the
/// last [`SharedCapability`] taken from it) is dropped. Handles compare, order
/// and hash by instance identity, with all empty handles equal.
#[derive(Clone, Default)]
pub struct PluginHandle {
    instance: Option<Arc<LiveInstance>>,
}

impl PluginHandle {
    pub(crate) fn instantiate(info: Arc<PluginInfo>, library: Arc<LibraryRecord>) -> Self {
        // SAFETY: the factory belongs to `library`, which we keep loaded.
        let raw = unsafe { (info.factory())() };
        let Some(raw) = NonNull::new(raw) else {
            error!("Factory of plugin [{}] returned no instance", info.name());
            return Self::default();
        };
        library.acquire_instance();
        debug!("Created an instance of plugin [{}]", info.name());
        Self::from_live(Arc::new(LiveInstance { raw, info, library }))
    }

    pub(crate) fn from_live(instance: Arc<LiveInstance>) -> Self {
        Self {
            instance: Some(instance),
        }
    }

    /// Whether the handle is bound to no instance.
    pub fn is_empty(&self) -> bool {
        self.instance.is_none()
    }

    /// Releases this handle's share of the instance.
    pub fn reset(&mut self) {
        self.instance = None;
    }

    /// Moves the instance out, leaving this handle empty.
    pub fn take(&mut self) -> Self {
        std::mem::take(self)
    }

    /// Normalized name of the instance's plugin.
    pub fn plugin_name(&self) -> Option<&str> {
        self.plugin_info().map(PluginInfo::name)
    }

    /// Metadata of the instance's plugin.
    pub fn plugin_info(&self) -> Option<&PluginInfo> {
        self.instance.as_deref().map(LiveInstance::info)
    }

    /// The library the instance was created from. It stays loaded while the
    /// handle exists, even if the loader forgot it.
    pub fn library(&self) -> Option<&LibraryRecord> {
        self.instance.as_deref().map(|instance| &*instance.library)
    }

    /// Handles and shared capabilities currently keeping the instance alive.
    pub fn use_count(&self) -> usize {
        self.instance.as_ref().map_or(0, Arc::strong_count)
    }

    /// The capability published under `interface`, any spelling. `None` when
    /// the handle is empty, the plugin does not list the interface, or its cast
    /// function declines.
    pub fn query_interface_raw(&self, interface: &str) -> Option<NonNull<c_void>> {
        self.raw_capability(interface).map(RawCapability::as_ptr)
    }

    /// Whether [`query_interface_raw`](Self::query_interface_raw) would succeed.
    pub fn has_interface(&self, interface: &str) -> bool {
        self.raw_capability(interface).is_some()
    }

    /// The capability for `I`, looked up under `I::NAME`. Borrowed from the
    /// handle; see [`as_shared`](Self::as_shared) for one that outlives it.
    pub fn query_interface<I: ?Sized + Interface>(&self) -> Option<&I> {
        // SAFETY: looked up under `I::NAME`, and `self` keeps the instance alive.
        self.raw_capability(I::NAME)
            .map(|capability| unsafe { capability.resolve::<I>() })
    }

    /// Like [`query_interface`](Self::query_interface) for a capability
    /// published under a name other than `I::NAME`.
    ///
    /// # Safety
    ///
    /// The capability published under `interface` must be of type `I`.
    pub unsafe fn query_interface_as<I: ?Sized + Interface>(&self, interface: &str) -> Option<&I> {
        self.raw_capability(interface)
            .map(|capability| unsafe { capability.resolve::<I>() })
    }

    /// Panicking [`query_interface`](Self::query_interface), for callers that
    /// know the plugin implements `I`.
    pub fn interface<I: ?Sized + Interface>(&self) -> &I {
        match self.query_interface::<I>() {
            Some(capability) => capability,
            None => panic!("{}", self.missing_interface(I::NAME)),
        }
    }

    /// An owning pointer to the `I` capability that outlives this handle.
    pub fn as_shared<I: ?Sized + Interface>(&self) -> Option<SharedCapability<I>> {
        let capability = self.raw_capability(I::NAME)?;
        self.share(capability)
    }

    pub(crate) fn raw_capability(&self, interface: &str) -> Option<RawCapability> {
        self.instance.as_ref()?.capability(interface)
    }

    /// `capability` must have been cast for `I` from this handle's instance.
    pub(crate) fn share<I: ?Sized + Interface>(
        &self,
        capability: RawCapability,
    ) -> Option<SharedCapability<I>> {
        let instance = self.instance.as_ref()?;
        Some(SharedCapability::new(Arc::clone(instance), capability))
    }

    pub(crate) fn missing_interface(&self, interface: &str) -> String {
        match self.plugin_name() {
            Some(plugin) => format!("plugin [{plugin}] does not provide interface [{interface}]"),
            None => format!("queried interface [{interface}] on an empty plugin handle"),
        }
    }

    fn identity(&self) -> usize {
        self.instance
            .as_ref()
            .map_or(0, |instance| Arc::as_ptr(instance) as usize)
    }
}

impl PartialEq for PluginHandle {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for PluginHandle {}

impl PartialOrd for PluginHandle {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PluginHandle {
    fn cmp(&self, other: &Self) -> Ordering {
        self.identity().cmp(&other.identity())
    }
}

impl Hash for PluginHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

impl fmt::Debug for PluginHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.instance {
            Some(instance) => f
                .debug_struct("PluginHandle")
                .field("plugin", &instance.info.name())
                .field("instance", &instance.raw)
                .finish(),
            None => f.write_str("PluginHandle(empty)"),
        }
    }
}
