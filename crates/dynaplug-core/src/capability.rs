//! Capability pointers.
//!
//! All reinterpretation of pointers returned by plugin code happens here.

use std::ffi::c_void;
use std::fmt;
use std::marker::PhantomData;
use std::ops::Deref;
use std::ptr::NonNull;
use std::sync::Arc;

use dynaplug_sdk::abi::CastFn;
use dynaplug_sdk::{CapabilityRef, Interface};

use crate::handle::{LiveInstance, PluginHandle};

/// A plugin's cast function for one interface.
#[derive(Clone, Copy)]
pub(crate) struct Caster(CastFn);

impl Caster {
    pub(crate) fn new(cast: CastFn) -> Self {
        Self(cast)
    }

    /// Legacy descriptors: the instance pointer is the capability.
    pub(crate) fn identity() -> Self {
        Self(identity_cast)
    }

    /// # Safety
    ///
    /// `instance` must be a live instance produced by the factory this caster
    /// was published with.
    pub(crate) unsafe fn cast(self, instance: NonNull<c_void>) -> Option<RawCapability> {
        // SAFETY: upheld by the caller.
        NonNull::new(unsafe { (self.0)(instance.as_ptr()) }).map(RawCapability)
    }
}

impl fmt::Debug for Caster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Caster").field(&(self.0 as *const ())).finish()
    }
}

unsafe extern "C" fn identity_cast(instance: *mut c_void) -> *mut c_void {
    instance
}

/// Untyped capability of a live instance, as returned by its cast function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawCapability(NonNull<c_void>);

// SAFETY: the pointer is only dereferenced as `&I` with `I: Send + Sync`.
unsafe impl Send for RawCapability {}
unsafe impl Sync for RawCapability {}

impl RawCapability {
    /// The capability pointer as returned by the plugin's cast function.
    pub fn as_ptr(self) -> NonNull<c_void> {
        self.0
    }

    /// # Safety
    ///
    /// `self` must have been cast for interface `I` and the instance must
    /// outlive `'a`.
    pub(crate) unsafe fn resolve<'a, I: ?Sized + Interface>(self) -> &'a I {
        // SAFETY: cast functions for `I` return a `CapabilityRef<I>` owned by
        // the instance, which the caller keeps alive.
        unsafe { self.0.cast::<CapabilityRef<I>>().as_ref().get() }
    }
}

/// Owning pointer to one capability of an instance.
///
/// Keeps the instance (and so its library) alive on its own, independent of
/// the handle it came from. Cloning shares ownership.
pub struct SharedCapability<I: ?Sized + Interface> {
    owner: Arc<LiveInstance>,
    capability: RawCapability,
    _interface: PhantomData<fn() -> &'static I>,
}

impl<I: ?Sized + Interface> SharedCapability<I> {
    pub(crate) fn new(owner: Arc<LiveInstance>, capability: RawCapability) -> Self {
        Self {
            owner,
            capability,
            _interface: PhantomData,
        }
    }

    /// Normalized name of the plugin the capability belongs to.
    pub fn plugin_name(&self) -> &str {
        self.owner.info().name()
    }

    /// A handle to the instance this capability belongs to.
    pub fn instance(&self) -> PluginHandle {
        PluginHandle::from_live(Arc::clone(&self.owner))
    }

    /// Whether both point at the same capability of the same instance.
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        this.capability == other.capability
    }
}

impl<I: ?Sized + Interface> Deref for SharedCapability<I> {
    type Target = I;

    fn deref(&self) -> &I {
        // SAFETY: `capability` was cast for `I` from `owner`, which we hold.
        unsafe { self.capability.resolve::<I>() }
    }
}

impl<I: ?Sized + Interface> Clone for SharedCapability<I> {
    fn clone(&self) -> Self {
        Self::new(Arc::clone(&self.owner), self.capability)
    }
}

impl<I: ?Sized + Interface> fmt::Debug for SharedCapability<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedCapability")
            .field("plugin", &self.plugin_name())
            .field("interface", &I::NAME)
            .finish()
    }
}
