//! Handles specialized for a fixed set of interfaces.
//!
//! A [`SpecializedPluginHandle`] resolves its candidate interfaces once, when
//! it is bound to an instance, and answers queries for them from a fixed-size
//! array without any name lookup. Queries for other interfaces fall back to the
//! generic path.
//!
//! ```ignore
//! type Shapes = SpecializedPluginHandle<candidates![dyn IntBase, dyn SetterBase]>;
//! let handle: Shapes = loader.instantiate_specialized("::plugins::Dummy");
//! let value = handle.interface::<dyn IntBase>().my_integer_value_is();
//! ```

use std::any::TypeId;
use std::borrow::Borrow;
use std::cmp::Ordering;
use std::ffi::c_void;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::ptr::NonNull;

use dynaplug_sdk::Interface;

use crate::capability::{RawCapability, SharedCapability};
use crate::descriptor::PluginInfo;
use crate::handle::PluginHandle;
use crate::library::LibraryRecord;

/// Type-level marker for one candidate interface of a specialized handle.
pub struct Candidate<I: ?Sized>(PhantomData<fn() -> *const I>);

/// Builds the candidate list of a [`SpecializedPluginHandle`] from 1 to 8
/// interface types.
#[macro_export]
macro_rules! candidates {
    ($($iface:ty),+ $(,)?) => {
        ($($crate::specialized::Candidate<$iface>,)+)
    };
}

mod sealed {
    pub trait Sealed {}
}

/// A closed list of candidate interfaces, written with [`candidates!`].
pub trait InterfaceSet: sealed::Sealed + 'static {
    /// One slot per candidate, in declaration order.
    type Slots: AsRef<[Option<RawCapability>]> + Default + Clone + Send + Sync + fmt::Debug;

    /// Candidate interface names, in declaration order.
    fn names() -> Vec<&'static str>;

    /// Slot of `I`, if it is a candidate.
    fn position<I: ?Sized + Interface>() -> Option<usize>;

    fn resolve(handle: &PluginHandle) -> Self::Slots;
}

macro_rules! impl_interface_set {
    ($len:literal; $($name:ident),+) => {
        impl<$($name: ?Sized + Interface),+> sealed::Sealed for ($(Candidate<$name>,)+) {}

        impl<$($name: ?Sized + Interface),+> InterfaceSet for ($(Candidate<$name>,)+) {
            type Slots = [Option<RawCapability>; $len];

            fn names() -> Vec<&'static str> {
                vec![$(<$name as Interface>::NAME),+]
            }

            fn position<I: ?Sized + Interface>() -> Option<usize> {
                let wanted = TypeId::of::<I>();
                [$(TypeId::of::<$name>()),+]
                    .iter()
                    .position(|candidate| *candidate == wanted)
            }

            fn resolve(handle: &PluginHandle) -> Self::Slots {
                [$(handle.raw_capability(<$name as Interface>::NAME)),+]
            }
        }
    };
}

impl_interface_set!(1; A);
impl_interface_set!(2; A, B);
impl_interface_set!(3; A, B, C);
impl_interface_set!(4; A, B, C, D);
impl_interface_set!(5; A, B, C, D, E);
impl_interface_set!(6; A, B, C, D, E, F);
impl_interface_set!(7; A, B, C, D, E, F, G);
impl_interface_set!(8; A, B, C, D, E, F, G, H);

/// A [`PluginHandle`] with pre-resolved capabilities for the interfaces in `S`.
///
/// Shares identity with the generic handle it was built from: the two compare
/// equal and hash alike.
pub struct SpecializedPluginHandle<S: InterfaceSet> {
    handle: PluginHandle,
    slots: S::Slots,
}

impl<S: InterfaceSet> SpecializedPluginHandle<S> {
    /// Resolves every candidate of `S` against `handle`'s instance.
    pub fn new(handle: PluginHandle) -> Self {
        let slots = S::resolve(&handle);
        Self { handle, slots }
    }

    /// Whether queries for `I` are answered from a slot.
    pub fn is_specialized_for<I: ?Sized + Interface>() -> bool {
        S::position::<I>().is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.handle.is_empty()
    }

    /// Releases the instance and clears every slot.
    pub fn reset(&mut self) {
        self.handle.reset();
        self.slots = S::Slots::default();
    }

    pub fn take(&mut self) -> Self {
        std::mem::take(self)
    }

    /// The generic handle sharing this instance.
    pub fn handle(&self) -> &PluginHandle {
        &self.handle
    }

    pub fn into_handle(self) -> PluginHandle {
        self.handle
    }

    /// The same instance, specialized for another candidate list.
    pub fn respecialize<T: InterfaceSet>(&self) -> SpecializedPluginHandle<T> {
        SpecializedPluginHandle::new(self.handle.clone())
    }

    pub fn plugin_name(&self) -> Option<&str> {
        self.handle.plugin_name()
    }

    pub fn plugin_info(&self) -> Option<&PluginInfo> {
        self.handle.plugin_info()
    }

    pub fn library(&self) -> Option<&LibraryRecord> {
        self.handle.library()
    }

    pub fn query_interface_raw(&self, interface: &str) -> Option<NonNull<c_void>> {
        self.handle.query_interface_raw(interface)
    }

    pub fn has_interface(&self, interface: &str) -> bool {
        self.handle.has_interface(interface)
    }

    /// Answered from a slot when `I` is a candidate, by name otherwise.
    pub fn query_interface<I: ?Sized + Interface>(&self) -> Option<&I> {
        // SAFETY: slots hold capabilities cast for their candidate type from
        // the instance `self.handle` keeps alive.
        self.capability::<I>()
            .map(|capability| unsafe { capability.resolve::<I>() })
    }

    /// Panicking [`query_interface`](Self::query_interface).
    pub fn interface<I: ?Sized + Interface>(&self) -> &I {
        match self.query_interface::<I>() {
            Some(capability) => capability,
            None => panic!("{}", self.handle.missing_interface(I::NAME)),
        }
    }

    /// See [`PluginHandle::as_shared`].
    pub fn as_shared<I: ?Sized + Interface>(&self) -> Option<SharedCapability<I>> {
        let capability = self.capability::<I>()?;
        self.handle.share(capability)
    }

    fn capability<I: ?Sized + Interface>(&self) -> Option<RawCapability> {
        match S::position::<I>() {
            Some(slot) => self.slots.as_ref()[slot],
            None => self.handle.raw_capability(I::NAME),
        }
    }
}

impl<S: InterfaceSet> Default for SpecializedPluginHandle<S> {
    fn default() -> Self {
        Self {
            handle: PluginHandle::default(),
            slots: S::Slots::default(),
        }
    }
}

impl<S: InterfaceSet> Clone for SpecializedPluginHandle<S> {
    fn clone(&self) -> Self {
        Self {
            handle: self.handle.clone(),
            slots: self.slots.clone(),
        }
    }
}

impl<S: InterfaceSet> From<PluginHandle> for SpecializedPluginHandle<S> {
    fn from(handle: PluginHandle) -> Self {
        Self::new(handle)
    }
}

impl<S: InterfaceSet> From<SpecializedPluginHandle<S>> for PluginHandle {
    fn from(handle: SpecializedPluginHandle<S>) -> Self {
        handle.handle
    }
}

impl<S: InterfaceSet> Borrow<PluginHandle> for SpecializedPluginHandle<S> {
    fn borrow(&self) -> &PluginHandle {
        &self.handle
    }
}

impl<S: InterfaceSet, T: InterfaceSet> PartialEq<SpecializedPluginHandle<T>>
    for SpecializedPluginHandle<S>
{
    fn eq(&self, other: &SpecializedPluginHandle<T>) -> bool {
        self.handle == other.handle
    }
}

impl<S: InterfaceSet> PartialEq<PluginHandle> for SpecializedPluginHandle<S> {
    fn eq(&self, other: &PluginHandle) -> bool {
        self.handle == *other
    }
}

impl<S: InterfaceSet> PartialEq<SpecializedPluginHandle<S>> for PluginHandle {
    fn eq(&self, other: &SpecializedPluginHandle<S>) -> bool {
        *self == other.handle
    }
}

impl<S: InterfaceSet> Eq for SpecializedPluginHandle<S> {}

impl<S: InterfaceSet> PartialOrd for SpecializedPluginHandle<S> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<S: InterfaceSet> Ord for SpecializedPluginHandle<S> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.handle.cmp(&other.handle)
    }
}

impl<S: InterfaceSet> Hash for SpecializedPluginHandle<S> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.handle.hash(state);
    }
}

impl<S: InterfaceSet> fmt::Debug for SpecializedPluginHandle<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpecializedPluginHandle")
            .field("handle", &self.handle)
            .field("candidates", &S::names())
            .finish()
    }
}
