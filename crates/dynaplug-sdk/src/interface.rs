//! Interface identity and the capability pointers handed to the host.

use std::any::Any;
use std::borrow::Cow;
use std::ffi::CStr;
use std::fmt;
use std::marker::PhantomData;
use std::ptr::NonNull;

/// A trait object type that plugins can implement and hosts can query.
///
/// Implemented for `dyn Trait` by [`declare_interface!`](crate::declare_interface);
/// do not implement it by hand.
///
/// # Safety
///
/// `NAME` identifies the layout of `Self` across library boundaries. Two types
/// sharing a name are treated as the same interface by the host, so a name must
/// only ever be declared for one trait.
pub unsafe trait Interface: Send + Sync + 'static {
    /// Fully qualified name, as written by the declaring crate.
    const NAME: &'static str;
    /// `NAME` as a C string, for descriptor tables.
    const C_NAME: &'static CStr;
}

/// Canonical spelling of a plugin or interface name.
///
/// All whitespace is dropped and a leading `::` is ensured, so `a::B`,
/// `::a::B` and `a :: B` compare equal after normalization.
///
/// ```
/// assert_eq!(dynaplug_sdk::normalize_name(" demo :: Plugin"), "::demo::Plugin");
/// ```
pub fn normalize_name(name: &str) -> String {
    normalized(name).into_owned()
}

/// Like [`normalize_name`] but borrows when the input is already canonical.
pub fn normalized(name: &str) -> Cow<'_, str> {
    if name.starts_with("::") && !name.chars().any(char::is_whitespace) {
        return Cow::Borrowed(name);
    }
    let compact: String = name.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.starts_with("::") {
        Cow::Owned(compact)
    } else {
        Cow::Owned(format!("::{compact}"))
    }
}

/// Thin, C-addressable handle to a capability of a live instance.
///
/// Cast functions return a pointer to one of these. It is `repr(transparent)`
/// over the (possibly wide) reference, so the host reads it back as long as it
/// asks for the same `I` the plugin stored.
#[repr(transparent)]
pub struct CapabilityRef<I: ?Sized>(NonNull<I>);

impl<I: ?Sized> CapabilityRef<I> {
    pub fn new(target: &I) -> Self {
        Self(NonNull::from(target))
    }

    /// # Safety
    ///
    /// The instance this capability was taken from must outlive `'a`.
    pub unsafe fn get<'a>(&self) -> &'a I {
        // SAFETY: upheld by the caller.
        unsafe { self.0.as_ref() }
    }
}

impl<I: ?Sized> fmt::Debug for CapabilityRef<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CapabilityRef").field(&self.0.cast::<u8>()).finish()
    }
}

// SAFETY: a CapabilityRef is a shared reference in disguise.
unsafe impl<I: ?Sized + Sync> Send for CapabilityRef<I> {}
unsafe impl<I: ?Sized + Sync> Sync for CapabilityRef<I> {}

/// The capabilities of one instance, keyed by interface type.
#[derive(Default)]
pub struct CapabilitySet {
    entries: Vec<Box<dyn Any + Send + Sync>>,
}

impl CapabilitySet {
    /// Publishes `target` as interface `I`. Later duplicates are ignored by [`find`](Self::find).
    pub fn provide<I: ?Sized + Interface>(&mut self, target: &I) -> &mut Self {
        self.entries.push(Box::new(CapabilityRef::<I>::new(target)));
        self
    }

    /// The first capability published as `I`.
    pub fn find<I: ?Sized + Interface>(&self) -> Option<&CapabilityRef<I>> {
        self.entries
            .iter()
            .find_map(|entry| (**entry).downcast_ref::<CapabilityRef<I>>())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// What a factory hands to the host: the plugin plus its published capabilities.
///
/// The plugin is owned through a raw pointer rather than a `Box`, so moving the
/// cell never retags the allocation and the capability pointers taken from it
/// stay valid.
pub struct InstanceCell<P> {
    capabilities: CapabilitySet,
    plugin: NonNull<P>,
    _owns: PhantomData<P>,
}

// SAFETY: the cell owns `P` exclusively and only hands out shared references.
unsafe impl<P: Send> Send for InstanceCell<P> {}
unsafe impl<P: Sync> Sync for InstanceCell<P> {}

impl<P: 'static> InstanceCell<P> {
    /// Moves `plugin` to the heap and lets `provide` publish its capabilities.
    pub fn new(plugin: P, provide: impl FnOnce(&P, &mut CapabilitySet)) -> Self {
        let plugin = NonNull::from(Box::leak(Box::new(plugin)));
        let mut capabilities = CapabilitySet::default();
        // SAFETY: `plugin` is live until Drop and never borrowed mutably.
        provide(unsafe { plugin.as_ref() }, &mut capabilities);
        Self {
            capabilities,
            plugin,
            _owns: PhantomData,
        }
    }

    pub fn plugin(&self) -> &P {
        // SAFETY: see `new`.
        unsafe { self.plugin.as_ref() }
    }

    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }
}

impl<P> Drop for InstanceCell<P> {
    fn drop(&mut self) {
        // Capabilities point into the plugin and go first.
        self.capabilities = CapabilitySet::default();
        // SAFETY: `plugin` came from `Box::leak` in `new` and is freed once.
        drop(unsafe { Box::from_raw(self.plugin.as_ptr()) });
    }
}
