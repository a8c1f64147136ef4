//! Declarative macros for interface crates and plugin libraries.

/// Makes a trait usable as a plugin interface.
///
/// The trait must have `Send + Sync` as supertraits. Its name defaults to the
/// module path of the invocation followed by the trait name, which no other
/// trait can share.
///
/// ```ignore
/// pub trait NameBase: Send + Sync {
///     fn my_name_is(&self) -> String;
/// }
/// dynaplug_sdk::declare_interface!(NameBase);
/// dynaplug_sdk::declare_interface!(unsafe OtherBase as "::shared::OtherBase");
/// ```
///
/// # Safety
///
/// An explicit name must be written `unsafe Trait as "name"`. The caller
/// guarantees that no other trait, in any library loaded into the same host, is
/// declared under that name: the host resolves capabilities by name alone and
/// would read one trait object as the other.
#[macro_export]
macro_rules! declare_interface {
    (unsafe $trait_:ident as $name:literal) => {
        unsafe impl $crate::Interface for dyn $trait_ {
            const NAME: &'static str = $name;
            const C_NAME: &'static ::std::ffi::CStr =
                $crate::abi::c_name(concat!($name, "\0").as_bytes());
        }
    };
    ($trait_:ident) => {
        unsafe impl $crate::Interface for dyn $trait_ {
            const NAME: &'static str = concat!(module_path!(), "::", stringify!($trait_));
            const C_NAME: &'static ::std::ffi::CStr = $crate::abi::c_name(
                concat!(module_path!(), "::", stringify!($trait_), "\0").as_bytes(),
            );
        }
    };
}

/// Exports the plugin symbols of a library.
///
/// Invoke once per library, at the crate root. Every plugin type must implement
/// `Default` and every listed interface; the plugin's name is the module path of
/// the invocation followed by the type name.
///
/// ```ignore
/// dynaplug_sdk::register_plugins! {
///     DummySinglePlugin => [dyn NameBase],
///     DummyMultiPlugin => [dyn NameBase, dyn DoubleBase, dyn IntBase],
/// }
/// ```
#[macro_export]
macro_rules! register_plugins {
    ($($plugin:ident => [$($iface:ty),+ $(,)?]),+ $(,)?) => {
        #[no_mangle]
        pub static DYNAPLUG_PLUGIN_API_VERSION: ::std::ffi::c_int = $crate::abi::PLUGIN_API_VERSION;

        #[no_mangle]
        pub static DYNAPLUG_PLUGIN_INFO_SIZE: usize =
            ::std::mem::size_of::<$crate::abi::RawPluginInfo>();

        /// # Safety
        ///
        /// `out` must be null or valid for writing `size` bytes.
        #[no_mangle]
        pub unsafe extern "C" fn dynaplug_multi_plugin_info(
            out: *mut ::std::ffi::c_void,
            index: usize,
            size: usize,
        ) -> usize {
            static PLUGINS: &[$crate::abi::RawPluginInfo] = &[
                $($crate::__plugin_info!($plugin => [$($iface),+])),+
            ];
            unsafe { $crate::export::fill_plugin_info(PLUGINS, out, index, size) }
        }
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __plugin_info {
    ($plugin:ident => [$($iface:ty),+]) => {{
        unsafe extern "C" fn factory() -> *mut ::std::ffi::c_void {
            let plugin = <$plugin as ::std::default::Default>::default();
            let cell = $crate::InstanceCell::new(plugin, |plugin, capabilities| {
                $(capabilities.provide::<$iface>(plugin);)+
            });
            $crate::export::into_raw(cell)
        }

        static INTERFACES: &[$crate::abi::RawInterfaceEntry] = &[$(
            $crate::abi::RawInterfaceEntry::new(
                <$iface as $crate::Interface>::C_NAME,
                $crate::export::cast::<$plugin, $iface>,
            )
        ),+];

        $crate::abi::RawPluginInfo::new(
            $crate::abi::c_name(concat!(module_path!(), "::", stringify!($plugin), "\0").as_bytes()),
            INTERFACES,
            factory,
            $crate::export::destroy::<$plugin>,
        )
    }};
}
