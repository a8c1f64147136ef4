//! ABI negotiation: reads a library's plugin symbols and picks the descriptor
//! function matching its declared API version.
//!
//! | version | descriptor size          | function                       |
//! |---------|--------------------------|--------------------------------|
//! | 3       | `RawPluginInfo`          | `dynaplug_multi_plugin_info`   |
//! | 2       | `LegacyPluginInfo`       | `dynaplug_single_plugin_info`, fills |
//! | 1       | `LegacyPluginInfo`       | `dynaplug_single_plugin_info`, returns |

use std::ffi::{c_int, c_void};
use std::mem::{size_of, MaybeUninit};
use std::path::Path;

use dynaplug_sdk::abi::{
    symbols, LegacyPluginInfo, MultiInfoFn, RawPluginInfo, SingleInfoFillFn, SingleInfoReturnFn,
    LEGACY_FILL_API_VERSION, LEGACY_RETURN_API_VERSION, PLUGIN_API_VERSION,
};
use libloading::{Library, Symbol};
use tracing::{debug, warn};

use crate::descriptor::PluginInfo;
use crate::error::AbiError;

const MULTI_FUNCTION: &str = "dynaplug_multi_plugin_info";
const SINGLE_FUNCTION: &str = "dynaplug_single_plugin_info";

/// The plugin symbols a library exports. Reading them calls no plugin code.
///
/// The single-descriptor symbol is kept under both legacy signatures; the
/// declared version decides which one is called.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Exports {
    pub(crate) version: Option<c_int>,
    pub(crate) info_size: Option<usize>,
    pub(crate) multi: Option<MultiInfoFn>,
    pub(crate) single_fill: Option<SingleInfoFillFn>,
    pub(crate) single_return: Option<SingleInfoReturnFn>,
}

impl Exports {
    /// # Safety
    ///
    /// Symbols with the plugin ABI names must have the types fixed by
    /// [`dynaplug_sdk::abi`].
    pub(crate) unsafe fn read(library: &Library) -> Self {
        // SAFETY: upheld by the caller; both statics are read-only.
        let version = unsafe { lookup::<*const c_int>(library, symbols::API_VERSION) }
            .map(|version| unsafe { **version });
        let info_size = unsafe { lookup::<*const usize>(library, symbols::INFO_SIZE) }
            .map(|size| unsafe { **size });
        Self {
            version,
            info_size,
            multi: unsafe { lookup::<MultiInfoFn>(library, symbols::MULTI_PLUGIN_INFO) }
                .map(|multi| *multi),
            single_fill: unsafe {
                lookup::<SingleInfoFillFn>(library, symbols::SINGLE_PLUGIN_INFO)
            }
            .map(|fill| *fill),
            single_return: unsafe {
                lookup::<SingleInfoReturnFn>(library, symbols::SINGLE_PLUGIN_INFO)
            }
            .map(|single| *single),
        }
    }

    fn has_info_function(&self) -> bool {
        self.multi.is_some() || self.single_fill.is_some() || self.single_return.is_some()
    }
}

/// Descriptors read from a library, with the API version it was built for.
#[derive(Debug)]
pub(crate) struct Negotiated {
    pub(crate) version: c_int,
    pub(crate) infos: Vec<PluginInfo>,
}

impl Negotiated {
    /// Built against an older API: instances have no deleter.
    pub(crate) fn is_outdated(&self) -> bool {
        self.version < PLUGIN_API_VERSION
    }
}

/// Reads every usable plugin descriptor exported by `library`.
///
/// Names are returned as the library wrote them; the loader normalizes them.
pub(crate) fn read_plugin_infos(library: &Library, path: &Path) -> Result<Negotiated, AbiError> {
    // SAFETY: the symbol types are the ones fixed by `dynaplug_sdk::abi`.
    let exports = unsafe { Exports::read(library) };
    debug!(
        "Library [{}] declares plugin API version {:?} with descriptor size {:?}",
        path.display(),
        exports.version,
        exports.info_size
    );
    // SAFETY: the function pointers come from `library`, which outlives this call.
    unsafe { negotiate(&exports) }
}

/// Dispatches on the declared version.
///
/// # Safety
///
/// Every function in `exports` must be callable with the signature it is
/// stored under.
pub(crate) unsafe fn negotiate(exports: &Exports) -> Result<Negotiated, AbiError> {
    let (Some(version), Some(size)) = (exports.version, exports.info_size) else {
        return Err(AbiError::MissingSymbols);
    };
    if !exports.has_info_function() {
        return Err(AbiError::MissingSymbols);
    }

    let infos = match version {
        PLUGIN_API_VERSION => {
            check_size(version, size, size_of::<RawPluginInfo>())?;
            let multi = exports.multi.ok_or(AbiError::MissingInfoFunction {
                version,
                symbol: MULTI_FUNCTION,
            })?;
            // SAFETY: version and size match the current ABI.
            unsafe { read_current(multi) }
        }
        LEGACY_FILL_API_VERSION => {
            check_size(version, size, size_of::<LegacyPluginInfo>())?;
            let fill = exports.single_fill.ok_or(AbiError::MissingInfoFunction {
                version,
                symbol: SINGLE_FUNCTION,
            })?;
            // SAFETY: a version 2 library exports the fill signature.
            unsafe { read_legacy_fill(fill, version) }?
        }
        LEGACY_RETURN_API_VERSION => {
            check_size(version, size, size_of::<LegacyPluginInfo>())?;
            let single = exports.single_return.ok_or(AbiError::MissingInfoFunction {
                version,
                symbol: SINGLE_FUNCTION,
            })?;
            // SAFETY: a version 1 library exports the by-value signature.
            let raw = unsafe { single() };
            unsafe { PluginInfo::from_legacy(&raw) }.into_iter().collect()
        }
        _ => return Err(AbiError::UnsupportedVersion { version }),
    };

    if infos.is_empty() {
        return Err(AbiError::NoDescriptors);
    }
    Ok(Negotiated { version, infos })
}

/// Logged once a library built against an older API has loaded.
pub(crate) fn warn_outdated(path: &Path, version: c_int) {
    warn!(
        "The library [{}] is using version [{}] of the plugin API. Its plugins \
         have no destructor and every instance will be leaked. The latest version \
         is [{}]; please rebuild the library.",
        path.display(),
        version,
        PLUGIN_API_VERSION
    );
}

fn check_size(version: c_int, found: usize, expected: usize) -> Result<(), AbiError> {
    if found == expected {
        Ok(())
    } else {
        Err(AbiError::Incompatible {
            version,
            expected,
            found,
        })
    }
}

unsafe fn lookup<'lib, T>(library: &'lib Library, symbol: &[u8]) -> Option<Symbol<'lib, T>> {
    // SAFETY: upheld by the caller.
    match unsafe { library.get::<T>(symbol) } {
        Ok(found) => Some(found),
        Err(err) => {
            debug!("{}", err);
            None
        }
    }
}

unsafe fn read_current(multi: MultiInfoFn) -> Vec<PluginInfo> {
    let mut infos = Vec::new();
    for index in 0.. {
        let mut raw = MaybeUninit::<RawPluginInfo>::uninit();
        // SAFETY: `raw` has room for exactly the size we pass.
        let remaining = unsafe { multi(raw.as_mut_ptr().cast(), index, size_of::<RawPluginInfo>()) };
        if remaining == 0 {
            break;
        }
        // SAFETY: a non-zero return means the descriptor was written.
        let raw = unsafe { raw.assume_init() };
        match unsafe { PluginInfo::from_raw(&raw) } {
            Some(info) => infos.push(info),
            None => warn!("Skipping unusable plugin descriptor #{}", index),
        }
    }
    infos
}

unsafe fn read_legacy_fill(fill: SingleInfoFillFn, version: c_int) -> Result<Vec<PluginInfo>, AbiError> {
    let mut raw = MaybeUninit::<LegacyPluginInfo>::uninit();
    // SAFETY: `raw` has room for exactly the size we pass.
    let written = unsafe { fill(raw.as_mut_ptr().cast::<c_void>(), size_of::<LegacyPluginInfo>()) };
    if written == 0 {
        return Err(AbiError::LegacyInfoUnavailable { version });
    }
    // SAFETY: a non-zero return means the descriptor was written.
    let raw = unsafe { raw.assume_init() };
    Ok(unsafe { PluginInfo::from_legacy(&raw) }.into_iter().collect())
}
