//! An in-process plugin for unit tests.

use std::collections::BTreeSet;
use std::mem::{size_of, MaybeUninit};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dynaplug_sdk::abi::RawPluginInfo;
use libloading::Library;

use crate::descriptor::PluginInfo;
use crate::library::LibraryRecord;

pub(crate) trait CounterApi: Send + Sync {
    fn bump(&self) -> usize;
}
pub(crate) trait UnusedApi: Send + Sync {}

dynaplug_sdk::declare_interface!(CounterApi);
dynaplug_sdk::declare_interface!(UnusedApi);

pub(crate) static DROPPED: AtomicUsize = AtomicUsize::new(0);

#[derive(Default)]
pub(crate) struct Counter {
    hits: AtomicUsize,
}

impl CounterApi for Counter {
    fn bump(&self) -> usize {
        self.hits.fetch_add(1, Ordering::SeqCst) + 1
    }
}

impl Drop for Counter {
    fn drop(&mut self) {
        DROPPED.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub(crate) struct Gauge;

impl CounterApi for Gauge {
    fn bump(&self) -> usize {
        0
    }
}

dynaplug_sdk::register_plugins! {
    Counter => [dyn CounterApi],
    Gauge => [dyn CounterApi],
}

/// Descriptors of `Counter` and `Gauge`, normalized.
pub(crate) fn descriptors() -> Vec<PluginInfo> {
    let mut infos = Vec::new();
    for index in 0.. {
        let mut raw = MaybeUninit::<RawPluginInfo>::uninit();
        let remaining = unsafe {
            dynaplug_multi_plugin_info(raw.as_mut_ptr().cast(), index, size_of::<RawPluginInfo>())
        };
        if remaining == 0 {
            break;
        }
        let info = unsafe { PluginInfo::from_raw(&raw.assume_init()) }.unwrap();
        infos.push(info.normalized());
    }
    infos
}

/// The test binary itself, standing in for a plugin library.
pub(crate) fn this_process() -> Library {
    #[cfg(unix)]
    let library = Library::from(libloading::os::unix::Library::this());
    #[cfg(windows)]
    let library = Library::from(libloading::os::windows::Library::this().unwrap());
    library
}

pub(crate) fn this_library(path: &str, plugin_names: BTreeSet<String>) -> LibraryRecord {
    LibraryRecord::new(PathBuf::from(path), this_process(), plugin_names)
}

pub(crate) fn counter_plugin() -> (Arc<PluginInfo>, Arc<LibraryRecord>) {
    let info = descriptors().remove(0);
    let library = this_library("counter", BTreeSet::from([info.name().to_owned()]));
    (Arc::new(info), Arc::new(library))
}
