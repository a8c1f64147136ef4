//! Loaded plugin libraries.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use libloading::Library;
use tracing::debug;

/// A library opened by the loader.
///
/// Shared between the loader and every instance created from it: the library
/// stays mapped until the last of them lets go, even after the loader forgot it.
#[derive(Debug)]
pub struct LibraryRecord {
    path: PathBuf,
    plugin_names: BTreeSet<String>,
    live_instances: AtomicUsize,
    // Unmapped when the record drops.
    _library: Library,
}

impl LibraryRecord {
    pub(crate) fn new(path: PathBuf, library: Library, plugin_names: BTreeSet<String>) -> Self {
        Self {
            path,
            plugin_names,
            live_instances: AtomicUsize::new(0),
            _library: library,
        }
    }

    /// Canonical path the library was loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Normalized names of all plugins the library provides.
    pub fn plugin_names(&self) -> impl Iterator<Item = &str> {
        self.plugin_names.iter().map(String::as_str)
    }

    /// Whether the library registered `plugin`, in any spelling.
    pub fn provides(&self, plugin: &str) -> bool {
        self.plugin_names
            .contains(dynaplug_sdk::normalized(plugin).as_ref())
    }

    /// Instances created from this library that have not been destroyed.
    pub fn live_instances(&self) -> usize {
        self.live_instances.load(Ordering::Acquire)
    }

    pub(crate) fn acquire_instance(&self) {
        self.live_instances.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn release_instance(&self) {
        self.live_instances.fetch_sub(1, Ordering::AcqRel);
    }
}

impl Drop for LibraryRecord {
    fn drop(&mut self) {
        debug!("Unloading library [{}]", self.path.display());
    }
}
