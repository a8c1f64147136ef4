//! The plugin loader: opens libraries, indexes their plugins and creates
//! instances.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dynaplug_sdk::{normalize_name, normalized, Interface};
use libloading::Library;
use tracing::{debug, error, info, warn};

use crate::config::{DuplicatePolicy, LoaderConfig};
use crate::descriptor::PluginInfo;
use crate::error::{LoadError, Result};
use crate::handle::PluginHandle;
use crate::library::LibraryRecord;
use crate::negotiate;
use crate::specialized::{InterfaceSet, SpecializedPluginHandle};

#[derive(Debug)]
struct RegisteredPlugin {
    info: Arc<PluginInfo>,
    library: Arc<LibraryRecord>,
}

/// Loads plugin libraries and creates plugin instances by name.
///
/// Plugin and interface names are accepted in any spelling that normalizes to
/// the same string (see [`normalize_name`]). Instances keep their library
/// loaded on their own, so forgetting a library never invalidates a handle.
#[derive(Debug, Default)]
pub struct PluginLoader {
    config: LoaderConfig,
    libraries: HashMap<PathBuf, Arc<LibraryRecord>>,
    plugins: HashMap<String, RegisteredPlugin>,
}

impl PluginLoader {
    /// An empty loader with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty loader. Nothing is loaded until [`load_configured`](Self::load_configured)
    /// or [`load_library`](Self::load_library) is called.
    pub fn with_config(config: LoaderConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Loads every library listed in [`LoaderConfig::preload`] and returns
    /// the names of all plugins registered by them.
    pub fn load_configured(&mut self) -> HashSet<String> {
        let preload = self.config.preload.clone();
        preload
            .iter()
            .flat_map(|path| self.load_library(path))
            .collect()
    }

    /// Loads the library at `path` and returns the normalized names of the
    /// plugins it registered. Failures are logged and yield an empty set.
    pub fn load_library(&mut self, path: impl AsRef<Path>) -> HashSet<String> {
        match self.try_load_library(path) {
            Ok(names) => names,
            Err(err) => {
                error!("{}", err);
                HashSet::new()
            }
        }
    }

    /// Like [`load_library`](Self::load_library) but returns why the library
    /// could not be used. On error nothing is registered and the library is
    /// closed again.
    pub fn try_load_library(&mut self, path: impl AsRef<Path>) -> Result<HashSet<String>> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(LoadError::NotFound(path.to_path_buf()));
        }
        debug!("Opening library [{}]", path.display());

        // SAFETY: opening a library runs its initialisers. Plugin libraries are
        // trusted code, built against the same SDK and toolchain as the host.
        let library = unsafe { Library::new(path) }.map_err(|source| LoadError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let negotiated = negotiate::read_plugin_infos(&library, path).map_err(|source| {
            LoadError::Abi {
                path: path.to_path_buf(),
                source,
            }
        })?;
        if self.config.warn_outdated_abi && negotiated.is_outdated() {
            negotiate::warn_outdated(path, negotiated.version);
        }

        let added = self.register(library_key(path), library, negotiated.infos);
        info!(
            "Loaded {} plugin(s) from library [{}]",
            added.len(),
            path.display()
        );
        Ok(added)
    }

    pub(crate) fn register(
        &mut self,
        key: PathBuf,
        library: Library,
        infos: Vec<PluginInfo>,
    ) -> HashSet<String> {
        let accepted: Vec<PluginInfo> = infos
            .into_iter()
            .map(PluginInfo::normalized)
            .filter(|info| self.accepts(info, &key))
            .collect();
        if accepted.is_empty() {
            return HashSet::new();
        }

        let names: BTreeSet<String> = accepted.iter().map(|info| info.name().to_owned()).collect();
        let record = Arc::new(LibraryRecord::new(key, library, names.clone()));
        for info in accepted {
            self.plugins.insert(
                info.name().to_owned(),
                RegisteredPlugin {
                    info: Arc::new(info),
                    library: Arc::clone(&record),
                },
            );
        }
        self.libraries.insert(record.path().to_path_buf(), record);
        names.into_iter().collect()
    }

    /// Applies the duplicate policy to a plugin about to be registered from
    /// the library at `key`.
    fn accepts(&self, info: &PluginInfo, key: &Path) -> bool {
        let Some(existing) = self.plugins.get(info.name()) else {
            return true;
        };
        if existing.library.path() == key {
            return true;
        }
        match self.config.duplicate_policy {
            DuplicatePolicy::Overwrite => {
                warn!(
                    "Plugin [{}] from library [{}] replaces the one from library [{}]",
                    info.name(),
                    key.display(),
                    existing.library.path().display()
                );
                true
            }
            DuplicatePolicy::Reject => {
                warn!(
                    "Plugin [{}] from library [{}] is ignored: already provided by library [{}]",
                    info.name(),
                    key.display(),
                    existing.library.path().display()
                );
                false
            }
        }
    }

    /// Normalized names of every interface implemented by a known plugin.
    pub fn interfaces_implemented(&self) -> HashSet<String> {
        self.plugins
            .values()
            .flat_map(|plugin| plugin.info.interfaces())
            .map(str::to_owned)
            .collect()
    }

    /// Normalized names of the known plugins implementing `interface`.
    pub fn plugins_implementing(&self, interface: &str) -> HashSet<String> {
        let interface = normalized(interface);
        self.plugins
            .values()
            .filter(|plugin| plugin.info.implements(&interface))
            .map(|plugin| plugin.info.name().to_owned())
            .collect()
    }

    /// [`plugins_implementing`](Self::plugins_implementing) for `I::NAME`.
    pub fn plugins_implementing_interface<I: ?Sized + Interface>(&self) -> HashSet<String> {
        self.plugins_implementing(I::NAME)
    }

    /// Creates an instance of `plugin`. Unknown plugins and failing factories
    /// yield an empty handle.
    pub fn instantiate(&self, plugin: &str) -> PluginHandle {
        let name = normalized(plugin);
        match self.plugins.get(name.as_ref()) {
            Some(registered) => PluginHandle::instantiate(
                Arc::clone(&registered.info),
                Arc::clone(&registered.library),
            ),
            None => {
                error!("Plugin [{}] is not available", name);
                PluginHandle::default()
            }
        }
    }

    /// Like [`instantiate`](Self::instantiate), with the capabilities in `S`
    /// resolved up front.
    pub fn instantiate_specialized<S: InterfaceSet>(
        &self,
        plugin: &str,
    ) -> SpecializedPluginHandle<S> {
        SpecializedPluginHandle::new(self.instantiate(plugin))
    }

    /// Drops the library at `path` and every plugin it provided. Existing
    /// instances stay valid; the library is unloaded once the last of them is
    /// gone. Returns false when no such library was loaded.
    pub fn forget_library(&mut self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        let Some(key) = self.find_library_key(path) else {
            debug!("Library [{}] is not loaded", path.display());
            return false;
        };
        let Some(record) = self.libraries.remove(&key) else {
            return false;
        };
        self.plugins.retain(|_, plugin| plugin.library.path() != key.as_path());
        debug!(
            "Forgot library [{}] ({} live instance(s) remain)",
            key.display(),
            record.live_instances()
        );
        true
    }

    /// [`forget_library`](Self::forget_library) for the library providing
    /// `plugin`.
    pub fn forget_library_of_plugin(&mut self, plugin: &str) -> bool {
        match self.library_of_plugin(plugin).map(Path::to_path_buf) {
            Some(path) => self.forget_library(path),
            None => {
                debug!("Plugin [{}] is not available", normalize_name(plugin));
                false
            }
        }
    }

    /// Metadata of a known plugin, any spelling.
    pub fn plugin_info(&self, plugin: &str) -> Option<&PluginInfo> {
        self.plugins
            .get(normalized(plugin).as_ref())
            .map(|registered| registered.info.as_ref())
    }

    /// Every known plugin, in no particular order.
    pub fn plugins(&self) -> impl Iterator<Item = &PluginInfo> {
        self.plugins.values().map(|registered| registered.info.as_ref())
    }

    /// Libraries the loader currently holds. Forgotten libraries kept alive by
    /// instances are not listed.
    pub fn libraries(&self) -> impl Iterator<Item = &LibraryRecord> {
        self.libraries.values().map(Arc::as_ref)
    }

    /// Path of the library providing `plugin`.
    pub fn library_of_plugin(&self, plugin: &str) -> Option<&Path> {
        self.plugins
            .get(normalized(plugin).as_ref())
            .map(|registered| registered.library.path())
    }

    fn find_library_key(&self, path: &Path) -> Option<PathBuf> {
        let key = library_key(path);
        if self.libraries.contains_key(&key) {
            return Some(key);
        }
        // The file may have been removed since it was loaded.
        self.libraries
            .contains_key(path)
            .then(|| path.to_path_buf())
    }
}

/// Libraries are keyed by canonical path, so different spellings of one file
/// share an entry.
fn library_key(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

impl fmt::Display for PluginLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let interfaces: BTreeSet<String> = self.interfaces_implemented().into_iter().collect();
        let plugins: BTreeMap<&str, &PluginInfo> = self
            .plugins()
            .map(|info| (info.name(), info))
            .collect();

        writeln!(f, "PluginLoader State")?;
        writeln!(f, "\tKnown Interfaces: {}", interfaces.len())?;
        for interface in &interfaces {
            writeln!(f, "\t\t{}", interface)?;
        }
        writeln!(f, "\tKnown Plugins: {}", plugins.len())?;
        for info in plugins.values() {
            writeln!(f, "\t\t{}:", info)?;
            for interface in info.interfaces() {
                writeln!(f, "\t\t\t{}", interface)?;
            }
        }
        Ok(())
    }
}
