//! Loading the dummy plugin library and looking up its plugins.

use std::collections::HashSet;

use dynaplug_core::{normalize_name, DuplicatePolicy, Interface, LoaderConfig, PluginLoader};
use dynaplug_testing::fixtures::{fixture_library, DUMMY_PLUGINS};
use dynaplug_testing::interfaces::{
    DoubleBase, IntBase, NameBase, SetterBase, SomeInterface, DUMMY_MULTI_DOUBLE,
};

const SINGLE: &str = "::dynaplug_dummy_plugins::DummySinglePlugin";
const MULTI: &str = "::dynaplug_dummy_plugins::DummyMultiPlugin";

fn name_of<I: ?Sized + Interface>() -> String {
    normalize_name(I::NAME)
}

fn both_plugins() -> HashSet<String> {
    HashSet::from([SINGLE.to_owned(), MULTI.to_owned()])
}

#[test]
fn test_load_existing_library() {
    let mut loader = PluginLoader::new();
    let names = loader.load_library(fixture_library(DUMMY_PLUGINS));
    assert_eq!(names, both_plugins());

    let interfaces = loader.interfaces_implemented();
    assert_eq!(
        interfaces,
        HashSet::from([
            name_of::<dyn NameBase>(),
            name_of::<dyn DoubleBase>(),
            name_of::<dyn IntBase>(),
            name_of::<dyn SetterBase>(),
        ])
    );
    assert!(!interfaces.contains(&name_of::<dyn SomeInterface>()));

    assert_eq!(loader.plugins_implementing(&name_of::<dyn NameBase>()), both_plugins());
    assert_eq!(
        loader.plugins_implementing_interface::<dyn DoubleBase>(),
        HashSet::from([MULTI.to_owned()])
    );
    assert!(loader
        .plugins_implementing_interface::<dyn SomeInterface>()
        .is_empty());

    let single = loader.instantiate(SINGLE);
    assert!(!single.is_empty());
    assert_eq!(
        single.query_interface::<dyn NameBase>().unwrap().my_name_is(),
        "DummySinglePlugin"
    );
    assert!(single.query_interface::<dyn DoubleBase>().is_none());

    let multi = loader.instantiate(MULTI);
    let value = multi.interface::<dyn DoubleBase>().my_double_value_is();
    assert!((value - DUMMY_MULTI_DOUBLE).abs() < 1e-8);
    assert_eq!(multi.interface::<dyn NameBase>().my_name_is(), "DummyMultiPlugin");
    assert_eq!(multi.interface::<dyn IntBase>().my_integer_value_is(), 5);

    assert_eq!(loader.plugin_info(MULTI).unwrap().interface_count(), 4);
    assert_eq!(loader.library_of_plugin(SINGLE), loader.library_of_plugin(MULTI));
}

#[test]
fn test_any_spelling_of_a_name() {
    let mut loader = PluginLoader::new();
    loader.load_library(fixture_library(DUMMY_PLUGINS));

    for spelling in [
        "dynaplug_dummy_plugins::DummyMultiPlugin",
        "::dynaplug_dummy_plugins::DummyMultiPlugin",
        " dynaplug_dummy_plugins :: DummyMultiPlugin ",
    ] {
        let handle = loader.instantiate(spelling);
        assert_eq!(handle.plugin_name(), Some(MULTI), "spelling {spelling:?}");
    }

    let handle = loader.instantiate(MULTI);
    assert!(handle.has_interface("dynaplug_testing::interfaces::IntBase"));
    assert!(handle.has_interface(":: dynaplug_testing :: interfaces :: IntBase"));
    assert_eq!(
        loader.plugins_implementing("dynaplug_testing::interfaces::SetterBase"),
        HashSet::from([MULTI.to_owned()])
    );
}

#[test]
fn test_unknown_plugin_yields_empty_handle() {
    let mut loader = PluginLoader::new();
    loader.load_library(fixture_library(DUMMY_PLUGINS));

    let handle = loader.instantiate("::dynaplug_dummy_plugins::NoSuchPlugin");
    assert!(handle.is_empty());
    assert!(handle.query_interface::<dyn NameBase>().is_none());
    assert!(loader.plugin_info("::dynaplug_dummy_plugins::NoSuchPlugin").is_none());
}

#[test]
fn test_reload_same_library() {
    let path = fixture_library(DUMMY_PLUGINS);
    let mut loader = PluginLoader::new();
    assert_eq!(loader.load_library(&path), both_plugins());
    let before = loader.instantiate(SINGLE);

    assert_eq!(loader.load_library(&path), both_plugins());
    assert_eq!(loader.libraries().count(), 1);
    assert_eq!(loader.plugins().count(), 2);

    let after = loader.instantiate(SINGLE);
    assert_eq!(before.interface::<dyn NameBase>().my_name_is(), "DummySinglePlugin");
    assert_eq!(after.interface::<dyn NameBase>().my_name_is(), "DummySinglePlugin");
}

#[test]
fn test_forget_library() {
    let path = fixture_library(DUMMY_PLUGINS);
    let mut loader = PluginLoader::new();
    loader.load_library(&path);
    let handle = loader.instantiate(MULTI);

    assert!(loader.forget_library(&path));
    assert!(!loader.forget_library(&path));
    assert!(loader.instantiate(MULTI).is_empty());
    assert!(loader.interfaces_implemented().is_empty());
    assert_eq!(loader.libraries().count(), 0);

    // The instance outlives the loader's interest in its library.
    assert_eq!(handle.interface::<dyn IntBase>().my_integer_value_is(), 5);
    assert_eq!(handle.library().unwrap().live_instances(), 1);
}

#[test]
fn test_forget_library_of_plugin() {
    let mut loader = PluginLoader::new();
    loader.load_library(fixture_library(DUMMY_PLUGINS));

    assert!(loader.forget_library_of_plugin("dynaplug_dummy_plugins::DummySinglePlugin"));
    // Both plugins came from the same library.
    assert!(loader.plugin_info(MULTI).is_none());
    assert!(!loader.forget_library_of_plugin(MULTI));
}

#[test]
fn test_live_instance_count() {
    let mut loader = PluginLoader::new();
    loader.load_library(fixture_library(DUMMY_PLUGINS));
    let library = loader.libraries().next().unwrap();
    assert_eq!(library.live_instances(), 0);
    assert!(library.provides("dynaplug_dummy_plugins::DummySinglePlugin"));
    assert_eq!(library.plugin_names().count(), 2);

    let first = loader.instantiate(SINGLE);
    let second = loader.instantiate(MULTI);
    let copy = second.clone();
    assert_eq!(first.library().unwrap().live_instances(), 2);

    drop(second);
    assert_eq!(first.library().unwrap().live_instances(), 2);
    drop(copy);
    assert_eq!(first.library().unwrap().live_instances(), 1);
}

#[test]
fn test_pretty_dump() {
    let mut loader = PluginLoader::new();
    loader.load_library(fixture_library(DUMMY_PLUGINS));
    let dump = loader.to_string();

    assert!(dump.starts_with("PluginLoader State\n"));
    assert!(dump.contains("\tKnown Interfaces: 4\n"));
    assert!(dump.contains(&format!("\t\t{}\n", name_of::<dyn SetterBase>())));
    assert!(dump.contains("\tKnown Plugins: 2\n"));
    assert!(dump.contains(&format!("\t\t[{MULTI}] which implements 4 interfaces:\n")));
    assert!(dump.contains(&format!("\t\t[{SINGLE}] which implements 1 interface:\n")));
    assert!(dump.contains(&format!("\t\t\t{}\n", name_of::<dyn DoubleBase>())));
}

#[test]
fn test_duplicate_plugins_from_another_library() {
    let original = fixture_library(DUMMY_PLUGINS);
    let dir = tempfile::tempdir().unwrap();
    let copy = dir.path().join(original.file_name().unwrap());
    std::fs::copy(&original, &copy).unwrap();
    let copy = copy.canonicalize().unwrap();

    let mut loader = PluginLoader::new();
    loader.load_library(&original);
    assert_eq!(loader.load_library(&copy), both_plugins());
    assert_eq!(loader.library_of_plugin(SINGLE), Some(copy.as_path()));
    assert_eq!(loader.libraries().count(), 2);

    let mut loader = PluginLoader::with_config(LoaderConfig {
        duplicate_policy: DuplicatePolicy::Reject,
        ..LoaderConfig::default()
    });
    loader.load_library(&original);
    assert!(loader.load_library(&copy).is_empty());
    assert_eq!(
        loader.library_of_plugin(SINGLE),
        Some(original.canonicalize().unwrap().as_path())
    );
}

#[test]
fn test_load_configured() {
    let config = LoaderConfig {
        preload: vec![fixture_library(DUMMY_PLUGINS)],
        ..LoaderConfig::default()
    };
    let mut loader = PluginLoader::with_config(config);
    assert_eq!(loader.load_configured(), both_plugins());
    assert!(!loader.instantiate(SINGLE).is_empty());
}
